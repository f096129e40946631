use replay_engine::{
    DeskState, Engine, Event, ManualClock, PlaybackStatus, Speaker, TileStatus,
};
use serde_json::{Map, Value, json};

fn engine_for(raw: Value) -> (Engine<ManualClock>, ManualClock) {
    let clock = ManualClock::new();
    (Engine::new(clock.clone(), &raw), clock)
}

fn play_to_end(engine: &mut Engine<ManualClock>, clock: &ManualClock) {
    engine.play();
    while let Some(wait) = engine.time_until_next_deadline() {
        clock.advance(wait.as_millis() as u64);
        engine.advance();
    }
}

fn dispatched_offsets(events: &[Event]) -> Vec<u64> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::EventDispatched { t, .. } => Some(*t),
            _ => None,
        })
        .collect()
}

#[test]
fn end_to_end_show_populate_hide() {
    let (mut engine, clock) = engine_for(json!([
        {"t": 0, "event": "transcript", "speaker": "customer", "text": "Hi"},
        {"t": 50, "event": "panel_show", "panel": "changeAddress"},
        {"t": 50, "event": "auto_populate", "panel": "changeAddress", "data": {"city": "NYC"}},
        {"t": 120, "event": "panel_hide", "panel": "changeAddress"},
    ]));

    play_to_end(&mut engine, &clock);

    let state = engine.state();
    assert_eq!(state.transcripts.len(), 1);
    assert_eq!(state.transcripts[0].speaker, Speaker::Customer);
    assert_eq!(state.transcripts[0].text, "Hi");
    assert_eq!(state.transcripts[0].timestamp, 0);
    assert!(state.visible_panels.is_empty());
    assert_eq!(state.tile_data.len(), 1);
    assert_eq!(
        Value::Object(state.tile_data["changeAddress"].clone()),
        json!({"city": "NYC"})
    );
    assert_eq!(engine.status(), PlaybackStatus::Finished);
    assert_eq!(engine.current_time_ms(), 120);
}

#[test]
fn malformed_event_does_not_stop_playback() {
    let (mut engine, clock) = engine_for(json!([
        {"t": 0, "event": "transcript", "speaker": "customer", "text": "First"},
        {"t": 10, "event": "bogus_kind"},
        {"t": 20, "event": "transcript", "speaker": "agent", "text": "Second"},
    ]));

    play_to_end(&mut engine, &clock);

    let texts: Vec<&str> = engine
        .state()
        .transcripts
        .iter()
        .map(|line| line.text.as_str())
        .collect();
    assert_eq!(texts, vec!["First", "Second"]);
}

#[test]
fn shuffled_input_with_distinct_offsets_yields_same_result() {
    let ordered = json!([
        {"t": 0, "event": "transcript", "speaker": "customer", "text": "a"},
        {"t": 10, "event": "ai_reasoning", "text": "b"},
        {"t": 20, "event": "panel_show", "panel": "verifyIdentity"},
        {"t": 30, "event": "transcript", "speaker": "agent", "text": "c"},
        {"t": 40, "event": "auto_populate", "panel": "verifyIdentity", "data": {"dob": "1985-06-15"}},
    ]);
    let shuffled = json!([
        ordered[3].clone(),
        ordered[0].clone(),
        ordered[4].clone(),
        ordered[2].clone(),
        ordered[1].clone(),
    ]);

    let (mut first, first_clock) = engine_for(ordered);
    let (mut second, second_clock) = engine_for(shuffled);
    play_to_end(&mut first, &first_clock);
    play_to_end(&mut second, &second_clock);

    assert_eq!(first.state(), second.state());
    assert_eq!(first.timeline().offsets(), second.timeline().offsets());
}

#[test]
fn events_dispatch_in_ascending_offset_order() {
    let (mut engine, clock) = engine_for(json!([
        {"t": 100, "event": "transcript", "speaker": "customer", "text": "Third"},
        {"t": 0, "event": "transcript", "speaker": "customer", "text": "First"},
        {"t": 50, "event": "transcript", "speaker": "agent", "text": "Second"},
    ]));
    engine.play();

    let mut offsets = dispatched_offsets(&engine.advance());
    assert_eq!(engine.state().transcripts.len(), 1);
    assert_eq!(engine.state().transcripts[0].text, "First");

    clock.advance(50);
    offsets.extend(dispatched_offsets(&engine.advance()));
    assert_eq!(engine.state().transcripts[1].text, "Second");

    clock.advance(50);
    offsets.extend(dispatched_offsets(&engine.advance()));
    assert_eq!(engine.state().transcripts[2].text, "Third");
    assert_eq!(offsets, vec![0, 50, 100]);
}

#[test]
fn transcripts_and_activities_only_grow() {
    let (mut engine, clock) = engine_for(json!([
        {"t": 0, "event": "transcript", "speaker": "customer", "text": "1"},
        {"t": 10, "event": "ai_action_attempt", "action": "Open ledger"},
        {"t": 20, "event": "transcript", "speaker": "agent", "text": "2"},
        {"t": 30, "event": "ai_action_blocked", "action": "Refund", "reason": "Limit"},
    ]));
    engine.play();

    let mut previous = engine.state().clone();
    for _ in 0..5 {
        engine.advance();
        let current = engine.state().clone();
        assert!(current.transcripts.len() >= previous.transcripts.len());
        assert!(current.ai_activities.len() >= previous.ai_activities.len());
        assert_eq!(
            &current.transcripts[..previous.transcripts.len()],
            previous.transcripts.as_slice()
        );
        assert_eq!(
            &current.ai_activities[..previous.ai_activities.len()],
            previous.ai_activities.as_slice()
        );
        previous = current;
        clock.advance(10);
    }
    assert_eq!(previous.transcripts.len(), 2);
    assert_eq!(previous.ai_activities.len(), 2);
}

#[test]
fn last_prefill_for_a_panel_wins() {
    let (mut engine, clock) = engine_for(json!([
        {"t": 0, "event": "auto_populate", "panel": "updateContactDetails", "data": {"phone": "1", "email": "a@b"}},
        {"t": 5, "event": "auto_populate", "panel": "updateContactDetails", "data": {"phone": "2"}},
        {"t": 5, "event": "auto_populate", "panel": "disputeTransaction", "data": {"amount": 42.5, "flagged": true}},
    ]));

    play_to_end(&mut engine, &clock);

    let tiles = &engine.state().tile_data;
    assert_eq!(
        Value::Object(tiles["updateContactDetails"].clone()),
        json!({"phone": "2"})
    );
    assert_eq!(
        Value::Object(tiles["disputeTransaction"].clone()),
        json!({"amount": 42.5, "flagged": true})
    );
}

#[test]
fn submission_moves_from_submitting_to_completed() {
    let (mut engine, clock) = engine_for(json!([
        {"t": 0, "event": "panel_show", "panel": "changeAddress"},
        {"t": 300, "event": "narration", "text": "keeps going"},
        {"t": 600, "event": "panel_hide", "panel": "changeAddress"},
    ]));
    engine.play();
    engine.advance();

    let mut form = Map::new();
    form.insert("city".to_owned(), json!("NYC"));
    engine.submit("changeAddress", &form);
    assert_eq!(
        engine.state().tile_status("changeAddress"),
        TileStatus::Submitting
    );

    clock.advance(300);
    engine.advance();
    assert_eq!(engine.state().narration.as_deref(), Some("keeps going"));
    assert_eq!(
        engine.state().tile_status("changeAddress"),
        TileStatus::Submitting
    );

    clock.advance(200);
    engine.advance();
    assert_eq!(
        engine.state().tile_status("changeAddress"),
        TileStatus::Completed
    );

    clock.advance(100);
    engine.advance();
    assert!(engine.state().visible_panels.is_empty());
    assert_eq!(
        engine.state().tile_status("changeAddress"),
        TileStatus::Completed
    );
    assert_eq!(engine.status(), PlaybackStatus::Finished);
}

#[test]
fn pause_freezes_dispatch_and_resume_continues_without_duplicates() {
    let (mut engine, clock) = engine_for(json!([
        {"t": 0, "event": "transcript", "speaker": "customer", "text": "0"},
        {"t": 100, "event": "transcript", "speaker": "customer", "text": "100"},
        {"t": 200, "event": "transcript", "speaker": "customer", "text": "200"},
        {"t": 300, "event": "transcript", "speaker": "customer", "text": "300"},
    ]));
    let mut dispatched = Vec::new();

    engine.play();
    dispatched.extend(dispatched_offsets(&engine.advance()));
    clock.advance(150);
    dispatched.extend(dispatched_offsets(&engine.pause()));
    assert_eq!(engine.status(), PlaybackStatus::Paused);
    assert_eq!(engine.position_ms(), 150);

    clock.advance(10_000);
    dispatched.extend(dispatched_offsets(&engine.advance()));
    assert_eq!(dispatched, vec![0, 100]);
    assert_eq!(engine.position_ms(), 150);

    engine.play();
    clock.advance(49);
    dispatched.extend(dispatched_offsets(&engine.advance()));
    assert_eq!(dispatched, vec![0, 100]);

    clock.advance(1);
    dispatched.extend(dispatched_offsets(&engine.advance()));
    assert_eq!(dispatched, vec![0, 100, 200]);

    clock.advance(100);
    dispatched.extend(dispatched_offsets(&engine.advance()));
    assert_eq!(dispatched, vec![0, 100, 200, 300]);
    assert_eq!(engine.state().transcripts.len(), 4);
    assert_eq!(engine.status(), PlaybackStatus::Finished);
}

#[test]
fn pause_before_first_event_keeps_remaining_delay() {
    let (mut engine, clock) = engine_for(json!([
        {"t": 100, "event": "narration", "text": "late"},
    ]));
    engine.play();
    clock.advance(40);
    engine.pause();
    clock.advance(500);
    engine.play();

    clock.advance(59);
    engine.advance();
    assert!(engine.state().narration.is_none());
    clock.advance(1);
    engine.advance();
    assert_eq!(engine.state().narration.as_deref(), Some("late"));
}

#[test]
fn reset_clears_every_derived_field() {
    let (mut engine, clock) = engine_for(json!([
        {"t": 0, "event": "transcript", "speaker": "customer", "text": "Hi"},
        {"t": 0, "event": "ai_reasoning", "text": "thinking"},
        {"t": 0, "event": "panel_show", "panel": "verifyIdentity"},
        {"t": 0, "event": "auto_populate", "panel": "verifyIdentity", "data": {"ssn": "***"}},
        {"t": 0, "event": "mouse_click", "target": "#verify"},
        {"t": 0, "event": "tab_switch", "tab": "accounts"},
        {"t": 0, "event": "tab_loading", "tab": "accounts"},
        {"t": 0, "event": "narration", "text": "caption"},
        {"t": 0, "event": "sentiment", "value": 20, "label": "Negative"},
        {"t": 5_000, "event": "narration", "text": "never"},
    ]));
    engine.play();
    engine.advance();
    engine.submit("verifyIdentity", &Map::new());
    clock.advance(10);
    engine.advance();
    assert_ne!(engine.state(), &DeskState::default());

    engine.reset();

    assert_eq!(engine.state(), &DeskState::default());
    assert_eq!(engine.status(), PlaybackStatus::Idle);
    assert_eq!(engine.current_time_ms(), 0);
    assert_eq!(engine.position_ms(), 0);
    assert_eq!(engine.snapshot().cursor, 0);
    assert_eq!(engine.next_deadline(), None);

    clock.advance(10_000);
    engine.advance();
    assert_eq!(engine.state(), &DeskState::default());
}

#[test]
fn play_after_finish_requires_reset() {
    let (mut engine, clock) = engine_for(json!([
        {"t": 0, "event": "transcript", "speaker": "agent", "text": "Once"},
    ]));
    play_to_end(&mut engine, &clock);
    assert_eq!(engine.status(), PlaybackStatus::Finished);

    engine.play();
    clock.advance(100);
    engine.advance();
    assert_eq!(engine.state().transcripts.len(), 1);

    engine.reset();
    play_to_end(&mut engine, &clock);
    assert_eq!(engine.state().transcripts.len(), 1);
    assert_eq!(engine.status(), PlaybackStatus::Finished);
}

#[test]
fn independent_engines_share_nothing() {
    let raw = json!([{"t": 0, "event": "panel_show", "panel": "changeAddress"}]);
    let (mut static_view, static_clock) = engine_for(raw.clone());
    let (dynamic_view, _dynamic_clock) = engine_for(raw);

    play_to_end(&mut static_view, &static_clock);

    assert!(static_view.state().visible_panels.contains("changeAddress"));
    assert!(dynamic_view.state().visible_panels.is_empty());
    assert_eq!(dynamic_view.status(), PlaybackStatus::Idle);
}
