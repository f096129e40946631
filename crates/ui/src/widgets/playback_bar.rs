use iced::widget::canvas::{self, Path, Stroke};
use iced::widget::container;
use std::time::Duration;

use iced::{Color, Element, Length, Point, Rectangle, Size, Theme, mouse};
use replay_engine::{DeskSnapshot, Millis};

/// Converts a playback offset to an x coordinate in widget space.
///
/// The left edge is offset `0` and the right edge is the offset of the last
/// event. Offsets past the end are clamped to the right edge.
///
/// # Example
///
/// ```ignore
/// assert_eq!(x_from_offset(0, 1_000, 200.0), 0.0);
/// assert_eq!(x_from_offset(500, 1_000, 200.0), 100.0);
/// assert_eq!(x_from_offset(5_000, 1_000, 200.0), 200.0);
/// ```
pub fn x_from_offset(offset_ms: Millis, duration_ms: Millis, width: f32) -> f32 {
    if duration_ms == 0 || width <= 0.0 {
        return 0.0;
    }
    let ratio = offset_ms.min(duration_ms) as f32 / duration_ms as f32;
    ratio * width
}

/// Playhead offset `since_snapshot` after `snapshot` was taken.
///
/// While playing, the playhead keeps moving between snapshots and stops at
/// the last event. Otherwise it stays where the snapshot put it.
pub fn live_position_ms(snapshot: &DeskSnapshot, since_snapshot: Duration) -> Millis {
    if !snapshot.is_playing {
        return snapshot.position_ms;
    }
    let elapsed = u64::try_from(since_snapshot.as_millis()).unwrap_or(u64::MAX);
    snapshot
        .position_ms
        .saturating_add(elapsed)
        .min(snapshot.duration_ms.max(snapshot.position_ms))
}

#[derive(Debug)]
struct PlaybackBarProgram<'a> {
    duration_ms: Millis,
    position_ms: Millis,
    cursor: usize,
    offsets: &'a [Millis],
    cache: &'a canvas::Cache,
}

impl<Message> canvas::Program<Message> for PlaybackBarProgram<'_> {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &iced::Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<canvas::Geometry> {
        // Markers only change when the timeline or cursor changes; the
        // caller clears the cache for those.
        let markers = self.cache.draw(renderer, bounds.size(), |frame| {
            let background = Path::rectangle(Point::ORIGIN, frame.size());
            frame.fill(&background, Color::from_rgb8(22, 24, 29));

            for (index, offset) in self.offsets.iter().enumerate() {
                let x = x_from_offset(*offset, self.duration_ms, bounds.width);
                let color = if index < self.cursor {
                    Color::from_rgb8(55, 110, 188)
                } else {
                    Color::from_rgb8(90, 96, 110)
                };
                let tick = Path::rectangle(
                    Point::new((x - 1.0).max(0.0), 8.0),
                    Size::new(2.0, (bounds.height - 16.0).max(1.0)),
                );
                frame.fill(&tick, color);
            }
        });

        let mut playhead_frame = canvas::Frame::new(renderer, bounds.size());
        if self.duration_ms > 0 {
            let x = x_from_offset(self.position_ms, self.duration_ms, bounds.width);
            let line = Path::line(Point::new(x, 0.0), Point::new(x, bounds.height));
            playhead_frame.stroke(
                &line,
                Stroke::default()
                    .with_width(2.0)
                    .with_color(Color::from_rgb8(255, 94, 77)),
            );
        }

        vec![markers, playhead_frame.into_geometry()]
    }
}

/// Renders the playback bar: one marker per event and the playhead at
/// `position_ms`.
pub fn view<'a, Message>(
    snapshot: &'a DeskSnapshot,
    position_ms: Millis,
    cache: &'a canvas::Cache,
) -> Element<'a, Message>
where
    Message: 'a,
{
    let program = PlaybackBarProgram {
        duration_ms: snapshot.duration_ms,
        position_ms,
        cursor: snapshot.cursor,
        offsets: snapshot.event_offsets.as_slice(),
        cache,
    };

    container(
        canvas::Canvas::new(program)
            .width(Length::Fill)
            .height(Length::Fixed(40.0)),
    )
    .width(Length::Fill)
    .into()
}
