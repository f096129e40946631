use iced::widget::{Column, column, scrollable, text};
use iced::{Element, Length};
use replay_engine::{AiActivity, AiActivityKind, Millis, Speaker, TranscriptLine};

/// Formats a playback offset as `m:ss`.
pub fn format_clock(offset_ms: Millis) -> String {
    let seconds = offset_ms / 1_000;
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

pub fn transcript_line(line: &TranscriptLine) -> String {
    let speaker = match line.speaker {
        Speaker::Customer => "Customer",
        Speaker::Agent => "Agent",
    };
    format!("[{}] {speaker}: {}", format_clock(line.timestamp), line.text)
}

pub fn activity_line(activity: &AiActivity) -> String {
    let clock = format_clock(activity.timestamp);
    match (activity.kind, activity.reason.as_deref()) {
        (AiActivityKind::ActionBlocked, Some(reason)) => {
            format!("[{clock}] {} ({reason})", activity.text)
        }
        _ => format!("[{clock}] {}", activity.text),
    }
}

/// Renders the conversation transcript, oldest first.
pub fn transcript<'a, Message>(lines: &'a [TranscriptLine]) -> Element<'a, Message>
where
    Message: 'a,
{
    panel("Conversation", lines.iter().map(transcript_line), "Waiting for the call...")
}

/// Renders the AI activity feed, oldest first.
pub fn activity<'a, Message>(activities: &'a [AiActivity]) -> Element<'a, Message>
where
    Message: 'a,
{
    panel("AI activity", activities.iter().map(activity_line), "No AI activity yet")
}

fn panel<'a, Message>(
    title: &'a str,
    lines: impl Iterator<Item = String>,
    placeholder: &'a str,
) -> Element<'a, Message>
where
    Message: 'a,
{
    let lines: Vec<String> = lines.collect();
    let body: Column<'a, Message> = if lines.is_empty() {
        column![text(placeholder)]
    } else {
        Column::with_children(lines.into_iter().map(|line| text(line).into())).spacing(4)
    };

    column![
        text(title).size(18),
        scrollable(body).height(Length::Fill)
    ]
    .spacing(8)
    .width(Length::Fill)
    .into()
}
