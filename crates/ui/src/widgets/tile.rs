use iced::widget::{button, column, container, row, text};
use iced::{Element, Length};
use replay_engine::{Prefill, TileStatus};
use serde_json::{Map, Value};
use tracing::debug;

/// Static description of a form tile the desktop knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileKind {
    pub panel: &'static str,
    pub title: &'static str,
    pub fields: &'static [&'static str],
}

pub static KNOWN_TILES: [TileKind; 4] = [
    TileKind {
        panel: "changeAddress",
        title: "Change Address",
        fields: &["street", "city", "state", "zip"],
    },
    TileKind {
        panel: "verifyIdentity",
        title: "Verify Identity",
        fields: &["idType", "idNumber", "verificationMethod"],
    },
    TileKind {
        panel: "updateContactDetails",
        title: "Update Contact Details",
        fields: &["phone", "email", "preferredContactMethod"],
    },
    TileKind {
        panel: "disputeTransaction",
        title: "Dispute Transaction",
        fields: &["transactionId", "amount", "reason"],
    },
];

pub fn find(panel: &str) -> Option<&'static TileKind> {
    KNOWN_TILES.iter().find(|kind| kind.panel == panel)
}

/// Text shown for a prefilled value. Strings are shown verbatim; other JSON
/// values use their compact JSON form. Null counts as absent.
pub fn field_text(prefill: Option<&Prefill>, field: &str) -> Option<String> {
    match prefill?.get(field)? {
        Value::Null => None,
        Value::String(value) => Some(value.clone()),
        other => Some(other.to_string()),
    }
}

/// Form payload reported on submit: every field of the tile, empty when the
/// AI did not prefill it.
pub fn form_data(kind: &TileKind, prefill: Option<&Prefill>) -> Map<String, Value> {
    kind.fields
        .iter()
        .map(|field| {
            let value = field_text(prefill, field).unwrap_or_default();
            ((*field).to_owned(), Value::String(value))
        })
        .collect()
}

pub fn submit_label(status: TileStatus) -> &'static str {
    match status {
        TileStatus::Idle => "Submit",
        TileStatus::Submitting => "Submitting...",
        TileStatus::Completed => "Submitted",
    }
}

/// Renders one tile. The submit button is disabled once a submission is in
/// flight or done.
pub fn view<'a, Message>(
    panel: &'a str,
    prefill: Option<&'a Prefill>,
    status: TileStatus,
    on_submit: Message,
) -> Element<'a, Message>
where
    Message: Clone + 'a,
{
    let Some(kind) = find(panel) else {
        debug!(panel, "unknown panel name");
        return container(text(format!(
            "Panel \"{panel}\" is not recognized. Check the timeline configuration."
        )))
        .padding(12)
        .width(Length::Fill)
        .into();
    };

    let mut fields = column![text(kind.title).size(20)].spacing(6);
    for field in kind.fields {
        let line = match field_text(prefill, field) {
            Some(value) => row![
                text(format!("{field}: {value}")),
                text("AI suggested").size(12),
            ]
            .spacing(8),
            None => row![text(format!("{field}: -"))],
        };
        fields = fields.push(line);
    }

    let submit = button(submit_label(status))
        .on_press_maybe((status == TileStatus::Idle).then_some(on_submit));

    container(column![fields, submit].spacing(10))
        .padding(12)
        .width(Length::Fill)
        .into()
}
