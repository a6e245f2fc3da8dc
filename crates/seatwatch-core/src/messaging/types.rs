use crate::domain::ChatId;

/// One update from the chat backend. Updates that are not text messages still
/// carry an id so the cursor can move past them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundUpdate {
    pub update_id: i64,
    pub message: Option<InboundMessage>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat_id: ChatId,
    pub text: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

/// A message queued for delivery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outbound {
    pub chat_id: ChatId,
    pub text: String,
    pub keyboard: Option<ReplyKeyboard>,
}

impl Outbound {
    pub fn text(chat_id: ChatId, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(mut self, keyboard: ReplyKeyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

/// A canned reply keyboard: each button sends its label as a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplyKeyboard {
    pub rows: Vec<Vec<String>>,
}

impl ReplyKeyboard {
    /// One button per row.
    pub fn single_column(labels: &[&str]) -> Self {
        Self {
            rows: labels.iter().map(|l| vec![l.to_string()]).collect(),
        }
    }

    /// Hints for people registering themselves.
    pub fn user() -> Self {
        Self::single_column(&["/start", "/register email user@example.com"])
    }

    /// Hints for admins handling requests.
    pub fn admin() -> Self {
        Self::single_column(&[
            "/approve <chat_id> email user@example.com",
            "/deny <chat_id>",
            "/scan_now",
        ])
    }
}
