use async_trait::async_trait;

use crate::{
    domain::ChatId,
    messaging::types::{InboundUpdate, ReplyKeyboard},
    Result,
};

/// Chat backend the core talks to.
#[async_trait]
pub trait ChatPort: Send + Sync {
    /// Deliver one text message, optionally with a reply keyboard attached.
    async fn send_message(
        &self,
        chat_id: &ChatId,
        text: &str,
        keyboard: Option<&ReplyKeyboard>,
    ) -> Result<()>;

    /// Fetch updates at or after `offset`, blocking up to `timeout_seconds`
    /// when none are queued. `None` starts from the server's current head.
    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_seconds: u32,
    ) -> Result<Vec<InboundUpdate>>;
}
