use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::{
    domain::ChatId,
    messaging::{
        port::ChatPort,
        types::{InboundUpdate, ReplyKeyboard},
    },
    Result,
};

/// ChatPort decorator that logs outbound messages instead of sending them.
///
/// Polling still goes to the wrapped backend so the registration flow can be
/// exercised end to end without spamming anyone.
pub struct DryRunChat {
    inner: Arc<dyn ChatPort>,
}

impl DryRunChat {
    pub fn new(inner: Arc<dyn ChatPort>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ChatPort for DryRunChat {
    async fn send_message(
        &self,
        chat_id: &ChatId,
        text: &str,
        _keyboard: Option<&ReplyKeyboard>,
    ) -> Result<()> {
        info!("DRY_RUN: would send to {chat_id}: {text}");
        Ok(())
    }

    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_seconds: u32,
    ) -> Result<Vec<InboundUpdate>> {
        self.inner.get_updates(offset, timeout_seconds).await
    }
}
