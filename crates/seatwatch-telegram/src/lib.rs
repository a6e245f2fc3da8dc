//! Telegram adapter (teloxide).
//!
//! Implements the `seatwatch-core` ChatPort over the Telegram Bot API:
//! plain-text sends with an optional reply keyboard, and long-polled
//! `getUpdates` for the registration cycle.

use std::time::Duration;

use async_trait::async_trait;
use teloxide::{
    prelude::*,
    types::{
        AllowedUpdate, KeyboardButton, KeyboardMarkup, Recipient, Update, UpdateKind,
    },
};
use tokio::time::sleep;
use tracing::debug;

use seatwatch_core::{
    domain::ChatId,
    errors::Error,
    messaging::{
        port::ChatPort,
        types::{InboundMessage, InboundUpdate, ReplyKeyboard},
    },
    Result,
};

/// Slack on top of the long-poll window before the HTTP client gives up.
const CLIENT_SLACK: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct TelegramChat {
    bot: Bot,
}

impl TelegramChat {
    /// Bot whose HTTP timeout outlasts a `long_poll` wait.
    pub fn new(token: &str, long_poll: Duration) -> Result<Self> {
        let client = teloxide::net::default_reqwest_settings()
            .timeout(long_poll + CLIENT_SLACK)
            .build()
            .map_err(|e| Error::External(format!("telegram client: {e}")))?;
        Ok(Self::from_bot(Bot::with_client(token, client)))
    }

    pub fn from_bot(bot: Bot) -> Self {
        Self { bot }
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(teloxide::RequestError::RetryAfter(d)) if attempts < MAX_RETRIES => {
                    attempts += 1;
                    debug!("telegram asked to retry after {d:?}");
                    sleep(d).await;
                }
                Err(other) => return Err(Self::map_err(other)),
            }
        }
    }
}

/// Numeric ids address a chat directly; anything else is a public
/// `@username`.
pub fn recipient(chat_id: &ChatId) -> Recipient {
    let raw = chat_id.as_str().trim();
    match raw.parse::<i64>() {
        Ok(id) => Recipient::Id(teloxide::types::ChatId(id)),
        Err(_) if raw.starts_with('@') => Recipient::ChannelUsername(raw.to_string()),
        Err(_) => Recipient::ChannelUsername(format!("@{raw}")),
    }
}

pub fn markup(keyboard: &ReplyKeyboard) -> KeyboardMarkup {
    let rows = keyboard
        .rows
        .iter()
        .map(|row| row.iter().map(KeyboardButton::new).collect::<Vec<_>>())
        .collect::<Vec<_>>();
    KeyboardMarkup::new(rows).resize_keyboard(true)
}

fn inbound(update: Update) -> InboundUpdate {
    let message = match update.kind {
        UpdateKind::Message(msg) => Some(inbound_message(&msg)),
        _ => None,
    };
    InboundUpdate {
        update_id: i64::from(update.id),
        message,
    }
}

fn inbound_message(msg: &Message) -> InboundMessage {
    let chat = &msg.chat;
    InboundMessage {
        chat_id: ChatId::from(chat.id.0),
        text: msg.text().unwrap_or_default().to_string(),
        first_name: chat.first_name().map(str::to_string),
        last_name: chat.last_name().map(str::to_string),
        username: chat.username().map(str::to_string),
    }
}

#[async_trait]
impl ChatPort for TelegramChat {
    async fn send_message(
        &self,
        chat_id: &ChatId,
        text: &str,
        keyboard: Option<&ReplyKeyboard>,
    ) -> Result<()> {
        let to = recipient(chat_id);
        let markup = keyboard.map(markup);
        self.with_retry(|| {
            let req = self.bot.send_message(to.clone(), text.to_string());
            match &markup {
                Some(m) => req.reply_markup(m.clone()),
                None => req,
            }
        })
        .await?;
        Ok(())
    }

    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_seconds: u32,
    ) -> Result<Vec<InboundUpdate>> {
        let offset = offset
            .map(i32::try_from)
            .transpose()
            .map_err(|_| Error::External("telegram update offset out of range".to_string()))?;
        let updates = self
            .with_retry(|| {
                let req = self
                    .bot
                    .get_updates()
                    .timeout(timeout_seconds)
                    .allowed_updates(vec![AllowedUpdate::Message]);
                match offset {
                    Some(o) => req.offset(o),
                    None => req,
                }
            })
            .await?;
        Ok(updates.into_iter().map(inbound).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_ids_are_chat_ids() {
        assert_eq!(
            recipient(&ChatId::from("-1001234")),
            Recipient::Id(teloxide::types::ChatId(-1001234))
        );
        assert_eq!(
            recipient(&ChatId::from(42i64)),
            Recipient::Id(teloxide::types::ChatId(42))
        );
    }

    #[test]
    fn names_become_usernames() {
        assert_eq!(
            recipient(&ChatId::from("@ops")),
            Recipient::ChannelUsername("@ops".to_string())
        );
        assert_eq!(
            recipient(&ChatId::from("ops")),
            Recipient::ChannelUsername("@ops".to_string())
        );
    }

    #[test]
    fn keyboard_rows_are_kept() {
        let m = markup(&ReplyKeyboard::admin());
        let labels: Vec<Vec<&str>> = m
            .keyboard
            .iter()
            .map(|row| row.iter().map(|b| b.text.as_str()).collect())
            .collect();
        let admin = ReplyKeyboard::admin();
        let expected: Vec<Vec<&str>> = admin
            .rows
            .iter()
            .map(|row| row.iter().map(String::as_str).collect())
            .collect();
        assert_eq!(labels, expected);
    }
}
