//! Self-service registration driven by chat commands.
//!
//! Per chat the lifecycle is `Unknown -> Pending -> Registered`, with deny
//! discarding a pending request. [`apply`] performs one command against an
//! in-memory registry and reports what happened as an [`Outcome`];
//! [`Registrar`] runs a poll batch through it, persisting after every
//! mutation and advancing the poll cursor once the batch is done.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::{
    cursor::{CursorStore, PollCursor},
    domain::ChatId,
    messaging::{
        port::ChatPort,
        send_all,
        types::{InboundMessage, InboundUpdate, Outbound, ReplyKeyboard},
    },
    registry::{ChatStatus, PendingRequest, Registry, RegistryStore, UserMapEntry},
    Result,
};

/// Inventory identity a chat should be linked to. Any subset may be set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Linking {
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
}

impl Linking {
    pub fn is_empty(&self) -> bool {
        self.user_id.is_none() && self.username.is_none() && self.email.is_none()
    }

    /// Classify a free-form hint: email if it has an `@`, id if all digits,
    /// username otherwise.
    pub fn from_hint(hint: &str) -> Self {
        let hint = hint.trim();
        if hint.is_empty() {
            Self::default()
        } else if hint.contains('@') {
            Self {
                email: Some(hint.to_string()),
                ..Self::default()
            }
        } else if hint.chars().all(|c| c.is_ascii_digit()) {
            Self {
                user_id: Some(hint.to_string()),
                ..Self::default()
            }
        } else {
            Self {
                username: Some(hint.to_string()),
                ..Self::default()
            }
        }
    }

    /// `email <x>`, `username <x>` or `id|user_id <x>`; anything else links nothing.
    fn from_pair(key: &str, value: &str) -> Self {
        let value = Some(value.to_string());
        match key.to_lowercase().as_str() {
            "email" => Self {
                email: value,
                ..Self::default()
            },
            "username" => Self {
                username: value,
                ..Self::default()
            },
            "id" | "user_id" => Self {
                user_id: value,
                ..Self::default()
            },
            _ => Self::default(),
        }
    }

    /// The self-reported hint stored on a pending request.
    ///
    /// NOTE: nothing verifies this against the inventory; an admin approving
    /// without explicit linking args trusts whatever the requester typed.
    pub fn from_pending(req: &PendingRequest) -> Self {
        Self {
            user_id: req.requested_user_id.clone(),
            username: req.requested_username.clone(),
            email: req.requested_email.clone(),
        }
    }
}

/// A parsed chat command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// `/start` or `/register [hint]`.
    Register { hint: Option<String> },
    /// `/approve <chat_id> [email|username|id <value>]`.
    Approve { target: Option<ChatId>, link: Linking },
    /// `/deny <chat_id>`.
    Deny { target: Option<ChatId> },
    ScanNow,
    Other,
}

impl Command {
    pub fn parse(text: &str) -> Self {
        let mut parts = text.split_whitespace();
        let Some(first) = parts.next() else {
            return Command::Other;
        };
        let args: Vec<&str> = parts.collect();

        // Group chats send `/cmd@botname`.
        let token = first.split('@').next().unwrap_or("").to_lowercase();
        match token.as_str() {
            "/start" | "/register" => Command::Register {
                hint: args.first().map(|s| s.to_string()),
            },
            "/approve" => Command::Approve {
                target: args.first().map(|s| ChatId::from(*s)),
                link: match args.as_slice() {
                    [_, key, value, ..] => Linking::from_pair(key, value),
                    _ => Linking::default(),
                },
            },
            "/deny" => Command::Deny {
                target: args.first().map(|s| ChatId::from(*s)),
            },
            "/scan_now" => Command::ScanNow,
            _ => Command::Other,
        }
    }
}

/// Which usage reply to send.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Usage {
    Approve,
    Deny,
    /// Approve found the request but neither the admin nor the requester
    /// supplied anything to link to.
    Linking,
}

/// Result of one command, dispatched into replies by [`replies`].
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Ignored,
    Requested { request: PendingRequest },
    AlreadyPending,
    AlreadyRegistered,
    Approved { target: ChatId },
    Denied { target: ChatId },
    NotFound { target: ChatId },
    Usage(Usage),
    ScanRequested,
}

impl Outcome {
    /// Whether the registry changed and must be saved.
    pub fn mutates(&self) -> bool {
        matches!(
            self,
            Outcome::Requested { .. } | Outcome::Approved { .. } | Outcome::Denied { .. }
        )
    }
}

/// Apply one inbound message to the registry.
///
/// Admin status is exact membership of the sender's chat id in `admins`.
/// Admin-only commands from anyone else are ignored like any unknown text.
pub fn apply(
    registry: &mut Registry,
    msg: &InboundMessage,
    admins: &[ChatId],
    now: DateTime<Utc>,
) -> Outcome {
    let is_admin = admins.contains(&msg.chat_id);
    match Command::parse(&msg.text) {
        Command::ScanNow if is_admin => Outcome::ScanRequested,
        Command::Deny { target } if is_admin => deny(registry, target),
        Command::Approve { target, link } if is_admin => approve(registry, target, link),
        Command::Register { hint } => register(registry, msg, hint.as_deref(), now),
        _ => Outcome::Ignored,
    }
}

fn register(
    registry: &mut Registry,
    msg: &InboundMessage,
    hint: Option<&str>,
    now: DateTime<Utc>,
) -> Outcome {
    match registry.status(&msg.chat_id) {
        ChatStatus::Registered => return Outcome::AlreadyRegistered,
        ChatStatus::Pending => return Outcome::AlreadyPending,
        ChatStatus::Unknown => {}
    }

    let link = hint.map(Linking::from_hint).unwrap_or_default();
    let request = PendingRequest {
        chat_id: msg.chat_id.clone(),
        first_name: msg.first_name.clone(),
        last_name: msg.last_name.clone(),
        username: msg.username.clone(),
        requested_email: link.email,
        requested_username: link.username,
        requested_user_id: link.user_id,
        requested_at: Some(now),
        admin_notified_at: None,
        extra: Default::default(),
    };
    registry.pending.push(request.clone());
    Outcome::Requested { request }
}

fn approve(registry: &mut Registry, target: Option<ChatId>, link: Linking) -> Outcome {
    let Some(target) = target else {
        return Outcome::Usage(Usage::Approve);
    };
    let Some(pending) = registry.find_pending(&target) else {
        return Outcome::NotFound { target };
    };

    let link = if link.is_empty() {
        Linking::from_pending(pending)
    } else {
        link
    };
    if link.is_empty() {
        return Outcome::Usage(Usage::Linking);
    }

    let Some(pending) = registry.take_pending(&target) else {
        return Outcome::NotFound { target };
    };
    registry.users.push(UserMapEntry {
        chat_id: target.clone(),
        inventory_user_id: link.user_id,
        inventory_username: link.username,
        inventory_email: link.email,
        first_name: pending.first_name,
        last_name: pending.last_name,
        chat_username: pending.username,
        extra: Default::default(),
    });
    Outcome::Approved { target }
}

fn deny(registry: &mut Registry, target: Option<ChatId>) -> Outcome {
    let Some(target) = target else {
        return Outcome::Usage(Usage::Deny);
    };
    match registry.take_pending(&target) {
        Some(_) => Outcome::Denied { target },
        None => Outcome::NotFound { target },
    }
}

/// Replies owed to the sender (and, on approval, to the approved chat).
///
/// Admin notices for a new request are separate, see [`admin_notices`].
pub fn replies(outcome: &Outcome, sender: &ChatId) -> Vec<Outbound> {
    let to_sender = |text: String| Outbound::text(sender.clone(), text);
    match outcome {
        Outcome::Ignored => vec![],
        Outcome::Requested { .. } => vec![to_sender(
            "Registration requested. Waiting for administrator approval.".to_string(),
        )
        .with_keyboard(ReplyKeyboard::user())],
        Outcome::AlreadyPending => vec![to_sender("Awaiting approval.".to_string())
            .with_keyboard(ReplyKeyboard::user())],
        Outcome::AlreadyRegistered => vec![to_sender("Already registered.".to_string())
            .with_keyboard(ReplyKeyboard::user())],
        Outcome::Approved { target } => vec![
            to_sender(format!("Approved {target}")),
            Outbound::text(
                target.clone(),
                "Registration approved. You will receive notifications.",
            )
            .with_keyboard(ReplyKeyboard::user()),
        ],
        Outcome::Denied { target } => vec![to_sender(format!("Denied {target}"))],
        Outcome::NotFound { target } => vec![to_sender(format!("Not found: {target}"))],
        Outcome::Usage(usage) => {
            let text = match usage {
                Usage::Approve => "Usage: /approve <chat_id> [email|username|id <value>]",
                Usage::Deny => "Usage: /deny <chat_id>",
                Usage::Linking => {
                    "Provide linking details: /approve <chat_id> email <x> or username <x> or id <x>"
                }
            };
            vec![to_sender(text.to_string()).with_keyboard(ReplyKeyboard::admin())]
        }
        Outcome::ScanRequested => vec![to_sender(
            "Scan requested. Sending notifications...".to_string(),
        )
        .with_keyboard(ReplyKeyboard::admin())],
    }
}

/// One approval prompt per admin for a fresh request.
pub fn admin_notices(request: &PendingRequest, admins: &[ChatId]) -> Vec<Outbound> {
    let chat = &request.chat_id;
    let mut who = vec![chat.to_string()];
    let name = [request.first_name.as_deref(), request.last_name.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    if !name.is_empty() {
        who.push(name);
    }
    if let Some(username) = &request.username {
        who.push(format!("@{username}"));
    }

    let hint = match Linking::from_pending(request) {
        Linking { email: Some(v), .. } => format!(" Requested email: {v}."),
        Linking { username: Some(v), .. } => format!(" Requested username: {v}."),
        Linking { user_id: Some(v), .. } => format!(" Requested user id: {v}."),
        _ => String::new(),
    };

    let text = format!(
        "Pending user: {}.{hint} Approve with /approve {chat} email <x> or username <x> or id <x>",
        who.join(" ")
    );
    admins
        .iter()
        .map(|admin| Outbound::text(admin.clone(), text.clone()).with_keyboard(ReplyKeyboard::admin()))
        .collect()
}

#[derive(Clone, Debug)]
pub struct RegistrationSettings {
    pub admins: Vec<ChatId>,
    pub long_poll_seconds: u32,
}

/// What a poll batch produced.
#[derive(Clone, Debug, PartialEq)]
pub struct PollResult {
    pub cursor: PollCursor,
    pub scan_requested: bool,
}

/// Runs inbound batches through the registration workflow.
pub struct Registrar {
    chat: Arc<dyn ChatPort>,
    registry: Arc<dyn RegistryStore>,
    cursor: Arc<dyn CursorStore>,
    settings: RegistrationSettings,
}

impl Registrar {
    pub fn new(
        chat: Arc<dyn ChatPort>,
        registry: Arc<dyn RegistryStore>,
        cursor: Arc<dyn CursorStore>,
        settings: RegistrationSettings,
    ) -> Self {
        Self {
            chat,
            registry,
            cursor,
            settings,
        }
    }

    /// One poll cycle against the stored cursor. Returns whether an admin
    /// asked for an immediate scan.
    pub async fn poll_once(&self) -> Result<bool> {
        let cursor = self.cursor.load();
        let result = self.poll(cursor.clone()).await?;
        if result.cursor != cursor {
            self.cursor.save(&result.cursor)?;
        }
        Ok(result.scan_requested)
    }

    /// Fetch one batch starting at `cursor` and process it.
    pub async fn poll(&self, cursor: PollCursor) -> Result<PollResult> {
        let updates = self
            .chat
            .get_updates(cursor.telegram_offset, self.settings.long_poll_seconds)
            .await?;
        self.process_batch(cursor, &updates).await
    }

    /// Process a batch. An empty batch leaves the cursor (and the registry
    /// file) untouched; otherwise the cursor moves past the highest update id
    /// even when no command in the batch was recognized.
    pub async fn process_batch(
        &self,
        cursor: PollCursor,
        updates: &[InboundUpdate],
    ) -> Result<PollResult> {
        let Some(max_id) = updates.iter().map(|u| u.update_id).max() else {
            return Ok(PollResult {
                cursor,
                scan_requested: false,
            });
        };

        let admins = &self.settings.admins;
        let mut registry = self.registry.load()?;
        let mut scan_requested = false;

        for update in updates {
            let Some(msg) = update.message.as_ref().filter(|m| !m.chat_id.is_empty()) else {
                continue;
            };

            let outcome = apply(&mut registry, msg, admins, Utc::now());
            if outcome == Outcome::Ignored {
                continue;
            }
            debug!("update {} from {}: {outcome:?}", update.update_id, msg.chat_id);

            if outcome.mutates() {
                self.registry.save(&registry)?;
            }
            send_all(self.chat.as_ref(), &replies(&outcome, &msg.chat_id)).await;

            match outcome {
                Outcome::ScanRequested => {
                    info!("scan requested by admin {}", msg.chat_id);
                    scan_requested = true;
                }
                Outcome::Requested { request } => {
                    info!("registration requested by {}", request.chat_id);
                    self.notify_admins(&mut registry, &request).await?;
                }
                Outcome::Approved { target } => info!("{} approved {target}", msg.chat_id),
                Outcome::Denied { target } => info!("{} denied {target}", msg.chat_id),
                _ => {}
            }
        }

        Ok(PollResult {
            cursor: cursor.advanced_past(max_id),
            scan_requested,
        })
    }

    async fn notify_admins(&self, registry: &mut Registry, request: &PendingRequest) -> Result<()> {
        let delivery = send_all(
            self.chat.as_ref(),
            &admin_notices(request, &self.settings.admins),
        )
        .await;
        if delivery.sent == 0 {
            warn!("no admin was told about pending request {}", request.chat_id);
            return Ok(());
        }
        if let Some(pending) = registry.find_pending_mut(&request.chat_id) {
            pending.admin_notified_at = Some(Utc::now());
            self.registry.save(registry)?;
        }
        Ok(())
    }
}
