//! Notification scan: find expiring licenses and tell the right chats.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    str::FromStr,
    sync::Arc,
};

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::{
    domain::ChatId,
    errors::Error,
    inventory::InventoryPort,
    matcher::match_chat_ids,
    messaging::{port::ChatPort, send_all, types::Outbound, Delivery},
    notify::{render_chunks, select_expiring, ExpiringItem, Window, MESSAGE_LIMIT},
    registry::{Registry, RegistryStore},
    Result,
};

/// How expiring licenses are routed to chats.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NotifyMode {
    /// Everyone known (registered, defaults, fallback, admins) gets the full list.
    #[default]
    Broadcast,
    /// Each license goes to the chats linked to its seat holders, or to the
    /// default recipients when nobody matches.
    PerSeat,
}

impl FromStr for NotifyMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "broadcast" | "all" => Ok(NotifyMode::Broadcast),
            "per_seat" | "seat" | "assigned" => Ok(NotifyMode::PerSeat),
            other => Err(Error::Config(format!(
                "NOTIFY_MODE must be broadcast or per_seat, got {other:?}"
            ))),
        }
    }
}

impl fmt::Display for NotifyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NotifyMode::Broadcast => "broadcast",
            NotifyMode::PerSeat => "per_seat",
        })
    }
}

#[derive(Clone, Debug)]
pub struct ScanSettings {
    pub window: Window,
    pub mode: NotifyMode,
    pub page_size: usize,
    pub admins: Vec<ChatId>,
    pub fallback_chat_id: Option<ChatId>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub licenses: usize,
    pub items: usize,
    pub recipients: usize,
    pub delivery: Delivery,
}

pub struct Notifier {
    inventory: Arc<dyn InventoryPort>,
    chat: Arc<dyn ChatPort>,
    registry: Arc<dyn RegistryStore>,
    settings: ScanSettings,
}

impl Notifier {
    pub fn new(
        inventory: Arc<dyn InventoryPort>,
        chat: Arc<dyn ChatPort>,
        registry: Arc<dyn RegistryStore>,
        settings: ScanSettings,
    ) -> Self {
        Self {
            inventory,
            chat,
            registry,
            settings,
        }
    }

    /// Run one scan with `today` as the reference date.
    ///
    /// Inventory errors propagate; individual send failures are counted in the
    /// report and do not stop the remaining sends.
    pub async fn run_once(&self, today: NaiveDate) -> Result<ScanReport> {
        let registry = self.registry.load()?;
        let licenses = self.inventory.list_licenses(self.settings.page_size).await?;
        info!("loaded {} licenses", licenses.len());

        let items = select_expiring(&licenses, &self.settings.window, today);
        let mut report = ScanReport {
            licenses: licenses.len(),
            items: items.len(),
            ..ScanReport::default()
        };
        if items.is_empty() {
            info!("no notifications to send");
            return Ok(report);
        }

        let messages = match self.settings.mode {
            NotifyMode::Broadcast => self.broadcast(&registry, &items),
            NotifyMode::PerSeat => self.per_seat(&registry, &items).await?,
        };
        report.recipients = dedup(messages.iter().map(|m| m.chat_id.clone())).len();
        report.delivery = send_all(self.chat.as_ref(), &messages).await;
        info!(
            "sent {} items to {} of {} chats ({} failed)",
            items.len(),
            report.delivery.sent,
            report.recipients,
            report.delivery.failed
        );
        Ok(report)
    }

    fn broadcast(&self, registry: &Registry, items: &[ExpiringItem]) -> Vec<Outbound> {
        let chunks = self.render(items);
        let recipients = dedup(
            registry
                .registered_chat_ids()
                .chain(&registry.default_chat_ids)
                .chain(&self.settings.fallback_chat_id)
                .chain(&self.settings.admins)
                .cloned(),
        );
        recipients
            .into_iter()
            .flat_map(|chat| chunks.iter().map(move |text| Outbound::text(chat.clone(), text.clone())))
            .collect()
    }

    fn render(&self, items: &[ExpiringItem]) -> Vec<String> {
        render_chunks(items, self.settings.window.days, MESSAGE_LIMIT)
    }

    async fn per_seat(&self, registry: &Registry, items: &[ExpiringItem]) -> Result<Vec<Outbound>> {
        let defaults = dedup(
            registry
                .default_chat_ids
                .iter()
                .chain(&self.settings.fallback_chat_id)
                .cloned(),
        );

        let mut order: Vec<ChatId> = Vec::new();
        let mut per_chat: HashMap<ChatId, Vec<ExpiringItem>> = HashMap::new();

        for item in items {
            let mut chats = match &item.id {
                Some(id) => self.seat_holders(registry, id).await?,
                None => Vec::new(),
            };
            if chats.is_empty() {
                debug!("no linked chat for {}, using defaults", item.name);
                chats = defaults.clone();
            }
            for chat in chats {
                per_chat
                    .entry(chat.clone())
                    .or_insert_with(|| {
                        order.push(chat);
                        Vec::new()
                    })
                    .push(item.clone());
            }
        }

        Ok(order
            .into_iter()
            .filter_map(|chat| Some((per_chat.remove(&chat)?, chat)))
            .flat_map(|(items, chat)| {
                self.render(&items)
                    .into_iter()
                    .map(move |text| Outbound::text(chat.clone(), text))
            })
            .collect())
    }

    async fn seat_holders(&self, registry: &Registry, license_id: &str) -> Result<Vec<ChatId>> {
        let seats = self
            .inventory
            .list_seats(license_id, self.settings.page_size)
            .await?;
        Ok(dedup(seats.iter().flat_map(|seat| {
            match_chat_ids(seat.assigned_user().as_ref(), &registry.users)
        })))
    }
}

/// Drop empty and repeated ids, keeping first occurrence order.
fn dedup(ids: impl IntoIterator<Item = ChatId>) -> Vec<ChatId> {
    let mut seen = HashSet::new();
    ids.into_iter()
        .filter(|c| !c.is_empty() && seen.insert(c.clone()))
        .collect()
}
