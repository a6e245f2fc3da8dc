//! In-memory fakes of the ports, shared by the unit tests.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;

use crate::{
    cursor::{CursorStore, PollCursor},
    domain::ChatId,
    errors::Error,
    inventory::{InventoryPort, LicenseRecord, SeatAssignment},
    messaging::{
        port::ChatPort,
        types::{InboundMessage, InboundUpdate, Outbound, ReplyKeyboard},
    },
    registry::{Registry, RegistryStore},
    Result,
};

pub fn message(chat: &str, text: &str) -> InboundMessage {
    InboundMessage {
        chat_id: chat.into(),
        text: text.to_string(),
        ..Default::default()
    }
}

pub fn update(update_id: i64, chat: &str, text: &str) -> InboundUpdate {
    InboundUpdate {
        update_id,
        message: Some(message(chat, text)),
    }
}

/// Chat backend that serves queued batches (honoring the offset like the
/// real API) and records successful sends.
#[derive(Default)]
pub struct FakeChat {
    batches: Mutex<VecDeque<Vec<InboundUpdate>>>,
    sent: Mutex<Vec<Outbound>>,
    offsets: Mutex<Vec<Option<i64>>>,
    failing: Mutex<HashSet<ChatId>>,
}

impl FakeChat {
    pub fn queue(&self, batch: Vec<InboundUpdate>) {
        self.batches.lock().unwrap().push_back(batch);
    }

    pub fn fail_for(&self, chat: &str) {
        self.failing.lock().unwrap().insert(chat.into());
    }

    pub fn sent(&self) -> Vec<Outbound> {
        self.sent.lock().unwrap().clone()
    }

    pub fn offsets(&self) -> Vec<Option<i64>> {
        self.offsets.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatPort for FakeChat {
    async fn send_message(
        &self,
        chat_id: &ChatId,
        text: &str,
        keyboard: Option<&ReplyKeyboard>,
    ) -> Result<()> {
        if self.failing.lock().unwrap().contains(chat_id) {
            return Err(Error::External(format!("chat {chat_id} unreachable")));
        }
        self.sent.lock().unwrap().push(Outbound {
            chat_id: chat_id.clone(),
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(())
    }

    async fn get_updates(
        &self,
        offset: Option<i64>,
        _timeout_seconds: u32,
    ) -> Result<Vec<InboundUpdate>> {
        self.offsets.lock().unwrap().push(offset);
        let batch = self.batches.lock().unwrap().pop_front().unwrap_or_default();
        Ok(batch
            .into_iter()
            .filter(|u| offset.map_or(true, |o| u.update_id >= o))
            .collect())
    }
}

pub struct MemoryRegistry {
    inner: Mutex<Registry>,
    loads: AtomicUsize,
    saves: AtomicUsize,
    broken: AtomicBool,
}

impl MemoryRegistry {
    pub fn new(registry: Registry) -> Self {
        Self {
            inner: Mutex::new(registry),
            loads: AtomicUsize::new(0),
            saves: AtomicUsize::new(0),
            broken: AtomicBool::new(false),
        }
    }

    pub fn snapshot(&self) -> Registry {
        self.inner.lock().unwrap().clone()
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn break_loads(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }
}

impl RegistryStore for MemoryRegistry {
    fn load(&self) -> Result<Registry> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.broken.load(Ordering::SeqCst) {
            return Err(Error::RegistryCorrupt {
                path: PathBuf::from("memory"),
                reason: "broken on purpose".to_string(),
            });
        }
        Ok(self.snapshot())
    }

    fn save(&self, registry: &Registry) -> Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.inner.lock().unwrap() = registry.clone();
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCursor {
    inner: Mutex<PollCursor>,
    saves: AtomicUsize,
}

impl MemoryCursor {
    pub fn current(&self) -> PollCursor {
        self.inner.lock().unwrap().clone()
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl CursorStore for MemoryCursor {
    fn load(&self) -> PollCursor {
        self.current()
    }

    fn save(&self, cursor: &PollCursor) -> Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.inner.lock().unwrap() = cursor.clone();
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeInventory {
    pub licenses: Vec<LicenseRecord>,
    pub seats: HashMap<String, Vec<SeatAssignment>>,
    pub seat_calls: Mutex<Vec<String>>,
}

#[async_trait]
impl InventoryPort for FakeInventory {
    async fn list_licenses(&self, _page_size: usize) -> Result<Vec<LicenseRecord>> {
        Ok(self.licenses.clone())
    }

    async fn list_seats(&self, license_id: &str, _page_size: usize) -> Result<Vec<SeatAssignment>> {
        self.seat_calls.lock().unwrap().push(license_id.to_string());
        Ok(self.seats.get(license_id).cloned().unwrap_or_default())
    }
}
