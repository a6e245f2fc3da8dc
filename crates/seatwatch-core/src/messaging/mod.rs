//! Chat-side abstractions: the port, message types, and helpers shared by the
//! poll and scan cycles.

pub mod dry_run;
pub mod port;
pub mod types;

use tracing::warn;

use crate::messaging::{port::ChatPort, types::Outbound};

/// Counts from a best-effort delivery run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Delivery {
    pub sent: usize,
    pub failed: usize,
}

/// Send every message in order. A failed send is logged and skipped; it never
/// stops the remaining sends.
pub async fn send_all(chat: &dyn ChatPort, messages: &[Outbound]) -> Delivery {
    let mut delivery = Delivery::default();
    for msg in messages {
        match chat
            .send_message(&msg.chat_id, &msg.text, msg.keyboard.as_ref())
            .await
        {
            Ok(()) => delivery.sent += 1,
            Err(e) => {
                warn!("send to chat {} failed: {e}", msg.chat_id);
                delivery.failed += 1;
            }
        }
    }
    delivery
}
