//! Structured notifications for the observability surface.
//!
//! Notifications are staged inside a unit of work and reach the sink only
//! when the top-level operation commits, so an external audit log never
//! records an unwound change.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::ident::{AccountId, AssetId, PayloadDigest};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    RiskConfigChanged {
        asset: AssetId,
        enabled: bool,
        max_amount: u128,
        max_fee_bps: u32,
    },
    PauseChanged {
        paused: bool,
    },
    OperatorChanged {
        previous: AccountId,
        current: AccountId,
    },
    BorrowRequested {
        asset: AssetId,
        amount: u128,
        payload_digest: PayloadDigest,
    },
    SettlementCompleted {
        asset: AssetId,
        amount: u128,
        fee: u128,
        payload_digest: PayloadDigest,
    },
    WithdrawalCompleted {
        asset: AssetId,
        to: AccountId,
        amount: u128,
    },
}

pub trait EventSink {
    fn emit(&mut self, event: &Notification);
}

/// In-memory sink; clones share one buffer, so an embedding (or a test) can
/// hand the guard one handle and keep another to observe.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<Notification>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Notification> {
        self.events.lock().expect("sink poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().expect("sink poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for MemorySink {
    fn emit(&mut self, event: &Notification) {
        self.events.lock().expect("sink poisoned").push(event.clone());
    }
}
