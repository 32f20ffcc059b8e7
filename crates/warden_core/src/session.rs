//! The singleton loan-session slot and the settlement receipt.

use crate::ident::{AssetId, PayloadDigest};

/// Record of an outstanding borrow awaiting settlement. At most one exists
/// at any time; the guard holds it in an `Option`, never a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub asset: AssetId,
    pub amount: u128,
    pub payload_digest: PayloadDigest,
    /// Set once the settlement callback has returned principal + fee. A
    /// settled session refuses further callbacks.
    pub settled: bool,
}

impl Session {
    pub fn open(asset: AssetId, amount: u128, payload_digest: PayloadDigest) -> Self {
        Self {
            asset,
            amount,
            payload_digest,
            settled: false,
        }
    }

    pub fn matches(&self, asset: AssetId, amount: u128, payload_digest: PayloadDigest) -> bool {
        self.asset == asset && self.amount == amount && self.payload_digest == payload_digest
    }
}

/// The most recently completed settlement, retained for observability and
/// overwritten on each success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementReceipt {
    pub asset: AssetId,
    pub amount: u128,
    pub fee: u128,
    pub payload: Vec<u8>,
    pub payload_digest: PayloadDigest,
}
