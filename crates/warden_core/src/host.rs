//! Boundary to the external world: asset implementations and the custodial
//! pool, plus the transaction support a non-transactional runtime must
//! supply so the guard can make every unit of work all-or-nothing.

use crate::error::AdvanceError;
use crate::guard::CustodyGuard;
use crate::ident::{AccountId, AssetId};

/// Marker for a host-side transaction point. Hosts assign meaning to the
/// inner value; checkpoints nest and are reverted or committed in LIFO
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(pub u64);

/// What a raw transfer call came back with, before interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferAck {
    /// The asset returned no data at all.
    NoReturn,
    /// The asset returned a decoded boolean.
    Flag(bool),
}

/// What a raw balance query came back with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceAck {
    Value(u128),
    /// The asset answered with bytes that do not decode to a balance.
    Malformed,
}

/// An asset call that reverted or errored outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallDeclined {
    pub reason: String,
}

impl CallDeclined {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

pub trait Host {
    /// Whether `asset` resolves to a live, invocable implementation rather
    /// than a plain account or nothing at all.
    fn asset_is_live(&self, asset: AssetId) -> bool;

    /// Raw transfer in the asset's own calling convention. The ack mirrors
    /// whatever the asset returned; interpretation belongs to
    /// [`crate::transfer`].
    fn call_transfer(
        &mut self,
        asset: AssetId,
        from: AccountId,
        to: AccountId,
        amount: u128,
    ) -> Result<TransferAck, CallDeclined>;

    fn call_balance_of(
        &self,
        asset: AssetId,
        account: AccountId,
    ) -> Result<BalanceAck, CallDeclined>;

    /// Ask the custodial pool to advance `amount` of `asset` to the guard's
    /// account and to invoke `on_settlement_callback` with the same payload,
    /// synchronously, before returning. A nested guard failure must come
    /// back unchanged as [`AdvanceError::Guard`].
    fn advance(
        &mut self,
        guard: &mut CustodyGuard,
        asset: AssetId,
        amount: u128,
        payload: &[u8],
    ) -> Result<(), AdvanceError>;

    fn checkpoint(&mut self) -> Checkpoint;

    /// Discard every host-side state change made since `checkpoint`.
    fn revert_to(&mut self, checkpoint: Checkpoint);

    /// Release `checkpoint`, keeping the changes made since it was taken.
    fn commit(&mut self, checkpoint: Checkpoint);
}
