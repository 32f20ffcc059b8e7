//! Typed failure taxonomy for the guard.
//!
//! Every failure is terminal for its unit of work and is surfaced to the
//! caller verbatim; nothing is retried internally. The category accessor
//! feeds reject metrics and external attribution.

use crate::ident::{AccountId, AssetId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authorization,
    Lifecycle,
    Configuration,
    Policy,
    CallbackIntegrity,
    Settlement,
}

impl ErrorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Authorization => "authorization",
            ErrorCategory::Lifecycle => "lifecycle",
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Policy => "policy",
            ErrorCategory::CallbackIntegrity => "callback_integrity",
            ErrorCategory::Settlement => "settlement",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardError {
    #[error("caller is not authorized for this operation")]
    Unauthorized,

    #[error("a loan session is already open")]
    SessionAlreadyOpen,
    #[error("no loan session is awaiting settlement")]
    NoActiveSession,
    #[error("re-entrant call rejected")]
    ReentrancyDetected,

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("operator identity must be non-zero")]
    InvalidOperator,
    #[error("fee ceiling {0} bps exceeds 10000")]
    InvalidFeeCeiling(u32),
    #[error("asset {0} does not resolve to a live implementation")]
    AssetNotExecutable(AssetId),
    #[error("withdrawal destination must be non-zero")]
    InvalidDestination,

    #[error("guard is paused")]
    Paused,
    #[error("zero-amount borrow rejected")]
    ZeroAmount,
    #[error("asset {0} is not enabled for borrowing")]
    AssetNotAllowed(AssetId),
    #[error("amount {amount} exceeds configured maximum {max}")]
    AmountExceedsMax { amount: u128, max: u128 },
    #[error("fee {fee} exceeds ceiling {ceiling}")]
    FeeExceedsCeiling { fee: u128, ceiling: u128 },

    #[error("settlement callback from untrusted caller {0}")]
    NotTrustedCaller(AccountId),
    #[error("settlement callback arity mismatch: {assets} assets, {amounts} amounts, {fees} fees")]
    InvalidArity {
        assets: usize,
        amounts: usize,
        fees: usize,
    },
    #[error("settlement callback does not match the open session")]
    CallbackMismatch,

    #[error("held balance {held} is below required repayment {required}")]
    InsufficientBalance { held: u128, required: u128 },
    #[error("asset transfer failed: {0}")]
    TransferFailed(String),
    #[error("pool balance increased by {observed}, expected {expected}")]
    IncompleteRepayment { observed: u128, expected: u128 },
    #[error("balance query failed: {0}")]
    BalanceQueryFailed(String),
    #[error("custodial pool declined the advance: {0}")]
    AdvanceDeclined(String),
    #[error("custodial pool returned without settling the open session")]
    SettlementNotReached,
}

impl GuardError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            GuardError::Unauthorized => ErrorCategory::Authorization,
            GuardError::SessionAlreadyOpen
            | GuardError::NoActiveSession
            | GuardError::ReentrancyDetected => ErrorCategory::Lifecycle,
            GuardError::InvalidConfiguration(_)
            | GuardError::InvalidOperator
            | GuardError::InvalidFeeCeiling(_)
            | GuardError::AssetNotExecutable(_)
            | GuardError::InvalidDestination => ErrorCategory::Configuration,
            GuardError::Paused
            | GuardError::ZeroAmount
            | GuardError::AssetNotAllowed(_)
            | GuardError::AmountExceedsMax { .. }
            | GuardError::FeeExceedsCeiling { .. } => ErrorCategory::Policy,
            GuardError::NotTrustedCaller(_)
            | GuardError::InvalidArity { .. }
            | GuardError::CallbackMismatch => ErrorCategory::CallbackIntegrity,
            GuardError::InsufficientBalance { .. }
            | GuardError::TransferFailed(_)
            | GuardError::IncompleteRepayment { .. }
            | GuardError::BalanceQueryFailed(_)
            | GuardError::AdvanceDeclined(_)
            | GuardError::SettlementNotReached => ErrorCategory::Settlement,
        }
    }
}

/// Outcome of asking the custodial pool for an advance.
///
/// A nested guard failure raised inside the settlement callback must be
/// carried back unchanged so the original caller sees the root cause.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdvanceError {
    #[error("custodial pool declined the advance: {0}")]
    Declined(String),
    #[error(transparent)]
    Guard(#[from] GuardError),
}
