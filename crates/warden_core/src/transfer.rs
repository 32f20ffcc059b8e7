//! Tolerant wrappers around untrusted asset calls.
//!
//! The asset's own success signal is not a contract: an implementation may
//! return nothing on success, return a boolean, or revert. Absence of a
//! return value is success; a present boolean must be true.

use crate::error::GuardError;
use crate::host::{BalanceAck, Host, TransferAck};
use crate::ident::{AccountId, AssetId};

pub fn safe_transfer(
    host: &mut dyn Host,
    asset: AssetId,
    from: AccountId,
    to: AccountId,
    amount: u128,
) -> Result<(), GuardError> {
    if !host.asset_is_live(asset) {
        return Err(GuardError::AssetNotExecutable(asset));
    }
    match host.call_transfer(asset, from, to, amount) {
        Ok(TransferAck::NoReturn) => Ok(()),
        Ok(TransferAck::Flag(true)) => Ok(()),
        Ok(TransferAck::Flag(false)) => Err(GuardError::TransferFailed(
            "asset reported failure".to_string(),
        )),
        Err(declined) => Err(GuardError::TransferFailed(declined.reason)),
    }
}

pub fn safe_balance_of(
    host: &dyn Host,
    asset: AssetId,
    account: AccountId,
) -> Result<u128, GuardError> {
    if !host.asset_is_live(asset) {
        return Err(GuardError::AssetNotExecutable(asset));
    }
    match host.call_balance_of(asset, account) {
        Ok(BalanceAck::Value(value)) => Ok(value),
        Ok(BalanceAck::Malformed) => Err(GuardError::BalanceQueryFailed(
            "malformed balance word".to_string(),
        )),
        Err(declined) => Err(GuardError::BalanceQueryFailed(declined.reason)),
    }
}
