#![allow(dead_code)]

//! Shared test harness: a scriptable in-memory host standing in for the
//! custodial pool and the asset implementations, with checkpoint support
//! so unwinding can be observed end to end.

use std::collections::BTreeMap;

use warden_core::error::AdvanceError;
use warden_core::events::MemorySink;
use warden_core::guard::{CustodyGuard, GuardConfig};
use warden_core::host::{BalanceAck, CallDeclined, Checkpoint, Host, TransferAck};
use warden_core::ident::{AccountId, AssetId};
use warden_core::risk::AssetRiskConfig;

pub const ADMIN: AccountId = AccountId::from_bytes([0xaa; 20]);
pub const OPERATOR: AccountId = AccountId::from_bytes([0xb0; 20]);
pub const OUTSIDER: AccountId = AccountId::from_bytes([0xee; 20]);
pub const POOL_ACCOUNT: AccountId = AccountId::from_bytes([0xcc; 20]);
pub const GUARD_ACCOUNT: AccountId = AccountId::from_bytes([0x0d; 20]);
pub const TREASURY_DEST: AccountId = AccountId::from_bytes([0x7e; 20]);

pub const TOKEN: AssetId = AssetId::from_bytes([0x11; 20]);
pub const OTHER_TOKEN: AssetId = AssetId::from_bytes([0x22; 20]);
/// Registered but not live: resolves to a plain account, not an asset.
pub const DEAD_TOKEN: AssetId = AssetId::from_bytes([0x33; 20]);

pub const POOL_FLOAT: u128 = 1_000_000;

/// How a mock asset answers transfer calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStyle {
    /// Moves value and returns nothing (the no-return convention).
    Silent,
    /// Moves value and returns `true`.
    Flagged,
    /// Returns `false` without moving value.
    RefusesWithFalse,
    /// Reverts outright.
    Declines,
    /// Moves value but burns this many bps of it in transit.
    FeeOnTransfer(u32),
}

#[derive(Debug, Clone)]
pub struct MockAsset {
    pub live: bool,
    pub style: TransferStyle,
    pub malformed_balance: bool,
    pub balances: BTreeMap<AccountId, u128>,
}

impl MockAsset {
    pub fn live_silent() -> Self {
        Self {
            live: true,
            style: TransferStyle::Silent,
            malformed_balance: false,
            balances: BTreeMap::new(),
        }
    }
}

/// What the mock pool does after moving the advance to the guard.
#[derive(Debug, Clone)]
pub enum PoolScript {
    /// Settle honestly with this fee.
    Settle { fee: u128 },
    /// Invoke the callback with an inflated amount.
    TamperAmount { fee: u128, delta: u128 },
    /// Invoke the callback naming a different asset.
    TamperAsset { fee: u128 },
    /// Invoke the callback with a different payload.
    TamperPayload { fee: u128 },
    /// Report success without ever calling back.
    SkipCallback,
    /// Refuse the advance outright.
    Decline,
    /// Settle, then try to settle the same session again.
    SettleTwice { fee: u128 },
    /// Re-enter `request_borrow` instead of settling.
    ReenterBorrow,
    /// Call `withdraw` as the administrative principal instead of settling.
    ReenterWithdraw,
    /// Rewrite the asset's risk config (as the administrative principal),
    /// then settle; exercises the settlement-time re-validation.
    ReconfigureThenSettle { fee: u128, config: AssetRiskConfig },
}

pub struct MockHost {
    pub assets: BTreeMap<AssetId, MockAsset>,
    pub script: PoolScript,
    pool_account: AccountId,
    guard_account: AccountId,
    snapshots: Vec<(u64, BTreeMap<AssetId, MockAsset>)>,
    next_checkpoint: u64,
}

impl MockHost {
    pub fn new() -> Self {
        let mut token = MockAsset::live_silent();
        token.balances.insert(POOL_ACCOUNT, POOL_FLOAT);
        let mut assets = BTreeMap::new();
        assets.insert(TOKEN, token);
        assets.insert(OTHER_TOKEN, MockAsset::live_silent());
        let mut dead = MockAsset::live_silent();
        dead.live = false;
        assets.insert(DEAD_TOKEN, dead);
        Self {
            assets,
            script: PoolScript::Settle { fee: 0 },
            pool_account: POOL_ACCOUNT,
            guard_account: GUARD_ACCOUNT,
            snapshots: Vec::new(),
            next_checkpoint: 0,
        }
    }

    pub fn with_script(mut self, script: PoolScript) -> Self {
        self.script = script;
        self
    }

    pub fn with_style(mut self, asset: AssetId, style: TransferStyle) -> Self {
        self.asset_mut(asset).style = style;
        self
    }

    pub fn with_malformed_balance(mut self, asset: AssetId) -> Self {
        self.asset_mut(asset).malformed_balance = true;
        self
    }

    pub fn set_balance(&mut self, asset: AssetId, account: AccountId, amount: u128) {
        self.asset_mut(asset).balances.insert(account, amount);
    }

    pub fn balance(&self, asset: AssetId, account: AccountId) -> u128 {
        self.assets
            .get(&asset)
            .and_then(|entry| entry.balances.get(&account))
            .copied()
            .unwrap_or(0)
    }

    /// All balances of `asset`, for whole-ledger unwind assertions.
    pub fn ledger(&self, asset: AssetId) -> BTreeMap<AccountId, u128> {
        self.assets
            .get(&asset)
            .map(|entry| entry.balances.clone())
            .unwrap_or_default()
    }

    fn asset_mut(&mut self, asset: AssetId) -> &mut MockAsset {
        self.assets.get_mut(&asset).expect("unregistered mock asset")
    }

    fn styled_move(
        &mut self,
        asset: AssetId,
        from: AccountId,
        to: AccountId,
        amount: u128,
    ) -> Result<TransferAck, String> {
        let entry = self
            .assets
            .get_mut(&asset)
            .ok_or_else(|| "unknown asset".to_string())?;
        let (burn_bps, ack) = match entry.style {
            TransferStyle::Declines => return Err("asset reverted".to_string()),
            TransferStyle::RefusesWithFalse => return Ok(TransferAck::Flag(false)),
            TransferStyle::Silent => (0, TransferAck::NoReturn),
            TransferStyle::Flagged => (0, TransferAck::Flag(true)),
            TransferStyle::FeeOnTransfer(bps) => (bps, TransferAck::NoReturn),
        };
        let from_balance = entry.balances.get(&from).copied().unwrap_or(0);
        if from_balance < amount {
            return Err(format!("insufficient balance in {from}"));
        }
        entry.balances.insert(from, from_balance - amount);
        let credited = amount - amount * u128::from(burn_bps) / 10_000;
        let to_balance = entry.balances.get(&to).copied().unwrap_or(0);
        entry.balances.insert(to, to_balance + credited);
        Ok(ack)
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for MockHost {
    fn asset_is_live(&self, asset: AssetId) -> bool {
        self.assets.get(&asset).map(|entry| entry.live).unwrap_or(false)
    }

    fn call_transfer(
        &mut self,
        asset: AssetId,
        from: AccountId,
        to: AccountId,
        amount: u128,
    ) -> Result<TransferAck, CallDeclined> {
        self.styled_move(asset, from, to, amount)
            .map_err(CallDeclined::new)
    }

    fn call_balance_of(
        &self,
        asset: AssetId,
        account: AccountId,
    ) -> Result<BalanceAck, CallDeclined> {
        let entry = match self.assets.get(&asset) {
            Some(entry) => entry,
            None => return Err(CallDeclined::new("unknown asset")),
        };
        if entry.malformed_balance {
            return Ok(BalanceAck::Malformed);
        }
        Ok(BalanceAck::Value(
            entry.balances.get(&account).copied().unwrap_or(0),
        ))
    }

    fn advance(
        &mut self,
        guard: &mut CustodyGuard,
        asset: AssetId,
        amount: u128,
        payload: &[u8],
    ) -> Result<(), AdvanceError> {
        let script = self.script.clone();
        if matches!(script, PoolScript::Decline) {
            return Err(AdvanceError::Declined(
                "pool refused the advance".to_string(),
            ));
        }
        let pool = self.pool_account;
        let guard_account = self.guard_account;
        match self.styled_move(asset, pool, guard_account, amount) {
            Ok(TransferAck::Flag(false)) => {
                return Err(AdvanceError::Declined("asset refused".to_string()));
            }
            Ok(_) => {}
            Err(reason) => return Err(AdvanceError::Declined(reason)),
        }
        match script {
            PoolScript::Decline => unreachable!("handled above"),
            PoolScript::Settle { fee } => {
                guard.on_settlement_callback(self, pool, &[asset], &[amount], &[fee], payload)?;
            }
            PoolScript::TamperAmount { fee, delta } => {
                let inflated = amount + delta;
                guard.on_settlement_callback(
                    self,
                    pool,
                    &[asset],
                    &[inflated],
                    &[fee],
                    payload,
                )?;
            }
            PoolScript::TamperAsset { fee } => {
                guard.on_settlement_callback(
                    self,
                    pool,
                    &[OTHER_TOKEN],
                    &[amount],
                    &[fee],
                    payload,
                )?;
            }
            PoolScript::TamperPayload { fee } => {
                guard.on_settlement_callback(
                    self,
                    pool,
                    &[asset],
                    &[amount],
                    &[fee],
                    b"tampered",
                )?;
            }
            PoolScript::SkipCallback => {}
            PoolScript::SettleTwice { fee } => {
                guard.on_settlement_callback(self, pool, &[asset], &[amount], &[fee], payload)?;
                guard.on_settlement_callback(self, pool, &[asset], &[amount], &[fee], payload)?;
            }
            PoolScript::ReenterBorrow => {
                guard.request_borrow(self, OPERATOR, asset, 1, b"nested")?;
            }
            PoolScript::ReenterWithdraw => {
                guard.withdraw(self, ADMIN, asset, ADMIN, 1)?;
            }
            PoolScript::ReconfigureThenSettle { fee, config } => {
                guard.set_risk_config(&*self, ADMIN, asset, config)?;
                guard.on_settlement_callback(self, pool, &[asset], &[amount], &[fee], payload)?;
            }
        }
        Ok(())
    }

    fn checkpoint(&mut self) -> Checkpoint {
        let id = self.next_checkpoint;
        self.next_checkpoint += 1;
        self.snapshots.push((id, self.assets.clone()));
        Checkpoint(id)
    }

    fn revert_to(&mut self, checkpoint: Checkpoint) {
        while let Some((id, saved)) = self.snapshots.pop() {
            if id == checkpoint.0 {
                self.assets = saved;
                return;
            }
        }
        panic!("revert to unknown checkpoint {}", checkpoint.0);
    }

    fn commit(&mut self, checkpoint: Checkpoint) {
        if let Some(pos) = self
            .snapshots
            .iter()
            .position(|(id, _)| *id == checkpoint.0)
        {
            self.snapshots.truncate(pos);
        }
    }
}

pub fn new_guard() -> (CustodyGuard, MemorySink) {
    let sink = MemorySink::new();
    let guard = CustodyGuard::new(
        GuardConfig {
            administrative: ADMIN,
            operator: OPERATOR,
            pool: POOL_ACCOUNT,
            account: GUARD_ACCOUNT,
        },
        Box::new(sink.clone()),
    )
    .expect("guard config");
    (guard, sink)
}

/// Guard plus host with `TOKEN` enabled at the given limits.
pub fn enabled_setup(max_amount: u128, max_fee_bps: u32) -> (CustodyGuard, MemorySink, MockHost) {
    let (mut guard, sink) = new_guard();
    let host = MockHost::new();
    guard
        .set_risk_config(
            &host,
            ADMIN,
            TOKEN,
            AssetRiskConfig {
                enabled: true,
                max_amount,
                max_fee_bps,
            },
        )
        .expect("risk config");
    (guard, sink, host)
}
