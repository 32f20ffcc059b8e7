//! The custody guard: gate ordering, the singleton session slot, and the
//! unit-of-work machinery that makes every entry point all-or-nothing.
//!
//! There is no ambient "abort the whole call" to lean on here, so each
//! entry point that can touch the host clones the guard's mutable state and
//! takes a host checkpoint on the way in; any failure restores both. Staged
//! notifications ride inside that state and reach the sink only when the
//! top-level unit commits.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info, warn};

use crate::error::{AdvanceError, ErrorCategory, GuardError};
use crate::events::{EventSink, Notification};
use crate::host::{Checkpoint, Host};
use crate::ident::{AccountId, AssetId, PayloadDigest};
use crate::policy::{AccessControl, PauseSwitch};
use crate::risk::{AssetRiskConfig, MAX_FEE_BPS, RiskRegistry, fee_ceiling};
use crate::session::{Session, SettlementReceipt};
use crate::transfer::{safe_balance_of, safe_transfer};

pub struct GuardMetrics {
    reject_authorization_total: AtomicU64,
    reject_lifecycle_total: AtomicU64,
    reject_configuration_total: AtomicU64,
    reject_policy_total: AtomicU64,
    reject_callback_total: AtomicU64,
    reject_settlement_total: AtomicU64,
    borrows_completed_total: AtomicU64,
}

impl GuardMetrics {
    pub const fn new() -> Self {
        Self {
            reject_authorization_total: AtomicU64::new(0),
            reject_lifecycle_total: AtomicU64::new(0),
            reject_configuration_total: AtomicU64::new(0),
            reject_policy_total: AtomicU64::new(0),
            reject_callback_total: AtomicU64::new(0),
            reject_settlement_total: AtomicU64::new(0),
            borrows_completed_total: AtomicU64::new(0),
        }
    }

    pub fn reject_total(&self, category: ErrorCategory) -> u64 {
        self.counter(category).load(Ordering::Relaxed)
    }

    pub fn borrows_completed(&self) -> u64 {
        self.borrows_completed_total.load(Ordering::Relaxed)
    }

    fn bump_reject(&self, category: ErrorCategory) {
        self.counter(category).fetch_add(1, Ordering::Relaxed);
    }

    fn counter(&self, category: ErrorCategory) -> &AtomicU64 {
        match category {
            ErrorCategory::Authorization => &self.reject_authorization_total,
            ErrorCategory::Lifecycle => &self.reject_lifecycle_total,
            ErrorCategory::Configuration => &self.reject_configuration_total,
            ErrorCategory::Policy => &self.reject_policy_total,
            ErrorCategory::CallbackIntegrity => &self.reject_callback_total,
            ErrorCategory::Settlement => &self.reject_settlement_total,
        }
    }
}

static GUARD_METRICS: GuardMetrics = GuardMetrics::new();

pub fn guard_reject_total(category: ErrorCategory) -> u64 {
    GUARD_METRICS.reject_total(category)
}

pub fn borrows_completed_total() -> u64 {
    GUARD_METRICS.borrows_completed()
}

/// Construction-time identities. All must be non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardConfig {
    /// Administrative principal: configuration, pause, withdrawal.
    pub administrative: AccountId,
    /// Execution principal: the only identity allowed to start a borrow.
    pub operator: AccountId,
    /// The custodial pool whose settlement callbacks are trusted.
    pub pool: AccountId,
    /// The guard's own account at the asset implementations.
    pub account: AccountId,
}

/// Everything a unit of work may mutate. Cloned at entry, restored on
/// abort; staged notifications are discarded with the rest.
#[derive(Debug, Clone)]
struct GuardState {
    access: AccessControl,
    pause: PauseSwitch,
    risk: RiskRegistry,
    session: Option<Session>,
    last_receipt: Option<SettlementReceipt>,
    staged_events: Vec<Notification>,
    entered: bool,
}

struct UnitOfWork {
    snapshot: GuardState,
    checkpoint: Checkpoint,
}

pub struct CustodyGuard {
    pool: AccountId,
    account: AccountId,
    state: GuardState,
    depth: usize,
    sink: Box<dyn EventSink>,
}

impl CustodyGuard {
    pub fn new(config: GuardConfig, sink: Box<dyn EventSink>) -> Result<Self, GuardError> {
        let access = AccessControl::new(config.administrative, config.operator)?;
        if config.pool.is_zero() {
            return Err(GuardError::InvalidConfiguration(
                "custodial pool identity must be non-zero",
            ));
        }
        if config.account.is_zero() {
            return Err(GuardError::InvalidConfiguration(
                "guard account identity must be non-zero",
            ));
        }
        Ok(Self {
            pool: config.pool,
            account: config.account,
            state: GuardState {
                access,
                pause: PauseSwitch::default(),
                risk: RiskRegistry::new(),
                session: None,
                last_receipt: None,
                staged_events: Vec::new(),
                entered: false,
            },
            depth: 0,
            sink,
        })
    }

    pub fn administrative(&self) -> AccountId {
        self.state.access.administrative()
    }

    pub fn operator(&self) -> AccountId {
        self.state.access.operator()
    }

    pub fn pool(&self) -> AccountId {
        self.pool
    }

    pub fn account(&self) -> AccountId {
        self.account
    }

    pub fn is_paused(&self) -> bool {
        self.state.pause.is_paused()
    }

    pub fn session_active(&self) -> bool {
        self.state.session.is_some()
    }

    pub fn last_receipt(&self) -> Option<&SettlementReceipt> {
        self.state.last_receipt.as_ref()
    }

    pub fn risk_config(&self, asset: AssetId) -> Option<AssetRiskConfig> {
        self.state.risk.get(asset)
    }

    // ── administrative surface ──────────────────────────────────────────

    pub fn set_paused(&mut self, caller: AccountId, paused: bool) -> Result<(), GuardError> {
        let result = self.set_paused_inner(caller, paused);
        self.conclude_local(result)
    }

    fn set_paused_inner(&mut self, caller: AccountId, paused: bool) -> Result<(), GuardError> {
        self.state.access.require_administrative(caller)?;
        self.state.pause.set(paused);
        info!(paused, "pause switch changed");
        self.stage(Notification::PauseChanged { paused });
        Ok(())
    }

    pub fn set_operator(&mut self, caller: AccountId, operator: AccountId) -> Result<(), GuardError> {
        let result = self.set_operator_inner(caller, operator);
        self.conclude_local(result)
    }

    fn set_operator_inner(
        &mut self,
        caller: AccountId,
        operator: AccountId,
    ) -> Result<(), GuardError> {
        self.state.access.require_administrative(caller)?;
        let previous = self.state.access.replace_operator(operator)?;
        info!(previous = %previous, current = %operator, "operator replaced");
        self.stage(Notification::OperatorChanged {
            previous,
            current: operator,
        });
        Ok(())
    }

    pub fn set_risk_config(
        &mut self,
        host: &dyn Host,
        caller: AccountId,
        asset: AssetId,
        config: AssetRiskConfig,
    ) -> Result<(), GuardError> {
        let result = self.set_risk_config_inner(host, caller, asset, config);
        self.conclude_local(result)
    }

    fn set_risk_config_inner(
        &mut self,
        host: &dyn Host,
        caller: AccountId,
        asset: AssetId,
        config: AssetRiskConfig,
    ) -> Result<(), GuardError> {
        self.state.access.require_administrative(caller)?;
        if config.max_fee_bps > MAX_FEE_BPS {
            return Err(GuardError::InvalidFeeCeiling(config.max_fee_bps));
        }
        if !host.asset_is_live(asset) {
            return Err(GuardError::AssetNotExecutable(asset));
        }
        self.state.risk.upsert(asset, config);
        self.stage(Notification::RiskConfigChanged {
            asset,
            enabled: config.enabled,
            max_amount: config.max_amount,
            max_fee_bps: config.max_fee_bps,
        });
        Ok(())
    }

    // ── borrow cycle ────────────────────────────────────────────────────

    pub fn request_borrow(
        &mut self,
        host: &mut dyn Host,
        caller: AccountId,
        asset: AssetId,
        amount: u128,
        payload: &[u8],
    ) -> Result<SettlementReceipt, GuardError> {
        let work = self.begin(host);
        let result = self.borrow_cycle(host, caller, asset, amount, payload);
        let result = self.conclude(host, work, result);
        if result.is_ok() {
            GUARD_METRICS
                .borrows_completed_total
                .fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    fn borrow_cycle(
        &mut self,
        host: &mut dyn Host,
        caller: AccountId,
        asset: AssetId,
        amount: u128,
        payload: &[u8],
    ) -> Result<SettlementReceipt, GuardError> {
        self.acquire_entry_lock()?;
        self.state.access.require_operator(caller)?;
        self.state.pause.require_active()?;
        if self.state.session.is_some() {
            return Err(GuardError::SessionAlreadyOpen);
        }
        if amount == 0 {
            return Err(GuardError::ZeroAmount);
        }
        self.state.risk.require_within_limits(asset, amount)?;

        let payload_digest = PayloadDigest::of(payload);
        self.state.session = Some(Session::open(asset, amount, payload_digest));
        debug!(asset = %asset, amount = %amount, digest = %payload_digest, "loan session opened");
        self.stage(Notification::BorrowRequested {
            asset,
            amount,
            payload_digest,
        });

        host.advance(self, asset, amount, payload)
            .map_err(|err| match err {
                AdvanceError::Declined(reason) => GuardError::AdvanceDeclined(reason),
                AdvanceError::Guard(inner) => inner,
            })?;

        // No session survives across independent external calls: the slot
        // is cleared before control returns, whatever the pool did with it.
        let session = self
            .state
            .session
            .take()
            .ok_or(GuardError::SettlementNotReached)?;
        if !session.settled {
            return Err(GuardError::SettlementNotReached);
        }
        let receipt = self
            .state
            .last_receipt
            .clone()
            .ok_or(GuardError::SettlementNotReached)?;
        self.release_entry_lock();
        info!(asset = %asset, amount = %amount, fee = %receipt.fee, "borrow cycle completed");
        Ok(receipt)
    }

    // ── settlement callback ─────────────────────────────────────────────

    pub fn on_settlement_callback(
        &mut self,
        host: &mut dyn Host,
        caller: AccountId,
        assets: &[AssetId],
        amounts: &[u128],
        fees: &[u128],
        payload: &[u8],
    ) -> Result<(), GuardError> {
        let work = self.begin(host);
        let result = self.settle(host, caller, assets, amounts, fees, payload);
        self.conclude(host, work, result)
    }

    fn settle(
        &mut self,
        host: &mut dyn Host,
        caller: AccountId,
        assets: &[AssetId],
        amounts: &[u128],
        fees: &[u128],
        payload: &[u8],
    ) -> Result<(), GuardError> {
        self.state.pause.require_active()?;
        if caller != self.pool {
            return Err(GuardError::NotTrustedCaller(caller));
        }
        if assets.len() != 1 || amounts.len() != 1 || fees.len() != 1 {
            return Err(GuardError::InvalidArity {
                assets: assets.len(),
                amounts: amounts.len(),
                fees: fees.len(),
            });
        }
        let (asset, amount, fee) = (assets[0], amounts[0], fees[0]);
        let payload_digest = PayloadDigest::of(payload);
        let session = match &self.state.session {
            Some(session) if !session.settled => session.clone(),
            _ => return Err(GuardError::NoActiveSession),
        };
        if !session.matches(asset, amount, payload_digest) {
            return Err(GuardError::CallbackMismatch);
        }

        // Re-read, not carried from the open: the limits must hold against
        // the configuration as it stands at settlement time.
        let config = self.state.risk.require_within_limits(asset, amount)?;
        let ceiling = fee_ceiling(amount, config.max_fee_bps);
        if fee > ceiling {
            return Err(GuardError::FeeExceedsCeiling { fee, ceiling });
        }

        let repayment = amount.saturating_add(fee);
        let held = safe_balance_of(&*host, asset, self.account)?;
        if held < repayment {
            return Err(GuardError::InsufficientBalance {
                held,
                required: repayment,
            });
        }

        let pool_before = safe_balance_of(&*host, asset, self.pool)?;
        safe_transfer(host, asset, self.account, self.pool, repayment)?;
        let pool_after = safe_balance_of(&*host, asset, self.pool)?;
        // The transfer's own success signal is not trusted: repayment counts
        // only if the pool's observed balance moved by the full amount.
        let observed = pool_after.saturating_sub(pool_before);
        if observed < repayment {
            return Err(GuardError::IncompleteRepayment {
                observed,
                expected: repayment,
            });
        }

        if let Some(session) = self.state.session.as_mut() {
            session.settled = true;
        }
        self.state.last_receipt = Some(SettlementReceipt {
            asset,
            amount,
            fee,
            payload: payload.to_vec(),
            payload_digest,
        });
        debug!(asset = %asset, amount = %amount, fee = %fee, "settlement completed");
        self.stage(Notification::SettlementCompleted {
            asset,
            amount,
            fee,
            payload_digest,
        });
        Ok(())
    }

    // ── treasury ────────────────────────────────────────────────────────

    /// Emergency-recovery path: administrative, session-independent, and
    /// deliberately not behind the pause gate.
    pub fn withdraw(
        &mut self,
        host: &mut dyn Host,
        caller: AccountId,
        asset: AssetId,
        to: AccountId,
        amount: u128,
    ) -> Result<(), GuardError> {
        let work = self.begin(host);
        let result = self.withdraw_cycle(host, caller, asset, to, amount);
        self.conclude(host, work, result)
    }

    fn withdraw_cycle(
        &mut self,
        host: &mut dyn Host,
        caller: AccountId,
        asset: AssetId,
        to: AccountId,
        amount: u128,
    ) -> Result<(), GuardError> {
        self.acquire_entry_lock()?;
        self.state.access.require_administrative(caller)?;
        if to.is_zero() {
            return Err(GuardError::InvalidDestination);
        }
        safe_transfer(host, asset, self.account, to, amount)?;
        info!(asset = %asset, to = %to, amount = %amount, "treasury withdrawal");
        self.stage(Notification::WithdrawalCompleted { asset, to, amount });
        self.release_entry_lock();
        Ok(())
    }

    // ── unit-of-work machinery ──────────────────────────────────────────

    fn begin(&mut self, host: &mut dyn Host) -> UnitOfWork {
        let work = UnitOfWork {
            snapshot: self.state.clone(),
            checkpoint: host.checkpoint(),
        };
        self.depth += 1;
        work
    }

    fn conclude<T>(
        &mut self,
        host: &mut dyn Host,
        work: UnitOfWork,
        result: Result<T, GuardError>,
    ) -> Result<T, GuardError> {
        self.depth -= 1;
        match result {
            Ok(value) => {
                host.commit(work.checkpoint);
                if self.depth == 0 {
                    self.flush_staged();
                }
                Ok(value)
            }
            Err(err) => {
                self.state = work.snapshot;
                host.revert_to(work.checkpoint);
                if self.depth == 0 {
                    GUARD_METRICS.bump_reject(err.category());
                }
                warn!(error = %err, "unit of work aborted");
                Err(err)
            }
        }
    }

    /// Conclusion for host-free administrative paths. These validate before
    /// mutating, so a failure has nothing to roll back.
    fn conclude_local<T>(&mut self, result: Result<T, GuardError>) -> Result<T, GuardError> {
        match &result {
            Ok(_) => {
                if self.depth == 0 {
                    self.flush_staged();
                }
            }
            Err(err) => {
                if self.depth == 0 {
                    GUARD_METRICS.bump_reject(err.category());
                }
            }
        }
        result
    }

    fn acquire_entry_lock(&mut self) -> Result<(), GuardError> {
        if self.state.entered {
            return Err(GuardError::ReentrancyDetected);
        }
        self.state.entered = true;
        Ok(())
    }

    fn release_entry_lock(&mut self) {
        self.state.entered = false;
    }

    fn stage(&mut self, event: Notification) {
        self.state.staged_events.push(event);
    }

    fn flush_staged(&mut self) {
        for event in self.state.staged_events.drain(..) {
            self.sink.emit(&event);
        }
    }
}
