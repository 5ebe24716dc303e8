//! Balance, history, and fee synchronization.
//!
//! A refresh fetches balance and history concurrently. Either may fail
//! without blocking the other; a failed stream keeps its previous data.
//! At most one refresh runs at a time: a call that arrives while one is in
//! flight returns `RefreshOutcome::Skipped` and issues no requests.

use crate::error::ServiceError;
use crate::guard::{lock, InFlight};
use crate::service::RemoteWalletService;
use btc2_types::{Amount, TransactionRecord, DEFAULT_FEE};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;

/// Load state of one data stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StreamStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    /// Last fetch failed; previous data (if any) is still shown.
    Failed(String),
}

/// Balance as last reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceSnapshot {
    pub amount: Amount,
    pub fetched_at: DateTime<Utc>,
}

/// Current per-transaction fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeEstimate {
    pub fee_per_tx: Amount,
    /// `None` while still on the built-in default.
    pub fetched_at: Option<DateTime<Utc>>,
}

impl Default for FeeEstimate {
    fn default() -> Self {
        Self {
            fee_per_tx: DEFAULT_FEE,
            fetched_at: None,
        }
    }
}

/// Read-only copy of everything the engine tracks.
#[derive(Debug, Clone, Default)]
pub struct SyncSnapshot {
    pub balance: Option<BalanceSnapshot>,
    pub balance_status: StreamStatus,
    pub history: Vec<TransactionRecord>,
    pub history_status: StreamStatus,
    pub fee: FeeEstimate,
    pub last_refresh: Option<DateTime<Utc>>,
    pub refreshing: bool,
}

/// Per-stream results of one completed refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshReport {
    pub balance: Result<Amount, ServiceError>,
    /// Number of history entries received.
    pub history: Result<usize, ServiceError>,
}

impl RefreshReport {
    pub fn is_ok(&self) -> bool {
        self.balance.is_ok() && self.history.is_ok()
    }

    /// Balance failure takes precedence over history failure.
    pub fn first_error(&self) -> Option<&ServiceError> {
        self.balance.as_ref().err().or(self.history.as_ref().err())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// Another refresh was already in flight; nothing was requested.
    Skipped,
    /// The session ended while the requests were out; results dropped.
    Discarded,
    Completed(RefreshReport),
}

#[derive(Default)]
struct SyncState {
    balance: Option<BalanceSnapshot>,
    balance_status: StreamStatus,
    history: Vec<TransactionRecord>,
    history_status: StreamStatus,
    fee: FeeEstimate,
    last_refresh: Option<DateTime<Utc>>,
}

/// Keeps balance, history, and fee estimate fresh.
#[derive(Default)]
pub struct SyncEngine {
    state: Mutex<SyncState>,
    refreshing: AtomicBool,
    /// Signalled whenever an in-flight refresh finishes or is dropped.
    idle: Notify,
}

impl SyncEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch balance and history.
    ///
    /// `still_current` is checked once both requests have settled; if it
    /// returns false the results belong to a session that has since ended
    /// and are dropped.
    pub async fn refresh<F>(
        &self,
        service: &dyn RemoteWalletService,
        still_current: F,
    ) -> RefreshOutcome
    where
        F: Fn() -> bool,
    {
        let Some(_busy) = InFlight::acquire_signalled(&self.refreshing, &self.idle) else {
            log::debug!("refresh already in flight, ignoring");
            return RefreshOutcome::Skipped;
        };

        {
            let mut st = lock(&self.state);
            st.balance_status = StreamStatus::Loading;
            st.history_status = StreamStatus::Loading;
        }

        let (balance, history) = tokio::join!(service.get_balance(), service.get_history());

        if !still_current() {
            log::debug!("session ended during refresh, dropping results");
            return RefreshOutcome::Discarded;
        }

        let now = Utc::now();
        let mut st = lock(&self.state);

        let balance = match balance {
            Ok(amount) => {
                st.balance = Some(BalanceSnapshot {
                    amount,
                    fetched_at: now,
                });
                st.balance_status = StreamStatus::Ready;
                Ok(amount)
            }
            Err(e) => {
                log::warn!("balance refresh failed: {}", e);
                st.balance_status = StreamStatus::Failed(e.to_string());
                Err(e)
            }
        };

        let history = match history {
            Ok(records) => {
                let n = records.len();
                st.history = records;
                st.history_status = StreamStatus::Ready;
                Ok(n)
            }
            Err(e) => {
                log::warn!("history refresh failed: {}", e);
                st.history_status = StreamStatus::Failed(e.to_string());
                Err(e)
            }
        };

        st.last_refresh = Some(now);
        RefreshOutcome::Completed(RefreshReport { balance, history })
    }

    /// Like `refresh`, but if another refresh is in flight, wait for it to
    /// finish and then run. Gives up with `Discarded` once `still_current`
    /// turns false.
    pub async fn refresh_when_idle<F>(
        &self,
        service: &dyn RemoteWalletService,
        still_current: F,
    ) -> RefreshOutcome
    where
        F: Fn() -> bool,
    {
        loop {
            let idle = self.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();

            match self.refresh(service, &still_current).await {
                RefreshOutcome::Skipped => {
                    log::debug!("waiting for the in-flight refresh to finish");
                    idle.await;
                    if !still_current() {
                        return RefreshOutcome::Discarded;
                    }
                }
                outcome => return outcome,
            }
        }
    }

    /// Fetch a new fee estimate. On failure the previous estimate stays.
    pub async fn refresh_fee_estimate(
        &self,
        service: &dyn RemoteWalletService,
        target_blocks: u32,
    ) -> Result<Amount, ServiceError> {
        match service.estimate_fee(target_blocks).await {
            Ok(fee) if fee.is_zero() => {
                // A zero estimate would let validation pass sends the node rejects.
                log::warn!("backend returned a zero fee estimate, keeping previous");
                Ok(self.fee())
            }
            Ok(fee) => {
                lock(&self.state).fee = FeeEstimate {
                    fee_per_tx: fee,
                    fetched_at: Some(Utc::now()),
                };
                log::debug!("fee estimate for {} blocks: {}", target_blocks, fee.to_fixed());
                Ok(fee)
            }
            Err(e) => {
                log::warn!("fee estimate failed, keeping {}: {}", self.fee().to_fixed(), e);
                Err(e)
            }
        }
    }

    /// Seed the balance from the login response.
    pub fn seed_balance(&self, amount: Amount) {
        let mut st = lock(&self.state);
        st.balance = Some(BalanceSnapshot {
            amount,
            fetched_at: Utc::now(),
        });
        st.balance_status = StreamStatus::Ready;
    }

    /// Forget session data. The fee estimate is not per-session and stays.
    pub fn clear(&self) {
        let mut st = lock(&self.state);
        let fee = st.fee;
        *st = SyncState {
            fee,
            ..Default::default()
        };
    }

    /// Balance for validation; zero when nothing has been fetched.
    pub fn balance(&self) -> Amount {
        lock(&self.state)
            .balance
            .map(|b| b.amount)
            .unwrap_or(Amount::ZERO)
    }

    pub fn fee(&self) -> Amount {
        lock(&self.state).fee.fee_per_tx
    }

    pub fn history(&self) -> Vec<TransactionRecord> {
        lock(&self.state).history.clone()
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        let st = lock(&self.state);
        SyncSnapshot {
            balance: st.balance,
            balance_status: st.balance_status.clone(),
            history: st.history.clone(),
            history_status: st.history_status.clone(),
            fee: st.fee,
            last_refresh: st.last_refresh,
            refreshing: self.is_refreshing(),
        }
    }
}
