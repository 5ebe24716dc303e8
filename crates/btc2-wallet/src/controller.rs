//! Wallet controller.
//!
//! Ties the session, sync engine, send composer, and QR scanner together
//! behind the operations a presentation layer calls. Each operation starts
//! by clearing the shared error slot and writes at most one message back
//! into it.

use crate::composer::{SendForm, SendReceipt, TransactionComposer};
use crate::error::WalletError;
use crate::guard::{lock, InFlight};
use crate::qr::{self, QrRenderOptions, QrScanner};
use crate::service::RemoteWalletService;
use crate::session::{LoginScreen, SessionPhase, SessionState};
use crate::sync::{RefreshOutcome, StreamStatus, SyncEngine};
use btc2_types::{Amount, TransactionRecord, WalletCreation, FEE_TARGET_BLOCKS};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

/// Controller settings.
#[derive(Debug, Clone)]
pub struct WalletConfig {
    /// Confirmation target passed to the fee estimate.
    pub fee_target_blocks: u32,
    /// Period of the background refresh.
    pub refresh_interval: Duration,
    pub qr: QrRenderOptions,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            fee_target_blocks: FEE_TARGET_BLOCKS,
            refresh_interval: Duration::from_secs(30),
            qr: QrRenderOptions::default(),
        }
    }
}

/// Which page the presentation layer should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Login,
    NewWallet(Option<WalletCreation>),
    Wallet,
}

/// Everything a presentation layer renders, copied out in one go.
#[derive(Debug, Clone)]
pub struct WalletView {
    pub screen: Screen,
    pub address: Option<String>,
    pub session_started: Option<DateTime<Utc>>,
    pub balance: Amount,
    pub balance_status: StreamStatus,
    pub history: Vec<TransactionRecord>,
    pub history_status: StreamStatus,
    pub fee: Amount,
    pub last_refresh: Option<DateTime<Utc>>,
    pub refreshing: bool,
    pub logging_in: bool,
    pub submitting: bool,
    pub scanning: bool,
    pub send_form: SendForm,
    pub error: Option<String>,
}

pub struct WalletController<S> {
    service: S,
    config: WalletConfig,
    session: SessionState,
    sync: SyncEngine,
    composer: TransactionComposer,
    scanner: tokio::sync::Mutex<Option<QrScanner>>,
    scan_cancel: Notify,
    scanning: AtomicBool,
    logging_in: AtomicBool,
    creating: AtomicBool,
    error: Mutex<Option<String>>,
}

impl<S: RemoteWalletService> WalletController<S> {
    pub fn new(service: S, config: WalletConfig) -> Self {
        Self {
            service,
            config,
            session: SessionState::new(),
            sync: SyncEngine::new(),
            composer: TransactionComposer::new(),
            scanner: tokio::sync::Mutex::new(None),
            scan_cancel: Notify::new(),
            scanning: AtomicBool::new(false),
            logging_in: AtomicBool::new(false),
            creating: AtomicBool::new(false),
            error: Mutex::new(None),
        }
    }

    /// Attach a QR scanner for `scan_address`.
    pub fn with_scanner(self, scanner: QrScanner) -> Self {
        Self {
            scanner: tokio::sync::Mutex::new(Some(scanner)),
            ..self
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    // ── Error slot ───────────────────────────────────────────────────────

    pub fn error(&self) -> Option<String> {
        lock(&self.error).clone()
    }

    pub fn clear_error(&self) {
        *lock(&self.error) = None;
    }

    fn set_error(&self, message: String) {
        *lock(&self.error) = Some(message);
    }

    /// Record a failure in the error slot and hand it back.
    fn fail<T>(&self, err: WalletError) -> Result<T, WalletError> {
        self.set_error(err.user_message());
        Err(err)
    }

    // ── Session ──────────────────────────────────────────────────────────

    /// Log in with an encrypted key, then fetch wallet data and the fee.
    ///
    /// The session is established before any follow-up request is issued.
    /// On failure nothing is refreshed.
    pub async fn login(&self, encrypted_key: &str) -> Result<String, WalletError> {
        self.clear_error();
        let Some(busy) = InFlight::acquire(&self.logging_in) else {
            return self.fail(WalletError::Busy("login"));
        };

        let result = match self.session.login(&self.service, encrypted_key).await {
            Ok(r) => r,
            Err(e) => return self.fail(e),
        };
        self.sync.seed_balance(result.balance);
        drop(busy);

        let generation = self.session.generation();
        // A refresh left over from the previous session may still hold the
        // slot; wait it out rather than skip.
        let (outcome, _) = tokio::join!(
            self.sync
                .refresh_when_idle(&self.service, || self.session.is_current(generation)),
            self.sync
                .refresh_fee_estimate(&self.service, self.config.fee_target_blocks),
        );
        self.report_refresh(&outcome);

        Ok(result.address)
    }

    /// Show the wallet-creation page.
    pub fn open_wallet_creation(&self) -> Result<(), WalletError> {
        self.clear_error();
        self.session.open_wallet_creation().or_else(|e| self.fail(e))
    }

    /// Generate a new wallet. Does not log in; the result is shown once.
    pub async fn create_wallet(&self) -> Result<WalletCreation, WalletError> {
        self.clear_error();
        let Some(_busy) = InFlight::acquire(&self.creating) else {
            return self.fail(WalletError::Busy("wallet creation"));
        };
        match self.session.create_wallet(&self.service).await {
            Ok(created) => Ok(created),
            Err(e) => self.fail(e),
        }
    }

    /// Leave the wallet-creation page, discarding its result.
    pub fn back_to_login(&self) -> Result<(), WalletError> {
        self.clear_error();
        self.session.back_to_login().or_else(|e| self.fail(e))
    }

    /// Drop all session data. Never fails; the backend is told on a
    /// best-effort basis.
    pub async fn logout(&self) {
        let was_logged_in = self.session.is_logged_in();
        self.session.logout();
        self.sync.clear();
        self.composer.clear();
        self.cancel_scan();
        self.clear_error();

        if was_logged_in {
            if let Err(e) = self.service.logout().await {
                log::debug!("backend logout failed (ignored): {}", e);
            }
        }
    }

    // ── Sync ─────────────────────────────────────────────────────────────

    /// Manual refresh. Ignored while another refresh is in flight.
    pub async fn refresh(&self) -> Result<RefreshOutcome, WalletError> {
        self.clear_error();
        if !self.session.is_logged_in() {
            return self.fail(WalletError::NotLoggedIn);
        }
        Ok(self.run_refresh().await)
    }

    async fn run_refresh(&self) -> RefreshOutcome {
        let generation = self.session.generation();
        let outcome = self
            .sync
            .refresh(&self.service, || self.session.is_current(generation))
            .await;
        self.report_refresh(&outcome);
        outcome
    }

    fn report_refresh(&self, outcome: &RefreshOutcome) {
        if let RefreshOutcome::Completed(report) = outcome {
            if let Some(e) = report.first_error() {
                self.set_error(e.message_or("Error fetching wallet data"));
            }
        }
    }

    /// Refresh balance/history (and the fee estimate) every configured
    /// interval while logged in. Runs until the future is dropped.
    pub async fn run_auto_refresh(&self) {
        let mut ticker = tokio::time::interval(self.config.refresh_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; login already refreshed.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if !self.session.is_logged_in() {
                continue;
            }
            log::debug!("auto refresh");
            let generation = self.session.generation();
            let (outcome, _) = tokio::join!(
                self.sync
                    .refresh(&self.service, || self.session.is_current(generation)),
                self.sync
                    .refresh_fee_estimate(&self.service, self.config.fee_target_blocks),
            );
            self.report_refresh(&outcome);
        }
    }

    // ── Send ─────────────────────────────────────────────────────────────

    pub fn set_recipient(&self, recipient: impl Into<String>) {
        self.composer.set_recipient(recipient);
    }

    pub fn set_amount(&self, amount: impl Into<String>) {
        self.composer.set_amount(amount);
    }

    pub fn send_form(&self) -> SendForm {
        self.composer.form()
    }

    /// Validate and submit the send form against the current fee and
    /// balance. After the backend accepts, wallet data is refreshed
    /// before returning.
    pub async fn send(&self) -> Result<SendReceipt, WalletError> {
        self.clear_error();
        let generation = self.session.generation();
        if !self.session.is_current(generation) {
            return self.fail(WalletError::NotLoggedIn);
        }

        let fee = self.sync.fee();
        let balance = self.sync.balance();
        let result = self.composer.submit(&self.service, fee, balance).await;

        if !self.session.is_current(generation) {
            log::debug!("session ended while the transaction was out");
            return result;
        }

        let receipt = match result {
            Ok(r) => r,
            Err(e) => return self.fail(e),
        };

        self.run_refresh().await;
        Ok(receipt)
    }

    // ── QR ───────────────────────────────────────────────────────────────

    /// Fill the recipient from the next scanned QR code.
    ///
    /// Returns the decoded address, or `None` if the scan was cancelled or
    /// the camera stopped producing frames; in both cases the recipient is
    /// left as it was.
    pub async fn scan_address(&self) -> Result<Option<String>, WalletError> {
        self.clear_error();
        if !self.session.is_logged_in() {
            return self.fail(WalletError::NotLoggedIn);
        }

        let Ok(mut slot) = self.scanner.try_lock() else {
            return self.fail(WalletError::Busy("a QR scan"));
        };
        let Some(scanner) = slot.as_mut() else {
            return self.fail(WalletError::Qr("no camera available".to_string()));
        };

        // Register for cancellation before the scan is visible as active.
        let cancelled = self.scan_cancel.notified();
        tokio::pin!(cancelled);
        cancelled.as_mut().enable();
        let Some(_scanning) = InFlight::acquire(&self.scanning) else {
            return self.fail(WalletError::Busy("a QR scan"));
        };

        let mut decoded = None;
        let result = tokio::select! {
            res = scanner.start_scan(|text| {
                self.composer.set_recipient(text.clone());
                decoded = Some(text);
            }) => res,
            _ = &mut cancelled => {
                log::debug!("QR scan cancelled");
                return Ok(None);
            }
        };

        match result {
            Ok(_) => Ok(decoded),
            Err(e) => self.fail(WalletError::Qr(e.to_string())),
        }
    }

    /// Stop an active scan. No-op when none is running.
    pub fn cancel_scan(&self) {
        if self.scanning.load(Ordering::Acquire) {
            self.scan_cancel.notify_waiters();
        }
    }

    /// SVG QR code of the session address.
    pub fn address_qr_svg(&self) -> Result<String, WalletError> {
        let address = self.session.address().ok_or(WalletError::NotLoggedIn)?;
        qr::render_svg(&address, &self.config.qr).map_err(|e| WalletError::Qr(e.to_string()))
    }

    /// Terminal QR code of the session address.
    pub fn address_qr_terminal(&self) -> Result<String, WalletError> {
        let address = self.session.address().ok_or(WalletError::NotLoggedIn)?;
        qr::render_terminal(&address, self.config.qr.ec_level)
            .map_err(|e| WalletError::Qr(e.to_string()))
    }

    // ── Reads ────────────────────────────────────────────────────────────

    pub fn is_logged_in(&self) -> bool {
        self.session.is_logged_in()
    }

    pub fn address(&self) -> Option<String> {
        self.session.address()
    }

    pub fn balance(&self) -> Amount {
        self.sync.balance()
    }

    pub fn fee(&self) -> Amount {
        self.sync.fee()
    }

    pub fn history(&self) -> Vec<TransactionRecord> {
        self.sync.history()
    }

    pub fn view(&self) -> WalletView {
        let snap = self.sync.snapshot();
        let (screen, session) = match self.session.phase() {
            SessionPhase::LoggedIn(s) => (Screen::Wallet, Some(s)),
            SessionPhase::LoggedOut(LoginScreen::Form) => (Screen::Login, None),
            SessionPhase::LoggedOut(LoginScreen::NewWallet(created)) => {
                (Screen::NewWallet(created), None)
            }
        };

        WalletView {
            screen,
            address: session.as_ref().map(|s| s.address().to_string()),
            session_started: session.as_ref().map(|s| s.started_at()),
            balance: snap.balance.map(|b| b.amount).unwrap_or(Amount::ZERO),
            balance_status: snap.balance_status,
            history: snap.history,
            history_status: snap.history_status,
            fee: snap.fee.fee_per_tx,
            last_refresh: snap.last_refresh,
            refreshing: snap.refreshing,
            logging_in: self.logging_in.load(Ordering::Acquire),
            submitting: self.composer.is_submitting(),
            scanning: self.scanning.load(Ordering::Acquire),
            send_form: self.composer.form(),
            error: self.error(),
        }
    }
}
