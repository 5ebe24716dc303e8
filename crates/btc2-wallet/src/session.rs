//! Login state and wallet-creation staging.
//!
//! ```text
//! LoggedOut(Form) ──open_wallet_creation──▶ LoggedOut(NewWallet(None))
//!        ▲                                         │ create_wallet
//!        │ back_to_login                           ▼
//!        └──────────────────────────── LoggedOut(NewWallet(Some(..)))
//! LoggedOut(_) ──login──▶ LoggedIn(Session) ──logout──▶ LoggedOut(Form)
//! ```
//!
//! Wallet creation is only reachable while logged out.

use crate::error::WalletError;
use crate::guard::lock;
use crate::service::RemoteWalletService;
use btc2_rpc::LoginResult;
use btc2_types::WalletCreation;
use chrono::{DateTime, Utc};
use std::sync::Mutex;

/// The authenticated context of one login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    address: String,
    started_at: DateTime<Utc>,
}

impl Session {
    fn new(address: String) -> Self {
        Self {
            address,
            started_at: Utc::now(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

/// What the logged-out user is looking at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginScreen {
    Form,
    /// Wallet creation page; holds the result until the user goes back.
    NewWallet(Option<WalletCreation>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    LoggedOut(LoginScreen),
    LoggedIn(Session),
}

struct Inner {
    phase: SessionPhase,
    /// Bumped on every login and logout.
    generation: u64,
}

pub struct SessionState {
    inner: Mutex<Inner>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                phase: SessionPhase::LoggedOut(LoginScreen::Form),
                generation: 0,
            }),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        lock(&self.inner).phase.clone()
    }

    pub fn is_logged_in(&self) -> bool {
        matches!(lock(&self.inner).phase, SessionPhase::LoggedIn(_))
    }

    pub fn address(&self) -> Option<String> {
        match &lock(&self.inner).phase {
            SessionPhase::LoggedIn(s) => Some(s.address.clone()),
            SessionPhase::LoggedOut(_) => None,
        }
    }

    pub fn generation(&self) -> u64 {
        lock(&self.inner).generation
    }

    /// Whether the session that was live at `generation` is still live.
    pub fn is_current(&self, generation: u64) -> bool {
        let inner = lock(&self.inner);
        inner.generation == generation && matches!(inner.phase, SessionPhase::LoggedIn(_))
    }

    /// Authenticate with the backend. State is untouched on failure.
    pub async fn login(
        &self,
        service: &dyn RemoteWalletService,
        encrypted_key: &str,
    ) -> Result<LoginResult, WalletError> {
        if self.is_logged_in() {
            return Err(WalletError::AlreadyLoggedIn);
        }

        let result = service.login(encrypted_key).await.map_err(|e| {
            log::warn!("login failed: {}", e);
            WalletError::Auth(e.message_or("Login request failed"))
        })?;

        let mut inner = lock(&self.inner);
        inner.generation += 1;
        inner.phase = SessionPhase::LoggedIn(Session::new(result.address.clone()));
        log::info!("logged in as {}", result.address);
        Ok(result)
    }

    /// Switch the login page to the wallet-creation page.
    pub fn open_wallet_creation(&self) -> Result<(), WalletError> {
        let mut inner = lock(&self.inner);
        match &inner.phase {
            SessionPhase::LoggedIn(_) => return Err(WalletError::AlreadyLoggedIn),
            SessionPhase::LoggedOut(LoginScreen::NewWallet(_)) => return Ok(()),
            SessionPhase::LoggedOut(LoginScreen::Form) => {}
        }
        inner.phase = SessionPhase::LoggedOut(LoginScreen::NewWallet(None));
        Ok(())
    }

    /// Request brand-new key material. Any result still on screen is
    /// discarded first; nothing is merged or kept for retry.
    pub async fn create_wallet(
        &self,
        service: &dyn RemoteWalletService,
    ) -> Result<WalletCreation, WalletError> {
        {
            let mut inner = lock(&self.inner);
            if let SessionPhase::LoggedIn(_) = inner.phase {
                return Err(WalletError::AlreadyLoggedIn);
            }
            inner.phase = SessionPhase::LoggedOut(LoginScreen::NewWallet(None));
        }

        let created = service.create_wallet().await.map_err(|e| {
            log::warn!("wallet creation failed: {}", e);
            WalletError::Creation(e.message_or("Failed to create wallet"))
        })?;

        let mut inner = lock(&self.inner);
        if matches!(inner.phase, SessionPhase::LoggedOut(LoginScreen::NewWallet(_))) {
            inner.phase = SessionPhase::LoggedOut(LoginScreen::NewWallet(Some(created.clone())));
        } else {
            // User navigated away while the request was out; the keys still
            // go back to the caller since they cannot be re-derived.
            log::debug!("wallet created after leaving the creation page");
        }
        log::info!("new wallet created for {}", created.address);
        Ok(created)
    }

    /// Return to the login form, dropping any displayed creation result.
    pub fn back_to_login(&self) -> Result<(), WalletError> {
        let mut inner = lock(&self.inner);
        if let SessionPhase::LoggedIn(_) = inner.phase {
            return Err(WalletError::AlreadyLoggedIn);
        }
        inner.phase = SessionPhase::LoggedOut(LoginScreen::Form);
        Ok(())
    }

    /// End the session. Never fails.
    pub fn logout(&self) {
        let mut inner = lock(&self.inner);
        if let SessionPhase::LoggedIn(s) = &inner.phase {
            log::info!("logged out of {}", s.address);
        }
        inner.generation += 1;
        inner.phase = SessionPhase::LoggedOut(LoginScreen::Form);
    }
}
