//! BTC2 wallet session controller.
//!
//! Drives a thin wallet client against a remote wallet service: login and
//! wallet creation, balance/history synchronization, fee-aware sends, and
//! QR address capture. All key handling and signing happen on the service
//! side; this crate only holds session state and talks to it.

pub mod error;
pub mod service;
pub mod session;
pub mod sync;
pub mod composer;
pub mod qr;
pub mod controller;
mod guard;

pub use error::{ServiceError, ValidationError, WalletError};
pub use service::RemoteWalletService;
pub use session::{LoginScreen, Session, SessionPhase, SessionState};
pub use sync::{FeeEstimate, RefreshOutcome, RefreshReport, StreamStatus, SyncEngine, SyncSnapshot};
pub use composer::{validate, SendForm, SendReceipt, SendRequest, TransactionComposer};
pub use qr::{CaptureGuard, CaptureSource, QrRenderOptions, QrScanner, ScanError};
pub use controller::{Screen, WalletConfig, WalletController, WalletView};
