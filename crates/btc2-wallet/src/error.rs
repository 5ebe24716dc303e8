//! Wallet error types.

use btc2_types::{Amount, TICKER};
use thiserror::Error;

/// Failure reported by the remote wallet service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The backend answered and refused; carries its message when it gave one.
    #[error("rejected by backend: {}", .0.as_deref().unwrap_or("no reason given"))]
    Rejected(Option<String>),

    /// Network or decoding failure. The detail is for logs only.
    #[error("transport failure: {0}")]
    Transport(String),
}

impl ServiceError {
    /// Backend message if present, otherwise `fallback`.
    pub fn message_or(&self, fallback: &str) -> String {
        match self {
            Self::Rejected(Some(msg)) => msg.clone(),
            _ => fallback.to_string(),
        }
    }
}

impl From<btc2_rpc::RpcError> for ServiceError {
    fn from(e: btc2_rpc::RpcError) -> Self {
        match e {
            btc2_rpc::RpcError::Rejected { message, .. } => Self::Rejected(message),
            other => Self::Transport(other.to_string()),
        }
    }
}

/// Client-side send validation, checked in this order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing fields: enter both a recipient address and an amount")]
    MissingFields,

    #[error("invalid amount: enter a positive number with at most 8 decimal places")]
    InvalidAmount,

    #[error(
        "insufficient funds: you need {} {} ({} + {} fee) but have {} {}",
        .total.to_fixed(), TICKER, .amount.to_fixed(), .fee.to_fixed(), .balance.to_fixed(), TICKER
    )]
    InsufficientFunds {
        total: Amount,
        amount: Amount,
        fee: Amount,
        balance: Amount,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("login failed: {0}")]
    Auth(String),

    #[error("wallet creation failed: {0}")]
    Creation(String),

    #[error("transaction failed: {0}")]
    Submission(String),

    #[error("not logged in")]
    NotLoggedIn,

    #[error("already logged in; log out first")]
    AlreadyLoggedIn,

    #[error("{0} already in progress")]
    Busy(&'static str),

    #[error("QR code error: {0}")]
    Qr(String),
}

impl WalletError {
    /// Text for the user-visible error slot.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(v) => v.to_string(),
            Self::Auth(m) | Self::Creation(m) | Self::Submission(m) => m.clone(),
            other => other.to_string(),
        }
    }
}
