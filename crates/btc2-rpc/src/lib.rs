//! BTC2 web wallet RPC client library.
//!
//! Provides an async HTTP client for the wallet backend's JSON endpoints
//! (`{success, error?, ...}` envelopes) and a typed `WalletApi` on top.
//!
//! # Example
//!
//! ```ignore
//! use btc2_rpc::WalletApi;
//!
//! #[tokio::main]
//! async fn main() {
//!     let api = WalletApi::new("http://localhost:5000").unwrap();
//!     let fee = api.estimate_fee(6).await.unwrap();
//!     println!("Fee: {}", fee.to_fixed());
//! }
//! ```

pub mod error;
pub mod client;
pub mod wallet_api;

pub use client::{RpcClient, RpcConfig};
pub use wallet_api::{LoginResult, WalletApi};
pub use error::RpcError;

/// Default port of the wallet backend.
pub const DEFAULT_PORT: u16 = 5000;

/// Backend endpoint paths.
pub mod endpoints {
    pub const ESTIMATE_FEE: &str = "/api/estimatefee";
    pub const BALANCE: &str = "/api/balance";
    pub const HISTORY: &str = "/api/history";
    pub const CREATE_WALLET: &str = "/api/create_wallet";
    pub const LOGIN: &str = "/api/login";
    pub const LOGOUT: &str = "/api/logout";
    pub const TRANSACTION: &str = "/api/transaction";
}
