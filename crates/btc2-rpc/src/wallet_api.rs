//! Wallet backend client.
//!
//! Typed async methods for the web wallet endpoints: fee estimate, balance,
//! history, wallet creation, login/logout, and transaction submission.

use crate::client::{RpcClient, RpcConfig};
use crate::endpoints;
use crate::error::RpcError;
use btc2_types::{Amount, TransactionRecord, WalletCreation};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};

// =============================================================================
// Response Types
// =============================================================================

/// Result of `login`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResult {
    pub address: String,
    pub balance: Amount,
}

#[derive(Debug, Deserialize)]
struct FeeResult {
    fee: Amount,
}

#[derive(Debug, Deserialize)]
struct BalanceResult {
    balance: Amount,
}

#[derive(Debug, Deserialize)]
struct HistoryResult {
    #[serde(default)]
    history: Vec<TransactionRecord>,
}

#[derive(Debug, Deserialize)]
struct SendResult {
    #[serde(default)]
    txid: Option<String>,
}

// =============================================================================
// Client
// =============================================================================

/// Typed client for the wallet backend.
pub struct WalletApi {
    client: RpcClient,
}

impl WalletApi {
    pub fn new(url: &str) -> Result<Self, RpcError> {
        Ok(Self {
            client: RpcClient::new(url)?,
        })
    }

    pub fn with_config(config: RpcConfig) -> Result<Self, RpcError> {
        Ok(Self {
            client: RpcClient::with_config(config)?,
        })
    }

    // ── Fees & balances ──────────────────────────────────────────────────

    /// Fee per transaction expected to confirm within `target_blocks`.
    pub async fn estimate_fee(&self, target_blocks: u32) -> Result<Amount, RpcError> {
        let payload = self
            .client
            .get(endpoints::ESTIMATE_FEE, &[("blocks", target_blocks.to_string())])
            .await?;
        let res: FeeResult = decode(endpoints::ESTIMATE_FEE, payload)?;
        Ok(res.fee)
    }

    /// Balance of the logged-in address.
    pub async fn get_balance(&self) -> Result<Amount, RpcError> {
        let payload = self.client.get(endpoints::BALANCE, &[]).await?;
        let res: BalanceResult = decode(endpoints::BALANCE, payload)?;
        Ok(res.balance)
    }

    /// Transaction history of the logged-in address, in backend order.
    pub async fn get_history(&self) -> Result<Vec<TransactionRecord>, RpcError> {
        let payload = self.client.get(endpoints::HISTORY, &[]).await?;
        let res: HistoryResult = decode(endpoints::HISTORY, payload)?;
        Ok(res.history)
    }

    // ── Session ──────────────────────────────────────────────────────────

    /// Generate a fresh key pair on the backend. Not idempotent.
    pub async fn create_wallet(&self) -> Result<WalletCreation, RpcError> {
        let payload = self.client.post(endpoints::CREATE_WALLET, None).await?;
        decode(endpoints::CREATE_WALLET, payload)
    }

    /// Open a backend session with the encrypted key.
    pub async fn login(&self, encrypted_key: &str) -> Result<LoginResult, RpcError> {
        let body = json!({ "encrypted_key": encrypted_key });
        let payload = self.client.post(endpoints::LOGIN, Some(&body)).await?;
        decode(endpoints::LOGIN, payload)
    }

    /// Drop the backend session.
    pub async fn logout(&self) -> Result<(), RpcError> {
        self.client.post(endpoints::LOGOUT, None).await?;
        Ok(())
    }

    // ── Transfers ────────────────────────────────────────────────────────

    /// Submit a payment; returns the transaction id.
    pub async fn send_transaction(&self, address: &str, amount: Amount) -> Result<String, RpcError> {
        let body = json!({
            "address": address,
            "amount": amount,
        });
        let payload = self.client.post(endpoints::TRANSACTION, Some(&body)).await?;
        let res: SendResult = decode(endpoints::TRANSACTION, payload)?;
        res.txid
            .filter(|t| !t.is_empty())
            .ok_or_else(|| RpcError::MissingField {
                endpoint: endpoints::TRANSACTION.to_string(),
                field: "txid",
            })
    }
}

fn decode<T: DeserializeOwned>(endpoint: &str, payload: Map<String, Value>) -> Result<T, RpcError> {
    serde_json::from_value(Value::Object(payload)).map_err(|e| RpcError::Json {
        endpoint: endpoint.to_string(),
        source: e,
    })
}
