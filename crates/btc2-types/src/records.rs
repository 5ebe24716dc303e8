//! Records exchanged with the wallet backend.

use crate::amount::{Amount, SignedAmount};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Direction of a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TxCategory {
    Receive,
    Send,
}

impl TxCategory {
    pub fn label(self) -> &'static str {
        match self {
            Self::Receive => "Received",
            Self::Send => "Sent",
        }
    }
}

impl<'de> Deserialize<'de> for TxCategory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        // Coinbase payouts arrive as generate/immature and credit the wallet.
        Ok(match raw.as_str() {
            "receive" | "generate" | "immature" => Self::Receive,
            _ => Self::Send,
        })
    }
}

/// One entry of the address history, in backend order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub txid: String,
    pub category: TxCategory,
    pub amount: SignedAmount,
    #[serde(default, deserialize_with = "clamp_confirmations")]
    pub confirmations: u64,
}

fn clamp_confirmations<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let raw = i64::deserialize(deserializer)?;
    Ok(raw.max(0) as u64)
}

/// Key material returned once by wallet creation.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletCreation {
    /// Encrypted private key; doubles as the login credential.
    pub encrypted_key: String,
    /// Private key in WIF, for import into other wallet software.
    pub private_key: String,
    pub address: String,
}

impl fmt::Debug for WalletCreation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletCreation")
            .field("encrypted_key", &"<redacted>")
            .field("private_key", &"<redacted>")
            .field("address", &self.address)
            .finish()
    }
}

/// Fee used until the backend's first estimate arrives.
pub const DEFAULT_FEE: Amount = Amount::from_atomic(10_000);

/// Confirmation target, in blocks, for fee estimates.
pub const FEE_TARGET_BLOCKS: u32 = 6;

/// Currency ticker used in user-facing text.
pub const TICKER: &str = "BTC2";
