//! Core types for the BTC2 web wallet.
//!
//! Atomic-unit amounts with eight-decimal display, and the records the
//! wallet backend returns (history entries, wallet creation results).

pub mod amount;
pub mod records;

pub use amount::{Amount, AmountError, SignedAmount, COIN};
pub use records::{TransactionRecord, TxCategory, WalletCreation, DEFAULT_FEE, FEE_TARGET_BLOCKS, TICKER};
