//! Remote wallet service boundary.
//!
//! Key generation, signing, and chain access all live behind this trait.
//! `WalletApi` is the HTTP implementation; tests substitute scripted ones.

use crate::error::ServiceError;
use async_trait::async_trait;
use btc2_rpc::{LoginResult, WalletApi};
use btc2_types::{Amount, TransactionRecord, WalletCreation};

#[async_trait]
pub trait RemoteWalletService: Send + Sync {
    async fn estimate_fee(&self, target_blocks: u32) -> Result<Amount, ServiceError>;

    async fn get_balance(&self) -> Result<Amount, ServiceError>;

    async fn get_history(&self) -> Result<Vec<TransactionRecord>, ServiceError>;

    async fn create_wallet(&self) -> Result<WalletCreation, ServiceError>;

    async fn login(&self, encrypted_key: &str) -> Result<LoginResult, ServiceError>;

    async fn logout(&self) -> Result<(), ServiceError>;

    async fn send_transaction(&self, address: &str, amount: Amount) -> Result<String, ServiceError>;
}

#[async_trait]
impl RemoteWalletService for WalletApi {
    async fn estimate_fee(&self, target_blocks: u32) -> Result<Amount, ServiceError> {
        Ok(WalletApi::estimate_fee(self, target_blocks).await?)
    }

    async fn get_balance(&self) -> Result<Amount, ServiceError> {
        Ok(WalletApi::get_balance(self).await?)
    }

    async fn get_history(&self) -> Result<Vec<TransactionRecord>, ServiceError> {
        Ok(WalletApi::get_history(self).await?)
    }

    async fn create_wallet(&self) -> Result<WalletCreation, ServiceError> {
        Ok(WalletApi::create_wallet(self).await?)
    }

    async fn login(&self, encrypted_key: &str) -> Result<LoginResult, ServiceError> {
        Ok(WalletApi::login(self, encrypted_key).await?)
    }

    async fn logout(&self) -> Result<(), ServiceError> {
        Ok(WalletApi::logout(self).await?)
    }

    async fn send_transaction(&self, address: &str, amount: Amount) -> Result<String, ServiceError> {
        Ok(WalletApi::send_transaction(self, address, amount).await?)
    }
}
