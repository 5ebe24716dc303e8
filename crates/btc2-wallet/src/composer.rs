//! Outgoing payment validation and submission.

use crate::error::{ServiceError, ValidationError, WalletError};
use crate::guard::{lock, InFlight};
use crate::service::RemoteWalletService;
use btc2_types::{Amount, TICKER};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Send form contents exactly as entered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendForm {
    pub recipient: String,
    pub amount: String,
}

/// A send that passed local validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    pub recipient: String,
    pub amount: Amount,
}

/// Returned after the backend accepted a send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub txid: String,
    pub recipient: String,
    pub amount: Amount,
    /// Fee estimate in effect when the send was validated.
    pub estimated_fee: Amount,
}

/// Check a form against the current fee and balance. First failure wins:
/// missing fields, then amount syntax, then funds.
///
/// This is advisory; the backend makes the final call.
pub fn validate(form: &SendForm, fee: Amount, balance: Amount) -> Result<SendRequest, ValidationError> {
    let recipient = form.recipient.trim();
    let amount_text = form.amount.trim();
    if recipient.is_empty() || amount_text.is_empty() {
        return Err(ValidationError::MissingFields);
    }

    let amount = match Amount::parse(amount_text) {
        Ok(a) if !a.is_zero() => a,
        _ => return Err(ValidationError::InvalidAmount),
    };

    let total = amount
        .checked_add(fee)
        .ok_or(ValidationError::InvalidAmount)?;
    if total > balance {
        return Err(ValidationError::InsufficientFunds {
            total,
            amount,
            fee,
            balance,
        });
    }

    Ok(SendRequest {
        recipient: recipient.to_string(),
        amount,
    })
}

/// Owns the send form and submits it.
#[derive(Default)]
pub struct TransactionComposer {
    form: Mutex<SendForm>,
    submitting: AtomicBool,
}

impl TransactionComposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn form(&self) -> SendForm {
        lock(&self.form).clone()
    }

    pub fn set_recipient(&self, recipient: impl Into<String>) {
        lock(&self.form).recipient = recipient.into();
    }

    pub fn set_amount(&self, amount: impl Into<String>) {
        lock(&self.form).amount = amount.into();
    }

    pub fn clear(&self) {
        *lock(&self.form) = SendForm::default();
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::Acquire)
    }

    /// Validate the form and submit it.
    ///
    /// On success the form is cleared. On any failure it is left exactly
    /// as entered so the user can correct it. Validation failures never
    /// reach the service.
    pub async fn submit(
        &self,
        service: &dyn RemoteWalletService,
        fee: Amount,
        balance: Amount,
    ) -> Result<SendReceipt, WalletError> {
        let Some(_busy) = InFlight::acquire(&self.submitting) else {
            return Err(WalletError::Busy("a transaction"));
        };

        let request = validate(&self.form(), fee, balance)?;

        log::debug!(
            "submitting {} {} to {} (fee ~{})",
            request.amount.to_fixed(),
            TICKER,
            request.recipient,
            fee.to_fixed()
        );

        match service.send_transaction(&request.recipient, request.amount).await {
            Ok(txid) => {
                self.clear();
                log::info!("transaction {} sent", txid);
                Ok(SendReceipt {
                    txid,
                    recipient: request.recipient,
                    amount: request.amount,
                    estimated_fee: fee,
                })
            }
            Err(e) => {
                log::warn!("transaction submission failed: {}", e);
                Err(WalletError::Submission(submission_message(&e, fee)))
            }
        }
    }
}

fn submission_message(e: &ServiceError, fee: Amount) -> String {
    match e {
        ServiceError::Rejected(Some(msg)) => msg.clone(),
        ServiceError::Rejected(None) => format!(
            "Transaction failed. Please ensure you have enough funds to cover the amount plus transaction fees ({} {}).",
            fee.to_fixed(),
            TICKER
        ),
        ServiceError::Transport(_) => "Failed to send transaction. Please try again.".to_string(),
    }
}
