//! The credit balance of users.

use std::sync::Mutex;

use fnv::{FnvHashMap, FnvHashSet};

#[derive(thiserror::Error, Debug)]
pub enum LedgerError {
    #[error("ledger unavailable")]
    Unavailable,
}

/// Storage of user credit balances.
#[async_trait::async_trait]
pub trait CreditLedger: Send + Sync {
    /// The user's balance. Unknown users are created with the initial balance.
    async fn balance(&self, user_id: &str) -> Result<u64, LedgerError>;

    /// Add credits for a payment, identified by its transaction reference.
    ///
    /// Granting for an already granted transaction changes nothing.
    /// Returns the new balance.
    async fn grant(&self, user_id: &str, credits: u64, txn_ref: &str) -> Result<u64, LedgerError>;
}

/// A ledger kept in process memory
pub struct InMemoryCreditLedger {
    initial_credits: u64,
    state: Mutex<LedgerState>,
}

#[derive(Default)]
struct LedgerState {
    balances: FnvHashMap<String, u64>,
    granted_txns: FnvHashSet<String>,
}

impl InMemoryCreditLedger {
    pub fn new(initial_credits: u64) -> Self {
        Self {
            initial_credits,
            state: Mutex::new(LedgerState::default()),
        }
    }
}

#[async_trait::async_trait]
impl CreditLedger for InMemoryCreditLedger {
    async fn balance(&self, user_id: &str) -> Result<u64, LedgerError> {
        let mut state = self.state.lock().map_err(|_| LedgerError::Unavailable)?;

        Ok(*state
            .balances
            .entry(user_id.to_string())
            .or_insert(self.initial_credits))
    }

    async fn grant(&self, user_id: &str, credits: u64, txn_ref: &str) -> Result<u64, LedgerError> {
        let mut state = self.state.lock().map_err(|_| LedgerError::Unavailable)?;
        let is_new_txn = state.granted_txns.insert(txn_ref.to_string());

        let balance = state
            .balances
            .entry(user_id.to_string())
            .or_insert(self.initial_credits);
        if is_new_txn {
            *balance = balance.saturating_add(credits);
        }

        Ok(*balance)
    }
}
