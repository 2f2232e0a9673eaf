//! Account statements
//!
//! Read-only view over the transaction history of one account.

use std::sync::Arc;

use super::traits::LedgerStore;
use crate::types::{AccountId, LedgerError, Transaction};

/// Reads the most recent transactions of an account
#[derive(Clone)]
pub struct StatementReader {
    store: Arc<dyn LedgerStore>,
    limit: usize,
}

impl StatementReader {
    pub fn new(store: Arc<dyn LedgerStore>, limit: usize) -> Self {
        Self { store, limit }
    }

    /// Transactions where the account is source or destination
    ///
    /// Newest first, ties broken by descending id, at most the configured
    /// limit. An unknown account has an empty statement.
    pub fn get_statements(&self, account_id: AccountId) -> Result<Vec<Transaction>, LedgerError> {
        self.store
            .read(|uow| uow.transactions_for_account(account_id, self.limit))
    }
}
