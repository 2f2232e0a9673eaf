//! Transaction-related types for the ledger
//!
//! A Transaction is the immutable record of one money movement. Transfers set
//! both legs; external deposits leave the source unset.

use super::ids::{AccountId, TransactionId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Kind of movement a recorded transaction represents
///
/// Derived from which legs are present rather than stored separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Funds entering the ledger from outside (no source account)
    Deposit,
    /// Funds moving between two ledger accounts
    Transfer,
}

/// Recorded money movement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub id: TransactionId,

    /// Debited account, absent for external deposits
    pub from_account_id: Option<AccountId>,

    /// Credited account
    pub to_account_id: Option<AccountId>,

    /// Amount moved, always positive
    pub amount: Decimal,

    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Classify the transaction by its legs
    pub fn kind(&self) -> TransactionKind {
        match self.from_account_id {
            Some(_) => TransactionKind::Transfer,
            None => TransactionKind::Deposit,
        }
    }

    /// Whether the account appears on either leg
    pub fn involves(&self, account_id: AccountId) -> bool {
        self.from_account_id == Some(account_id) || self.to_account_id == Some(account_id)
    }
}

/// Payload for recording a transaction
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub from_account_id: Option<AccountId>,
    pub to_account_id: Option<AccountId>,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl NewTransaction {
    /// A transfer between two ledger accounts
    pub fn transfer(
        from: AccountId,
        to: AccountId,
        amount: Decimal,
        created_at: DateTime<Utc>,
    ) -> Self {
        NewTransaction {
            from_account_id: Some(from),
            to_account_id: Some(to),
            amount,
            created_at,
        }
    }

    /// An external deposit into a ledger account
    pub fn deposit(to: AccountId, amount: Decimal, created_at: DateTime<Utc>) -> Self {
        NewTransaction {
            from_account_id: None,
            to_account_id: Some(to),
            amount,
            created_at,
        }
    }

    pub fn into_transaction(self, id: TransactionId) -> Transaction {
        Transaction {
            id,
            from_account_id: self.from_account_id,
            to_account_id: self.to_account_id,
            amount: self.amount,
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_deposit_has_no_source_leg() {
        let tx = NewTransaction::deposit(3, dec!(10), Utc::now()).into_transaction(1);

        assert_eq!(tx.kind(), TransactionKind::Deposit);
        assert_eq!(tx.from_account_id, None);
        assert!(tx.involves(3));
        assert!(!tx.involves(4));
    }

    #[test]
    fn test_transfer_involves_both_legs() {
        let tx = NewTransaction::transfer(1, 2, dec!(5), Utc::now()).into_transaction(9);

        assert_eq!(tx.kind(), TransactionKind::Transfer);
        assert!(tx.involves(1));
        assert!(tx.involves(2));
    }
}
