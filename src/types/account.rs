//! Account-related types for the ledger
//!
//! This module defines the Account structure, the payload used to open one,
//! and the Beneficiary records customers register against existing accounts.

use super::ids::{AccountId, BeneficiaryId, BranchId, CustomerId};
use rust_decimal::Decimal;
use serde::Serialize;

/// Customer account state
///
/// Balance is only ever mutated by the account balance manager, inside a
/// transactional scope that holds the account's row lock.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    /// Store-assigned account id
    pub id: AccountId,

    /// The customer that owns this account
    pub customer_id: CustomerId,

    /// Branch the account was opened at
    pub branch_id: BranchId,

    /// Display name of the account owner
    pub owner: String,

    /// ISO 4217 currency code, uppercase
    pub currency: String,

    /// Current balance
    ///
    /// Never negative in any committed state.
    pub balance: Decimal,
}

/// Payload for opening an account
///
/// The store assigns the id; the balance always starts at zero.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAccount {
    pub customer_id: CustomerId,
    pub branch_id: BranchId,
    pub owner: String,
    pub currency: String,
}

impl NewAccount {
    /// Materialize the account row once the store has assigned an id
    pub fn into_account(self, id: AccountId) -> Account {
        Account {
            id,
            customer_id: self.customer_id,
            branch_id: self.branch_id,
            owner: self.owner,
            currency: self.currency,
            balance: Decimal::ZERO,
        }
    }
}

/// A payee account registered by a customer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Beneficiary {
    pub id: BeneficiaryId,
    /// Customer who registered the beneficiary
    pub owner_customer_id: CustomerId,
    /// Account funds would be sent to
    pub account_id: AccountId,
    pub nickname: String,
}

/// Payload for registering a beneficiary
#[derive(Debug, Clone, PartialEq)]
pub struct NewBeneficiary {
    pub owner_customer_id: CustomerId,
    pub account_id: AccountId,
    pub nickname: String,
}

impl NewBeneficiary {
    pub fn into_beneficiary(self, id: BeneficiaryId) -> Beneficiary {
        Beneficiary {
            id,
            owner_customer_id: self.owner_customer_id,
            account_id: self.account_id,
            nickname: self.nickname,
        }
    }
}
