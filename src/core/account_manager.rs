//! Account balance management module
//!
//! This module provides the `AccountBalanceManager`, the only component that
//! mutates account balances. It is responsible for:
//! - Opening accounts with a zero balance
//! - Transfers between two ledger accounts
//! - External deposits
//! - Recording exactly one `Transaction` per successful movement
//!
//! Every mutation runs inside one Ledger Store scope holding the row locks of
//! the accounts it touches, so the balance check and the debit cannot be
//! separated by a concurrent writer.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info};

use super::clock::Clock;
use super::traits::{LedgerStore, LockKey, UnitOfWork};
use crate::types::{
    Account, AccountId, BranchId, CustomerId, Entity, LedgerError, NewAccount, NewTransaction,
    Transaction,
};

/// Owns balance mutation and transaction recording
#[derive(Clone)]
pub struct AccountBalanceManager {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
}

impl AccountBalanceManager {
    /// Create a new AccountBalanceManager over a shared store and clock
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Open an account with a zero balance
    ///
    /// # Arguments
    ///
    /// * `customer_id` - The customer that will own the account
    /// * `branch_id` - The branch the account is opened at
    /// * `owner` - Display name of the owner (must not be blank)
    /// * `currency` - Three-letter currency code, stored uppercase
    ///
    /// # Returns
    ///
    /// * `Ok(Account)` - The new account with its store-assigned id
    /// * `Err(LedgerError::InvalidInput)` - If owner or currency is malformed
    pub fn open_account(
        &self,
        customer_id: CustomerId,
        branch_id: BranchId,
        owner: &str,
        currency: &str,
    ) -> Result<Account, LedgerError> {
        let owner = owner.trim();
        if owner.is_empty() {
            return Err(LedgerError::invalid_input("owner", "must not be blank"));
        }

        let currency = currency.trim().to_ascii_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(LedgerError::invalid_input(
                "currency",
                "must be a three-letter code",
            ));
        }

        let new_account = NewAccount {
            customer_id,
            branch_id,
            owner: owner.to_string(),
            currency,
        };

        let account = self.store.run(&[], |uow| uow.insert_account(new_account))?;
        info!(account_id = account.id, customer_id, "account opened");
        Ok(account)
    }

    /// Move funds from one account to another
    ///
    /// Debits `from`, credits `to` and records one Transaction carrying both
    /// ids. All three effects commit together or not at all.
    ///
    /// # Errors
    ///
    /// Checked in this order:
    /// - `InvalidAmount` if `amount` is not strictly positive
    /// - `SameAccount` if `from == to`
    /// - `NotFound` if either account does not exist
    /// - `InsufficientFunds` if the source balance is below `amount`
    /// - `ArithmeticOverflow` if the credit would overflow
    pub fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
    ) -> Result<Transaction, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::invalid_amount(amount, "transfer"));
        }
        if from == to {
            return Err(LedgerError::same_account(from));
        }

        let locks = [LockKey::Account(from), LockKey::Account(to)];

        let tx = self.store.run(&locks, |uow| {
            let source = existing_account(uow, from)?;
            existing_account(uow, to)?;

            if source.balance < amount {
                return Err(LedgerError::insufficient_funds(
                    from,
                    source.balance,
                    amount,
                ));
            }

            update_balance(uow, from, |account| {
                account.balance = account
                    .balance
                    .checked_sub(amount)
                    .ok_or_else(|| LedgerError::arithmetic_overflow("transfer debit"))?;
                Ok(())
            })?;
            update_balance(uow, to, |account| {
                account.balance = account
                    .balance
                    .checked_add(amount)
                    .ok_or_else(|| LedgerError::arithmetic_overflow("transfer credit"))?;
                Ok(())
            })?;

            let created_at = self.clock.now();
            uow.insert_transaction(NewTransaction::transfer(from, to, amount, created_at))
        })?;

        debug!(tx_id = tx.id, from, to, %amount, "transfer committed");
        Ok(tx)
    }

    /// Credit an account with external funds
    ///
    /// Records one Transaction with no source account, atomically with the
    /// credit.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if `amount` is not strictly positive
    /// - `NotFound` if the account does not exist
    /// - `ArithmeticOverflow` if the credit would overflow
    pub fn deposit(
        &self,
        account_id: AccountId,
        amount: Decimal,
    ) -> Result<Transaction, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::invalid_amount(amount, "deposit"));
        }

        let tx = self.store.run(&[LockKey::Account(account_id)], |uow| {
            update_balance(uow, account_id, |account| {
                account.balance = account
                    .balance
                    .checked_add(amount)
                    .ok_or_else(|| LedgerError::arithmetic_overflow("deposit"))?;
                Ok(())
            })?;

            let created_at = self.clock.now();
            uow.insert_transaction(NewTransaction::deposit(account_id, amount, created_at))
        })?;

        debug!(tx_id = tx.id, account_id, %amount, "deposit committed");
        Ok(tx)
    }

    /// Look up a single account
    pub fn get_account(&self, account_id: AccountId) -> Result<Account, LedgerError> {
        self.store.read(|uow| existing_account(uow, account_id))
    }

    /// Accounts owned by a customer, ordered by id
    pub fn list_accounts(&self, customer_id: CustomerId) -> Result<Vec<Account>, LedgerError> {
        self.store.read(|uow| uow.accounts(Some(customer_id)))
    }

    /// Every account in the ledger, ordered by id
    pub fn all_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        self.store.read(|uow| uow.accounts(None))
    }
}

fn existing_account(uow: &dyn UnitOfWork, id: AccountId) -> Result<Account, LedgerError> {
    uow.account(id)?
        .ok_or_else(|| LedgerError::not_found(Entity::Account, id))
}

/// Load an account, apply `f` to it and stage the result
///
/// Nothing is staged if `f` returns an error.
fn update_balance<F>(uow: &mut dyn UnitOfWork, id: AccountId, f: F) -> Result<Account, LedgerError>
where
    F: FnOnce(&mut Account) -> Result<(), LedgerError>,
{
    let mut account = existing_account(uow, id)?;
    f(&mut account)?;
    uow.update_account(account.clone())?;
    Ok(account)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::{fixture, LockCountingClock};
    use crate::types::TransactionKind;
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use std::thread;

    fn funded_pair(manager: &AccountBalanceManager, balance: Decimal) -> (AccountId, AccountId) {
        let a = manager.open_account(1, 1, "Alice", "usd").unwrap();
        let b = manager.open_account(2, 1, "Bob", "usd").unwrap();
        if balance > Decimal::ZERO {
            manager.deposit(a.id, balance).unwrap();
        }
        (a.id, b.id)
    }

    #[test]
    fn test_open_account_starts_at_zero_and_uppercases_currency() {
        let (manager, _) = fixture().accounts();

        let account = manager.open_account(7, 3, "  Ada  ", "eur").unwrap();

        assert_eq!(account.balance, Decimal::ZERO);
        assert_eq!(account.currency, "EUR");
        assert_eq!(account.owner, "Ada");
        assert_eq!(account.customer_id, 7);
        assert_eq!(account.branch_id, 3);
    }

    #[rstest]
    #[case("", "USD", "owner")]
    #[case("   ", "USD", "owner")]
    #[case("Ada", "US", "currency")]
    #[case("Ada", "US1", "currency")]
    #[case("Ada", "DOLLAR", "currency")]
    fn test_open_account_rejects_malformed_input(
        #[case] owner: &str,
        #[case] currency: &str,
        #[case] field: &str,
    ) {
        let (manager, _) = fixture().accounts();

        let result = manager.open_account(1, 1, owner, currency);

        assert!(
            matches!(result, Err(LedgerError::InvalidInput { field: ref f, .. }) if f == field),
            "unexpected result: {:?}",
            result
        );
    }

    #[test]
    fn test_transfer_moves_funds_and_records_one_transaction() {
        let (manager, statements) = fixture().accounts();
        let (a, b) = funded_pair(&manager, dec!(100));

        let tx = manager.transfer(a, b, dec!(40)).unwrap();

        assert_eq!(tx.kind(), TransactionKind::Transfer);
        assert_eq!(tx.from_account_id, Some(a));
        assert_eq!(tx.to_account_id, Some(b));
        assert_eq!(tx.amount, dec!(40));
        assert_eq!(manager.get_account(a).unwrap().balance, dec!(60));
        assert_eq!(manager.get_account(b).unwrap().balance, dec!(40));

        let history = statements.get_statements(b).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, tx.id);
    }

    #[test]
    fn test_transfer_with_insufficient_funds_changes_nothing() {
        let (manager, statements) = fixture().accounts();
        let (a, b) = funded_pair(&manager, dec!(50));

        let result = manager.transfer(a, b, dec!(50.01));

        assert_eq!(
            result,
            Err(LedgerError::insufficient_funds(a, dec!(50), dec!(50.01)))
        );
        assert_eq!(manager.get_account(a).unwrap().balance, dec!(50));
        assert_eq!(manager.get_account(b).unwrap().balance, Decimal::ZERO);
        // only the funding deposit
        assert_eq!(statements.get_statements(a).unwrap().len(), 1);
        assert!(statements.get_statements(b).unwrap().is_empty());
    }

    #[test]
    fn test_transfer_of_entire_balance_is_allowed() {
        let (manager, _) = fixture().accounts();
        let (a, b) = funded_pair(&manager, dec!(25));

        manager.transfer(a, b, dec!(25)).unwrap();

        assert_eq!(manager.get_account(a).unwrap().balance, Decimal::ZERO);
        assert_eq!(manager.get_account(b).unwrap().balance, dec!(25));
    }

    #[test]
    fn test_transfer_to_same_account_is_rejected_first() {
        let (manager, _) = fixture().accounts();

        // account 99 does not exist, but the self-transfer check wins
        assert_eq!(
            manager.transfer(99, 99, dec!(1)),
            Err(LedgerError::same_account(99))
        );
    }

    #[rstest]
    #[case::missing_source(99, 1)]
    #[case::missing_destination(1, 99)]
    fn test_transfer_with_missing_account(#[case] from: AccountId, #[case] to: AccountId) {
        let (manager, _) = fixture().accounts();
        funded_pair(&manager, dec!(10));

        assert_eq!(
            manager.transfer(from, to, dec!(1)),
            Err(LedgerError::not_found(Entity::Account, 99))
        );
        assert_eq!(manager.get_account(1).unwrap().balance, dec!(10));
    }

    #[rstest]
    #[case(dec!(0))]
    #[case(dec!(-5))]
    fn test_non_positive_amounts_are_rejected(#[case] amount: Decimal) {
        let (manager, _) = fixture().accounts();
        let (a, b) = funded_pair(&manager, dec!(10));

        assert!(matches!(
            manager.transfer(a, b, amount),
            Err(LedgerError::InvalidAmount { .. })
        ));
        assert!(matches!(
            manager.deposit(a, amount),
            Err(LedgerError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_deposit_credits_and_records_external_transaction() {
        let (manager, statements) = fixture().accounts();
        let account = manager.open_account(1, 1, "Alice", "USD").unwrap();

        let tx = manager.deposit(account.id, dec!(123.45)).unwrap();

        assert_eq!(tx.kind(), TransactionKind::Deposit);
        assert_eq!(tx.from_account_id, None);
        assert_eq!(tx.to_account_id, Some(account.id));
        assert_eq!(manager.get_account(account.id).unwrap().balance, dec!(123.45));
        assert_eq!(statements.get_statements(account.id).unwrap(), vec![tx]);
    }

    #[test]
    fn test_deposit_into_missing_account() {
        let (manager, _) = fixture().accounts();

        assert_eq!(
            manager.deposit(5, dec!(1)),
            Err(LedgerError::not_found(Entity::Account, 5))
        );
    }

    #[test]
    fn test_deposit_overflow_is_reported() {
        let (manager, _) = fixture().accounts();
        let account = manager.open_account(1, 1, "Alice", "USD").unwrap();
        manager.deposit(account.id, Decimal::MAX).unwrap();

        assert_eq!(
            manager.deposit(account.id, dec!(1)),
            Err(LedgerError::arithmetic_overflow("deposit"))
        );
        assert_eq!(manager.get_account(account.id).unwrap().balance, Decimal::MAX);
    }

    #[test]
    fn test_list_accounts_by_customer() {
        let (manager, _) = fixture().accounts();
        manager.open_account(1, 1, "Alice", "USD").unwrap();
        manager.open_account(2, 1, "Bob", "USD").unwrap();
        manager.open_account(1, 2, "Alice", "EUR").unwrap();

        let owned: Vec<String> = manager
            .list_accounts(1)
            .unwrap()
            .into_iter()
            .map(|a| a.currency)
            .collect();

        assert_eq!(owned, vec!["USD", "EUR"]);
        assert_eq!(manager.all_accounts().unwrap().len(), 3);
        assert!(manager.list_accounts(42).unwrap().is_empty());
    }

    #[test]
    fn test_concurrent_transfers_cannot_overdraw() {
        let (manager, _) = fixture().accounts();
        let (a, b) = funded_pair(&manager, dec!(100));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let manager = manager.clone();
                thread::spawn(move || manager.transfer(a, b, dec!(70)))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(succeeded, 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(LedgerError::InsufficientFunds { .. }))));
        assert_eq!(manager.get_account(a).unwrap().balance, dec!(30));
        assert_eq!(manager.get_account(b).unwrap().balance, dec!(70));
    }

    #[test]
    fn test_opposing_transfers_preserve_total() {
        let (manager, _) = fixture().accounts();
        let (a, b) = funded_pair(&manager, dec!(500));
        manager.transfer(a, b, dec!(250)).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let manager = manager.clone();
                let (from, to) = if i % 2 == 0 { (a, b) } else { (b, a) };
                thread::spawn(move || {
                    for _ in 0..25 {
                        let _ = manager.transfer(from, to, dec!(3));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let balance_a = manager.get_account(a).unwrap().balance;
        let balance_b = manager.get_account(b).unwrap().balance;
        assert!(balance_a >= Decimal::ZERO);
        assert!(balance_b >= Decimal::ZERO);
        assert_eq!(balance_a + balance_b, dec!(500));
    }

    #[test]
    fn test_transaction_time_is_read_under_row_locks() {
        let fx = fixture();
        let (setup, _) = fx.accounts();
        let (a, b) = funded_pair(&setup, dec!(50));

        let clock = Arc::new(LockCountingClock::new(&fx));
        let manager = AccountBalanceManager::new(fx.store.clone(), clock.clone());

        manager.transfer(a, b, dec!(20)).unwrap();
        manager.deposit(b, dec!(5)).unwrap();

        // Both transfer accounts, then the deposit account
        assert_eq!(clock.held(), vec![2, 1]);
    }
}
