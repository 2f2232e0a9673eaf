//! In-memory Ledger Store
//!
//! `MemoryLedgerStore` implements the `LedgerStore` capability set with real
//! transactional semantics, standing in for a relational database.
//!
//! # Design
//!
//! ```text
//! MemoryLedgerStore
//!     ├── RwLock<Tables>                   (committed rows)
//!     ├── DashMap<LockKey, Arc<Mutex<()>>> (per-row lock registry)
//!     └── Sequences                        (id generators, one per relation)
//! ```
//!
//! A scope acquires its row locks in ascending `LockKey` order, stages every
//! write in an overlay and, if the body succeeds, applies the overlay under the
//! table write lock. Readers therefore never observe a half-applied scope, and
//! an error or panic inside the body simply drops the overlay.
//!
//! Ids are drawn from atomic sequences when a row is staged; ids consumed by a
//! rolled-back scope are never reused.
//!
//! A row lock stays registered only while some scope holds or waits for it,
//! so scopes naming ids that do not exist leave nothing behind.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{ArcMutexGuard, Mutex, RawMutex, RwLock};
use tracing::{debug, warn};

use super::traits::{
    AccountRepository, BeneficiaryRepository, LedgerStore, LoanPaymentRepository, LoanRepository,
    LockKey, ScopeBody, TransactionRepository,
};
use crate::types::{
    Account, AccountId, Beneficiary, BeneficiaryId, CustomerId, Entity, LedgerError, Loan, LoanId,
    LoanPayment, NewAccount, NewBeneficiary, NewLoan, NewLoanPayment, NewTransaction, PaymentId,
    Transaction, TransactionId,
};

/// Committed rows, one ordered map per relation
#[derive(Debug, Default, Clone)]
struct Tables {
    accounts: BTreeMap<AccountId, Account>,
    transactions: BTreeMap<TransactionId, Transaction>,
    loans: BTreeMap<LoanId, Loan>,
    payments: BTreeMap<PaymentId, LoanPayment>,
    beneficiaries: BTreeMap<BeneficiaryId, Beneficiary>,
}

impl Tables {
    fn is_empty(&self) -> bool {
        self.accounts.is_empty()
            && self.transactions.is_empty()
            && self.loans.is_empty()
            && self.payments.is_empty()
            && self.beneficiaries.is_empty()
    }

    /// Upsert every row of `staged` into `self`
    fn apply(&mut self, staged: Tables) {
        self.accounts.extend(staged.accounts);
        self.transactions.extend(staged.transactions);
        self.loans.extend(staged.loans);
        self.payments.extend(staged.payments);
        self.beneficiaries.extend(staged.beneficiaries);
    }
}

/// Id generators
#[derive(Debug)]
struct Sequences {
    account: AtomicU64,
    transaction: AtomicU64,
    loan: AtomicU64,
    payment: AtomicU64,
    beneficiary: AtomicU64,
}

impl Default for Sequences {
    fn default() -> Self {
        Self {
            account: AtomicU64::new(1),
            transaction: AtomicU64::new(1),
            loan: AtomicU64::new(1),
            payment: AtomicU64::new(1),
            beneficiary: AtomicU64::new(1),
        }
    }
}

fn next_id(sequence: &AtomicU64) -> u64 {
    sequence.fetch_add(1, Ordering::Relaxed)
}

/// Thread-safe in-memory ledger storage
///
/// Cheap to share behind an `Arc`. Operations on disjoint rows proceed in
/// parallel; scopes that lock the same row serialize.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    tables: RwLock<Tables>,
    row_locks: DashMap<LockKey, Arc<Mutex<()>>>,
    sequences: Sequences,

    /// Remaining payment inserts before an injected failure
    payment_fault: Mutex<Option<usize>>,
}

impl MemoryLedgerStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the `nth` payment insert from now on (1-based) fail
    ///
    /// Used to exercise rollback of multi-row scopes. The fault fires once.
    pub fn fail_payment_insert(&self, nth: usize) {
        *self.payment_fault.lock() = Some(nth.max(1));
    }

    /// Number of committed rows in each relation
    ///
    /// Returned as `(accounts, transactions, loans, payments, beneficiaries)`.
    pub fn row_counts(&self) -> (usize, usize, usize, usize, usize) {
        let tables = self.tables.read();
        (
            tables.accounts.len(),
            tables.transactions.len(),
            tables.loans.len(),
            tables.payments.len(),
            tables.beneficiaries.len(),
        )
    }

    /// Number of row locks currently registered
    pub fn registered_locks(&self) -> usize {
        self.row_locks.len()
    }

    fn row_lock(&self, key: LockKey) -> Arc<Mutex<()>> {
        Arc::clone(self.row_locks.entry(key).or_default().value())
    }

    /// Acquire the row locks for `keys`, which must be sorted and unique
    fn lock_rows(&self, keys: Vec<LockKey>) -> HeldLocks<'_> {
        let guards = keys
            .iter()
            .map(|key| self.row_lock(*key).lock_arc())
            .collect();
        HeldLocks {
            store: self,
            keys,
            guards,
        }
    }

    fn check_payment_fault(&self) -> Result<(), LedgerError> {
        let mut fault = self.payment_fault.lock();
        match *fault {
            Some(1) => {
                *fault = None;
                Err(LedgerError::store_failure("injected payment insert failure"))
            }
            Some(remaining) => {
                *fault = Some(remaining - 1);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn transaction(&self, locks: &[LockKey], body: &mut ScopeBody<'_>) -> Result<(), LedgerError> {
        let mut keys = locks.to_vec();
        keys.sort_unstable();
        keys.dedup();

        // Lowest key first, so no two scopes can wait on each other
        let _held = self.lock_rows(keys);

        let mut scope = Scope {
            store: self,
            staged: Tables::default(),
        };

        match body(&mut scope) {
            Ok(()) => {
                let staged = scope.staged;
                if !staged.is_empty() {
                    self.tables.write().apply(staged);
                }
                Ok(())
            }
            Err(e) => {
                debug!(error = %e, "scope rolled back");
                Err(e)
            }
        }
    }
}

/// Row locks held by one scope
///
/// Dropping it (also while unwinding) releases the locks and unregisters
/// every lock no other scope holds or waits for.
struct HeldLocks<'s> {
    store: &'s MemoryLedgerStore,
    keys: Vec<LockKey>,
    guards: Vec<ArcMutexGuard<RawMutex, ()>>,
}

impl Drop for HeldLocks<'_> {
    fn drop(&mut self) {
        // Each guard owns a clone of its Arc; release them before counting
        self.guards.clear();
        for key in &self.keys {
            self.store
                .row_locks
                .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
        }
    }
}

/// One open transactional scope
///
/// Reads consult the staged overlay first, then committed rows.
struct Scope<'s> {
    store: &'s MemoryLedgerStore,
    staged: Tables,
}

/// Merge committed and staged rows matching `keep`, ordered by key
fn merged<K, V, F>(committed: &BTreeMap<K, V>, staged: &BTreeMap<K, V>, keep: F) -> Vec<V>
where
    K: Ord + Copy,
    V: Clone,
    F: Fn(&V) -> bool,
{
    let mut rows: BTreeMap<K, V> = committed
        .iter()
        .filter(|(_, row)| keep(row))
        .map(|(id, row)| (*id, row.clone()))
        .collect();

    for (id, row) in staged {
        if keep(row) {
            rows.insert(*id, row.clone());
        } else {
            rows.remove(id);
        }
    }

    rows.into_values().collect()
}

fn lookup<K: Ord, V: Clone>(
    committed: &BTreeMap<K, V>,
    staged: &BTreeMap<K, V>,
    id: &K,
) -> Option<V> {
    staged.get(id).or_else(|| committed.get(id)).cloned()
}

impl AccountRepository for Scope<'_> {
    fn insert_account(&mut self, account: NewAccount) -> Result<Account, LedgerError> {
        let account = account.into_account(next_id(&self.store.sequences.account));
        self.staged.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    fn account(&self, id: AccountId) -> Result<Option<Account>, LedgerError> {
        let tables = self.store.tables.read();
        Ok(lookup(&tables.accounts, &self.staged.accounts, &id))
    }

    fn update_account(&mut self, account: Account) -> Result<(), LedgerError> {
        if self.account(account.id)?.is_none() {
            return Err(LedgerError::not_found(Entity::Account, account.id));
        }
        self.staged.accounts.insert(account.id, account);
        Ok(())
    }

    fn accounts(&self, customer: Option<CustomerId>) -> Result<Vec<Account>, LedgerError> {
        let tables = self.store.tables.read();
        Ok(merged(&tables.accounts, &self.staged.accounts, |a| {
            customer.is_none_or(|c| a.customer_id == c)
        }))
    }
}

impl TransactionRepository for Scope<'_> {
    fn insert_transaction(&mut self, tx: NewTransaction) -> Result<Transaction, LedgerError> {
        let tx = tx.into_transaction(next_id(&self.store.sequences.transaction));
        self.staged.transactions.insert(tx.id, tx.clone());
        Ok(tx)
    }

    fn transactions_for_account(
        &self,
        account: AccountId,
        limit: usize,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let tables = self.store.tables.read();
        let mut history = merged(&tables.transactions, &self.staged.transactions, |tx| {
            tx.involves(account)
        });

        history.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        history.truncate(limit);
        Ok(history)
    }
}

impl LoanRepository for Scope<'_> {
    fn insert_loan(&mut self, loan: NewLoan) -> Result<Loan, LedgerError> {
        let loan = loan.into_loan(next_id(&self.store.sequences.loan));
        self.staged.loans.insert(loan.id, loan.clone());
        Ok(loan)
    }

    fn loan(&self, id: LoanId) -> Result<Option<Loan>, LedgerError> {
        let tables = self.store.tables.read();
        Ok(lookup(&tables.loans, &self.staged.loans, &id))
    }

    fn update_loan(&mut self, loan: Loan) -> Result<(), LedgerError> {
        if self.loan(loan.id)?.is_none() {
            return Err(LedgerError::not_found(Entity::Loan, loan.id));
        }
        self.staged.loans.insert(loan.id, loan);
        Ok(())
    }

    fn loans(&self, customer: Option<CustomerId>) -> Result<Vec<Loan>, LedgerError> {
        let tables = self.store.tables.read();
        Ok(merged(&tables.loans, &self.staged.loans, |l| {
            customer.is_none_or(|c| l.customer_id == c)
        }))
    }
}

impl LoanPaymentRepository for Scope<'_> {
    fn insert_payment(&mut self, payment: NewLoanPayment) -> Result<LoanPayment, LedgerError> {
        if let Err(e) = self.store.check_payment_fault() {
            warn!(loan_id = payment.loan_id, "payment insert failed");
            return Err(e);
        }
        let payment = payment.into_payment(next_id(&self.store.sequences.payment));
        self.staged.payments.insert(payment.id, payment.clone());
        Ok(payment)
    }

    fn payment(&self, id: PaymentId) -> Result<Option<LoanPayment>, LedgerError> {
        let tables = self.store.tables.read();
        Ok(lookup(&tables.payments, &self.staged.payments, &id))
    }

    fn update_payment(&mut self, payment: LoanPayment) -> Result<(), LedgerError> {
        if self.payment(payment.id)?.is_none() {
            return Err(LedgerError::not_found(Entity::Payment, payment.id));
        }
        self.staged.payments.insert(payment.id, payment);
        Ok(())
    }

    fn payments_for_loan(&self, loan: LoanId) -> Result<Vec<LoanPayment>, LedgerError> {
        let tables = self.store.tables.read();
        let mut schedule = merged(&tables.payments, &self.staged.payments, |p| p.loan_id == loan);
        schedule.sort_by(|a, b| a.due_date.cmp(&b.due_date).then(a.id.cmp(&b.id)));
        Ok(schedule)
    }
}

impl BeneficiaryRepository for Scope<'_> {
    fn insert_beneficiary(
        &mut self,
        beneficiary: NewBeneficiary,
    ) -> Result<Beneficiary, LedgerError> {
        let beneficiary = beneficiary.into_beneficiary(next_id(&self.store.sequences.beneficiary));
        self.staged
            .beneficiaries
            .insert(beneficiary.id, beneficiary.clone());
        Ok(beneficiary)
    }

    fn beneficiaries(&self, owner: CustomerId) -> Result<Vec<Beneficiary>, LedgerError> {
        let tables = self.store.tables.read();
        Ok(merged(&tables.beneficiaries, &self.staged.beneficiaries, |b| {
            b.owner_customer_id == owner
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::UnitOfWork;
    use rust_decimal_macros::dec;
    use std::thread;

    fn new_account(customer_id: CustomerId) -> NewAccount {
        NewAccount {
            customer_id,
            branch_id: 1,
            owner: "Owner".to_string(),
            currency: "USD".to_string(),
        }
    }

    fn store() -> Arc<dyn LedgerStore> {
        Arc::new(MemoryLedgerStore::new())
    }

    #[test]
    fn test_committed_scope_is_visible() {
        let store = store();

        let account = store
            .run(&[], |uow| uow.insert_account(new_account(1)))
            .unwrap();

        let reloaded = store.read(|uow| uow.account(account.id)).unwrap();
        assert_eq!(reloaded, Some(account));
    }

    #[test]
    fn test_failed_scope_leaves_no_rows() {
        let store = store();

        let result: Result<(), LedgerError> = store.run(&[], |uow| {
            uow.insert_account(new_account(1))?;
            Err(LedgerError::store_failure("boom"))
        });

        assert!(result.is_err());
        let accounts = store.read(|uow| uow.accounts(None)).unwrap();
        assert!(accounts.is_empty());
    }

    #[test]
    fn test_ids_are_not_reused_after_rollback() {
        let store = store();

        let _ = store.run(&[], |uow| -> Result<(), LedgerError> {
            uow.insert_account(new_account(1))?;
            Err(LedgerError::store_failure("boom"))
        });
        let account = store
            .run(&[], |uow| uow.insert_account(new_account(1)))
            .unwrap();

        assert_eq!(account.id, 2);
    }

    #[test]
    fn test_scope_reads_its_own_writes() {
        let store = store();

        let seen = store
            .run(&[], |uow| {
                let mut account = uow.insert_account(new_account(4))?;
                account.balance = dec!(12.5);
                uow.update_account(account.clone())?;
                let listed = uow.accounts(Some(4))?;
                Ok((uow.account(account.id)?, listed.len()))
            })
            .unwrap();

        assert_eq!(seen.0.map(|a| a.balance), Some(dec!(12.5)));
        assert_eq!(seen.1, 1);
    }

    #[test]
    fn test_update_of_missing_row_fails() {
        let store = store();
        let phantom = new_account(1).into_account(99);

        let result = store.run(&[], |uow| uow.update_account(phantom));

        assert_eq!(result, Err(LedgerError::not_found(Entity::Account, 99)));
    }

    #[test]
    fn test_accounts_filtered_by_customer_in_id_order() {
        let store = store();
        store
            .run(&[], |uow| {
                uow.insert_account(new_account(1))?;
                uow.insert_account(new_account(2))?;
                uow.insert_account(new_account(1))?;
                Ok(())
            })
            .unwrap();

        let ids: Vec<AccountId> = store
            .read(|uow| uow.accounts(Some(1)))
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();

        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_injected_payment_fault_fires_once() {
        let memory = Arc::new(MemoryLedgerStore::new());
        memory.fail_payment_insert(2);
        let store: Arc<dyn LedgerStore> = memory.clone();

        let due = chrono::NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let payment = || NewLoanPayment {
            loan_id: 1,
            amount: dec!(10),
            due_date: due,
        };

        let result = store.run(&[], |uow: &mut dyn UnitOfWork| {
            uow.insert_payment(payment())?;
            uow.insert_payment(payment())
        });
        assert!(matches!(result, Err(LedgerError::StoreFailure { .. })));
        assert_eq!(memory.row_counts().3, 0);

        store.run(&[], |uow| uow.insert_payment(payment())).unwrap();
        assert_eq!(memory.row_counts().3, 1);
    }

    #[test]
    fn test_row_locks_are_released_after_failed_scopes() {
        let memory = Arc::new(MemoryLedgerStore::new());
        let store: Arc<dyn LedgerStore> = memory.clone();

        for id in 1..=1000 {
            let result = store.run(&[LockKey::Account(id), LockKey::Loan(id)], |uow| {
                uow.account(id)?
                    .ok_or_else(|| LedgerError::not_found(Entity::Account, id))
            });
            assert!(result.is_err());
        }

        assert_eq!(memory.registered_locks(), 0);
    }

    #[test]
    fn test_panicking_scope_leaves_no_rows_and_releases_locks() {
        let memory = Arc::new(MemoryLedgerStore::new());
        let store: Arc<dyn LedgerStore> = memory.clone();
        let key = LockKey::Account(1);

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            store.run(&[key], |uow| -> Result<(), LedgerError> {
                uow.insert_account(new_account(1))?;
                panic!("scope body failed");
            })
        }));

        assert!(outcome.is_err());
        assert_eq!(memory.row_counts(), (0, 0, 0, 0, 0));
        assert_eq!(memory.registered_locks(), 0);

        // The same row can be locked again
        let account = store
            .run(&[key], |uow| uow.insert_account(new_account(1)))
            .unwrap();
        assert_eq!(memory.row_counts().0, 1);
        assert_eq!(account.id, 2);
    }

    #[test]
    fn test_overlapping_lock_sets_do_not_deadlock() {
        let store = store();
        let (a, b) = store
            .run(&[], |uow| {
                let a = uow.insert_account(new_account(1))?;
                let b = uow.insert_account(new_account(2))?;
                Ok((a.id, b.id))
            })
            .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let locks = if i % 2 == 0 {
                        [LockKey::Account(a), LockKey::Account(b)]
                    } else {
                        [LockKey::Account(b), LockKey::Account(a)]
                    };
                    for _ in 0..50 {
                        store
                            .run(&locks, |uow| {
                                let mut account = uow
                                    .account(a)?
                                    .ok_or_else(|| LedgerError::not_found(Entity::Account, a))?;
                                account.balance += dec!(1);
                                uow.update_account(account)
                            })
                            .unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let balance = store.read(|uow| uow.account(a)).unwrap().map(|a| a.balance);
        assert_eq!(balance, Some(dec!(400)));
    }

    #[test]
    fn test_contended_lock_stays_registered_while_held() {
        let memory = Arc::new(MemoryLedgerStore::new());
        let store: Arc<dyn LedgerStore> = memory.clone();
        let key = LockKey::Loan(7);

        let inner = Arc::clone(&memory);
        store
            .run(&[key], |_| {
                assert_eq!(inner.registered_locks(), 1);
                Ok(())
            })
            .unwrap();

        assert_eq!(memory.registered_locks(), 0);
    }
}
