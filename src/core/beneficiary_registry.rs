//! Beneficiary registry
//!
//! Customers register existing ledger accounts as payees under a nickname.

use std::sync::Arc;

use tracing::info;

use super::traits::{LedgerStore, LockKey};
use crate::types::{
    AccountId, Beneficiary, CustomerId, Entity, LedgerError, NewBeneficiary,
};

/// Registers and lists payee accounts per customer
#[derive(Clone)]
pub struct BeneficiaryRegistry {
    store: Arc<dyn LedgerStore>,
}

impl BeneficiaryRegistry {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Register `account_id` as a beneficiary of `customer_id`
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if the nickname is blank
    /// - `NotFound` if the target account does not exist
    pub fn add_beneficiary(
        &self,
        customer_id: CustomerId,
        account_id: AccountId,
        nickname: &str,
    ) -> Result<Beneficiary, LedgerError> {
        let nickname = nickname.trim();
        if nickname.is_empty() {
            return Err(LedgerError::invalid_input("nickname", "must not be blank"));
        }

        let beneficiary = self.store.run(&[LockKey::Account(account_id)], |uow| {
            if uow.account(account_id)?.is_none() {
                return Err(LedgerError::not_found(Entity::Account, account_id));
            }
            uow.insert_beneficiary(NewBeneficiary {
                owner_customer_id: customer_id,
                account_id,
                nickname: nickname.to_string(),
            })
        })?;

        info!(beneficiary_id = beneficiary.id, customer_id, account_id, "beneficiary added");
        Ok(beneficiary)
    }

    /// Beneficiaries registered by a customer, ordered by id
    pub fn list_beneficiaries(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<Beneficiary>, LedgerError> {
        self.store.read(|uow| uow.beneficiaries(customer_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::fixture;

    #[test]
    fn test_add_and_list_beneficiaries() {
        let fx = fixture();
        let (manager, _) = fx.accounts();
        let registry = fx.beneficiaries();
        let target = manager.open_account(2, 1, "Bob", "USD").unwrap();

        let added = registry.add_beneficiary(1, target.id, " Landlord ").unwrap();

        assert_eq!(added.nickname, "Landlord");
        assert_eq!(added.owner_customer_id, 1);
        assert_eq!(registry.list_beneficiaries(1).unwrap(), vec![added]);
        assert!(registry.list_beneficiaries(2).unwrap().is_empty());
    }

    #[test]
    fn test_beneficiary_requires_existing_account() {
        let registry = fixture().beneficiaries();

        assert_eq!(
            registry.add_beneficiary(1, 8, "Nobody"),
            Err(LedgerError::not_found(Entity::Account, 8))
        );
    }

    #[test]
    fn test_beneficiary_requires_nickname() {
        let registry = fixture().beneficiaries();

        assert!(matches!(
            registry.add_beneficiary(1, 1, "  "),
            Err(LedgerError::InvalidInput { .. })
        ));
    }
}
