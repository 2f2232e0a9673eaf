//! Ledger facade
//!
//! `Ledger` wires every component to one shared store, clock and
//! configuration, and dispatches `LedgerCommand`s to the component that owns
//! them. It is `Send + Sync` and meant to be shared behind an `Arc`.

use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;

use super::account_manager::AccountBalanceManager;
use super::beneficiary_registry::BeneficiaryRegistry;
use super::clock::{Clock, SystemClock};
use super::loan_engine::LoanAmortizationEngine;
use super::payment_processor::LoanPaymentProcessor;
use super::statement_reader::StatementReader;
use super::store::MemoryLedgerStore;
use super::traits::{LedgerStore, LockKey};
use crate::config::EngineConfig;
use crate::types::{
    Account, AccountId, Beneficiary, BranchId, CustomerId, LedgerError, LoanId, LoanPayment,
    LoanWithPayments, PaymentId, Transaction,
};

/// A mutating ledger operation
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerCommand {
    OpenAccount {
        customer_id: CustomerId,
        branch_id: BranchId,
        owner: String,
        currency: String,
    },
    Deposit {
        account_id: AccountId,
        amount: Decimal,
    },
    Transfer {
        from: AccountId,
        to: AccountId,
        amount: Decimal,
    },
    CreateLoan {
        customer_id: CustomerId,
        branch_id: BranchId,
        principal: Decimal,
        annual_rate: Decimal,
        term_months: i32,
    },
    Repay {
        payment_id: PaymentId,
        loan_id: LoanId,
    },
    AddBeneficiary {
        customer_id: CustomerId,
        account_id: AccountId,
        nickname: String,
    },
}

impl LedgerCommand {
    /// Whether the command inserts rows whose ids later commands may refer to
    ///
    /// Such commands must run in input order to keep id assignment
    /// deterministic.
    pub fn creates_rows(&self) -> bool {
        matches!(
            self,
            LedgerCommand::OpenAccount { .. }
                | LedgerCommand::CreateLoan { .. }
                | LedgerCommand::AddBeneficiary { .. }
        )
    }

    /// Existing rows the command locks while it runs
    ///
    /// Commands with disjoint lock sets cannot observe each other's effects.
    pub fn lock_keys(&self) -> Vec<LockKey> {
        match self {
            LedgerCommand::Deposit { account_id, .. } => vec![LockKey::Account(*account_id)],
            LedgerCommand::Transfer { from, to, .. } => {
                vec![LockKey::Account(*from), LockKey::Account(*to)]
            }
            LedgerCommand::Repay { loan_id, .. } => vec![LockKey::Loan(*loan_id)],
            LedgerCommand::AddBeneficiary { account_id, .. } => {
                vec![LockKey::Account(*account_id)]
            }
            LedgerCommand::OpenAccount { .. } | LedgerCommand::CreateLoan { .. } => Vec::new(),
        }
    }
}

impl fmt::Display for LedgerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerCommand::OpenAccount { customer_id, .. } => {
                write!(f, "open account for customer {}", customer_id)
            }
            LedgerCommand::Deposit { account_id, amount } => {
                write!(f, "deposit {} into account {}", amount, account_id)
            }
            LedgerCommand::Transfer { from, to, amount } => {
                write!(f, "transfer {} from account {} to account {}", amount, from, to)
            }
            LedgerCommand::CreateLoan {
                customer_id,
                principal,
                ..
            } => write!(f, "loan of {} for customer {}", principal, customer_id),
            LedgerCommand::Repay {
                payment_id,
                loan_id,
            } => write!(f, "repay payment {} of loan {}", payment_id, loan_id),
            LedgerCommand::AddBeneficiary {
                customer_id,
                account_id,
                ..
            } => write!(
                f,
                "add account {} as beneficiary of customer {}",
                account_id, customer_id
            ),
        }
    }
}

/// What a successful command produced
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    AccountOpened(Account),
    /// Deposit or transfer
    Recorded(Transaction),
    LoanIssued(LoanWithPayments),
    PaymentMade(LoanPayment),
    BeneficiaryAdded(Beneficiary),
}

/// The ledger core over one shared store
#[derive(Clone)]
pub struct Ledger {
    config: EngineConfig,
    accounts: AccountBalanceManager,
    loans: LoanAmortizationEngine,
    payments: LoanPaymentProcessor,
    statements: StatementReader,
    beneficiaries: BeneficiaryRegistry,
}

impl Ledger {
    /// Build the ledger over an explicit store, clock and configuration
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>, config: EngineConfig) -> Self {
        Self {
            config,
            accounts: AccountBalanceManager::new(Arc::clone(&store), Arc::clone(&clock)),
            loans: LoanAmortizationEngine::new(Arc::clone(&store), Arc::clone(&clock), config),
            payments: LoanPaymentProcessor::new(Arc::clone(&store), clock),
            statements: StatementReader::new(Arc::clone(&store), config.statement_limit),
            beneficiaries: BeneficiaryRegistry::new(store),
        }
    }

    /// A ledger over a fresh in-memory store and the system clock
    pub fn in_memory(config: EngineConfig) -> Self {
        Self::new(
            Arc::new(MemoryLedgerStore::new()),
            Arc::new(SystemClock),
            config,
        )
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn accounts(&self) -> &AccountBalanceManager {
        &self.accounts
    }

    pub fn loans(&self) -> &LoanAmortizationEngine {
        &self.loans
    }

    pub fn payments(&self) -> &LoanPaymentProcessor {
        &self.payments
    }

    pub fn statements(&self) -> &StatementReader {
        &self.statements
    }

    pub fn beneficiaries(&self) -> &BeneficiaryRegistry {
        &self.beneficiaries
    }

    /// Dispatch a command to the component that owns it
    pub fn execute(&self, command: LedgerCommand) -> Result<CommandOutcome, LedgerError> {
        match command {
            LedgerCommand::OpenAccount {
                customer_id,
                branch_id,
                owner,
                currency,
            } => self
                .accounts
                .open_account(customer_id, branch_id, &owner, &currency)
                .map(CommandOutcome::AccountOpened),
            LedgerCommand::Deposit { account_id, amount } => self
                .accounts
                .deposit(account_id, amount)
                .map(CommandOutcome::Recorded),
            LedgerCommand::Transfer { from, to, amount } => self
                .accounts
                .transfer(from, to, amount)
                .map(CommandOutcome::Recorded),
            LedgerCommand::CreateLoan {
                customer_id,
                branch_id,
                principal,
                annual_rate,
                term_months,
            } => self
                .loans
                .create_loan(customer_id, branch_id, principal, annual_rate, term_months)
                .map(CommandOutcome::LoanIssued),
            LedgerCommand::Repay {
                payment_id,
                loan_id,
            } => self
                .payments
                .make_payment(payment_id, loan_id)
                .map(CommandOutcome::PaymentMade),
            LedgerCommand::AddBeneficiary {
                customer_id,
                account_id,
                nickname,
            } => self
                .beneficiaries
                .add_beneficiary(customer_id, account_id, &nickname)
                .map(CommandOutcome::BeneficiaryAdded),
        }
    }
}
