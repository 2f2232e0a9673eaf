//! CSV format handling for ledger commands and reports
//!
//! This module centralizes all CSV format concerns, providing:
//! - CsvCommand structure for deserialization
//! - Conversion from CSV rows to `LedgerCommand`s
//! - Accounts and loans report serialization
//!
//! All functions are pure (no file I/O) for easy testing.
//!
//! # Input format
//!
//! ```text
//! command,customer,branch,account,target,amount,rate,term,loan,payment,owner,currency
//! open,1,1,,,,,,,,Alice,USD
//! deposit,,,1,,100.00,,,,,,
//! transfer,,,1,2,25.00,,,,,,
//! loan,1,1,,,12000,0,12,,,,
//! repay,,,,,,,,1,1,,
//! beneficiary,1,,,2,,,,,,Landlord,
//! ```

use crate::core::LedgerCommand;
use crate::io::RunnerError;
use crate::types::{
    Account, AccountId, BranchId, CustomerId, LoanId, LoanWithPayments, PaymentId,
};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// CSV row structure for deserialization
///
/// Every column except `command` is optional; which ones are required
/// depends on the command.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct CsvCommand {
    pub command: String,
    pub customer: Option<CustomerId>,
    pub branch: Option<BranchId>,
    pub account: Option<AccountId>,
    pub target: Option<AccountId>,
    pub amount: Option<String>,
    pub rate: Option<String>,
    pub term: Option<i32>,
    pub loan: Option<LoanId>,
    pub payment: Option<PaymentId>,
    pub owner: Option<String>,
    pub currency: Option<String>,
}

fn required<T>(value: Option<T>, column: &str, command: &str) -> Result<T, String> {
    value.ok_or_else(|| format!("{} command requires a '{}' value", command, column))
}

fn required_text(value: Option<String>, column: &str, command: &str) -> Result<String, String> {
    required(value.filter(|v| !v.trim().is_empty()), column, command)
}

fn required_decimal(value: Option<String>, column: &str, command: &str) -> Result<Decimal, String> {
    let text = required_text(value, column, command)?;
    Decimal::from_str(text.trim())
        .map_err(|_| format!("Invalid {} '{}' for {} command", column, text, command))
}

/// Convert a CsvCommand to a LedgerCommand
///
/// This function:
/// - Parses the command name (case-insensitive)
/// - Checks that every column the command needs is present
/// - Parses amounts and rates into Decimals
///
/// Domain validation (positive amounts, valid terms, ...) is left to the
/// ledger so that such rows surface as ledger errors.
///
/// # Arguments
///
/// * `row` - The deserialized CSV row
///
/// # Returns
///
/// Result containing either:
/// - Ok(LedgerCommand) - Successfully converted command
/// - Err(String) - Error message describing the conversion failure
pub fn convert_csv_command(row: CsvCommand) -> Result<LedgerCommand, String> {
    let name = row.command.trim().to_lowercase();
    let name = name.as_str();

    let command = match name {
        "open" => LedgerCommand::OpenAccount {
            customer_id: required(row.customer, "customer", name)?,
            branch_id: required(row.branch, "branch", name)?,
            owner: required_text(row.owner, "owner", name)?,
            currency: required_text(row.currency, "currency", name)?,
        },
        "deposit" => LedgerCommand::Deposit {
            account_id: required(row.account, "account", name)?,
            amount: required_decimal(row.amount, "amount", name)?,
        },
        "transfer" => LedgerCommand::Transfer {
            from: required(row.account, "account", name)?,
            to: required(row.target, "target", name)?,
            amount: required_decimal(row.amount, "amount", name)?,
        },
        "loan" => LedgerCommand::CreateLoan {
            customer_id: required(row.customer, "customer", name)?,
            branch_id: required(row.branch, "branch", name)?,
            principal: required_decimal(row.amount, "amount", name)?,
            annual_rate: required_decimal(row.rate, "rate", name)?,
            term_months: required(row.term, "term", name)?,
        },
        "repay" => LedgerCommand::Repay {
            payment_id: required(row.payment, "payment", name)?,
            loan_id: required(row.loan, "loan", name)?,
        },
        "beneficiary" => LedgerCommand::AddBeneficiary {
            customer_id: required(row.customer, "customer", name)?,
            account_id: required(row.target, "target", name)?,
            nickname: required_text(row.owner, "owner", name)?,
        },
        _ => return Err(format!("Invalid command type: '{}'", row.command)),
    };

    Ok(command)
}

/// Money columns are written with two decimal places
fn money(value: Decimal) -> String {
    format!(
        "{:.2}",
        value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    )
}

/// Write account states to CSV format
///
/// Columns: account, customer, branch, owner, currency, balance.
/// Accounts are sorted by id for deterministic output.
///
/// # Arguments
///
/// * `accounts` - Slice of accounts to write
/// * `output` - Mutable reference to a writer for outputting CSV
pub fn write_accounts_csv(accounts: &[Account], output: &mut dyn Write) -> Result<(), RunnerError> {
    let mut writer = csv::Writer::from_writer(output);

    writer.write_record(["account", "customer", "branch", "owner", "currency", "balance"])?;

    let mut sorted = accounts.to_vec();
    sorted.sort_by_key(|account| account.id);

    for account in sorted {
        writer.write_record(&[
            account.id.to_string(),
            account.customer_id.to_string(),
            account.branch_id.to_string(),
            account.owner,
            account.currency,
            money(account.balance),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Write loans with their repayment progress to CSV format
///
/// Columns: loan, customer, principal, rate, term, emi, total_payable, paid,
/// status. Loans are sorted by id for deterministic output.
pub fn write_loans_csv(
    loans: &[LoanWithPayments],
    output: &mut dyn Write,
) -> Result<(), RunnerError> {
    let mut writer = csv::Writer::from_writer(output);

    writer.write_record([
        "loan",
        "customer",
        "principal",
        "rate",
        "term",
        "emi",
        "total_payable",
        "paid",
        "status",
    ])?;

    let mut sorted: Vec<&LoanWithPayments> = loans.iter().collect();
    sorted.sort_by_key(|view| view.loan.id);

    for view in sorted {
        let loan = &view.loan;
        writer.write_record(&[
            loan.id.to_string(),
            loan.customer_id.to_string(),
            money(loan.principal),
            loan.annual_rate.normalize().to_string(),
            loan.term_months.to_string(),
            money(loan.emi),
            money(loan.total_payable),
            view.paid_count().to_string(),
            loan.status.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}
