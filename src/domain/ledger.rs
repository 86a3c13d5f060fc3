use std::collections::BTreeMap;

use thiserror::Error;

use super::{Cents, LedgerEntry, LedgerRecord, RecordId};

/// Current balance per account. Accounts without records are absent.
pub type AccountBalances = BTreeMap<String, Cents>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Record {record_id} would overflow the balance of account '{account}'")]
    BalanceOverflow { record_id: RecordId, account: String },
}

/// Compute balances for all accounts from records in the order given.
///
/// Adjustment records overwrite the running balance of their account, every
/// other record adds `amount + fee + discount`. The caller is responsible for
/// passing records in chronological order; an adjustment only erases what was
/// folded before it.
pub fn compute_balances<'a, I>(records: I) -> Result<AccountBalances, LedgerError>
where
    I: IntoIterator<Item = &'a LedgerRecord>,
{
    let mut balances = AccountBalances::new();

    for record in records {
        match record.entry() {
            LedgerEntry::Adjustment { account, amount } => {
                balances.insert(account.to_string(), amount);
            }
            LedgerEntry::Transaction {
                account,
                amount,
                fee,
                discount,
            } => {
                let overflow = || LedgerError::BalanceOverflow {
                    record_id: record.id,
                    account: account.to_string(),
                };
                let delta = amount
                    .checked_add(fee)
                    .and_then(|d| d.checked_add(discount))
                    .ok_or_else(overflow)?;
                let balance = balances.entry(account.to_string()).or_insert(0);
                *balance = balance.checked_add(delta).ok_or_else(overflow)?;
            }
        }
    }

    Ok(balances)
}

/// Compute the balance for a single account, `None` if it has no records.
pub fn compute_balance(
    account: &str,
    records: &[LedgerRecord],
) -> Result<Option<Cents>, LedgerError> {
    let balances = compute_balances(records.iter().filter(|r| r.account == account))?;
    Ok(balances.get(account).copied())
}
