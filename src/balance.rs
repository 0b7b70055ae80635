use rust_decimal::Decimal;
use thiserror::Error;

use crate::statement::{OperationType, Statement};

/// Result of folding a user's statements. `statement` is only filled when the
/// caller asked for the full history.
#[derive(Debug, Clone, PartialEq)]
pub struct Balance {
    pub balance: Decimal,
    pub statement: Option<Vec<Statement>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Balance is outside the representable range")]
pub struct BalanceOverflow;

/// Signed effect of a single statement on its owner's balance.
pub fn signed_amount(statement: &Statement) -> Decimal {
    match (statement.kind, statement.sender_id) {
        (OperationType::Deposit, _) => statement.amount,
        (OperationType::Withdraw, _) => -statement.amount,
        // receiving leg
        (OperationType::Transfer, Some(_)) => statement.amount,
        // sending leg
        (OperationType::Transfer, None) => -statement.amount,
    }
}

/// Adds the effect of `statement` to `total`.
pub fn apply(total: Decimal, statement: &Statement) -> Result<Decimal, BalanceOverflow> {
    total
        .checked_add(signed_amount(statement))
        .ok_or(BalanceOverflow)
}

pub fn balance_of<'a>(
    statements: impl IntoIterator<Item = &'a Statement>,
) -> Result<Decimal, BalanceOverflow> {
    statements.into_iter().try_fold(Decimal::ZERO, apply)
}

pub fn calculate(statements: Vec<Statement>, with_statement: bool) -> Result<Balance, BalanceOverflow> {
    let balance = balance_of(&statements)?;
    Ok(Balance {
        balance,
        statement: with_statement.then_some(statements),
    })
}
