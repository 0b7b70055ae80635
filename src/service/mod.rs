use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
    statement::{StatementId, UserId},
    store::StoreError,
};

pub mod query_service;
pub mod statement_service;

pub use query_service::QueryService;
pub use statement_service::StatementService;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("User {0} not found")]
    UserNotFound(UserId),
    #[error("Insufficient funds: balance is {balance}, requested {requested}")]
    InsufficientFunds { balance: Decimal, requested: Decimal },
    #[error("Balance of user {0} would leave the representable range")]
    BalanceOverflow(UserId),
    #[error("Statement {0} not found")]
    StatementNotFound(StatementId),
    #[error("Email `{0}` is already registered")]
    EmailTaken(String),
    #[error("Storage failure: {0}")]
    Storage(StoreError),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InsufficientFunds { balance, requested } => {
                LedgerError::InsufficientFunds { balance, requested }
            }
            StoreError::BalanceOverflow { user_id } => LedgerError::BalanceOverflow(user_id),
            StoreError::EmailTaken(email) => LedgerError::EmailTaken(email),
            other => LedgerError::Storage(other),
        }
    }
}

impl LedgerError {
    /// User or statement missing, or not visible to the caller.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LedgerError::UserNotFound(_) | LedgerError::StatementNotFound(_)
        )
    }

    /// Request the caller can correct, as opposed to an internal failure.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, LedgerError::Storage(_))
    }
}
