use rust_decimal::{Decimal, prelude::Zero};
use thiserror::Error;

use crate::statement::{OperationType, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Deposit,
    Withdraw,
    Transfer { receiver_id: UserId },
}

impl Operation {
    pub fn kind(&self) -> OperationType {
        match self {
            Operation::Deposit => OperationType::Deposit,
            Operation::Withdraw => OperationType::Withdraw,
            Operation::Transfer { .. } => OperationType::Transfer,
        }
    }

    /// Whether the operation takes money out of the acting user's account.
    pub fn debits_user(&self) -> bool {
        match self {
            Operation::Deposit => false,
            Operation::Withdraw | Operation::Transfer { .. } => true,
        }
    }
}

/// Validated request to record a new operation for `user_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateStatementCommand {
    pub user_id: UserId,
    pub operation: Operation,
    pub amount: Decimal,
    pub description: String,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Amount is required for {kind}")]
    AmountRequired { kind: OperationType },
    #[error("Amount must be positive for {kind}")]
    NonPositiveAmount { kind: OperationType },
    #[error("Receiver is required for transfer")]
    ReceiverRequired,
    #[error("Receiver is not allowed for {kind}")]
    UnexpectedReceiver { kind: OperationType },
}

impl CreateStatementCommand {
    pub fn parse(
        user_id: UserId,
        kind: OperationType,
        receiver_id: Option<UserId>,
        amount: Option<Decimal>,
        description: impl Into<String>,
    ) -> Result<Self, CommandError> {
        let operation = match (kind, receiver_id) {
            (OperationType::Transfer, Some(receiver_id)) => Operation::Transfer { receiver_id },
            (OperationType::Transfer, None) => return Err(CommandError::ReceiverRequired),
            (OperationType::Deposit, None) => Operation::Deposit,
            (OperationType::Withdraw, None) => Operation::Withdraw,
            (kind, Some(_)) => return Err(CommandError::UnexpectedReceiver { kind }),
        };
        let Some(amount) = amount else {
            return Err(CommandError::AmountRequired { kind });
        };
        if amount <= Decimal::zero() {
            return Err(CommandError::NonPositiveAmount { kind });
        }
        Ok(Self {
            user_id,
            operation,
            amount,
            description: description.into(),
        })
    }
}
