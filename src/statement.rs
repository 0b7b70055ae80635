use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatementId(Uuid);

impl StatementId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StatementId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StatementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for StatementId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Deposit,
    Withdraw,
    Transfer,
}

#[derive(Debug, Error)]
#[error("Unknown operation type `{0}`")]
pub struct UnknownOperationType(pub String);

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Deposit => "deposit",
            OperationType::Withdraw => "withdraw",
            OperationType::Transfer => "transfer",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = UnknownOperationType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(OperationType::Deposit),
            "withdraw" => Ok(OperationType::Withdraw),
            "transfer" => Ok(OperationType::Transfer),
            other => Err(UnknownOperationType(other.to_string())),
        }
    }
}

/// Immutable ledger entry. A transfer is stored as two of these: the sender's
/// leg (no `sender_id`) and the receiver's leg (`sender_id` = sender).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub id: StatementId,
    pub user_id: UserId,
    pub sender_id: Option<UserId>,
    pub amount: Decimal,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: OperationType,
    pub created_at: DateTime<Utc>,
}

/// Statement that has not been stored yet; the store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewStatement {
    pub user_id: UserId,
    pub sender_id: Option<UserId>,
    pub amount: Decimal,
    pub description: String,
    pub kind: OperationType,
}

impl NewStatement {
    pub fn into_statement(self, id: StatementId, created_at: DateTime<Utc>) -> Statement {
        Statement {
            id,
            user_id: self.user_id,
            sender_id: self.sender_id,
            amount: self.amount,
            description: self.description,
            kind: self.kind,
            created_at,
        }
    }
}
