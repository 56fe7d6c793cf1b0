use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::cpf::Cpf;

/// A registered party that can originate charges, settle them, and hold
/// a balance. Uses optimistic locking via the `version` field to handle
/// concurrent updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub cpf: Cpf,
    pub email: String,
    /// Credential hash owned by the authentication collaborator; opaque here.
    pub password_hash: String,
    /// Current balance. Never negative.
    pub balance: Decimal,
    /// Version number for optimistic locking.
    pub version: i32,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Creates a new user with a zero balance.
    pub fn new(
        name: impl Into<String>,
        cpf: Cpf,
        email: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            cpf,
            email: email.into(),
            password_hash: password_hash.into(),
            balance: Decimal::ZERO,
            version: 1,
            created_at: Utc::now(),
        }
    }

    /// Creates a new user with an initial balance.
    pub fn with_balance(
        name: impl Into<String>,
        cpf: Cpf,
        email: impl Into<String>,
        password_hash: impl Into<String>,
        balance: Decimal,
    ) -> Self {
        Self {
            balance,
            ..Self::new(name, cpf, email, password_hash)
        }
    }

    pub fn has_sufficient_funds(&self, amount: Decimal) -> bool {
        self.balance >= amount
    }

    /// Credits the balance (increases it).
    pub fn credit(&mut self, amount: Decimal) {
        self.balance += amount;
        self.version += 1;
    }

    /// Debits the balance (decreases it). Refuses to overdraw and leaves
    /// the balance untouched on failure.
    pub fn debit(&mut self, amount: Decimal) -> Result<(), InsufficientFundsError> {
        if !self.has_sufficient_funds(amount) {
            return Err(InsufficientFundsError {
                requested: amount,
                available: self.balance,
            });
        }
        self.balance -= amount;
        self.version += 1;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct InsufficientFundsError {
    pub requested: Decimal,
    pub available: Decimal,
}

impl std::fmt::Display for InsufficientFundsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "insufficient funds: requested {}, available {}",
            self.requested, self.available
        )
    }
}

impl std::error::Error for InsufficientFundsError {}
