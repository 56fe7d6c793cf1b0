use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::cpf::Cpf;
use super::user::User;

/// Status of a charge in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChargeStatus {
    /// Created but not yet settled.
    Pending,
    /// Settled by the recipient.
    Paid,
    /// Cancelled by the originator. Terminal.
    Cancelled,
}

impl ChargeStatus {
    pub fn is_final(&self) -> bool {
        matches!(self, ChargeStatus::Cancelled)
    }
}

/// How a charge was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Internal zero-sum transfer from the payer's balance.
    Balance,
    /// External card authorization; funds are injected to the
    /// originator without touching the payer's balance.
    Card,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Balance => "BALANCE",
            PaymentMethod::Card => "CARD",
        }
    }
}

/// Settlement record, set exactly once on the Pending -> Paid transition
/// and read-only thereafter. It records history, not current truth: a
/// later cancellation leaves it in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub method: PaymentMethod,
    pub paid_at: DateTime<Utc>,
    pub paid_by_cpf: Cpf,
}

/// A monetary claim from an originator (who is owed money) against a
/// recipient (who owes it). Uses optimistic locking via `version`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Charge {
    pub id: Uuid,
    pub originator_id: Uuid,
    pub originator_cpf: Cpf,
    pub recipient_id: Uuid,
    pub recipient_cpf: Cpf,
    /// Amount owed. Strictly positive, immutable after creation.
    pub amount: Decimal,
    pub description: Option<String>,
    pub status: ChargeStatus,
    pub settlement: Option<Settlement>,
    /// Version number for optimistic locking.
    pub version: i32,
    pub created_at: DateTime<Utc>,
}

impl Charge {
    /// Creates a pending charge from the originator against the recipient.
    pub fn new(
        originator: &User,
        recipient: &User,
        amount: Decimal,
        description: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            originator_id: originator.id,
            originator_cpf: originator.cpf.clone(),
            recipient_id: recipient.id,
            recipient_cpf: recipient.cpf.clone(),
            amount,
            description,
            status: ChargeStatus::Pending,
            settlement: None,
            version: 1,
            created_at: Utc::now(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ChargeStatus::Pending
    }

    /// The recorded payment method, if the charge was ever settled.
    pub fn payment_method(&self) -> Option<PaymentMethod> {
        self.settlement.as_ref().map(|s| s.method)
    }

    /// Marks the charge as paid, recording how, when, and by whom.
    pub fn settle(
        &mut self,
        method: PaymentMethod,
        paid_by_cpf: Cpf,
        paid_at: DateTime<Utc>,
    ) -> Result<(), InvalidTransition> {
        ChargeStateMachine::transition(self.status, ChargeStatus::Paid)?;
        self.status = ChargeStatus::Paid;
        self.settlement = Some(Settlement {
            method,
            paid_at,
            paid_by_cpf,
        });
        self.version += 1;
        Ok(())
    }

    /// Marks the charge as cancelled. The settlement record, if any,
    /// stays untouched.
    pub fn cancel(&mut self) -> Result<(), InvalidTransition> {
        ChargeStateMachine::transition(self.status, ChargeStatus::Cancelled)?;
        self.status = ChargeStatus::Cancelled;
        self.version += 1;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid charge transition from {from:?} to {to:?}")]
pub struct InvalidTransition {
    pub from: ChargeStatus,
    pub to: ChargeStatus,
}

/// Charge state machine. Transitions are monotone and one-directional;
/// Cancelled is terminal.
#[derive(Debug, Clone)]
pub struct ChargeStateMachine;

impl ChargeStateMachine {
    /// Returns valid next states from the current state.
    pub fn valid_transitions(current: ChargeStatus) -> Vec<ChargeStatus> {
        match current {
            ChargeStatus::Pending => vec![ChargeStatus::Paid, ChargeStatus::Cancelled],
            ChargeStatus::Paid => vec![ChargeStatus::Cancelled],
            ChargeStatus::Cancelled => vec![],
        }
    }

    /// Checks if a transition is valid.
    pub fn can_transition(from: ChargeStatus, to: ChargeStatus) -> bool {
        Self::valid_transitions(from).contains(&to)
    }

    /// Attempts to transition to a new state.
    pub fn transition(from: ChargeStatus, to: ChargeStatus) -> Result<(), InvalidTransition> {
        if Self::can_transition(from, to) {
            Ok(())
        } else {
            Err(InvalidTransition { from, to })
        }
    }
}
