use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::gateway::AuthorizerGateway;
use crate::models::{Charge, PaymentMethod};
use crate::observability::{get_metrics, mask_cpf, LatencyTimer};
use crate::repositories::{GatewayStore, StateUpdate};

use super::clock::{Clock, SystemClock};
use super::ledger::{BalanceLedger, LedgerError};
use super::MAX_COMMIT_RETRIES;

/// Request to settle a pending charge. Card details are required only
/// for `PaymentMethod::Card` and are never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub charge_id: Uuid,
    pub method: PaymentMethod,
    pub card_number: Option<String>,
    pub card_expiration: Option<String>,
    pub card_cvv: Option<String>,
}

impl PaymentRequest {
    pub fn balance(charge_id: Uuid) -> Self {
        Self {
            charge_id,
            method: PaymentMethod::Balance,
            card_number: None,
            card_expiration: None,
            card_cvv: None,
        }
    }

    pub fn card(
        charge_id: Uuid,
        number: impl Into<String>,
        expiration: impl Into<String>,
        cvv: impl Into<String>,
    ) -> Self {
        Self {
            charge_id,
            method: PaymentMethod::Card,
            card_number: Some(number.into()),
            card_expiration: Some(expiration.into()),
            card_cvv: Some(cvv.into()),
        }
    }

    fn has_card_details(&self) -> bool {
        self.card_number.is_some() && self.card_expiration.is_some() && self.card_cvv.is_some()
    }
}

/// The payment settlement engine: settles pending charges and credits
/// deposits.
pub struct PaymentService {
    store: Arc<dyn GatewayStore>,
    authorizer: Arc<dyn AuthorizerGateway>,
    clock: Arc<dyn Clock>,
}

impl PaymentService {
    pub fn new(store: Arc<dyn GatewayStore>, authorizer: Arc<dyn AuthorizerGateway>) -> Self {
        Self::with_clock(store, authorizer, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn GatewayStore>,
        authorizer: Arc<dyn AuthorizerGateway>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            authorizer,
            clock,
        }
    }

    /// Settles a pending charge on behalf of the payer. Only the
    /// recipient of the charge may pay it. Returns the settled charge.
    pub async fn pay(&self, payer_id: Uuid, request: PaymentRequest) -> Result<Charge> {
        let timer = LatencyTimer::start();
        let mut attempt = 0;
        let outcome = loop {
            match self.try_pay(payer_id, &request).await {
                Err(AppError::Conflict(reason)) if attempt + 1 < MAX_COMMIT_RETRIES => {
                    attempt += 1;
                    get_metrics().record_commit_conflict("pay");
                    debug!(
                        charge_id = %request.charge_id,
                        attempt,
                        reason,
                        "commit conflict, retrying settlement"
                    );
                }
                other => break other,
            }
        };
        if outcome.is_ok() {
            get_metrics().record_settlement_latency(timer.elapsed_ms());
        }
        outcome
    }

    async fn try_pay(&self, payer_id: Uuid, request: &PaymentRequest) -> Result<Charge> {
        let mut charge = self
            .store
            .charge_by_id(request.charge_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("charge '{}' not found", request.charge_id))
            })?;

        if !charge.is_pending() {
            return Err(AppError::ChargeNotPending);
        }

        let mut payer = self
            .store
            .user_by_id(payer_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user '{payer_id}' not found")))?;

        if payer.cpf != charge.recipient_cpf {
            return Err(AppError::NotRecipient);
        }

        let mut originator = self
            .store
            .user_by_cpf(&charge.originator_cpf)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("originator of charge '{}' not found", charge.id))
            })?;

        match request.method {
            PaymentMethod::Balance => {
                BalanceLedger::transfer(&mut payer, &mut originator, charge.amount).map_err(
                    |err| match err {
                        LedgerError::InsufficientFunds {
                            requested,
                            available,
                        } => AppError::InsufficientBalance {
                            requested,
                            available,
                        },
                        other => AppError::InvalidState(other.to_string()),
                    },
                )?;
            }
            PaymentMethod::Card => {
                if !request.has_card_details() {
                    return Err(AppError::CardDetailsIncomplete);
                }
                if !self.authorizer.is_approved().await {
                    return Err(AppError::AuthorizerDeclined);
                }
                // Card funds come from outside the ledger: only the
                // originator's balance moves.
                BalanceLedger::credit(&mut originator, charge.amount)
                    .map_err(|err| AppError::InvalidState(err.to_string()))?;
            }
        }

        charge
            .settle(request.method, payer.cpf.clone(), self.clock.now())
            .map_err(|e| AppError::InvalidState(e.to_string()))?;

        let update = match request.method {
            PaymentMethod::Balance => StateUpdate::for_charge(charge.clone())
                .with_user(payer)
                .with_user(originator),
            PaymentMethod::Card => StateUpdate::for_charge(charge.clone()).with_user(originator),
        };
        self.store.commit(update).await?;

        get_metrics().record_charge_settled(request.method.as_str());
        info!(
            charge_id = %charge.id,
            method = request.method.as_str(),
            amount = %charge.amount,
            payer = %mask_cpf(charge.settlement.as_ref().map(|s| s.paid_by_cpf.as_str()).unwrap_or("")),
            "charge settled"
        );
        Ok(charge)
    }

    /// Credits external funds to the user's balance, gated by a single
    /// authorizer consultation. Returns the updated balance.
    pub async fn deposit(&self, user_id: Uuid, amount: Decimal) -> Result<Decimal> {
        if amount <= Decimal::ZERO {
            return Err(AppError::Validation(
                "deposit amount must be positive".to_string(),
            ));
        }

        // One consultation per deposit attempt. Commit retries below
        // reuse this verdict rather than asking again.
        if !self.authorizer.is_approved().await {
            return Err(AppError::DepositDeclined);
        }

        let mut attempt = 0;
        loop {
            match self.try_deposit(user_id, amount).await {
                Err(AppError::Conflict(reason)) if attempt + 1 < MAX_COMMIT_RETRIES => {
                    attempt += 1;
                    get_metrics().record_commit_conflict("deposit");
                    debug!(%user_id, attempt, reason, "commit conflict, retrying deposit");
                }
                other => return other,
            }
        }
    }

    async fn try_deposit(&self, user_id: Uuid, amount: Decimal) -> Result<Decimal> {
        let mut user = self
            .store
            .user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user '{user_id}' not found")))?;

        BalanceLedger::credit(&mut user, amount)
            .map_err(|err| AppError::InvalidState(err.to_string()))?;
        let balance = user.balance;

        self.store.commit(StateUpdate::for_user(user)).await?;
        get_metrics().record_deposit();
        info!(%user_id, %amount, "deposit credited");
        Ok(balance)
    }
}
