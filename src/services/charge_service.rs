use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::gateway::AuthorizerGateway;
use crate::models::{Charge, ChargeStatus, Cpf, PaymentMethod, User};
use crate::observability::get_metrics;
use crate::repositories::{GatewayStore, StateUpdate};

use super::ledger::{BalanceLedger, LedgerError};
use super::MAX_COMMIT_RETRIES;

/// Request to create a charge against a recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChargeRequest {
    pub recipient_cpf: Cpf,
    pub amount: Decimal,
    pub description: Option<String>,
}

/// The charge lifecycle engine: creation, querying, and the
/// cancellation/reversal state machine.
pub struct ChargeService {
    store: Arc<dyn GatewayStore>,
    authorizer: Arc<dyn AuthorizerGateway>,
}

impl ChargeService {
    pub fn new(store: Arc<dyn GatewayStore>, authorizer: Arc<dyn AuthorizerGateway>) -> Self {
        Self { store, authorizer }
    }

    /// Creates a pending charge from the originator against the user
    /// identified by the request's CPF. No balance effect.
    pub async fn create(
        &self,
        originator_id: Uuid,
        request: CreateChargeRequest,
    ) -> Result<Charge> {
        if request.amount <= Decimal::ZERO {
            return Err(AppError::Validation(
                "charge amount must be positive".to_string(),
            ));
        }

        let originator = self.require_user(originator_id).await?;
        let recipient = self
            .store
            .user_by_cpf(&request.recipient_cpf)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "recipient with CPF '{}' not found",
                    request.recipient_cpf
                ))
            })?;

        if originator.cpf == recipient.cpf {
            return Err(AppError::SelfChargeNotAllowed);
        }

        let charge = Charge::new(&originator, &recipient, request.amount, request.description);
        self.store.insert_charge(&charge).await?;
        get_metrics().record_charge_created();
        info!(charge_id = %charge.id, amount = %charge.amount, "charge created");
        Ok(charge)
    }

    /// Charges the user originated, filtered by exact status, in the
    /// store's insertion order.
    pub async fn list_sent(
        &self,
        originator_id: Uuid,
        status: ChargeStatus,
    ) -> Result<Vec<Charge>> {
        self.require_user(originator_id).await?;
        self.store
            .charges_by_originator(originator_id, status)
            .await
    }

    /// Charges addressed to the user, filtered by exact status.
    pub async fn list_received(
        &self,
        recipient_id: Uuid,
        status: ChargeStatus,
    ) -> Result<Vec<Charge>> {
        self.require_user(recipient_id).await?;
        self.store.charges_by_recipient(recipient_id, status).await
    }

    /// Cancels a charge on behalf of the requester. Only the originator
    /// may cancel, regardless of status. Cancelling a paid charge also
    /// reverses its settlement.
    pub async fn cancel(&self, charge_id: Uuid, requester_id: Uuid) -> Result<Charge> {
        let mut attempt = 0;
        loop {
            match self.try_cancel(charge_id, requester_id).await {
                Err(AppError::Conflict(reason)) if attempt + 1 < MAX_COMMIT_RETRIES => {
                    attempt += 1;
                    get_metrics().record_commit_conflict("cancel");
                    debug!(%charge_id, attempt, reason, "commit conflict, retrying cancellation");
                }
                other => return other,
            }
        }
    }

    async fn try_cancel(&self, charge_id: Uuid, requester_id: Uuid) -> Result<Charge> {
        let mut charge = self
            .store
            .charge_by_id(charge_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("charge '{charge_id}' not found")))?;
        let requester = self.require_user(requester_id).await?;

        if requester.cpf != charge.originator_cpf {
            return Err(AppError::NotOriginator);
        }

        match charge.status {
            ChargeStatus::Cancelled => Err(AppError::AlreadyCancelled),
            ChargeStatus::Pending => {
                charge
                    .cancel()
                    .map_err(|e| AppError::InvalidState(e.to_string()))?;
                self.store
                    .commit(StateUpdate::for_charge(charge.clone()))
                    .await?;
                get_metrics().record_charge_cancelled(None);
                info!(charge_id = %charge.id, "pending charge cancelled");
                Ok(charge)
            }
            ChargeStatus::Paid => self.reverse_settlement(charge).await,
        }
    }

    /// Undoes exactly what settlement did, branching on how the charge
    /// was originally paid. A balance settlement is reversed by an
    /// internal transfer back to the payer; a card settlement by pulling
    /// the injected funds from the originator only, after a second,
    /// independent authorizer approval.
    async fn reverse_settlement(&self, mut charge: Charge) -> Result<Charge> {
        let settlement = charge.settlement.clone().ok_or_else(|| {
            warn!(charge_id = %charge.id, "paid charge has no settlement record");
            AppError::UnknownPaymentMethod
        })?;

        let mut originator = self
            .store
            .user_by_id(charge.originator_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("originator of charge '{}' not found", charge.id))
            })?;

        let update = match settlement.method {
            PaymentMethod::Balance => {
                let mut payer = self
                    .store
                    .user_by_cpf(&settlement.paid_by_cpf)
                    .await?
                    .ok_or_else(|| {
                        AppError::NotFound(format!(
                            "payer with CPF '{}' not found",
                            settlement.paid_by_cpf
                        ))
                    })?;
                BalanceLedger::transfer(&mut originator, &mut payer, charge.amount)
                    .map_err(reversal_error)?;
                charge
                    .cancel()
                    .map_err(|e| AppError::InvalidState(e.to_string()))?;
                StateUpdate::for_charge(charge.clone())
                    .with_user(originator)
                    .with_user(payer)
            }
            PaymentMethod::Card => {
                if !self.authorizer.is_approved().await {
                    return Err(AppError::AuthorizerDeclined);
                }
                // The payer's balance was never touched by the card
                // settlement, so there is no counterpart credit here.
                BalanceLedger::debit(&mut originator, charge.amount).map_err(reversal_error)?;
                charge
                    .cancel()
                    .map_err(|e| AppError::InvalidState(e.to_string()))?;
                StateUpdate::for_charge(charge.clone()).with_user(originator)
            }
        };

        self.store.commit(update).await?;
        get_metrics().record_charge_cancelled(Some(settlement.method.as_str()));
        info!(
            charge_id = %charge.id,
            method = settlement.method.as_str(),
            "paid charge cancelled, settlement reversed"
        );
        Ok(charge)
    }

    async fn require_user(&self, id: Uuid) -> Result<User> {
        self.store
            .user_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user '{id}' not found")))
    }
}

fn reversal_error(err: LedgerError) -> AppError {
    match err {
        LedgerError::InsufficientFunds {
            requested,
            available,
        } => AppError::InsufficientFundsForReversal {
            requested,
            available,
        },
        other => AppError::InvalidState(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockAuthorizerGateway;
    use crate::repositories::{ChargeRepository, InMemoryStore, UserRepository};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    async fn setup(authorizer: MockAuthorizerGateway) -> (Arc<InMemoryStore>, ChargeService) {
        let store = Arc::new(InMemoryStore::new());
        let service = ChargeService::new(store.clone(), Arc::new(authorizer));
        (store, service)
    }

    async fn register(store: &InMemoryStore, cpf: &str, balance: Decimal) -> User {
        let user = User::with_balance(
            "Test",
            Cpf::parse(cpf).unwrap(),
            format!("{cpf}@example.com"),
            "hash",
            balance,
        );
        store.insert_user(&user).await.unwrap();
        user
    }

    #[tokio::test]
    async fn test_create_rejects_self_charge() {
        let (store, service) = setup(MockAuthorizerGateway::new()).await;
        let alice = register(&store, "52998224725", dec!(0)).await;

        let err = service
            .create(
                alice.id,
                CreateChargeRequest {
                    recipient_cpf: alice.cpf.clone(),
                    amount: dec!(10),
                    description: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "SELF_CHARGE_NOT_ALLOWED");
    }

    #[tokio::test]
    async fn test_create_rejects_non_positive_amount() {
        let (store, service) = setup(MockAuthorizerGateway::new()).await;
        let alice = register(&store, "52998224725", dec!(0)).await;
        let bob = register(&store, "18609139034", dec!(0)).await;

        let err = service
            .create(
                alice.id,
                CreateChargeRequest {
                    recipient_cpf: bob.cpf.clone(),
                    amount: Decimal::ZERO,
                    description: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION");
    }

    #[tokio::test]
    async fn test_cancel_requires_originator() {
        let (store, service) = setup(MockAuthorizerGateway::new()).await;
        let alice = register(&store, "52998224725", dec!(0)).await;
        let bob = register(&store, "18609139034", dec!(0)).await;

        let charge = service
            .create(
                alice.id,
                CreateChargeRequest {
                    recipient_cpf: bob.cpf.clone(),
                    amount: dec!(10),
                    description: None,
                },
            )
            .await
            .unwrap();

        let err = service.cancel(charge.id, bob.id).await.unwrap_err();
        assert_eq!(err.code(), "NOT_ORIGINATOR");
    }

    #[tokio::test]
    async fn test_card_reversal_declined_leaves_state_unchanged() {
        let mut authorizer = MockAuthorizerGateway::new();
        authorizer.expect_is_approved().times(1).return_const(false);
        let (store, service) = setup(authorizer).await;
        let alice = register(&store, "52998224725", dec!(0)).await;
        let bob = register(&store, "18609139034", dec!(0)).await;

        let charge = service
            .create(
                alice.id,
                CreateChargeRequest {
                    recipient_cpf: bob.cpf.clone(),
                    amount: dec!(100),
                    description: None,
                },
            )
            .await
            .unwrap();

        // Settle the charge by card directly through the store, then
        // credit the originator the way a card settlement would.
        let mut paid = store.charge_by_id(charge.id).await.unwrap().unwrap();
        paid.settle(PaymentMethod::Card, bob.cpf.clone(), Utc::now())
            .unwrap();
        let mut originator = store.user_by_id(alice.id).await.unwrap().unwrap();
        originator.credit(dec!(100));
        store
            .commit(StateUpdate::for_charge(paid).with_user(originator))
            .await
            .unwrap();

        let err = service.cancel(charge.id, alice.id).await.unwrap_err();
        assert_eq!(err.code(), "AUTHORIZER_DECLINED");

        let after = store.charge_by_id(charge.id).await.unwrap().unwrap();
        assert_eq!(after.status, ChargeStatus::Paid);
        let balance = store.user_by_id(alice.id).await.unwrap().unwrap().balance;
        assert_eq!(balance, dec!(100));
    }

    #[tokio::test]
    async fn test_cancel_paid_charge_without_settlement_record() {
        let (store, service) = setup(MockAuthorizerGateway::new()).await;
        let alice = register(&store, "52998224725", dec!(0)).await;
        let bob = register(&store, "18609139034", dec!(0)).await;

        let charge = service
            .create(
                alice.id,
                CreateChargeRequest {
                    recipient_cpf: bob.cpf.clone(),
                    amount: dec!(50),
                    description: None,
                },
            )
            .await
            .unwrap();

        // Corrupt the stored charge: mark it paid without the
        // settlement record that settle() would have written.
        let mut broken = store.charge_by_id(charge.id).await.unwrap().unwrap();
        broken.status = ChargeStatus::Paid;
        broken.version += 1;
        store
            .commit(StateUpdate::for_charge(broken))
            .await
            .unwrap();

        let err = service.cancel(charge.id, alice.id).await.unwrap_err();
        assert_eq!(err.code(), "UNKNOWN_PAYMENT_METHOD");

        let after = store.charge_by_id(charge.id).await.unwrap().unwrap();
        assert_eq!(after.status, ChargeStatus::Paid);
    }
}
