#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use charge_gateway::gateway::AuthorizerGateway;
use charge_gateway::models::{Cpf, User};
use charge_gateway::repositories::{InMemoryStore, UserRepository};
use charge_gateway::services::{ChargeService, PaymentService};

pub const CPF_ALICE: &str = "52998224725";
pub const CPF_BOB: &str = "18609139034";
pub const CPF_CAROL: &str = "52601815906";
pub const CPF_DAVE: &str = "08301661305";

/// Fully wired engines over one shared in-memory store, with the
/// authorizer outcome chosen per test.
pub struct TestGateway {
    pub store: Arc<InMemoryStore>,
    pub charges: ChargeService,
    pub payments: PaymentService,
}

impl TestGateway {
    pub fn new(authorizer: Arc<dyn AuthorizerGateway>) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let charges = ChargeService::new(store.clone(), authorizer.clone());
        let payments = PaymentService::new(store.clone(), authorizer);
        Self {
            store,
            charges,
            payments,
        }
    }

    pub async fn register_user(&self, name: &str, cpf: &str, balance: Decimal) -> User {
        let user = User::with_balance(
            name,
            Cpf::parse(cpf).unwrap(),
            format!("{cpf}@example.com"),
            "hash",
            balance,
        );
        self.store.insert_user(&user).await.unwrap();
        user
    }

    pub async fn balance_of(&self, user: &User) -> Decimal {
        self.store
            .user_by_id(user.id)
            .await
            .unwrap()
            .unwrap()
            .balance
    }
}

/// Authorizer that replays a scripted sequence of verdicts, then keeps
/// repeating the last one. Lets a test approve the settlement and
/// decline the reversal, or vice versa.
pub struct ScriptedAuthorizer {
    outcomes: Mutex<VecDeque<bool>>,
    fallback: bool,
}

impl ScriptedAuthorizer {
    pub fn new(outcomes: impl IntoIterator<Item = bool>) -> Self {
        let outcomes: VecDeque<bool> = outcomes.into_iter().collect();
        let fallback = outcomes.back().copied().unwrap_or(false);
        Self {
            outcomes: Mutex::new(outcomes),
            fallback,
        }
    }
}

#[async_trait]
impl AuthorizerGateway for ScriptedAuthorizer {
    async fn is_approved(&self) -> bool {
        self.outcomes
            .lock()
            .await
            .pop_front()
            .unwrap_or(self.fallback)
    }
}
