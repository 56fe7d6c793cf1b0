use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Charge, ChargeStatus, Cpf, User};

/// Lookup and insertion for the User aggregate. Registration itself is
/// owned by the excluded auth collaborator; the engines only resolve and
/// persist users through this seam.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn user_by_cpf(&self, cpf: &Cpf) -> Result<Option<User>>;
    async fn user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn insert_user(&self, user: &User) -> Result<()>;
}

/// Lookup and insertion for the Charge aggregate. List queries return
/// charges in the store's insertion order.
#[async_trait]
pub trait ChargeRepository: Send + Sync {
    async fn charge_by_id(&self, id: Uuid) -> Result<Option<Charge>>;
    async fn charges_by_originator(
        &self,
        originator_id: Uuid,
        status: ChargeStatus,
    ) -> Result<Vec<Charge>>;
    async fn charges_by_recipient(
        &self,
        recipient_id: Uuid,
        status: ChargeStatus,
    ) -> Result<Vec<Charge>>;
    async fn insert_charge(&self, charge: &Charge) -> Result<()>;
}

/// One atomic unit of mutated state: at most one charge and the users
/// whose balances the operation touched. Either everything in the update
/// is persisted or nothing is.
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub charge: Option<Charge>,
    pub users: Vec<User>,
}

impl StateUpdate {
    pub fn for_charge(charge: Charge) -> Self {
        Self {
            charge: Some(charge),
            users: Vec::new(),
        }
    }

    pub fn for_user(user: User) -> Self {
        Self {
            charge: None,
            users: vec![user],
        }
    }

    pub fn with_user(mut self, user: User) -> Self {
        self.users.push(user);
        self
    }
}

/// The transactional store the engines persist through. `commit` checks
/// the version of every entity in the update against the stored one
/// (each mutation bumps an entity's version exactly once) and applies
/// all mutations under a single write section, or fails with
/// `AppError::Conflict` applying none. Engines retry on conflict after
/// reloading.
#[async_trait]
pub trait GatewayStore: UserRepository + ChargeRepository {
    async fn commit(&self, update: StateUpdate) -> Result<()>;
}
