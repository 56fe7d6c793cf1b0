use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Charge, ChargeStatus, Cpf, User};

use super::store::{ChargeRepository, GatewayStore, StateUpdate, UserRepository};

/// In-memory transactional store. A single `RwLock` over the whole state
/// makes `commit` an atomic section: version checks and mutations happen
/// under one write guard, so no reader ever observes a half-applied
/// operation.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    users_by_cpf: HashMap<Cpf, Uuid>,
    charges: HashMap<Uuid, Charge>,
    /// Insertion order, backing the "store natural order" guarantee of
    /// the list queries.
    charge_order: Vec<Uuid>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.get(&id).cloned())
    }

    async fn user_by_cpf(&self, cpf: &Cpf) -> Result<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users_by_cpf
            .get(cpf)
            .and_then(|id| inner.users.get(id))
            .cloned())
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn insert_user(&self, user: &User) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.users.contains_key(&user.id) || inner.users_by_cpf.contains_key(&user.cpf) {
            return Err(AppError::Validation(format!(
                "user with CPF '{}' already registered",
                user.cpf
            )));
        }
        if inner.users.values().any(|u| u.email == user.email) {
            return Err(AppError::Validation(format!(
                "email '{}' already registered",
                user.email
            )));
        }
        inner.users_by_cpf.insert(user.cpf.clone(), user.id);
        inner.users.insert(user.id, user.clone());
        Ok(())
    }
}

#[async_trait]
impl ChargeRepository for InMemoryStore {
    async fn charge_by_id(&self, id: Uuid) -> Result<Option<Charge>> {
        let inner = self.inner.read().await;
        Ok(inner.charges.get(&id).cloned())
    }

    async fn charges_by_originator(
        &self,
        originator_id: Uuid,
        status: ChargeStatus,
    ) -> Result<Vec<Charge>> {
        let inner = self.inner.read().await;
        Ok(inner
            .charge_order
            .iter()
            .filter_map(|id| inner.charges.get(id))
            .filter(|c| c.originator_id == originator_id && c.status == status)
            .cloned()
            .collect())
    }

    async fn charges_by_recipient(
        &self,
        recipient_id: Uuid,
        status: ChargeStatus,
    ) -> Result<Vec<Charge>> {
        let inner = self.inner.read().await;
        Ok(inner
            .charge_order
            .iter()
            .filter_map(|id| inner.charges.get(id))
            .filter(|c| c.recipient_id == recipient_id && c.status == status)
            .cloned()
            .collect())
    }

    async fn insert_charge(&self, charge: &Charge) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.charges.contains_key(&charge.id) {
            return Err(AppError::Validation(format!(
                "charge '{}' already exists",
                charge.id
            )));
        }
        inner.charge_order.push(charge.id);
        inner.charges.insert(charge.id, charge.clone());
        Ok(())
    }
}

#[async_trait]
impl GatewayStore for InMemoryStore {
    async fn commit(&self, update: StateUpdate) -> Result<()> {
        let mut inner = self.inner.write().await;

        // Verify everything before mutating anything.
        if let Some(charge) = &update.charge {
            let stored = inner.charges.get(&charge.id).ok_or_else(|| {
                AppError::InvalidState(format!("charge '{}' vanished from the store", charge.id))
            })?;
            if stored.version + 1 != charge.version {
                return Err(AppError::Conflict(format!(
                    "charge '{}' was modified concurrently (stored v{}, incoming v{})",
                    charge.id, stored.version, charge.version
                )));
            }
        }
        for user in &update.users {
            let stored = inner.users.get(&user.id).ok_or_else(|| {
                AppError::InvalidState(format!("user '{}' vanished from the store", user.id))
            })?;
            if stored.version + 1 != user.version {
                return Err(AppError::Conflict(format!(
                    "user '{}' was modified concurrently (stored v{}, incoming v{})",
                    user.id, stored.version, user.version
                )));
            }
            if user.balance < Decimal::ZERO {
                return Err(AppError::InvalidState(format!(
                    "refusing to persist negative balance {} for user '{}'",
                    user.balance, user.id
                )));
            }
        }

        if let Some(charge) = update.charge {
            inner.charges.insert(charge.id, charge);
        }
        for user in update.users {
            inner.users.insert(user.id, user);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn user(cpf: &str, balance: Decimal) -> User {
        User::with_balance(
            "Test",
            Cpf::parse(cpf).unwrap(),
            format!("{cpf}@example.com"),
            "hash",
            balance,
        )
    }

    #[tokio::test]
    async fn test_user_lookup_by_id_and_cpf() {
        let store = InMemoryStore::new();
        let alice = user("52998224725", dec!(100));
        store.insert_user(&alice).await.unwrap();

        assert_eq!(
            store.user_by_id(alice.id).await.unwrap().unwrap().id,
            alice.id
        );
        assert_eq!(
            store.user_by_cpf(&alice.cpf).await.unwrap().unwrap().id,
            alice.id
        );
        assert!(store
            .user_by_cpf(&Cpf::parse("18609139034").unwrap())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_duplicate_cpf_rejected() {
        let store = InMemoryStore::new();
        let alice = user("52998224725", dec!(0));
        let mut clone = user("52998224725", dec!(0));
        clone.email = "other@example.com".to_string();

        store.insert_user(&alice).await.unwrap();
        let err = store.insert_user(&clone).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION");
    }

    #[tokio::test]
    async fn test_charge_listing_keeps_insertion_order() {
        let store = InMemoryStore::new();
        let alice = user("52998224725", dec!(0));
        let bob = user("18609139034", dec!(0));
        store.insert_user(&alice).await.unwrap();
        store.insert_user(&bob).await.unwrap();

        let first = Charge::new(&alice, &bob, dec!(10), None);
        let second = Charge::new(&alice, &bob, dec!(20), None);
        store.insert_charge(&first).await.unwrap();
        store.insert_charge(&second).await.unwrap();

        let sent = store
            .charges_by_originator(alice.id, ChargeStatus::Pending)
            .await
            .unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].id, first.id);
        assert_eq!(sent[1].id, second.id);

        let received = store
            .charges_by_recipient(bob.id, ChargeStatus::Pending)
            .await
            .unwrap();
        assert_eq!(received.len(), 2);

        assert!(store
            .charges_by_recipient(alice.id, ChargeStatus::Pending)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_commit_detects_stale_version() {
        let store = InMemoryStore::new();
        let alice = user("52998224725", dec!(100));
        store.insert_user(&alice).await.unwrap();

        // Two copies loaded at the same version, both mutated.
        let mut first = store.user_by_id(alice.id).await.unwrap().unwrap();
        let mut second = store.user_by_id(alice.id).await.unwrap().unwrap();
        first.credit(dec!(10));
        second.credit(dec!(20));

        store.commit(StateUpdate::for_user(first)).await.unwrap();
        let err = store
            .commit(StateUpdate::for_user(second))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CONFLICT");

        let balance = store.user_by_id(alice.id).await.unwrap().unwrap().balance;
        assert_eq!(balance, dec!(110));
    }

    #[tokio::test]
    async fn test_commit_is_all_or_nothing() {
        let store = InMemoryStore::new();
        let alice = user("52998224725", dec!(100));
        let bob = user("18609139034", dec!(50));
        store.insert_user(&alice).await.unwrap();
        store.insert_user(&bob).await.unwrap();

        let mut fresh_alice = store.user_by_id(alice.id).await.unwrap().unwrap();
        fresh_alice.credit(dec!(10));
        let mut stale_bob = store.user_by_id(bob.id).await.unwrap().unwrap();
        stale_bob.credit(dec!(10));
        // Make bob's copy stale.
        let mut winner = store.user_by_id(bob.id).await.unwrap().unwrap();
        winner.credit(dec!(1));
        store.commit(StateUpdate::for_user(winner)).await.unwrap();

        let err = store
            .commit(StateUpdate::for_user(fresh_alice).with_user(stale_bob))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CONFLICT");

        // Alice's fresh mutation must not have been applied either.
        let balance = store.user_by_id(alice.id).await.unwrap().unwrap().balance;
        assert_eq!(balance, dec!(100));
    }

    #[tokio::test]
    async fn test_commit_refuses_negative_balance() {
        let store = InMemoryStore::new();
        let alice = user("52998224725", dec!(100));
        store.insert_user(&alice).await.unwrap();

        let mut broken = store.user_by_id(alice.id).await.unwrap().unwrap();
        broken.balance = dec!(-5);
        broken.version += 1;

        let err = store.commit(StateUpdate::for_user(broken)).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_STATE");
    }
}
