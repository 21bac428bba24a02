//! In-memory store used by unit tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{
    Account, AccountStore, Adopter, AdopterChanges, NewAdopter, NewShelter, Shelter,
    ShelterChanges, Taken, TokenRecord, TokenStore, UserRecord, WriteOutcome,
};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, UserRecord>,
    adopters: Vec<Adopter>,
    shelters: Vec<Shelter>,
    tokens: HashSet<String>,
}

impl Inner {
    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|user| user.email == email && Some(user.id) != except)
    }

    fn insert_user(&mut self, email: &str, password_hash: Option<String>, account: Account) -> Uuid {
        let user_id = Uuid::new_v4();
        self.users.insert(
            user_id,
            UserRecord {
                id: user_id,
                email: email.to_string(),
                password_hash,
                account: Some(account),
            },
        );
        user_id
    }

    fn update_user(&mut self, user_id: Uuid, email: Option<&String>, password_hash: Option<&String>) {
        if let Some(user) = self.users.get_mut(&user_id) {
            if let Some(email) = email {
                user.email.clone_from(email);
            }
            if let Some(hash) = password_hash {
                user.password_hash = Some(hash.clone());
            }
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))
    }

    /// Attach a profile to an existing user without a login-path guard,
    /// to model rows created outside the API.
    pub fn insert_user_record(&self, user: UserRecord) -> Result<()> {
        self.lock()?.users.insert(user.id, user);
        Ok(())
    }

    pub fn token_count(&self) -> Result<usize> {
        Ok(self.lock()?.tokens.len())
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn insert(&self, record: &TokenRecord) -> Result<()> {
        self.lock()?.tokens.insert(record.content.clone());
        Ok(())
    }

    async fn contains(&self, content: &str) -> Result<bool> {
        Ok(self.lock()?.tokens.contains(content))
    }

    async fn delete(&self, content: &str) -> Result<u64> {
        Ok(u64::from(self.lock()?.tokens.remove(content)))
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        self.lock().map(|_| ())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn find_user_by_google_id(&self, google_id: &str) -> Result<Option<UserRecord>> {
        let inner = self.lock()?;
        let user_id = inner
            .adopters
            .iter()
            .find(|adopter| adopter.google_id.as_deref() == Some(google_id))
            .map(|adopter| adopter.user_id);
        Ok(user_id.and_then(|id| inner.users.get(&id).cloned()))
    }

    async fn adopter(&self, id: Uuid) -> Result<Option<Adopter>> {
        Ok(self.lock()?.adopters.iter().find(|a| a.id == id).cloned())
    }

    async fn shelter(&self, id: Uuid) -> Result<Option<Shelter>> {
        Ok(self.lock()?.shelters.iter().find(|s| s.id == id).cloned())
    }

    async fn list_adopters(&self) -> Result<Vec<Adopter>> {
        Ok(self.lock()?.adopters.clone())
    }

    async fn list_shelters(&self) -> Result<Vec<Shelter>> {
        Ok(self.lock()?.shelters.clone())
    }

    async fn create_adopter(&self, adopter: NewAdopter) -> Result<WriteOutcome<Adopter>> {
        let mut inner = self.lock()?;
        let google_taken = adopter.google_id.as_ref().is_some_and(|google_id| {
            inner
                .adopters
                .iter()
                .any(|a| a.google_id.as_ref() == Some(google_id))
        });
        if inner.email_taken(&adopter.email, None) {
            return Ok(WriteOutcome::Conflict(Taken::Email));
        }
        if google_taken {
            return Ok(WriteOutcome::Conflict(Taken::GoogleAccount));
        }

        let id = Uuid::new_v4();
        let user_id = inner.insert_user(
            &adopter.email,
            adopter.password_hash.clone(),
            Account::Adopter(id),
        );
        let adopter = adopter.into_adopter(id, user_id);
        inner.adopters.push(adopter.clone());
        Ok(WriteOutcome::Written(adopter))
    }

    async fn create_shelter(&self, shelter: NewShelter) -> Result<WriteOutcome<Shelter>> {
        let mut inner = self.lock()?;
        if inner.email_taken(&shelter.email, None) {
            return Ok(WriteOutcome::Conflict(Taken::Email));
        }

        let id = Uuid::new_v4();
        let user_id = inner.insert_user(
            &shelter.email,
            Some(shelter.password_hash.clone()),
            Account::Shelter(id),
        );
        let shelter = shelter.into_shelter(id, user_id);
        inner.shelters.push(shelter.clone());
        Ok(WriteOutcome::Written(shelter))
    }

    async fn update_adopter(
        &self,
        id: Uuid,
        changes: AdopterChanges,
    ) -> Result<WriteOutcome<Adopter>> {
        let mut inner = self.lock()?;
        let Some(user_id) = inner.adopters.iter().find(|a| a.id == id).map(|a| a.user_id) else {
            return Ok(WriteOutcome::NotFound);
        };
        if let Some(email) = &changes.email {
            if inner.email_taken(email, Some(user_id)) {
                return Ok(WriteOutcome::Conflict(Taken::Email));
            }
        }
        inner.update_user(user_id, changes.email.as_ref(), changes.password_hash.as_ref());

        let Some(adopter) = inner.adopters.iter_mut().find(|a| a.id == id) else {
            return Ok(WriteOutcome::NotFound);
        };
        changes.apply(adopter);
        Ok(WriteOutcome::Written(adopter.clone()))
    }

    async fn update_shelter(
        &self,
        id: Uuid,
        changes: ShelterChanges,
    ) -> Result<WriteOutcome<Shelter>> {
        let mut inner = self.lock()?;
        let Some(user_id) = inner.shelters.iter().find(|s| s.id == id).map(|s| s.user_id) else {
            return Ok(WriteOutcome::NotFound);
        };
        if let Some(email) = &changes.email {
            if inner.email_taken(email, Some(user_id)) {
                return Ok(WriteOutcome::Conflict(Taken::Email));
            }
        }
        inner.update_user(user_id, changes.email.as_ref(), changes.password_hash.as_ref());

        let Some(shelter) = inner.shelters.iter_mut().find(|s| s.id == id) else {
            return Ok(WriteOutcome::NotFound);
        };
        changes.apply(shelter);
        Ok(WriteOutcome::Written(shelter.clone()))
    }

    async fn delete_adopter(&self, id: Uuid) -> Result<bool> {
        let mut inner = self.lock()?;
        let Some(index) = inner.adopters.iter().position(|a| a.id == id) else {
            return Ok(false);
        };
        let adopter = inner.adopters.remove(index);
        inner.users.remove(&adopter.user_id);
        Ok(true)
    }

    async fn delete_shelter(&self, id: Uuid) -> Result<bool> {
        let mut inner = self.lock()?;
        let Some(index) = inner.shelters.iter().position(|s| s.id == id) else {
            return Ok(false);
        };
        let shelter = inner.shelters.remove(index);
        inner.users.remove(&shelter.user_id);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shelter(email: &str) -> NewShelter {
        NewShelter {
            email: email.to_string(),
            password_hash: "$argon2id$stub".to_string(),
            name: "Happy Tails".to_string(),
            description: "Dogs and cats".to_string(),
            phone_number: "555-0100".to_string(),
            address: "1 Main St".to_string(),
            latitude: 40.0,
            longitude: -3.0,
        }
    }

    #[tokio::test]
    async fn create_links_user_to_profile() -> Result<()> {
        let store = MemoryStore::new();
        let WriteOutcome::Written(created) = store.create_shelter(shelter("a@b.co")).await? else {
            anyhow::bail!("expected written");
        };

        let user = store
            .find_user_by_email("a@b.co")
            .await?
            .ok_or_else(|| anyhow!("user missing"))?;
        assert_eq!(user.id, created.user_id);
        assert_eq!(user.account, Some(Account::Shelter(created.id)));
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() -> Result<()> {
        let store = MemoryStore::new();
        store.create_shelter(shelter("a@b.co")).await?;
        let outcome = store.create_shelter(shelter("a@b.co")).await?;
        assert!(matches!(outcome, WriteOutcome::Conflict(Taken::Email)));
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_google_account_conflicts() -> Result<()> {
        let store = MemoryStore::new();
        let adopter = |email: &str| NewAdopter {
            email: email.to_string(),
            password_hash: None,
            google_id: Some("g-1".to_string()),
            first_name: "Ana".to_string(),
            last_name: "Lopez".to_string(),
            age: 30,
            description: "Loves dogs".to_string(),
            house_type: "house".to_string(),
            has_pets: true,
            has_children: false,
            time_at_home: 4,
            latitude: 40.4,
            longitude: -3.7,
            address: "Calle Mayor 1".to_string(),
        };
        store.create_adopter(adopter("a@b.co")).await?;
        let outcome = store.create_adopter(adopter("c@d.co")).await?;
        assert!(matches!(outcome, WriteOutcome::Conflict(Taken::GoogleAccount)));
        Ok(())
    }

    #[tokio::test]
    async fn update_to_taken_email_conflicts() -> Result<()> {
        let store = MemoryStore::new();
        store.create_shelter(shelter("a@b.co")).await?;
        let WriteOutcome::Written(second) = store.create_shelter(shelter("c@d.co")).await? else {
            anyhow::bail!("expected written");
        };

        let changes = ShelterChanges {
            email: Some("a@b.co".to_string()),
            ..ShelterChanges::default()
        };
        let outcome = store.update_shelter(second.id, changes).await?;
        assert!(matches!(outcome, WriteOutcome::Conflict(Taken::Email)));

        let missing = store
            .update_shelter(Uuid::new_v4(), ShelterChanges::default())
            .await?;
        assert!(matches!(missing, WriteOutcome::NotFound));
        Ok(())
    }

    #[tokio::test]
    async fn delete_removes_owning_user() -> Result<()> {
        let store = MemoryStore::new();
        let WriteOutcome::Written(created) = store.create_shelter(shelter("a@b.co")).await? else {
            anyhow::bail!("expected written");
        };

        assert!(store.delete_shelter(created.id).await?);
        assert!(store.find_user_by_email("a@b.co").await?.is_none());
        assert!(!store.delete_shelter(created.id).await?);
        Ok(())
    }

    #[tokio::test]
    async fn token_delete_is_idempotent() -> Result<()> {
        let store = MemoryStore::new();
        let record = TokenRecord {
            id: Uuid::new_v4(),
            content: "abc".to_string(),
        };
        store.insert(&record).await?;
        assert!(store.contains("abc").await?);
        assert_eq!(store.delete("abc").await?, 1);
        assert_eq!(store.delete("abc").await?, 0);
        Ok(())
    }
}
