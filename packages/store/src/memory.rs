use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::models::{Category, CategoryInput, NewUser, Person, PersonInput, User};
use crate::repo::{BirthdayStore, StoreError, StoreResult};

/// In-memory BirthdayStore for testing and local runs without a database.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    users: Vec<User>,
    people: Vec<PersonRecord>,
    categories: Vec<CategoryRecord>,
}

/// People keep category ids and are resolved on read, so renames show up everywhere.
#[derive(Clone, Debug)]
struct PersonRecord {
    owner: Uuid,
    id: Uuid,
    input: PersonInput,
}

#[derive(Clone, Debug)]
struct CategoryRecord {
    owner: Uuid,
    category: Category,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Inner {
    fn owned_categories(&self, owner: Uuid) -> Vec<Category> {
        self.categories
            .iter()
            .filter(|c| c.owner == owner)
            .map(|c| c.category.clone())
            .collect()
    }

    fn resolve(&self, record: &PersonRecord) -> Person {
        let owned = self.owned_categories(record.owner);
        Person::from_input(record.id, record.input.clone(), &owned)
    }

    /// Drop category ids the owner does not have.
    fn retain_owned(&self, owner: Uuid, input: &mut PersonInput) {
        let owned = self.owned_categories(owner);
        input.category_ids = crate::models::resolve_categories(&input.category_ids, &owned)
            .into_iter()
            .map(|c| c.id)
            .collect();
    }

    fn person_mut(&mut self, owner: Uuid, id: Uuid) -> StoreResult<&mut PersonRecord> {
        self.people
            .iter_mut()
            .find(|p| p.owner == owner && p.id == id)
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl BirthdayStore for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut inner = self.inner.lock().unwrap();
        if inner.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(
                "An account with this email already exists".to_string(),
            ));
        }
        let user = User {
            id: Uuid::new_v4(),
            email: user.email,
            username: user.username,
            password_hash: user.password_hash,
            created_at: Utc::now(),
        };
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.iter().find(|u| u.id == id).cloned())
    }

    async fn list_people(&self, owner: Uuid) -> StoreResult<Vec<Person>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .people
            .iter()
            .filter(|p| p.owner == owner)
            .map(|p| inner.resolve(p))
            .collect())
    }

    async fn get_person(&self, owner: Uuid, id: Uuid) -> StoreResult<Person> {
        let inner = self.inner.lock().unwrap();
        inner
            .people
            .iter()
            .find(|p| p.owner == owner && p.id == id)
            .map(|p| inner.resolve(p))
            .ok_or(StoreError::NotFound)
    }

    async fn insert_person(&self, owner: Uuid, mut input: PersonInput) -> StoreResult<Person> {
        let mut inner = self.inner.lock().unwrap();
        inner.retain_owned(owner, &mut input);
        input.pinned = Some(input.pinned.unwrap_or(false));
        let record = PersonRecord {
            owner,
            id: Uuid::new_v4(),
            input,
        };
        let person = inner.resolve(&record);
        inner.people.push(record);
        Ok(person)
    }

    async fn update_person(
        &self,
        owner: Uuid,
        id: Uuid,
        mut input: PersonInput,
    ) -> StoreResult<Person> {
        let mut inner = self.inner.lock().unwrap();
        inner.retain_owned(owner, &mut input);
        let record = inner.person_mut(owner, id)?;
        if input.pinned.is_none() {
            input.pinned = record.input.pinned;
        }
        if input.avatar.is_none() {
            input.avatar = record.input.avatar.clone();
        }
        record.input = input;
        let record = record.clone();
        Ok(inner.resolve(&record))
    }

    async fn set_pinned(&self, owner: Uuid, id: Uuid, pinned: bool) -> StoreResult<Person> {
        let mut inner = self.inner.lock().unwrap();
        let record = inner.person_mut(owner, id)?;
        record.input.pinned = Some(pinned);
        let record = record.clone();
        Ok(inner.resolve(&record))
    }

    async fn set_avatar(&self, owner: Uuid, id: Uuid, key: &str) -> StoreResult<Option<String>> {
        let mut inner = self.inner.lock().unwrap();
        let record = inner.person_mut(owner, id)?;
        Ok(record.input.avatar.replace(key.to_string()))
    }

    async fn delete_person(&self, owner: Uuid, id: Uuid) -> StoreResult<Person> {
        let mut inner = self.inner.lock().unwrap();
        let index = inner
            .people
            .iter()
            .position(|p| p.owner == owner && p.id == id)
            .ok_or(StoreError::NotFound)?;
        let person = inner.resolve(&inner.people[index]);
        inner.people.remove(index);
        Ok(person)
    }

    async fn list_categories(&self, owner: Uuid) -> StoreResult<Vec<Category>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.owned_categories(owner))
    }

    async fn insert_category(&self, owner: Uuid, input: CategoryInput) -> StoreResult<Category> {
        let mut created = self.insert_categories(owner, vec![input]).await?;
        created.pop().ok_or(StoreError::NotFound)
    }

    async fn insert_categories(
        &self,
        owner: Uuid,
        inputs: Vec<CategoryInput>,
    ) -> StoreResult<Vec<Category>> {
        let mut inner = self.inner.lock().unwrap();
        let created: Vec<Category> = inputs
            .into_iter()
            .map(|input| Category {
                id: Uuid::new_v4(),
                name: input.name,
                color: input.color,
            })
            .collect();
        inner
            .categories
            .extend(created.iter().cloned().map(|category| CategoryRecord { owner, category }));
        Ok(created)
    }

    async fn update_category(
        &self,
        owner: Uuid,
        id: Uuid,
        input: CategoryInput,
    ) -> StoreResult<Category> {
        let mut inner = self.inner.lock().unwrap();
        let record = inner
            .categories
            .iter_mut()
            .find(|c| c.owner == owner && c.category.id == id)
            .ok_or(StoreError::NotFound)?;
        record.category.name = input.name;
        record.category.color = input.color;
        Ok(record.category.clone())
    }

    async fn delete_category(&self, owner: Uuid, id: Uuid) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.categories.len();
        inner
            .categories
            .retain(|c| !(c.owner == owner && c.category.id == id));
        if inner.categories.len() == before {
            return Err(StoreError::NotFound);
        }
        for person in inner.people.iter_mut().filter(|p| p.owner == owner) {
            person.input.category_ids.retain(|c| *c != id);
        }
        Ok(())
    }
}
