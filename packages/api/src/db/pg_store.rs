use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use store::{
    BirthdayStore, Category, CategoryInput, NewUser, Person, PersonInput, StoreError,
    StoreResult, User,
};
use uuid::Uuid;

/// PostgreSQL-backed BirthdayStore.
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    username: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            email: row.email,
            username: row.username,
            password_hash: row.password_hash,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct PersonRow {
    id: Uuid,
    name: String,
    birthday: NaiveDate,
    phone: Option<String>,
    email: Option<String>,
    address: Option<String>,
    notes: Option<String>,
    avatar: Option<String>,
    pinned: bool,
}

impl PersonRow {
    fn into_person(self, categories: Vec<Category>) -> Person {
        Person {
            id: self.id,
            name: self.name,
            birthday: self.birthday,
            phone: self.phone,
            email: self.email,
            address: self.address,
            notes: self.notes,
            avatar: self.avatar,
            categories,
            pinned: self.pinned,
        }
    }
}

/// Categories in creation order. `seq` breaks the tie `created_at` leaves
/// between rows inserted in one transaction.
const LIST_CATEGORIES: &str =
    "SELECT id, name, color FROM categories WHERE user_id = $1 ORDER BY seq";

#[derive(Debug, FromRow)]
struct CategoryRow {
    id: Uuid,
    name: String,
    color: String,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: row.id,
            name: row.name,
            color: row.color,
        }
    }
}

#[derive(Debug, FromRow)]
struct LinkRow {
    person_id: Uuid,
    id: Uuid,
    name: String,
    color: String,
}

const PERSON_COLUMNS: &str =
    "id, name, birthday, phone, email, address, notes, avatar, pinned";

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .map_or(false, |db| db.is_unique_violation())
}

impl PgStore {
    /// Resolve the categories of each row, keeping the order they were attached in.
    async fn with_categories(&self, rows: Vec<PersonRow>) -> StoreResult<Vec<Person>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let links: Vec<LinkRow> = sqlx::query_as(
            r#"
            SELECT pc.person_id, c.id, c.name, c.color
            FROM person_categories pc
            JOIN categories c ON c.id = pc.category_id
            WHERE pc.person_id = ANY($1)
            ORDER BY pc.position
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut by_person: HashMap<Uuid, Vec<Category>> = HashMap::new();
        for link in links {
            by_person.entry(link.person_id).or_default().push(Category {
                id: link.id,
                name: link.name,
                color: link.color,
            });
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let categories = by_person.remove(&row.id).unwrap_or_default();
                row.into_person(categories)
            })
            .collect())
    }

    async fn resolve_one(&self, row: PersonRow) -> StoreResult<Person> {
        self.with_categories(vec![row])
            .await?
            .pop()
            .ok_or(StoreError::NotFound)
    }

    /// Replace the category links of a person. Ids the owner does not own are skipped.
    async fn link_categories(
        tx: &mut Transaction<'_, Postgres>,
        owner: Uuid,
        person: Uuid,
        category_ids: &[Uuid],
    ) -> StoreResult<()> {
        sqlx::query("DELETE FROM person_categories WHERE person_id = $1")
            .bind(person)
            .execute(&mut **tx)
            .await
            .map_err(backend)?;

        for (position, category) in category_ids.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO person_categories (person_id, category_id, position)
                SELECT $1, c.id, $3 FROM categories c
                WHERE c.id = $2 AND c.user_id = $4
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(person)
            .bind(category)
            .bind(position as i32)
            .bind(owner)
            .execute(&mut **tx)
            .await
            .map_err(backend)?;
        }
        Ok(())
    }
}

#[async_trait]
impl BirthdayStore for PgStore {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let row: UserRow = sqlx::query_as(
            "INSERT INTO users (id, email, username, password_hash) VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Conflict("An account with this email already exists".to_string())
            } else {
                backend(e)
            }
        })?;
        Ok(row.into())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        Ok(row.map(User::from))
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        Ok(row.map(User::from))
    }

    async fn list_people(&self, owner: Uuid) -> StoreResult<Vec<Person>> {
        let rows: Vec<PersonRow> = sqlx::query_as(&format!(
            "SELECT {PERSON_COLUMNS} FROM people WHERE user_id = $1 ORDER BY seq"
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        self.with_categories(rows).await
    }

    async fn get_person(&self, owner: Uuid, id: Uuid) -> StoreResult<Person> {
        let row: PersonRow = sqlx::query_as(&format!(
            "SELECT {PERSON_COLUMNS} FROM people WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        .ok_or(StoreError::NotFound)?;
        self.resolve_one(row).await
    }

    async fn insert_person(&self, owner: Uuid, input: PersonInput) -> StoreResult<Person> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let row: PersonRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO people (id, user_id, name, birthday, phone, email, address, notes, avatar, pinned)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {PERSON_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(owner)
        .bind(&input.name)
        .bind(input.birthday)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(&input.address)
        .bind(&input.notes)
        .bind(&input.avatar)
        .bind(input.pinned.unwrap_or(false))
        .fetch_one(&mut *tx)
        .await
        .map_err(backend)?;

        Self::link_categories(&mut tx, owner, id, &input.category_ids).await?;
        tx.commit().await.map_err(backend)?;

        self.resolve_one(row).await
    }

    async fn update_person(
        &self,
        owner: Uuid,
        id: Uuid,
        input: PersonInput,
    ) -> StoreResult<Person> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let row: PersonRow = sqlx::query_as(&format!(
            r#"
            UPDATE people
            SET name = $3, birthday = $4, phone = $5, email = $6, address = $7, notes = $8,
                avatar = COALESCE($9, avatar), pinned = COALESCE($10, pinned)
            WHERE id = $1 AND user_id = $2
            RETURNING {PERSON_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(owner)
        .bind(&input.name)
        .bind(input.birthday)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(&input.address)
        .bind(&input.notes)
        .bind(&input.avatar)
        .bind(input.pinned)
        .fetch_optional(&mut *tx)
        .await
        .map_err(backend)?
        .ok_or(StoreError::NotFound)?;

        Self::link_categories(&mut tx, owner, id, &input.category_ids).await?;
        tx.commit().await.map_err(backend)?;

        self.resolve_one(row).await
    }

    async fn set_pinned(&self, owner: Uuid, id: Uuid, pinned: bool) -> StoreResult<Person> {
        let row: PersonRow = sqlx::query_as(&format!(
            "UPDATE people SET pinned = $3 WHERE id = $1 AND user_id = $2 RETURNING {PERSON_COLUMNS}"
        ))
        .bind(id)
        .bind(owner)
        .bind(pinned)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        .ok_or(StoreError::NotFound)?;
        self.resolve_one(row).await
    }

    async fn set_avatar(&self, owner: Uuid, id: Uuid, key: &str) -> StoreResult<Option<String>> {
        let previous: (Option<String>,) = sqlx::query_as(
            r#"
            UPDATE people p SET avatar = $3
            FROM (SELECT id, avatar FROM people WHERE id = $1 AND user_id = $2 FOR UPDATE) old
            WHERE p.id = old.id
            RETURNING old.avatar
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        .ok_or(StoreError::NotFound)?;
        Ok(previous.0)
    }

    async fn delete_person(&self, owner: Uuid, id: Uuid) -> StoreResult<Person> {
        let person = self.get_person(owner, id).await?;
        let result = sqlx::query("DELETE FROM people WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(person)
    }

    async fn list_categories(&self, owner: Uuid) -> StoreResult<Vec<Category>> {
        let rows: Vec<CategoryRow> = sqlx::query_as(LIST_CATEGORIES)
            .bind(owner)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        Ok(rows.into_iter().map(Category::from).collect())
    }

    async fn insert_category(&self, owner: Uuid, input: CategoryInput) -> StoreResult<Category> {
        let row: CategoryRow = sqlx::query_as(
            "INSERT INTO categories (id, user_id, name, color) VALUES ($1, $2, $3, $4) RETURNING id, name, color",
        )
        .bind(Uuid::new_v4())
        .bind(owner)
        .bind(&input.name)
        .bind(&input.color)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;
        Ok(row.into())
    }

    async fn insert_categories(
        &self,
        owner: Uuid,
        inputs: Vec<CategoryInput>,
    ) -> StoreResult<Vec<Category>> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let mut created = Vec::with_capacity(inputs.len());
        for input in inputs {
            let row: CategoryRow = sqlx::query_as(
                "INSERT INTO categories (id, user_id, name, color) VALUES ($1, $2, $3, $4) RETURNING id, name, color",
            )
            .bind(Uuid::new_v4())
            .bind(owner)
            .bind(&input.name)
            .bind(&input.color)
            .fetch_one(&mut *tx)
            .await
            .map_err(backend)?;
            created.push(Category::from(row));
        }
        tx.commit().await.map_err(backend)?;
        Ok(created)
    }

    async fn update_category(
        &self,
        owner: Uuid,
        id: Uuid,
        input: CategoryInput,
    ) -> StoreResult<Category> {
        let row: CategoryRow = sqlx::query_as(
            "UPDATE categories SET name = $3, color = $4 WHERE id = $1 AND user_id = $2 RETURNING id, name, color",
        )
        .bind(id)
        .bind(owner)
        .bind(&input.name)
        .bind(&input.color)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        .ok_or(StoreError::NotFound)?;
        Ok(row.into())
    }

    async fn delete_category(&self, owner: Uuid, id: Uuid) -> StoreResult<()> {
        // person_categories rows go with it through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM categories WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
