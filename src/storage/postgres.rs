//! `PostgreSQL` implementation of the store traits.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    Connection, PgPool, Row,
};
use std::time::Duration;
use tracing::{info_span, Instrument, Span};
use uuid::Uuid;

use super::{
    Account, AccountStore, Adopter, AdopterChanges, NewAdopter, NewShelter, Shelter,
    ShelterChanges, Taken, TokenRecord, TokenStore, UserRecord, WriteOutcome,
};

pub const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

const USER_SELECT: &str = r"
    SELECT u.id, u.email, u.password, a.id AS adopter_id, s.id AS shelter_id
    FROM users u
    LEFT JOIN adopters a ON a.user_id = u.id
    LEFT JOIN shelters s ON s.user_id = u.id
";

const ADOPTER_SELECT: &str = r"
    SELECT a.id, a.user_id, u.email, a.google_id, a.first_name, a.last_name, a.age,
           a.description, a.house_type, a.has_pets, a.has_children, a.time_at_home,
           a.latitude, a.longitude, a.address
    FROM adopters a
    JOIN users u ON u.id = a.user_id
";

const SHELTER_SELECT: &str = r"
    SELECT s.id, s.user_id, u.email, s.name, s.description, s.phone_number, s.address,
           s.latitude, s.longitude
    FROM shelters s
    JOIN users u ON u.id = s.user_id
";

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn db_span(operation: &'static str, statement: &str) -> Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

/// Open the connection pool and make sure the schema exists.
///
/// # Errors
/// Returns an error if the database is unreachable or the schema fails.
pub async fn connect(dsn: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(dsn)
        .await
        .context("Failed to connect to database")?;

    apply_schema(&pool)
        .await
        .context("Failed to apply database schema")?;

    Ok(pool)
}

/// Apply the bundled schema. Every statement is idempotent.
///
/// # Errors
/// Returns an error if any statement fails.
pub async fn apply_schema(pool: &PgPool) -> Result<()> {
    for (index, statement) in split_sql_statements(SCHEMA_SQL).iter().enumerate() {
        sqlx::query(statement)
            .execute(pool)
            .instrument(db_span("DDL", statement))
            .await
            .with_context(|| format!("failed to execute schema statement {}", index + 1))?;
    }

    Ok(())
}

fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn user_from_row(row: &PgRow) -> Result<UserRecord> {
    Ok(UserRecord {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password")?,
        account: Account::from_associations(row.try_get("adopter_id")?, row.try_get("shelter_id")?),
    })
}

fn adopter_from_row(row: &PgRow) -> Result<Adopter> {
    Ok(Adopter {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        email: row.try_get("email")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        age: row.try_get("age")?,
        description: row.try_get("description")?,
        house_type: row.try_get("house_type")?,
        has_pets: row.try_get("has_pets")?,
        has_children: row.try_get("has_children")?,
        time_at_home: row.try_get("time_at_home")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        address: row.try_get("address")?,
        google_id: row.try_get("google_id")?,
    })
}

fn shelter_from_row(row: &PgRow) -> Result<Shelter> {
    Ok(Shelter {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        phone_number: row.try_get("phone_number")?,
        address: row.try_get("address")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
    })
}

async fn insert_user(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    email: &str,
    password_hash: Option<&str>,
) -> Result<Option<Uuid>> {
    let user_id = Uuid::new_v4();
    let query = "INSERT INTO users (id, email, password) VALUES ($1, $2, $3)";
    let result = sqlx::query(query)
        .bind(user_id)
        .bind(email)
        .bind(password_hash)
        .execute(&mut **tx)
        .instrument(db_span("INSERT", query))
        .await;

    match result {
        Ok(_) => Ok(Some(user_id)),
        Err(err) if is_unique_violation(&err) => Ok(None),
        Err(err) => Err(err).context("failed to insert user"),
    }
}

/// Update the shared `users` columns. `Ok(false)` means a unique collision.
async fn update_user(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: Uuid,
    email: Option<&str>,
    password_hash: Option<&str>,
) -> Result<bool> {
    let query = r"
        UPDATE users
        SET email = COALESCE($2, email),
            password = COALESCE($3, password),
            updated_at = NOW()
        WHERE id = $1
    ";
    let result = sqlx::query(query)
        .bind(user_id)
        .bind(email)
        .bind(password_hash)
        .execute(&mut **tx)
        .instrument(db_span("UPDATE", query))
        .await;

    match result {
        Ok(_) => Ok(true),
        Err(err) if is_unique_violation(&err) => Ok(false),
        Err(err) => Err(err).context("failed to update user"),
    }
}

async fn owner_for_update(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    query: &'static str,
    id: Uuid,
) -> Result<Option<Uuid>> {
    let row = sqlx::query(query)
        .bind(id)
        .fetch_optional(&mut **tx)
        .instrument(db_span("SELECT", query))
        .await
        .context("failed to lock profile row")?;

    row.map(|row| row.try_get("user_id"))
        .transpose()
        .context("failed to decode profile owner")
}

#[async_trait]
impl TokenStore for PgStore {
    async fn insert(&self, record: &TokenRecord) -> Result<()> {
        let query = "INSERT INTO tokens (id, content) VALUES ($1, $2)";
        sqlx::query(query)
            .bind(record.id)
            .bind(&record.content)
            .execute(&self.pool)
            .instrument(db_span("INSERT", query))
            .await
            .context("failed to insert token")?;

        Ok(())
    }

    async fn contains(&self, content: &str) -> Result<bool> {
        let query = "SELECT 1 FROM tokens WHERE content = $1";
        let row = sqlx::query(query)
            .bind(content)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to lookup token")?;

        Ok(row.is_some())
    }

    async fn delete(&self, content: &str) -> Result<u64> {
        let query = "DELETE FROM tokens WHERE content = $1";
        let result = sqlx::query(query)
            .bind(content)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await
            .context("failed to delete token")?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn ping(&self) -> Result<()> {
        let mut conn = self
            .pool
            .acquire()
            .instrument(info_span!(
                "db.acquire",
                db.system = "postgresql",
                db.operation = "ACQUIRE"
            ))
            .await
            .context("failed to acquire database connection")?;

        conn.ping()
            .instrument(info_span!(
                "db.ping",
                db.system = "postgresql",
                db.operation = "PING"
            ))
            .await
            .context("failed to ping database")
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let query = format!("{USER_SELECT} WHERE u.email = $1");
        let row = sqlx::query(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await
            .context("failed to lookup user by email")?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_google_id(&self, google_id: &str) -> Result<Option<UserRecord>> {
        let query = format!("{USER_SELECT} WHERE a.google_id = $1");
        let row = sqlx::query(&query)
            .bind(google_id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await
            .context("failed to lookup user by google id")?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn adopter(&self, id: Uuid) -> Result<Option<Adopter>> {
        let query = format!("{ADOPTER_SELECT} WHERE a.id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await
            .context("failed to lookup adopter")?;

        row.as_ref().map(adopter_from_row).transpose()
    }

    async fn shelter(&self, id: Uuid) -> Result<Option<Shelter>> {
        let query = format!("{SHELTER_SELECT} WHERE s.id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await
            .context("failed to lookup shelter")?;

        row.as_ref().map(shelter_from_row).transpose()
    }

    async fn list_adopters(&self) -> Result<Vec<Adopter>> {
        let query = format!("{ADOPTER_SELECT} ORDER BY a.created_at");
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await
            .context("failed to list adopters")?;

        rows.iter().map(adopter_from_row).collect()
    }

    async fn list_shelters(&self) -> Result<Vec<Shelter>> {
        let query = format!("{SHELTER_SELECT} ORDER BY s.created_at");
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await
            .context("failed to list shelters")?;

        rows.iter().map(shelter_from_row).collect()
    }

    async fn create_adopter(&self, adopter: NewAdopter) -> Result<WriteOutcome<Adopter>> {
        // User and profile rows are created together or not at all; an early
        // return drops `tx`, which rolls it back.
        let mut tx = self.pool.begin().await.context("begin adopter signup")?;

        let Some(user_id) =
            insert_user(&mut tx, &adopter.email, adopter.password_hash.as_deref()).await?
        else {
            return Ok(WriteOutcome::Conflict(Taken::Email));
        };

        let id = Uuid::new_v4();
        let query = r"
            INSERT INTO adopters
                (id, user_id, google_id, first_name, last_name, age, description, house_type,
                 has_pets, has_children, time_at_home, latitude, longitude, address)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        ";
        let result = sqlx::query(query)
            .bind(id)
            .bind(user_id)
            .bind(adopter.google_id.as_deref())
            .bind(&adopter.first_name)
            .bind(&adopter.last_name)
            .bind(adopter.age)
            .bind(&adopter.description)
            .bind(&adopter.house_type)
            .bind(adopter.has_pets)
            .bind(adopter.has_children)
            .bind(adopter.time_at_home)
            .bind(adopter.latitude)
            .bind(adopter.longitude)
            .bind(&adopter.address)
            .execute(&mut *tx)
            .instrument(db_span("INSERT", query))
            .await;

        match result {
            Ok(_) => {}
            // `user_id` is fresh, so only `google_id` can collide here.
            Err(err) if is_unique_violation(&err) => {
                return Ok(WriteOutcome::Conflict(Taken::GoogleAccount));
            }
            Err(err) => return Err(err).context("failed to insert adopter"),
        }

        tx.commit().await.context("commit adopter signup")?;

        Ok(WriteOutcome::Written(adopter.into_adopter(id, user_id)))
    }

    async fn create_shelter(&self, shelter: NewShelter) -> Result<WriteOutcome<Shelter>> {
        let mut tx = self.pool.begin().await.context("begin shelter signup")?;

        let Some(user_id) = insert_user(&mut tx, &shelter.email, Some(&shelter.password_hash)).await?
        else {
            return Ok(WriteOutcome::Conflict(Taken::Email));
        };

        let id = Uuid::new_v4();
        let query = r"
            INSERT INTO shelters
                (id, user_id, name, description, phone_number, address, latitude, longitude)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ";
        sqlx::query(query)
            .bind(id)
            .bind(user_id)
            .bind(&shelter.name)
            .bind(&shelter.description)
            .bind(&shelter.phone_number)
            .bind(&shelter.address)
            .bind(shelter.latitude)
            .bind(shelter.longitude)
            .execute(&mut *tx)
            .instrument(db_span("INSERT", query))
            .await
            .context("failed to insert shelter")?;

        tx.commit().await.context("commit shelter signup")?;

        Ok(WriteOutcome::Written(shelter.into_shelter(id, user_id)))
    }

    async fn update_adopter(
        &self,
        id: Uuid,
        changes: AdopterChanges,
    ) -> Result<WriteOutcome<Adopter>> {
        let mut tx = self.pool.begin().await.context("begin adopter update")?;

        let Some(user_id) = owner_for_update(
            &mut tx,
            "SELECT user_id FROM adopters WHERE id = $1 FOR UPDATE",
            id,
        )
        .await?
        else {
            return Ok(WriteOutcome::NotFound);
        };

        if !update_user(
            &mut tx,
            user_id,
            changes.email.as_deref(),
            changes.password_hash.as_deref(),
        )
        .await?
        {
            return Ok(WriteOutcome::Conflict(Taken::Email));
        }

        let query = r"
            UPDATE adopters
            SET first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                age = COALESCE($4, age),
                description = COALESCE($5, description),
                house_type = COALESCE($6, house_type),
                has_pets = COALESCE($7, has_pets),
                has_children = COALESCE($8, has_children),
                time_at_home = COALESCE($9, time_at_home),
                latitude = COALESCE($10, latitude),
                longitude = COALESCE($11, longitude),
                address = COALESCE($12, address),
                updated_at = NOW()
            WHERE id = $1
        ";
        sqlx::query(query)
            .bind(id)
            .bind(changes.first_name.as_deref())
            .bind(changes.last_name.as_deref())
            .bind(changes.age)
            .bind(changes.description.as_deref())
            .bind(changes.house_type.as_deref())
            .bind(changes.has_pets)
            .bind(changes.has_children)
            .bind(changes.time_at_home)
            .bind(changes.latitude)
            .bind(changes.longitude)
            .bind(changes.address.as_deref())
            .execute(&mut *tx)
            .instrument(db_span("UPDATE", query))
            .await
            .context("failed to update adopter")?;

        let select = format!("{ADOPTER_SELECT} WHERE a.id = $1");
        let row = sqlx::query(&select)
            .bind(id)
            .fetch_one(&mut *tx)
            .instrument(db_span("SELECT", &select))
            .await
            .context("failed to reload adopter")?;

        tx.commit().await.context("commit adopter update")?;

        Ok(WriteOutcome::Written(adopter_from_row(&row)?))
    }

    async fn update_shelter(
        &self,
        id: Uuid,
        changes: ShelterChanges,
    ) -> Result<WriteOutcome<Shelter>> {
        let mut tx = self.pool.begin().await.context("begin shelter update")?;

        let Some(user_id) = owner_for_update(
            &mut tx,
            "SELECT user_id FROM shelters WHERE id = $1 FOR UPDATE",
            id,
        )
        .await?
        else {
            return Ok(WriteOutcome::NotFound);
        };

        if !update_user(
            &mut tx,
            user_id,
            changes.email.as_deref(),
            changes.password_hash.as_deref(),
        )
        .await?
        {
            return Ok(WriteOutcome::Conflict(Taken::Email));
        }

        let query = r"
            UPDATE shelters
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                phone_number = COALESCE($4, phone_number),
                address = COALESCE($5, address),
                latitude = COALESCE($6, latitude),
                longitude = COALESCE($7, longitude),
                updated_at = NOW()
            WHERE id = $1
        ";
        sqlx::query(query)
            .bind(id)
            .bind(changes.name.as_deref())
            .bind(changes.description.as_deref())
            .bind(changes.phone_number.as_deref())
            .bind(changes.address.as_deref())
            .bind(changes.latitude)
            .bind(changes.longitude)
            .execute(&mut *tx)
            .instrument(db_span("UPDATE", query))
            .await
            .context("failed to update shelter")?;

        let select = format!("{SHELTER_SELECT} WHERE s.id = $1");
        let row = sqlx::query(&select)
            .bind(id)
            .fetch_one(&mut *tx)
            .instrument(db_span("SELECT", &select))
            .await
            .context("failed to reload shelter")?;

        tx.commit().await.context("commit shelter update")?;

        Ok(WriteOutcome::Written(shelter_from_row(&row)?))
    }

    async fn delete_adopter(&self, id: Uuid) -> Result<bool> {
        let query = "DELETE FROM users WHERE id = (SELECT user_id FROM adopters WHERE id = $1)";
        let result = sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await
            .context("failed to delete adopter")?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_shelter(&self, id: Uuid) -> Result<bool> {
        let query = "DELETE FROM users WHERE id = (SELECT user_id FROM shelters WHERE id = $1)";
        let result = sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await
            .context("failed to delete shelter")?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_splits_into_table_statements() {
        let statements = split_sql_statements(SCHEMA_SQL);
        assert_eq!(statements.len(), 4);
        assert!(statements
            .iter()
            .all(|statement| statement.starts_with("CREATE TABLE IF NOT EXISTS")));
        assert!(statements.iter().all(|statement| statement.ends_with(';')));
    }

    #[test]
    fn split_keeps_unterminated_tail() {
        let statements = split_sql_statements("SELECT 1;\n-- note\nSELECT 2");
        assert_eq!(statements, vec!["SELECT 1;".to_string(), "SELECT 2".to_string()]);
    }

    #[test]
    fn row_not_found_is_not_unique_violation() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }
}
