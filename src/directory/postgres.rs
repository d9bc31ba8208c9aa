//! Postgres-backed directory.

use super::{Directory, DirectoryError, NewUserRecord, Profile, User, UserId};
use anyhow::{Context, Result};
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    Connection, PgPool, Row,
};
use std::time::Duration;
use tracing::{info_span, Instrument};

pub const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

const SELECT_USER: &str = r"
    SELECT id, firstname, lastname, username, email, accesscode, usertype, password
    FROM users
";

#[derive(Debug, Clone)]
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool against `dsn`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be reached.
    pub async fn connect(dsn: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;

        Ok(Self::new(pool))
    }

    /// Apply `sql/schema.sql`. Every statement is idempotent.
    ///
    /// # Errors
    /// Returns an error naming the statement that failed.
    pub async fn migrate(&self) -> Result<()> {
        for (index, statement) in split_sql_statements(SCHEMA_SQL).iter().enumerate() {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .with_context(|| format!("failed to execute schema statement {}", index + 1))?;
        }

        Ok(())
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl Directory for PgDirectory {
    async fn find_by_email(&self, email: &str) -> Result<User, DirectoryError> {
        let query = format!("{SELECT_USER} WHERE email = $1");
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(DirectoryError::unavailable)?;

        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(DirectoryError::unavailable)?
            .ok_or(DirectoryError::NotFound)
    }

    async fn find_by_id(&self, id: UserId) -> Result<User, DirectoryError> {
        let query = format!("{SELECT_USER} WHERE id = $1");
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(DirectoryError::unavailable)?;

        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(DirectoryError::unavailable)?
            .ok_or(DirectoryError::NotFound)
    }

    async fn insert(&self, user: NewUserRecord) -> Result<UserId, DirectoryError> {
        let query = r"
            INSERT INTO users
                (username, password, firstname, lastname, email, accesscode, usertype)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(&user.profile.username)
            .bind(&user.password_hash)
            .bind(&user.profile.first_name)
            .bind(&user.profile.last_name)
            .bind(&user.profile.email)
            .bind(&user.profile.access_code)
            .bind(&user.profile.user_type)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .map_err(map_write_error)?;

        row.try_get("id").map_err(DirectoryError::unavailable)
    }

    async fn update_email(&self, id: UserId, email: &str) -> Result<u64, DirectoryError> {
        let query = "UPDATE users SET email = $1 WHERE id = $2";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(email)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(map_write_error)?;

        Ok(result.rows_affected())
    }

    async fn update_password(&self, id: UserId, password_hash: &str) -> Result<u64, DirectoryError> {
        let query = "UPDATE users SET password = $1 WHERE id = $2";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(DirectoryError::unavailable)?;

        Ok(result.rows_affected())
    }

    async fn update_credentials(
        &self,
        id: UserId,
        email: &str,
        password_hash: &str,
    ) -> Result<u64, DirectoryError> {
        // Single statement: Postgres applies both columns or neither.
        let query = "UPDATE users SET email = $1, password = $2 WHERE id = $3";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(email)
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(map_write_error)?;

        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<(), DirectoryError> {
        let acquire_span = info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self
            .pool
            .acquire()
            .instrument(acquire_span)
            .await
            .map_err(DirectoryError::unavailable)?;

        let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping()
            .instrument(ping_span)
            .await
            .map_err(DirectoryError::unavailable)
    }
}

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        profile: Profile {
            first_name: row.try_get("firstname")?,
            last_name: row.try_get("lastname")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            access_code: row.try_get("accesscode")?,
            user_type: row.try_get("usertype")?,
        },
        password_hash: row.try_get("password")?,
    })
}

fn map_write_error(err: sqlx::Error) -> DirectoryError {
    if is_unique_violation(&err) {
        DirectoryError::EmailTaken
    } else {
        DirectoryError::unavailable(err)
    }
}

/// Postgres reports unique constraint violations with SQLSTATE 23505.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("--") {
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
