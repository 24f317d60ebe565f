use crate::users::repo_types::User;
use sqlx::PgPool;

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, \
                            is_active, is_verified, caregiver_id, created_at";

/// True when the error is a unique-constraint violation. The unique index on
/// `users.email` is the arbiter for concurrent registrations with the same
/// address.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

impl User {
    /// Find a user by email, exact match.
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: i64) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Create a new user. Returns the raw sqlx error so callers can map a
    /// unique violation on email to their own taxonomy.
    pub async fn create(
        db: &PgPool,
        email: &str,
        password_hash: &str,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, password_hash, first_name, last_name)
             VALUES ($1, $2, $3, $4)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(email)
        .bind(password_hash)
        .bind(first_name)
        .bind(last_name)
        .fetch_one(db)
        .await
    }

    pub async fn update_password(db: &PgPool, id: i64, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Update profile fields, keeping current values where the caller passed
    /// nothing.
    pub async fn update_profile(
        db: &PgPool,
        id: i64,
        email: Option<&str>,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users
             SET email = COALESCE($2, email),
                 first_name = COALESCE($3, first_name),
                 last_name = COALESCE($4, last_name)
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(email)
        .bind(first_name)
        .bind(last_name)
        .fetch_one(db)
        .await
    }

    pub async fn list_all(db: &PgPool) -> anyhow::Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id"
        ))
        .fetch_all(db)
        .await?;
        Ok(users)
    }

    pub async fn list_dependents(db: &PgPool, caregiver_id: i64) -> anyhow::Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE caregiver_id = $1 ORDER BY id"
        ))
        .bind(caregiver_id)
        .fetch_all(db)
        .await?;
        Ok(users)
    }

    pub async fn count_dependents(db: &PgPool, caregiver_id: i64) -> anyhow::Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE caregiver_id = $1")
                .bind(caregiver_id)
                .fetch_one(db)
                .await?;
        Ok(count)
    }

    pub async fn set_caregiver(
        db: &PgPool,
        dependent_id: i64,
        caregiver_id: i64,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET caregiver_id = $1 WHERE id = $2")
            .bind(caregiver_id)
            .bind(dependent_id)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Unlink a dependent from its caregiver. Returns false when the row did
    /// not belong to that caregiver.
    pub async fn clear_caregiver(
        db: &PgPool,
        dependent_id: i64,
        caregiver_id: i64,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET caregiver_id = NULL WHERE id = $1 AND caregiver_id = $2",
        )
        .bind(dependent_id)
        .bind(caregiver_id)
        .execute(db)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
