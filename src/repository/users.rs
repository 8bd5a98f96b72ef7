//! Users repository for database operations

use chrono::Utc;
use sqlx::{Pool, Postgres, QueryBuilder};

use super::contains_pattern;
use crate::{
    error::{AppError, AppResult},
    models::{
        pagination::Page,
        user::{NewUser, User, UserQuery, UserShort},
    },
};

const USER_COLUMNS: &str = "id, username, email, password, first_name, last_name, phone_number, \
     date_of_birth, address, guarantor_fullname, guarantor_phone_number, guarantor_address, \
     guarantor_relationship, created_at, updated_at";

const DUPLICATE_USER: &str = "Username or email already exists";

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    /// Check if username already exists
    pub async fn username_exists(&self, username: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(username) = LOWER($1) AND ($2::INTEGER IS NULL OR id != $2))",
        )
        .bind(username)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Check if email already exists
    pub async fn email_exists(&self, email: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1) AND ($2::INTEGER IS NULL OR id != $2))",
        )
        .bind(email)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Create a new user
    pub async fn create(&self, user: &NewUser) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, password, first_name, last_name, phone_number,
                               date_of_birth, address, guarantor_fullname, guarantor_phone_number,
                               guarantor_address, guarantor_relationship)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.phone_number)
        .bind(user.date_of_birth)
        .bind(&user.address)
        .bind(&user.guarantor_fullname)
        .bind(&user.guarantor_phone_number)
        .bind(&user.guarantor_address)
        .bind(&user.guarantor_relationship)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::on_unique_violation(e, DUPLICATE_USER))
    }

    /// Write back every mutable field of `user`
    pub async fn update(&self, user: &User) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET username = $1, email = $2, password = $3, first_name = $4, last_name = $5,
                phone_number = $6, address = $7, guarantor_fullname = $8,
                guarantor_phone_number = $9, guarantor_address = $10,
                guarantor_relationship = $11, updated_at = $12
            WHERE id = $13
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.phone_number)
        .bind(&user.address)
        .bind(&user.guarantor_fullname)
        .bind(&user.guarantor_phone_number)
        .bind(&user.guarantor_address)
        .bind(&user.guarantor_relationship)
        .bind(Utc::now())
        .bind(user.id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::on_unique_violation(e, DUPLICATE_USER))?
        .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", user.id)))
    }

    /// Search users with pagination
    pub async fn search(&self, query: &UserQuery, page: Page) -> AppResult<(Vec<UserShort>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users WHERE 1=1");
        push_filters(&mut count, query);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(
            "SELECT id, username, first_name, last_name, email FROM users WHERE 1=1",
        );
        push_filters(&mut select, query);
        select
            .push(" ORDER BY id LIMIT ")
            .push_bind(page.per_page)
            .push(" OFFSET ")
            .push_bind(page.offset());
        let users = select.build_query_as::<UserShort>().fetch_all(&self.pool).await?;

        Ok((users, total))
    }

    /// Delete a user.
    ///
    /// Refused while the user has unreturned books. Returned-loan history
    /// blocks the delete unless `force` is set; reading-list entries always
    /// go with the account. Returns the number of history rows removed.
    pub async fn delete(&self, id: i32, force: bool) -> AppResult<u64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query_scalar::<_, i32>("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))?;

        let (loans, outstanding): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE return_date IS NULL) FROM loans WHERE user_id = $1",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if outstanding > 0 {
            return Err(AppError::Conflict(format!(
                "User has {} unreturned books",
                outstanding
            )));
        }
        if loans > 0 && !force {
            return Err(AppError::Conflict(
                "User has loan history; use force=true to delete the account with its history".to_string(),
            ));
        }

        let removed = sqlx::query("DELETE FROM loans WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(removed)
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &UserQuery) {
    if let Some(ref username) = query.username {
        qb.push(" AND username ILIKE ").push_bind(contains_pattern(username));
    }
    if let Some(ref email) = query.email {
        qb.push(" AND email ILIKE ").push_bind(contains_pattern(email));
    }
}
