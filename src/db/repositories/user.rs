//! User repository
//!
//! Database operations for admin accounts.
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL
//!
//! Emails are stored lowercase; lookups lowercase their argument.

use super::search_pattern;
use crate::db::{with_pool, DynDatabasePool, InsertId};
use crate::models::{ListParams, User, UserFilter, UserRole};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

const SELECT_USER: &str = "SELECT id, name, email, password_hash, role, is_active, \
     last_login_at, created_at, updated_at FROM users";

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create(&self, user: &User) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by email (case-insensitive)
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// List users, newest first, plus the total match count
    async fn list(&self, filter: &UserFilter, params: &ListParams) -> Result<(Vec<User>, i64)>;

    /// Update name, email, password hash, role and active flag
    async fn update(&self, user: &User) -> Result<User>;

    /// Delete a user, returning whether a row was removed.
    /// Their sessions are removed by the foreign key cascade.
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Count total users
    async fn count(&self) -> Result<i64>;

    /// Count admins that can still sign in
    async fn count_active_admins(&self) -> Result<i64>;

    /// Record a successful login
    async fn touch_last_login(&self, id: i64) -> Result<()>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        let now = Utc::now();
        let email = user.email.to_lowercase();
        let id = with_pool!(self.pool, |conn| {
            sqlx::query(
                r#"
                INSERT INTO users (name, email, password_hash, role, is_active, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&user.name)
            .bind(&email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(user.is_active)
            .bind(now)
            .bind(now)
            .execute(conn)
            .await
            .context("Failed to create user")?
            .insert_id()
        });

        Ok(User {
            id,
            email,
            last_login_at: None,
            created_at: now,
            updated_at: now,
            ..user.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("{SELECT_USER} WHERE id = ?");
        let user = with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, User>(&sql)
                .bind(id)
                .fetch_optional(conn)
                .await
                .context("Failed to get user by ID")?
        });
        Ok(user)
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("{SELECT_USER} WHERE email = ?");
        let email = email.trim().to_lowercase();
        let user = with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, User>(&sql)
                .bind(&email)
                .fetch_optional(conn)
                .await
                .context("Failed to get user by email")?
        });
        Ok(user)
    }

    async fn list(&self, filter: &UserFilter, params: &ListParams) -> Result<(Vec<User>, i64)> {
        let role = filter.role.map(|r| r.as_str());
        let search = search_pattern(filter.search.as_deref());
        let where_clause = r#"
            WHERE (? IS NULL OR role = ?)
              AND (? IS NULL OR is_active = ?)
              AND (? IS NULL OR LOWER(name) LIKE ? OR email LIKE ?)
        "#;
        let count_sql = format!("SELECT COUNT(*) FROM users {where_clause}");
        let list_sql =
            format!("{SELECT_USER} {where_clause} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?");

        let (users, total) = with_pool!(self.pool, |conn| {
            let total: i64 = sqlx::query_scalar(&count_sql)
                .bind(role)
                .bind(role)
                .bind(filter.is_active)
                .bind(filter.is_active)
                .bind(&search)
                .bind(&search)
                .bind(&search)
                .fetch_one(conn)
                .await
                .context("Failed to count users")?;

            let users = sqlx::query_as::<_, User>(&list_sql)
                .bind(role)
                .bind(role)
                .bind(filter.is_active)
                .bind(filter.is_active)
                .bind(&search)
                .bind(&search)
                .bind(&search)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(conn)
                .await
                .context("Failed to list users")?;

            (users, total)
        });

        Ok((users, total))
    }

    async fn update(&self, user: &User) -> Result<User> {
        let now = Utc::now();
        let email = user.email.to_lowercase();
        with_pool!(self.pool, |conn| {
            sqlx::query(
                r#"
                UPDATE users
                SET name = ?, email = ?, password_hash = ?, role = ?, is_active = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&user.name)
            .bind(&email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(user.is_active)
            .bind(now)
            .bind(user.id)
            .execute(conn)
            .await
            .context("Failed to update user")?;
        });

        self.get_by_id(user.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = with_pool!(self.pool, |conn| {
            sqlx::query("DELETE FROM users WHERE id = ?")
                .bind(id)
                .execute(conn)
                .await
                .context("Failed to delete user")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = with_pool!(self.pool, |conn| {
            sqlx::query_scalar("SELECT COUNT(*) FROM users")
                .fetch_one(conn)
                .await
                .context("Failed to count users")?
        });
        Ok(count)
    }

    async fn count_active_admins(&self) -> Result<i64> {
        let count: i64 = with_pool!(self.pool, |conn| {
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = ? AND is_active = ?")
                .bind(UserRole::Admin.as_str())
                .bind(true)
                .fetch_one(conn)
                .await
                .context("Failed to count active admins")?
        });
        Ok(count)
    }

    async fn touch_last_login(&self, id: i64) -> Result<()> {
        let now = Utc::now();
        with_pool!(self.pool, |conn| {
            sqlx::query("UPDATE users SET last_login_at = ? WHERE id = ?")
                .bind(now)
                .bind(id)
                .execute(conn)
                .await
                .context("Failed to record last login")?;
        });
        Ok(())
    }
}
