// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Postgres Share Repositories
//!
//! PostgreSQL persistence for public links (`share_links` + `shared_items`)
//! and direct shares (`user_file_shares`). Schema in
//! `migrations/001_shares.sql`.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Implements PublicShareRepository and DirectShareRepository

use crate::domain::identity::UserId;
use crate::domain::repository::{DirectShareRepository, PublicShareRepository, RepositoryError};
use crate::domain::share::{DirectShare, DirectShareId, PublicShare, ShareToken};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use uuid::Uuid;

pub struct PostgresPublicShareRepository {
    pool: PgPool,
}

impl PostgresPublicShareRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_items(&self, token: &str) -> Result<Vec<String>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT path FROM shared_items
            WHERE share_token = $1
            ORDER BY position ASC
            "#,
        )
        .bind(token)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("path").map_err(RepositoryError::from))
            .collect()
    }

    async fn hydrate(&self, row: &PgRow) -> Result<PublicShare, RepositoryError> {
        let token: String = row.try_get("token")?;
        let items = self.load_items(&token).await?;
        let token = ShareToken::parse(&token)
            .ok_or_else(|| RepositoryError::Serialization(format!("invalid share token '{}'", token)))?;

        Ok(PublicShare {
            token,
            name: row.try_get("name")?,
            owner: UserId(row.try_get("owner_id")?),
            items,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }
}

#[async_trait]
impl PublicShareRepository for PostgresPublicShareRepository {
    async fn save(&self, share: &PublicShare) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO share_links (token, name, owner_id, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(share.token.as_str())
        .bind(&share.name)
        .bind(share.owner.0)
        .bind(share.created_at)
        .execute(&mut *tx)
        .await?;

        for (position, path) in share.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO shared_items (share_token, position, path)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(share.token.as_str())
            .bind(position as i32)
            .bind(path)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_by_token(&self, token: &ShareToken) -> Result<Option<PublicShare>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT token, name, owner_id, created_at
            FROM share_links
            WHERE token = $1
            "#,
        )
        .bind(token.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    async fn find_by_owner(&self, owner: UserId) -> Result<Vec<PublicShare>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT token, name, owner_id, created_at
            FROM share_links
            WHERE owner_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(owner.0)
        .fetch_all(&self.pool)
        .await?;

        let mut shares = Vec::with_capacity(rows.len());
        for row in &rows {
            shares.push(self.hydrate(row).await?);
        }
        Ok(shares)
    }

    async fn delete(&self, token: &ShareToken) -> Result<bool, RepositoryError> {
        // shared_items cascades
        let result = sqlx::query("DELETE FROM share_links WHERE token = $1")
            .bind(token.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

pub struct PostgresDirectShareRepository {
    pool: PgPool,
}

impl PostgresDirectShareRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn from_row(row: &PgRow) -> Result<DirectShare, RepositoryError> {
        Ok(DirectShare {
            id: DirectShareId(row.try_get::<Uuid, _>("id")?),
            sharer: UserId(row.try_get("sharer_id")?),
            recipient: UserId(row.try_get("recipient_id")?),
            root_path: row.try_get("path")?,
            shared_at: row.try_get::<DateTime<Utc>, _>("shared_at")?,
            escaped_sandbox: row.try_get("escaped_sandbox")?,
        })
    }

    async fn find_where(&self, column: &'static str, user: UserId) -> Result<Vec<DirectShare>, RepositoryError> {
        let query = format!(
            "SELECT id, sharer_id, recipient_id, path, shared_at, escaped_sandbox \
             FROM user_file_shares WHERE {} = $1 ORDER BY shared_at DESC",
            column
        );
        let rows = sqlx::query(&query).bind(user.0).fetch_all(&self.pool).await?;
        rows.iter().map(Self::from_row).collect()
    }
}

#[async_trait]
impl DirectShareRepository for PostgresDirectShareRepository {
    async fn insert(&self, share: &DirectShare) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO user_file_shares (id, sharer_id, recipient_id, path, shared_at, escaped_sandbox)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(share.id.0)
        .bind(share.sharer.0)
        .bind(share.recipient.0)
        .bind(&share.root_path)
        .bind(share.shared_at)
        .bind(share.escaped_sandbox)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn exists(
        &self,
        sharer: UserId,
        recipient: UserId,
        root_path: &str,
    ) -> Result<bool, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM user_file_shares
                WHERE sharer_id = $1 AND recipient_id = $2 AND path = $3
            ) AS present
            "#,
        )
        .bind(sharer.0)
        .bind(recipient.0)
        .bind(root_path)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("present")?)
    }

    async fn find_by_id(&self, id: DirectShareId) -> Result<Option<DirectShare>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, sharer_id, recipient_id, path, shared_at, escaped_sandbox
            FROM user_file_shares
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::from_row).transpose()
    }

    async fn find_by_recipient(&self, recipient: UserId) -> Result<Vec<DirectShare>, RepositoryError> {
        self.find_where("recipient_id", recipient).await
    }

    async fn find_by_sharer(&self, sharer: UserId) -> Result<Vec<DirectShare>, RepositoryError> {
        self.find_where("sharer_id", sharer).await
    }

    async fn delete_for_party(
        &self,
        ids: &[DirectShareId],
        requester: UserId,
    ) -> Result<Vec<DirectShareId>, RepositoryError> {
        let ids: Vec<Uuid> = ids.iter().map(|id| id.0).collect();
        let rows = sqlx::query(
            r#"
            DELETE FROM user_file_shares
            WHERE id = ANY($1) AND (sharer_id = $2 OR recipient_id = $2)
            RETURNING id
            "#,
        )
        .bind(&ids)
        .bind(requester.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| Ok(DirectShareId(row.try_get::<Uuid, _>("id")?)))
            .collect()
    }
}
