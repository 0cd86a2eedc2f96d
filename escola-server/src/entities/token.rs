use std::future::Future;

use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::entities::dao::ApiToken;
use crate::entities::SqliteStore;

/// Lower-case hex SHA-256 of a raw token, the form kept in `api_tokens`.
pub fn hash_token(raw: &str) -> String {
    Sha256::digest(raw.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

pub trait TokenStore: Send + Sync + 'static {
    /// Look up the owner of a raw token.
    fn find_token(&self, raw: &str) -> impl Future<Output = Result<Option<ApiToken>, sqlx::Error>> + Send;
    /// Issue (or replace) the token for `username`; returns the raw token.
    fn issue_token(&self, username: &str) -> impl Future<Output = Result<String, sqlx::Error>> + Send;
}

impl TokenStore for SqliteStore {
    async fn find_token(&self, raw: &str) -> Result<Option<ApiToken>, sqlx::Error> {
        let row: Option<(i64, String)> =
            sqlx::query_as("SELECT id, username FROM api_tokens WHERE key_hash = ?1")
                .bind(hash_token(raw))
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(id, username)| ApiToken { id, username }))
    }

    async fn issue_token(&self, username: &str) -> Result<String, sqlx::Error> {
        let raw = uuid::Uuid::new_v4().simple().to_string();
        let created_at = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO api_tokens (username, key_hash, created_at) VALUES (?1, ?2, ?3) \
             ON CONFLICT(username) DO UPDATE SET key_hash = ?2, created_at = ?3",
        )
        .bind(username)
        .bind(hash_token(&raw))
        .bind(&created_at)
        .execute(&self.pool)
        .await?;
        Ok(raw)
    }
}
