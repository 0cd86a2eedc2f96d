//! Persistence layer.
//!
//! One store trait per resource ([`EstudanteStore`], [`CursoStore`],
//! [`MatriculaStore`], [`TokenStore`]), all implemented by [`SqliteStore`].
//! Handlers only talk to the traits.
//!
//! All trait methods use `impl Future` in their signatures (stable since Rust
//! 1.75) so no extra `async-trait` crate is required.

pub mod curso;
pub mod dao;
pub mod estudante;
pub mod listing;
pub mod matricula;
pub mod token;

pub use dao::{
    Curso, Estudante, Matricula, MatriculaDeCurso, MatriculaDeEstudante, NewCurso, NewEstudante,
    NewMatricula, Nivel, Periodo,
};
pub use listing::{ListParams, Listing, Window};

pub use curso::CursoStore;
pub use estudante::EstudanteStore;
pub use matricula::MatriculaStore;
pub use token::TokenStore;

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

/// Outcome of deleting a row that enrollments may point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Deleted,
    NotFound,
    /// Enrollments still reference the row; nothing was deleted.
    Referenced,
}

/// SQLite-backed store for every escola table.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the SQLite database at `url` and run pending migrations.
    ///
    /// `url` should be a sqlx-compatible SQLite URL, e.g. `"sqlite://escola.db"`.
    /// Foreign keys are enforced on every connection so `ON DELETE RESTRICT`
    /// holds.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Self::migrate(pool).await
    }

    /// A private in-memory database.
    ///
    /// Pinned to a single connection that never expires, because every new
    /// connection to `:memory:` would see an empty database.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::migrate(pool).await
    }

    async fn migrate(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        // Path is resolved relative to CARGO_MANIFEST_DIR at compile time.
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// Delete row `id` unless `referenced_sql` finds an enrollment pointing
    /// at it. Both statements run in one transaction.
    async fn remove_unreferenced(
        &self,
        referenced_sql: &'static str,
        delete_sql: &'static str,
        id: i64,
    ) -> Result<Removal, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let referenced: Option<(i64,)> = sqlx::query_as(referenced_sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if referenced.is_some() {
            return Ok(Removal::Referenced);
        }
        let result = sqlx::query(delete_sql).bind(id).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(if result.rows_affected() > 0 {
            Removal::Deleted
        } else {
            Removal::NotFound
        })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
