use std::future::Future;

use crate::entities::dao::{Curso, NewCurso};
use crate::entities::listing::{self, search_key, ListParams, ListSpec, Listing, Ordering};
use crate::entities::{Removal, SqliteStore};

pub const CURSO_LIST: ListSpec = ListSpec {
    from: "cursos",
    columns: "id, codigo, descricao, nivel",
    id_column: "id",
    searchable_fields: &["codigo_busca", "descricao_busca"],
    orderable_fields: &[("codigo", "codigo"), ("descricao", "descricao"), ("nivel", "nivel")],
    default_ordering: &[Ordering::asc("id")],
};

pub trait CursoStore: Send + Sync + 'static {
    fn list_cursos(&self, params: &ListParams) -> impl Future<Output = Result<Listing<Curso>, sqlx::Error>> + Send;
    fn get_curso(&self, id: i64) -> impl Future<Output = Result<Option<Curso>, sqlx::Error>> + Send;
    fn curso_exists(&self, id: i64) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;
    /// Whether another course already uses `codigo`.
    fn codigo_taken(
        &self,
        codigo: &str,
        except_id: Option<i64>,
    ) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;
    fn create_curso(&self, new: NewCurso) -> impl Future<Output = Result<Curso, sqlx::Error>> + Send;
    fn update_curso(&self, id: i64, new: NewCurso) -> impl Future<Output = Result<Option<Curso>, sqlx::Error>> + Send;
    /// Refuses with [`Removal::Referenced`] while the course has enrollments.
    fn delete_curso(&self, id: i64) -> impl Future<Output = Result<Removal, sqlx::Error>> + Send;
}

impl CursoStore for SqliteStore {
    async fn list_cursos(&self, params: &ListParams) -> Result<Listing<Curso>, sqlx::Error> {
        listing::fetch(&self.pool, &CURSO_LIST, params, None).await
    }

    async fn get_curso(&self, id: i64) -> Result<Option<Curso>, sqlx::Error> {
        sqlx::query_as::<_, Curso>("SELECT id, codigo, descricao, nivel FROM cursos WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn curso_exists(&self, id: i64) -> Result<bool, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM cursos WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn codigo_taken(&self, codigo: &str, except_id: Option<i64>) -> Result<bool, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT 1 FROM cursos WHERE codigo = ?1 AND (?2 IS NULL OR id <> ?2)",
        )
        .bind(codigo)
        .bind(except_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn create_curso(&self, new: NewCurso) -> Result<Curso, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO cursos (codigo, descricao, nivel, codigo_busca, descricao_busca) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&new.codigo)
        .bind(&new.descricao)
        .bind(new.nivel.code())
        .bind(search_key(&new.codigo))
        .bind(search_key(&new.descricao))
        .execute(&self.pool)
        .await?;
        Ok(Curso {
            id: result.last_insert_rowid(),
            codigo: new.codigo,
            descricao: new.descricao,
            nivel: new.nivel,
        })
    }

    async fn update_curso(&self, id: i64, new: NewCurso) -> Result<Option<Curso>, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE cursos SET codigo = ?1, descricao = ?2, nivel = ?3, \
                 codigo_busca = ?5, descricao_busca = ?6 \
             WHERE id = ?4",
        )
        .bind(&new.codigo)
        .bind(&new.descricao)
        .bind(new.nivel.code())
        .bind(id)
        .bind(search_key(&new.codigo))
        .bind(search_key(&new.descricao))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(Curso {
            id,
            codigo: new.codigo,
            descricao: new.descricao,
            nivel: new.nivel,
        }))
    }

    async fn delete_curso(&self, id: i64) -> Result<Removal, sqlx::Error> {
        self.remove_unreferenced(
            "SELECT 1 FROM matriculas WHERE curso = ?1 LIMIT 1",
            "DELETE FROM cursos WHERE id = ?1",
            id,
        )
        .await
    }
}
