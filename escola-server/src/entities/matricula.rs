use std::future::Future;

use crate::entities::dao::{Matricula, MatriculaDeCurso, MatriculaDeEstudante, NewMatricula};
use crate::entities::listing::{self, ListParams, ListSpec, Listing, Ordering, Scope};
use crate::entities::SqliteStore;

pub const MATRICULA_LIST: ListSpec = ListSpec {
    from: "matriculas",
    columns: "id, estudante, curso, periodo",
    id_column: "id",
    searchable_fields: &[],
    orderable_fields: &[("periodo", "periodo")],
    default_ordering: &[Ordering::asc("id")],
};

/// Enrollments of one student, with the course description.
pub const MATRICULAS_DE_ESTUDANTE: ListSpec = ListSpec {
    from: "matriculas m JOIN cursos c ON c.id = m.curso",
    columns: "m.id AS id, c.descricao AS curso_descricao, m.periodo AS periodo",
    id_column: "m.id",
    searchable_fields: &[],
    orderable_fields: &[],
    default_ordering: &[Ordering::asc("m.id")],
};

/// Enrollments in one course, with the student's name.
pub const MATRICULAS_DE_CURSO: ListSpec = ListSpec {
    from: "matriculas m JOIN estudantes e ON e.id = m.estudante",
    columns: "m.id AS id, e.nome AS estudante_nome",
    id_column: "m.id",
    searchable_fields: &[],
    orderable_fields: &[],
    default_ordering: &[Ordering::asc("m.id")],
};

pub trait MatriculaStore: Send + Sync + 'static {
    fn list_matriculas(
        &self,
        params: &ListParams,
    ) -> impl Future<Output = Result<Listing<Matricula>, sqlx::Error>> + Send;
    fn list_matriculas_de_estudante(
        &self,
        estudante: i64,
        params: &ListParams,
    ) -> impl Future<Output = Result<Listing<MatriculaDeEstudante>, sqlx::Error>> + Send;
    fn list_matriculas_de_curso(
        &self,
        curso: i64,
        params: &ListParams,
    ) -> impl Future<Output = Result<Listing<MatriculaDeCurso>, sqlx::Error>> + Send;
    fn matricula_exists(
        &self,
        estudante: i64,
        curso: i64,
    ) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;
    fn create_matricula(&self, new: NewMatricula) -> impl Future<Output = Result<Matricula, sqlx::Error>> + Send;
}

impl MatriculaStore for SqliteStore {
    async fn list_matriculas(&self, params: &ListParams) -> Result<Listing<Matricula>, sqlx::Error> {
        listing::fetch(&self.pool, &MATRICULA_LIST, params, None).await
    }

    async fn list_matriculas_de_estudante(
        &self,
        estudante: i64,
        params: &ListParams,
    ) -> Result<Listing<MatriculaDeEstudante>, sqlx::Error> {
        let scope = Scope {
            column: "m.estudante",
            value: estudante,
        };
        listing::fetch(&self.pool, &MATRICULAS_DE_ESTUDANTE, params, Some(scope)).await
    }

    async fn list_matriculas_de_curso(
        &self,
        curso: i64,
        params: &ListParams,
    ) -> Result<Listing<MatriculaDeCurso>, sqlx::Error> {
        let scope = Scope {
            column: "m.curso",
            value: curso,
        };
        listing::fetch(&self.pool, &MATRICULAS_DE_CURSO, params, Some(scope)).await
    }

    async fn matricula_exists(&self, estudante: i64, curso: i64) -> Result<bool, sqlx::Error> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM matriculas WHERE estudante = ?1 AND curso = ?2")
                .bind(estudante)
                .bind(curso)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    async fn create_matricula(&self, new: NewMatricula) -> Result<Matricula, sqlx::Error> {
        let result = sqlx::query("INSERT INTO matriculas (estudante, curso, periodo) VALUES (?1, ?2, ?3)")
            .bind(new.estudante)
            .bind(new.curso)
            .bind(new.periodo.code())
            .execute(&self.pool)
            .await?;
        Ok(Matricula {
            id: result.last_insert_rowid(),
            estudante: new.estudante,
            curso: new.curso,
            periodo: new.periodo,
        })
    }
}
