use std::future::Future;

use crate::entities::dao::{Estudante, NewEstudante};
use crate::entities::listing::{self, search_key, ListParams, ListSpec, Listing, Ordering};
use crate::entities::{Removal, SqliteStore};

/// `?search=` over name and CPF, `?ordering=` by name only.
pub const ESTUDANTE_LIST: ListSpec = ListSpec {
    from: "estudantes",
    columns: "id, nome, email, cpf, data_nascimento, celular",
    id_column: "id",
    searchable_fields: &["nome_busca", "cpf"],
    orderable_fields: &[("nome", "nome")],
    default_ordering: &[Ordering::asc("id")],
};

const SELECT_ONE: &str =
    "SELECT id, nome, email, cpf, data_nascimento, celular FROM estudantes WHERE id = ?1";

pub trait EstudanteStore: Send + Sync + 'static {
    fn list_estudantes(
        &self,
        params: &ListParams,
    ) -> impl Future<Output = Result<Listing<Estudante>, sqlx::Error>> + Send;
    fn get_estudante(&self, id: i64) -> impl Future<Output = Result<Option<Estudante>, sqlx::Error>> + Send;
    fn estudante_exists(&self, id: i64) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;
    /// Whether another student already holds `cpf`.
    fn cpf_taken(
        &self,
        cpf: &str,
        except_id: Option<i64>,
    ) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;
    fn create_estudante(&self, new: NewEstudante) -> impl Future<Output = Result<Estudante, sqlx::Error>> + Send;
    /// `None` when no row has this id.
    fn update_estudante(
        &self,
        id: i64,
        new: NewEstudante,
    ) -> impl Future<Output = Result<Option<Estudante>, sqlx::Error>> + Send;
    /// Refuses with [`Removal::Referenced`] while the student has enrollments.
    fn delete_estudante(&self, id: i64) -> impl Future<Output = Result<Removal, sqlx::Error>> + Send;
}

impl EstudanteStore for SqliteStore {
    async fn list_estudantes(&self, params: &ListParams) -> Result<Listing<Estudante>, sqlx::Error> {
        listing::fetch(&self.pool, &ESTUDANTE_LIST, params, None).await
    }

    async fn get_estudante(&self, id: i64) -> Result<Option<Estudante>, sqlx::Error> {
        sqlx::query_as::<_, Estudante>(SELECT_ONE)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn estudante_exists(&self, id: i64) -> Result<bool, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM estudantes WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn cpf_taken(&self, cpf: &str, except_id: Option<i64>) -> Result<bool, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT 1 FROM estudantes WHERE cpf = ?1 AND (?2 IS NULL OR id <> ?2)",
        )
        .bind(cpf)
        .bind(except_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn create_estudante(&self, new: NewEstudante) -> Result<Estudante, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO estudantes (nome, email, cpf, data_nascimento, celular, nome_busca) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&new.nome)
        .bind(&new.email)
        .bind(&new.cpf)
        .bind(new.data_nascimento)
        .bind(&new.celular)
        .bind(search_key(&new.nome))
        .execute(&self.pool)
        .await?;

        Ok(Estudante {
            id: result.last_insert_rowid(),
            nome: new.nome,
            email: new.email,
            cpf: new.cpf,
            data_nascimento: new.data_nascimento,
            celular: new.celular,
        })
    }

    async fn update_estudante(&self, id: i64, new: NewEstudante) -> Result<Option<Estudante>, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE estudantes \
             SET nome = ?1, email = ?2, cpf = ?3, data_nascimento = ?4, celular = ?5, \
                 nome_busca = ?7 \
             WHERE id = ?6",
        )
        .bind(&new.nome)
        .bind(&new.email)
        .bind(&new.cpf)
        .bind(new.data_nascimento)
        .bind(&new.celular)
        .bind(id)
        .bind(search_key(&new.nome))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(Estudante {
            id,
            nome: new.nome,
            email: new.email,
            cpf: new.cpf,
            data_nascimento: new.data_nascimento,
            celular: new.celular,
        }))
    }

    async fn delete_estudante(&self, id: i64) -> Result<Removal, sqlx::Error> {
        self.remove_unreferenced(
            "SELECT 1 FROM matriculas WHERE estudante = ?1 LIMIT 1",
            "DELETE FROM estudantes WHERE id = ?1",
            id,
        )
        .await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::NaiveDate;

    fn ana() -> NewEstudante {
        NewEstudante {
            nome: "Ana Souza".into(),
            email: "ana@escola.br".into(),
            cpf: "52998224725".into(),
            data_nascimento: NaiveDate::from_ymd_opt(2001, 3, 14).unwrap(),
            celular: "11 99999-0000".into(),
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trips_all_columns() {
        let store = SqliteStore::in_memory().await.unwrap();
        let created = store.create_estudante(ana()).await.unwrap();
        let fetched = store.get_estudante(created.id).await.unwrap();
        assert_eq!(fetched, Some(created));
    }

    #[tokio::test]
    async fn duplicate_cpf_is_rejected_by_storage() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.create_estudante(ana()).await.unwrap();
        let err = store.create_estudante(ana()).await.unwrap_err();
        match err {
            sqlx::Error::Database(db) => assert!(db.is_unique_violation()),
            other => panic!("expected unique violation, got {other:?}"),
        }
        assert_eq!(store.list_estudantes(&ListParams::default()).await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn cpf_taken_excludes_own_row() {
        let store = SqliteStore::in_memory().await.unwrap();
        let created = store.create_estudante(ana()).await.unwrap();
        assert!(store.cpf_taken("52998224725", None).await.unwrap());
        assert!(!store.cpf_taken("52998224725", Some(created.id)).await.unwrap());
        assert!(!store.cpf_taken("11144477735", None).await.unwrap());
    }

    #[tokio::test]
    async fn update_and_delete_report_missing_rows() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert_eq!(store.update_estudante(42, ana()).await.unwrap(), None);
        assert_eq!(store.delete_estudante(42).await.unwrap(), Removal::NotFound);
    }

    #[tokio::test]
    async fn search_is_case_insensitive_across_name_and_cpf() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.create_estudante(ana()).await.unwrap();
        let mut bruno = ana();
        bruno.nome = "Bruno Lima".into();
        bruno.cpf = "11144477735".into();
        store.create_estudante(bruno).await.unwrap();

        let by_name = ListParams {
            search: Some("SOUZA".into()),
            ..Default::default()
        };
        let found = store.list_estudantes(&by_name).await.unwrap();
        assert_eq!(found.count, 1);
        assert_eq!(found.items[0].nome, "Ana Souza");

        let by_cpf = ListParams {
            search: Some("444".into()),
            ..Default::default()
        };
        let found = store.list_estudantes(&by_cpf).await.unwrap();
        assert_eq!(found.items[0].nome, "Bruno Lima");
    }

    #[tokio::test]
    async fn search_folds_accented_letters() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut jose = ana();
        jose.nome = "José Álvares".into();
        store.create_estudante(jose).await.unwrap();

        for term in ["josé", "JOSÉ", "álvares", "ÁLVARES"] {
            let params = ListParams {
                search: Some(term.into()),
                ..Default::default()
            };
            assert_eq!(store.list_estudantes(&params).await.unwrap().count, 1, "{term}");
        }
    }

    #[tokio::test]
    async fn search_follows_renamed_students() {
        let store = SqliteStore::in_memory().await.unwrap();
        let created = store.create_estudante(ana()).await.unwrap();
        let mut renamed = ana();
        renamed.nome = "Érica Souza".into();
        store.update_estudante(created.id, renamed).await.unwrap();

        let search = |term: &str| ListParams {
            search: Some(term.into()),
            ..Default::default()
        };
        assert_eq!(store.list_estudantes(&search("ÉRICA")).await.unwrap().count, 1);
        assert_eq!(store.list_estudantes(&search("ana")).await.unwrap().count, 0);
    }

    #[tokio::test]
    async fn ordering_by_name_descending() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.create_estudante(ana()).await.unwrap();
        let mut bruno = ana();
        bruno.nome = "Bruno Lima".into();
        bruno.cpf = "11144477735".into();
        store.create_estudante(bruno).await.unwrap();

        let params = ListParams {
            ordering: Some("-nome".into()),
            ..Default::default()
        };
        let names: Vec<String> = store
            .list_estudantes(&params)
            .await
            .unwrap()
            .items
            .into_iter()
            .map(|e| e.nome)
            .collect();
        assert_eq!(names, vec!["Bruno Lima", "Ana Souza"]);
    }
}
