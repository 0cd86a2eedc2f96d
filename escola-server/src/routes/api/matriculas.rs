use std::sync::Arc;

use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::entities::{CursoStore, EstudanteStore, Matricula, MatriculaStore, NewMatricula};
use crate::error::{is_foreign_key_violation, FieldErrors, ServerError, NON_FIELD_ERRORS};
use crate::extract::{JsonBody, QueryParams};
use crate::middleware::{permission, throttle};
use crate::routes::api::metadata::{self, COLLECTION};
use crate::schemas::matricula::{MatriculaRequest, MatriculaResponse};
use crate::schemas::pagination::{ListQuery, ListResponse, Page};
use crate::state::AppState;

const DUPLICATE_PAIR: &str = "The fields estudante, curso must make a unique set.";

#[derive(OpenApi)]
#[openapi(
    paths(list_matriculas, create_matricula),
    components(schemas(MatriculaRequest, MatriculaResponse))
)]
pub struct MatriculasApi;

/// Enrollment routes: list and create only, behind the `user` and
/// `matricula_anon` throttles.
pub fn router(state: &AppState) -> Router<Arc<AppState>> {
    let collection = get(list_matriculas)
        .post(create_matricula)
        .route_layer(from_fn_with_state(
            state.matricula_throttle.clone(),
            throttle::enforce,
        ))
        .route_layer(from_fn_with_state(
            state.config.default_permission,
            permission::enforce,
        ));
    Router::new()
        .route(
            "/matriculas",
            metadata::resource("Matricula List", COLLECTION, collection),
        )
        .route("/matriculas/{id}", metadata::closed())
}

#[utoipa::path(
    get,
    path = "/matriculas",
    tag = "matriculas",
    params(ListQuery),
    responses(
        (status = 200, description = "Enrollments", body = Page<MatriculaResponse>),
        (status = 429, description = "Throttled; see Retry-After"),
    )
)]
pub async fn list_matriculas(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    QueryParams(query): QueryParams<ListQuery>,
) -> Result<Json<ListResponse<MatriculaResponse>>, ServerError> {
    let store = &state.store;
    let body = query
        .respond(
            &uri,
            state.config.page_size,
            |params| async move { store.list_matriculas(&params).await },
            MatriculaResponse::from,
        )
        .await?;
    Ok(Json(body))
}

#[utoipa::path(
    post,
    path = "/matriculas",
    tag = "matriculas",
    request_body = MatriculaRequest,
    responses(
        (status = 201, description = "Enrollment created", body = MatriculaResponse),
        (status = 400, description = "Unknown student or course, or the pair is already enrolled"),
        (status = 429, description = "Throttled; see Retry-After"),
    )
)]
pub async fn create_matricula(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<MatriculaRequest>,
) -> Result<(StatusCode, Json<MatriculaResponse>), ServerError> {
    let new = req.into_new()?;
    missing_references(&state, &new).await?.into_result()?;

    if state.store.matricula_exists(new.estudante, new.curso).await? {
        return Err(duplicate_pair());
    }

    let created = insert(&state, new).await?;
    tracing::info!(
        id = created.id,
        estudante = created.estudante,
        curso = created.curso,
        "matricula created"
    );
    Ok((StatusCode::CREATED, Json(created.into())))
}

/// `Invalid pk` errors for each referenced row that does not exist.
async fn missing_references(state: &AppState, new: &NewMatricula) -> Result<FieldErrors, ServerError> {
    let mut errors = FieldErrors::new();
    if !state.store.estudante_exists(new.estudante).await? {
        errors.add("estudante", invalid_pk(new.estudante));
    }
    if !state.store.curso_exists(new.curso).await? {
        errors.add("curso", invalid_pk(new.curso));
    }
    Ok(errors)
}

/// Insert, reporting constraint failures the same way as the pre-checks.
async fn insert(state: &AppState, new: NewMatricula) -> Result<Matricula, ServerError> {
    match state.store.create_matricula(new).await {
        Ok(created) => Ok(created),
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(duplicate_pair()),
        Err(e) if is_foreign_key_violation(&e) => {
            // A referenced row was deleted after the existence check.
            let mut errors = missing_references(state, &new).await?;
            if errors.is_empty() {
                errors.add(NON_FIELD_ERRORS, "Referenced student or course does not exist.");
            }
            Err(ServerError::Validation(errors))
        }
        Err(e) => Err(e.into()),
    }
}

fn duplicate_pair() -> ServerError {
    ServerError::Validation(FieldErrors::single(NON_FIELD_ERRORS, DUPLICATE_PAIR))
}

fn invalid_pk(id: i64) -> String {
    format!("Invalid pk \"{id}\" - object does not exist.")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Config;
    use crate::entities::{CursoStore, NewCurso, Nivel, Periodo, SqliteStore};

    #[tokio::test]
    async fn insert_reports_vanished_references_as_invalid_pk() {
        let store = SqliteStore::in_memory().await.unwrap();
        let curso = store
            .create_curso(NewCurso {
                codigo: "PY01".into(),
                descricao: "Python".into(),
                nivel: Nivel::Basico,
            })
            .await
            .unwrap();
        let state = AppState::new(Config::default(), store);

        let err = insert(
            &state,
            NewMatricula {
                estudante: 77,
                curso: curso.id,
                periodo: Periodo::Matutino,
            },
        )
        .await
        .unwrap_err();
        match err {
            ServerError::Validation(fields) => {
                assert_eq!(
                    fields.get("estudante"),
                    Some(&["Invalid pk \"77\" - object does not exist.".to_owned()][..])
                );
                assert_eq!(fields.get("curso"), None);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
