use std::sync::Arc;

use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::entities::{CursoStore, MatriculaStore, NewCurso, Removal};
use crate::error::{FieldErrors, ServerError, STILL_REFERENCED};
use crate::extract::{IdPath, JsonBody, QueryParams};
use crate::middleware::permission::{self, Permission};
use crate::routes::api::metadata::{self, COLLECTION, DETAIL, READ_ONLY};
use crate::schemas::curso::{CursoRequest, CursoResponse};
use crate::schemas::matricula::MatriculaDeCursoResponse;
use crate::schemas::pagination::{ListQuery, ListResponse, Page};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        list_cursos,
        create_curso,
        get_curso,
        update_curso,
        patch_curso,
        delete_curso,
        list_matriculas_de_curso,
    ),
    components(schemas(CursoRequest, CursoResponse, MatriculaDeCursoResponse))
)]
pub struct CursosApi;

/// Course routes. Reads are open; writes need a token.
pub fn router(state: &AppState) -> Router<Arc<AppState>> {
    let guard = from_fn_with_state(Permission::AuthenticatedOrReadOnly, permission::enforce);
    let nested_guard = from_fn_with_state(state.config.default_permission, permission::enforce);
    Router::new()
        .route(
            "/cursos",
            metadata::resource(
                "Curso List",
                COLLECTION,
                get(list_cursos).post(create_curso).route_layer(guard.clone()),
            ),
        )
        .route(
            "/cursos/{id}",
            metadata::resource(
                "Curso Instance",
                DETAIL,
                get(get_curso)
                    .put(update_curso)
                    .patch(patch_curso)
                    .delete(delete_curso)
                    .route_layer(guard),
            ),
        )
        .route(
            "/cursos/{id}/matriculas",
            metadata::resource(
                "Lista Matricula Curso",
                READ_ONLY,
                get(list_matriculas_de_curso).route_layer(nested_guard),
            ),
        )
}

fn not_found() -> ServerError {
    ServerError::NotFound("Not found.".to_owned())
}

async fn store_curso(state: &AppState, id: Option<i64>, new: NewCurso) -> Result<Option<CursoResponse>, ServerError> {
    if state.store.codigo_taken(&new.codigo, id).await? {
        return Err(ServerError::Validation(FieldErrors::single(
            "codigo",
            "curso with this codigo already exists.",
        )));
    }
    let saved = match id {
        Some(id) => state.store.update_curso(id, new).await,
        None => state.store.create_curso(new).await.map(Some),
    }
    .map_err(|e| ServerError::from_constraint(e, "codigo"))?;
    Ok(saved.map(CursoResponse::from))
}

#[utoipa::path(
    get,
    path = "/cursos",
    tag = "cursos",
    params(ListQuery),
    responses(
        (status = 200, description = "Courses", body = Page<CursoResponse>),
        (status = 404, description = "Invalid page"),
    )
)]
pub async fn list_cursos(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    QueryParams(query): QueryParams<ListQuery>,
) -> Result<Json<ListResponse<CursoResponse>>, ServerError> {
    let store = &state.store;
    let body = query
        .respond(
            &uri,
            state.config.page_size,
            |params| async move { store.list_cursos(&params).await },
            CursoResponse::from,
        )
        .await?;
    Ok(Json(body))
}

#[utoipa::path(
    post,
    path = "/cursos",
    tag = "cursos",
    request_body = CursoRequest,
    responses(
        (status = 201, description = "Course created", body = CursoResponse),
        (status = 400, description = "Field validation failed, including a duplicate or mis-sized codigo"),
        (status = 401, description = "No credentials"),
    ),
    security(("token" = []))
)]
pub async fn create_curso(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<CursoRequest>,
) -> Result<(StatusCode, Json<CursoResponse>), ServerError> {
    let created = store_curso(&state, None, req.into_new()?)
        .await?
        .ok_or_else(|| ServerError::Internal("insert returned no row".to_owned()))?;
    tracing::info!(id = created.id, codigo = %created.codigo, "curso created");
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/cursos/{id}",
    tag = "cursos",
    params(("id" = i64, Path, description = "Course id")),
    responses(
        (status = 200, description = "Course", body = CursoResponse),
        (status = 404, description = "No such course"),
    )
)]
pub async fn get_curso(
    State(state): State<Arc<AppState>>,
    IdPath(id): IdPath,
) -> Result<Json<CursoResponse>, ServerError> {
    let curso = state.store.get_curso(id).await?.ok_or_else(not_found)?;
    Ok(Json(curso.into()))
}

#[utoipa::path(
    put,
    path = "/cursos/{id}",
    tag = "cursos",
    params(("id" = i64, Path, description = "Course id")),
    request_body = CursoRequest,
    responses(
        (status = 200, description = "Course replaced", body = CursoResponse),
        (status = 400, description = "Field validation failed"),
        (status = 401, description = "No credentials"),
        (status = 404, description = "No such course"),
    ),
    security(("token" = []))
)]
pub async fn update_curso(
    State(state): State<Arc<AppState>>,
    IdPath(id): IdPath,
    JsonBody(req): JsonBody<CursoRequest>,
) -> Result<Json<CursoResponse>, ServerError> {
    if !state.store.curso_exists(id).await? {
        return Err(not_found());
    }
    let updated = store_curso(&state, Some(id), req.into_new()?)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(updated))
}

#[utoipa::path(
    patch,
    path = "/cursos/{id}",
    tag = "cursos",
    params(("id" = i64, Path, description = "Course id")),
    request_body = CursoRequest,
    responses(
        (status = 200, description = "Course updated", body = CursoResponse),
        (status = 400, description = "Field validation failed"),
        (status = 401, description = "No credentials"),
        (status = 404, description = "No such course"),
    ),
    security(("token" = []))
)]
pub async fn patch_curso(
    State(state): State<Arc<AppState>>,
    IdPath(id): IdPath,
    JsonBody(req): JsonBody<CursoRequest>,
) -> Result<Json<CursoResponse>, ServerError> {
    let current = state.store.get_curso(id).await?.ok_or_else(not_found)?;
    let updated = store_curso(&state, Some(id), req.merged_onto(&current).into_new()?)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(updated))
}

#[utoipa::path(
    delete,
    path = "/cursos/{id}",
    tag = "cursos",
    params(("id" = i64, Path, description = "Course id")),
    responses(
        (status = 204, description = "Course deleted"),
        (status = 401, description = "No credentials"),
        (status = 404, description = "No such course"),
        (status = 409, description = "Course still has enrollments"),
    ),
    security(("token" = []))
)]
pub async fn delete_curso(
    State(state): State<Arc<AppState>>,
    IdPath(id): IdPath,
) -> Result<StatusCode, ServerError> {
    let removal = state
        .store
        .delete_curso(id)
        .await
        .map_err(ServerError::from_delete)?;
    match removal {
        Removal::Deleted => {
            tracing::info!(id, "curso deleted");
            Ok(StatusCode::NO_CONTENT)
        }
        Removal::NotFound => Err(not_found()),
        Removal::Referenced => Err(ServerError::Conflict(STILL_REFERENCED.to_owned())),
    }
}

#[utoipa::path(
    get,
    path = "/cursos/{id}/matriculas",
    tag = "matriculas",
    params(("id" = i64, Path, description = "Course id"), ListQuery),
    responses(
        (status = 200, description = "Enrollments in the course", body = Page<MatriculaDeCursoResponse>),
        (status = 400, description = "Non-integer id"),
    )
)]
pub async fn list_matriculas_de_curso(
    State(state): State<Arc<AppState>>,
    IdPath(id): IdPath,
    uri: Uri,
    QueryParams(query): QueryParams<ListQuery>,
) -> Result<Json<ListResponse<MatriculaDeCursoResponse>>, ServerError> {
    let store = &state.store;
    let body = query
        .respond(
            &uri,
            state.config.page_size,
            |params| async move { store.list_matriculas_de_curso(id, &params).await },
            MatriculaDeCursoResponse::from,
        )
        .await?;
    Ok(Json(body))
}
