use std::sync::Arc;

use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::entities::{EstudanteStore, MatriculaStore, Removal};
use crate::error::{FieldErrors, ServerError, STILL_REFERENCED};
use crate::extract::{IdPath, JsonBody, QueryParams};
use crate::middleware::permission;
use crate::routes::api::metadata::{self, COLLECTION, DETAIL, READ_ONLY};
use crate::schemas::estudante::{
    EstudanteRepr, EstudanteRequest, EstudanteResponse, EstudanteSerializer, EstudanteV2Response,
};
use crate::schemas::matricula::MatriculaDeEstudanteResponse;
use crate::schemas::pagination::{ListQuery, ListResponse, Page};
use crate::state::AppState;
use crate::versioning::ApiVersion;

#[derive(OpenApi)]
#[openapi(
    paths(
        list_estudantes,
        create_estudante,
        get_estudante,
        update_estudante,
        patch_estudante,
        delete_estudante,
        list_matriculas_de_estudante,
    ),
    components(schemas(
        EstudanteRequest,
        EstudanteResponse,
        EstudanteV2Response,
        MatriculaDeEstudanteResponse,
    ))
)]
pub struct EstudantesApi;

/// Student routes, guarded by the configured default permission.
pub fn router(state: &AppState) -> Router<Arc<AppState>> {
    let guard = from_fn_with_state(state.config.default_permission, permission::enforce);
    Router::new()
        .route(
            "/estudantes",
            metadata::resource(
                "Estudante List",
                COLLECTION,
                get(list_estudantes).post(create_estudante).route_layer(guard.clone()),
            ),
        )
        .route(
            "/estudantes/{id}",
            metadata::resource(
                "Estudante Instance",
                DETAIL,
                get(get_estudante)
                    .put(update_estudante)
                    .patch(patch_estudante)
                    .delete(delete_estudante)
                    .route_layer(guard.clone()),
            ),
        )
        .route(
            "/estudantes/{id}/matriculas",
            metadata::resource(
                "Lista Matricula Estudante",
                READ_ONLY,
                get(list_matriculas_de_estudante).route_layer(guard),
            ),
        )
}

fn not_found() -> ServerError {
    ServerError::NotFound("Not found.".to_owned())
}

async fn ensure_cpf_free(state: &AppState, cpf: &str, except_id: Option<i64>) -> Result<(), ServerError> {
    if state.store.cpf_taken(cpf, except_id).await? {
        return Err(ServerError::Validation(FieldErrors::single(
            "cpf",
            "estudante with this cpf already exists.",
        )));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/estudantes",
    tag = "estudantes",
    params(ListQuery, ("version" = Option<String>, Query, description = "`v2` selects the short representation")),
    responses(
        (status = 200, description = "Students, ordered by id unless `ordering` says otherwise", body = Page<EstudanteResponse>),
        (status = 404, description = "Invalid page or version"),
    )
)]
pub async fn list_estudantes(
    State(state): State<Arc<AppState>>,
    version: ApiVersion,
    uri: Uri,
    QueryParams(query): QueryParams<ListQuery>,
) -> Result<Json<ListResponse<EstudanteRepr>>, ServerError> {
    let serializer = EstudanteSerializer::for_version(version);
    let store = &state.store;
    let body = query
        .respond(
            &uri,
            state.config.page_size,
            |params| async move { store.list_estudantes(&params).await },
            |e| serializer.render(e),
        )
        .await?;
    Ok(Json(body))
}

#[utoipa::path(
    post,
    path = "/estudantes",
    tag = "estudantes",
    request_body = EstudanteRequest,
    responses(
        (status = 201, description = "Student created", body = EstudanteResponse),
        (status = 400, description = "Field validation failed, including a duplicate CPF"),
    )
)]
pub async fn create_estudante(
    State(state): State<Arc<AppState>>,
    version: ApiVersion,
    JsonBody(req): JsonBody<EstudanteRequest>,
) -> Result<(StatusCode, Json<EstudanteRepr>), ServerError> {
    let new = req.into_new()?;
    ensure_cpf_free(&state, &new.cpf, None).await?;
    let created = state
        .store
        .create_estudante(new)
        .await
        .map_err(|e| ServerError::from_constraint(e, "cpf"))?;
    tracing::info!(id = created.id, "estudante created");
    let serializer = EstudanteSerializer::for_version(version);
    Ok((StatusCode::CREATED, Json(serializer.render(created))))
}

#[utoipa::path(
    get,
    path = "/estudantes/{id}",
    tag = "estudantes",
    params(("id" = i64, Path, description = "Student id")),
    responses(
        (status = 200, description = "Student", body = EstudanteResponse),
        (status = 404, description = "No such student"),
    )
)]
pub async fn get_estudante(
    State(state): State<Arc<AppState>>,
    version: ApiVersion,
    IdPath(id): IdPath,
) -> Result<Json<EstudanteRepr>, ServerError> {
    let estudante = state.store.get_estudante(id).await?.ok_or_else(not_found)?;
    Ok(Json(EstudanteSerializer::for_version(version).render(estudante)))
}

async fn save(
    state: &AppState,
    version: ApiVersion,
    id: i64,
    req: EstudanteRequest,
) -> Result<Json<EstudanteRepr>, ServerError> {
    let new = req.into_new()?;
    ensure_cpf_free(state, &new.cpf, Some(id)).await?;
    let updated = state
        .store
        .update_estudante(id, new)
        .await
        .map_err(|e| ServerError::from_constraint(e, "cpf"))?
        .ok_or_else(not_found)?;
    Ok(Json(EstudanteSerializer::for_version(version).render(updated)))
}

#[utoipa::path(
    put,
    path = "/estudantes/{id}",
    tag = "estudantes",
    params(("id" = i64, Path, description = "Student id")),
    request_body = EstudanteRequest,
    responses(
        (status = 200, description = "Student replaced", body = EstudanteResponse),
        (status = 400, description = "Field validation failed"),
        (status = 404, description = "No such student"),
    )
)]
pub async fn update_estudante(
    State(state): State<Arc<AppState>>,
    version: ApiVersion,
    IdPath(id): IdPath,
    JsonBody(req): JsonBody<EstudanteRequest>,
) -> Result<Json<EstudanteRepr>, ServerError> {
    if !state.store.estudante_exists(id).await? {
        return Err(not_found());
    }
    save(&state, version, id, req).await
}

/// Omitted fields keep their stored values; the merged record is validated
/// like a full replacement.
#[utoipa::path(
    patch,
    path = "/estudantes/{id}",
    tag = "estudantes",
    params(("id" = i64, Path, description = "Student id")),
    request_body = EstudanteRequest,
    responses(
        (status = 200, description = "Student updated", body = EstudanteResponse),
        (status = 400, description = "Field validation failed"),
        (status = 404, description = "No such student"),
    )
)]
pub async fn patch_estudante(
    State(state): State<Arc<AppState>>,
    version: ApiVersion,
    IdPath(id): IdPath,
    JsonBody(req): JsonBody<EstudanteRequest>,
) -> Result<Json<EstudanteRepr>, ServerError> {
    let current = state.store.get_estudante(id).await?.ok_or_else(not_found)?;
    save(&state, version, id, req.merged_onto(&current)).await
}

#[utoipa::path(
    delete,
    path = "/estudantes/{id}",
    tag = "estudantes",
    params(("id" = i64, Path, description = "Student id")),
    responses(
        (status = 204, description = "Student deleted"),
        (status = 404, description = "No such student"),
        (status = 409, description = "Student still has enrollments"),
    )
)]
pub async fn delete_estudante(
    State(state): State<Arc<AppState>>,
    IdPath(id): IdPath,
) -> Result<StatusCode, ServerError> {
    let removal = state
        .store
        .delete_estudante(id)
        .await
        .map_err(ServerError::from_delete)?;
    match removal {
        Removal::Deleted => {
            tracing::info!(id, "estudante deleted");
            Ok(StatusCode::NO_CONTENT)
        }
        Removal::NotFound => Err(not_found()),
        Removal::Referenced => Err(ServerError::Conflict(STILL_REFERENCED.to_owned())),
    }
}

/// An unknown student id yields an empty list, not a 404.
#[utoipa::path(
    get,
    path = "/estudantes/{id}/matriculas",
    tag = "matriculas",
    params(("id" = i64, Path, description = "Student id"), ListQuery),
    responses(
        (status = 200, description = "Enrollments of the student", body = Page<MatriculaDeEstudanteResponse>),
        (status = 400, description = "Non-integer id"),
    )
)]
pub async fn list_matriculas_de_estudante(
    State(state): State<Arc<AppState>>,
    IdPath(id): IdPath,
    uri: Uri,
    QueryParams(query): QueryParams<ListQuery>,
) -> Result<Json<ListResponse<MatriculaDeEstudanteResponse>>, ServerError> {
    let store = &state.store;
    let body = query
        .respond(
            &uri,
            state.config.page_size,
            |params| async move { store.list_matriculas_de_estudante(id, &params).await },
            MatriculaDeEstudanteResponse::from,
        )
        .await?;
    Ok(Json(body))
}
