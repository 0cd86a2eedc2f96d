pub mod cursos;
pub mod estudantes;
pub mod matriculas;
pub mod metadata;

use std::sync::Arc;

use axum::Router;
use utoipa::OpenApi;

use crate::state::AppState;

/// Resource routes, mounted at the root.
pub fn router(state: &AppState) -> Router<Arc<AppState>> {
    Router::new()
        .merge(estudantes::router(state))
        .merge(cursos::router(state))
        .merge(matriculas::router(state))
}

pub fn api_docs() -> utoipa::openapi::OpenApi {
    let mut spec = estudantes::EstudantesApi::openapi();
    spec.merge(cursos::CursosApi::openapi());
    spec.merge(matriculas::MatriculasApi::openapi());
    spec
}
