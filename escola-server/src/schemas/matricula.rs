use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::entities::{Matricula, MatriculaDeCurso, MatriculaDeEstudante, NewMatricula, Periodo};
use crate::error::ServerError;

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct MatriculaRequest {
    #[serde(default, deserialize_with = "crate::schemas::non_null")]
    #[validate(required(message = "This field is required."))]
    pub estudante: Option<i64>,
    #[serde(default, deserialize_with = "crate::schemas::non_null")]
    #[validate(required(message = "This field is required."))]
    pub curso: Option<i64>,
    /// Defaults to `M` when omitted.
    #[serde(default, deserialize_with = "crate::schemas::non_null")]
    pub periodo: Option<Periodo>,
}

impl MatriculaRequest {
    pub fn into_new(self) -> Result<NewMatricula, ServerError> {
        self.validate()?;
        match (self.estudante, self.curso) {
            (Some(estudante), Some(curso)) => Ok(NewMatricula {
                estudante,
                curso,
                periodo: self.periodo.unwrap_or_default(),
            }),
            _ => Err(ServerError::Internal("validated enrollment is missing fields".to_owned())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MatriculaResponse {
    pub id: i64,
    pub estudante: i64,
    pub curso: i64,
    pub periodo: Periodo,
}

impl From<Matricula> for MatriculaResponse {
    fn from(m: Matricula) -> Self {
        Self {
            id: m.id,
            estudante: m.estudante,
            curso: m.curso,
            periodo: m.periodo,
        }
    }
}

/// An enrollment as listed under a student.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MatriculaDeEstudanteResponse {
    /// Course description.
    pub curso: String,
    /// Display label, e.g. `"Matutino"`.
    pub periodo: String,
}

impl From<MatriculaDeEstudante> for MatriculaDeEstudanteResponse {
    fn from(m: MatriculaDeEstudante) -> Self {
        Self {
            curso: m.curso_descricao,
            periodo: m.periodo.label().to_owned(),
        }
    }
}

/// An enrollment as listed under a course.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MatriculaDeCursoResponse {
    pub estudante_nome: String,
}

impl From<MatriculaDeCurso> for MatriculaDeCursoResponse {
    fn from(m: MatriculaDeCurso) -> Self {
        Self {
            estudante_nome: m.estudante_nome,
        }
    }
}
