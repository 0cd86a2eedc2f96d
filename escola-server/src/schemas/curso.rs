use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::entities::{Curso, NewCurso, Nivel};
use crate::error::ServerError;

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct CursoRequest {
    #[serde(default, deserialize_with = "crate::schemas::non_null")]
    #[validate(
        required(message = "This field is required."),
        length(min = 3, max = 10, message = "Ensure this field has between 3 and 10 characters.")
    )]
    #[schema(example = "PY01")]
    pub codigo: Option<String>,
    #[serde(default, deserialize_with = "crate::schemas::non_null")]
    #[validate(
        required(message = "This field is required."),
        length(min = 1, max = 100, message = "Ensure this field has between 1 and 100 characters.")
    )]
    pub descricao: Option<String>,
    /// Defaults to `B` when omitted on create.
    #[serde(default, deserialize_with = "crate::schemas::non_null")]
    pub nivel: Option<Nivel>,
}

impl CursoRequest {
    pub fn merged_onto(self, current: &Curso) -> Self {
        Self {
            codigo: self.codigo.or_else(|| Some(current.codigo.clone())),
            descricao: self.descricao.or_else(|| Some(current.descricao.clone())),
            nivel: self.nivel.or(Some(current.nivel)),
        }
    }

    pub fn into_new(self) -> Result<NewCurso, ServerError> {
        self.validate()?;
        match (self.codigo, self.descricao) {
            (Some(codigo), Some(descricao)) => Ok(NewCurso {
                codigo,
                descricao,
                nivel: self.nivel.unwrap_or_default(),
            }),
            _ => Err(ServerError::Internal("validated course is missing fields".to_owned())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CursoResponse {
    pub id: i64,
    pub codigo: String,
    pub descricao: String,
    pub nivel: Nivel,
}

impl From<Curso> for CursoResponse {
    fn from(c: Curso) -> Self {
        Self {
            id: c.id,
            codigo: c.codigo,
            descricao: c.descricao,
            nivel: c.nivel,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn with_codigo(codigo: &str) -> CursoRequest {
        CursoRequest {
            codigo: Some(codigo.to_owned()),
            descricao: Some("Python".to_owned()),
            nivel: None,
        }
    }

    #[test]
    fn codigo_length_bounds() {
        assert!(with_codigo("PY").into_new().is_err());
        assert!(with_codigo("PY1").into_new().is_ok());
        assert!(with_codigo("PYTHON0001").into_new().is_ok());
        match with_codigo("PYTHON00001").into_new() {
            Err(ServerError::Validation(fields)) => assert!(fields.get("codigo").is_some()),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn nivel_defaults_to_basico() {
        assert_eq!(with_codigo("PY1").into_new().unwrap().nivel, Nivel::Basico);
    }

    #[test]
    fn missing_descricao_is_required() {
        let req = CursoRequest {
            codigo: Some("PY1".into()),
            ..CursoRequest::default()
        };
        match req.into_new() {
            Err(ServerError::Validation(fields)) => {
                assert_eq!(fields.get("descricao"), Some(&["This field is required.".to_owned()][..]))
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
