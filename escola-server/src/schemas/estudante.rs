use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::entities::{Estudante, NewEstudante};
use crate::error::ServerError;
use crate::schemas::required_error;
use crate::versioning::ApiVersion;

/// Student payload for create, replace and partial update.
///
/// Every field is optional at the type level so that PATCH can omit any of
/// them; [`Validate`] enforces presence for full writes.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct EstudanteRequest {
    #[serde(default, deserialize_with = "crate::schemas::non_null")]
    #[validate(
        required(message = "This field is required."),
        length(min = 1, max = 100, message = "Ensure this field has between 1 and 100 characters."),
        custom(function = "validate_nome")
    )]
    pub nome: Option<String>,
    #[serde(default, deserialize_with = "crate::schemas::non_null")]
    #[validate(
        required(message = "This field is required."),
        email(message = "Enter a valid email address."),
        length(max = 30, message = "Ensure this field has no more than 30 characters.")
    )]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "crate::schemas::non_null")]
    #[validate(required(message = "This field is required."), custom(function = "validate_cpf"))]
    pub cpf: Option<String>,
    #[serde(default, deserialize_with = "crate::schemas::non_null")]
    #[validate(required(message = "This field is required."))]
    #[schema(value_type = Option<String>, format = Date, example = "2001-03-14")]
    pub data_nascimento: Option<NaiveDate>,
    #[serde(default, deserialize_with = "crate::schemas::non_null")]
    #[validate(required(message = "This field is required."), custom(function = "validate_celular"))]
    #[schema(example = "86 99999-9999")]
    pub celular: Option<String>,
}

impl EstudanteRequest {
    /// Fill omitted fields from the stored record, for PATCH.
    pub fn merged_onto(self, current: &Estudante) -> Self {
        Self {
            nome: self.nome.or_else(|| Some(current.nome.clone())),
            email: self.email.or_else(|| Some(current.email.clone())),
            cpf: self.cpf.or_else(|| Some(current.cpf.clone())),
            data_nascimento: self.data_nascimento.or(Some(current.data_nascimento)),
            celular: self.celular.or_else(|| Some(current.celular.clone())),
        }
    }

    /// Validate and convert into storage values.
    pub fn into_new(self) -> Result<NewEstudante, ServerError> {
        self.validate()?;
        let missing = |field: &'static str| {
            let mut errors = validator::ValidationErrors::new();
            errors.add(field, required_error());
            ServerError::from(errors)
        };
        Ok(NewEstudante {
            nome: self.nome.ok_or_else(|| missing("nome"))?,
            email: self.email.ok_or_else(|| missing("email"))?,
            cpf: self.cpf.ok_or_else(|| missing("cpf"))?,
            data_nascimento: self.data_nascimento.ok_or_else(|| missing("data_nascimento"))?,
            celular: self.celular.ok_or_else(|| missing("celular"))?,
        })
    }
}

fn validate_nome(nome: &str) -> Result<(), ValidationError> {
    if nome.chars().all(|c| c.is_alphabetic() || c == ' ') {
        Ok(())
    } else {
        Err(ValidationError::new("nome_invalido").with_message("O nome só pode ter letras".into()))
    }
}

/// Eleven digits, not all equal, with both check digits correct.
pub fn cpf_valido(cpf: &str) -> bool {
    let digits: Vec<u32> = cpf.chars().filter_map(|c| c.to_digit(10)).collect();
    if cpf.len() != 11 || digits.len() != 11 || digits.iter().all(|&d| d == digits[0]) {
        return false;
    }
    let check = |len: usize| {
        let sum: u32 = digits[..len]
            .iter()
            .zip((2..=len as u32 + 1).rev())
            .map(|(d, w)| d * w)
            .sum();
        (sum * 10 % 11) % 10
    };
    check(9) == digits[9] && check(10) == digits[10]
}

fn validate_cpf(cpf: &str) -> Result<(), ValidationError> {
    if cpf_valido(cpf) {
        Ok(())
    } else {
        Err(ValidationError::new("cpf_invalido").with_message("O CPF deve ter um valor válido".into()))
    }
}

/// `NN NNNNN-NNNN`.
pub fn celular_valido(celular: &str) -> bool {
    let b = celular.as_bytes();
    b.len() == 13
        && b.iter().enumerate().all(|(i, c)| match i {
            2 => *c == b' ',
            8 => *c == b'-',
            _ => c.is_ascii_digit(),
        })
}

fn validate_celular(celular: &str) -> Result<(), ValidationError> {
    if celular_valido(celular) {
        Ok(())
    } else {
        Err(ValidationError::new("celular_invalido")
            .with_message("O celular precisa seguir o modelo: 86 99999-9999".into()))
    }
}

/// Full student representation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EstudanteResponse {
    pub id: i64,
    pub nome: String,
    pub email: String,
    pub cpf: String,
    #[schema(value_type = String, format = Date)]
    pub data_nascimento: NaiveDate,
    pub celular: String,
}

/// Student representation served to API version 2.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EstudanteV2Response {
    pub id: i64,
    pub nome: String,
    pub email: String,
    pub celular: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(untagged)]
pub enum EstudanteRepr {
    Default(EstudanteResponse),
    V2(EstudanteV2Response),
}

/// Output serializer, picked per request from the API version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstudanteSerializer {
    Default,
    V2,
}

impl EstudanteSerializer {
    pub fn for_version(version: ApiVersion) -> Self {
        match version {
            ApiVersion::V2 => EstudanteSerializer::V2,
            ApiVersion::V1 => EstudanteSerializer::Default,
        }
    }

    pub fn render(self, e: Estudante) -> EstudanteRepr {
        match self {
            EstudanteSerializer::Default => EstudanteRepr::Default(EstudanteResponse {
                id: e.id,
                nome: e.nome,
                email: e.email,
                cpf: e.cpf,
                data_nascimento: e.data_nascimento,
                celular: e.celular,
            }),
            EstudanteSerializer::V2 => EstudanteRepr::V2(EstudanteV2Response {
                id: e.id,
                nome: e.nome,
                email: e.email,
                celular: e.celular,
            }),
        }
    }
}
