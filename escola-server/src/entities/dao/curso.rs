use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use utoipa::ToSchema;

/// Course level, stored as its one-letter code.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema,
    EnumString, IntoStaticStr, Display,
)]
pub enum Nivel {
    #[default]
    #[serde(rename = "B")]
    #[strum(serialize = "B")]
    Basico,
    #[serde(rename = "I")]
    #[strum(serialize = "I")]
    Intermediario,
    #[serde(rename = "A")]
    #[strum(serialize = "A")]
    Avancado,
}

impl Nivel {
    pub fn code(self) -> &'static str {
        self.into()
    }
}

impl TryFrom<String> for Nivel {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A row in the `cursos` table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Curso {
    pub id: i64,
    /// 3 to 10 characters, unique across courses.
    pub codigo: String,
    pub descricao: String,
    #[sqlx(try_from = "String")]
    pub nivel: Nivel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCurso {
    pub codigo: String,
    pub descricao: String,
    pub nivel: Nivel,
}
