use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use utoipa::ToSchema;

/// Time of day the student attends, stored as its one-letter code.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema,
    EnumString, IntoStaticStr, Display,
)]
pub enum Periodo {
    #[default]
    #[serde(rename = "M")]
    #[strum(serialize = "M")]
    Matutino,
    #[serde(rename = "V")]
    #[strum(serialize = "V")]
    Vespertino,
    #[serde(rename = "N")]
    #[strum(serialize = "N")]
    Noturno,
}

impl Periodo {
    pub fn code(self) -> &'static str {
        self.into()
    }

    pub fn label(self) -> &'static str {
        match self {
            Periodo::Matutino => "Matutino",
            Periodo::Vespertino => "Vespertino",
            Periodo::Noturno => "Noturno",
        }
    }
}

impl TryFrom<String> for Periodo {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A row in the `matriculas` table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Matricula {
    pub id: i64,
    pub estudante: i64,
    pub curso: i64,
    #[sqlx(try_from = "String")]
    pub periodo: Periodo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewMatricula {
    pub estudante: i64,
    pub curso: i64,
    pub periodo: Periodo,
}

/// An enrollment joined with its course, as listed under a student.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct MatriculaDeEstudante {
    pub id: i64,
    pub curso_descricao: String,
    #[sqlx(try_from = "String")]
    pub periodo: Periodo,
}

/// An enrollment joined with its student, as listed under a course.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct MatriculaDeCurso {
    pub id: i64,
    pub estudante_nome: String,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn periodo_codes_round_trip_through_strum() {
        assert_eq!("V".parse::<Periodo>().unwrap(), Periodo::Vespertino);
        assert_eq!(Periodo::Noturno.code(), "N");
        assert_eq!(Periodo::default().label(), "Matutino");
        assert!("X".parse::<Periodo>().is_err());
    }
}
