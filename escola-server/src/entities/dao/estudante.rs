use chrono::NaiveDate;

/// A row in the `estudantes` table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Estudante {
    pub id: i64,
    pub nome: String,
    pub email: String,
    /// Eleven digits, unique across students.
    pub cpf: String,
    pub data_nascimento: NaiveDate,
    pub celular: String,
}

/// Column values for an insert or a full update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEstudante {
    pub nome: String,
    pub email: String,
    pub cpf: String,
    pub data_nascimento: NaiveDate,
    pub celular: String,
}
