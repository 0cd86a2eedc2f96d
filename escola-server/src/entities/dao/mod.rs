pub mod curso;
pub mod estudante;
pub mod matricula;
pub mod token;

pub use curso::{Curso, NewCurso, Nivel};
pub use estudante::{Estudante, NewEstudante};
pub use matricula::{MatriculaDeCurso, MatriculaDeEstudante, Matricula, NewMatricula, Periodo};
pub use token::ApiToken;
