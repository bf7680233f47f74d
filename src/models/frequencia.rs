// src/models/frequencia.rs
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Estado de um aluno num dia de aula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusPresenca {
    Presente,
    Ausente,
    /// Falta justificada
    Atestado,
}

impl StatusPresenca {
    pub const TODOS: [StatusPresenca; 3] =
        [StatusPresenca::Presente, StatusPresenca::Ausente, StatusPresenca::Atestado];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusPresenca::Presente => "presente",
            StatusPresenca::Ausente => "ausente",
            StatusPresenca::Atestado => "atestado",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::TODOS.into_iter().find(|s| s.as_str().eq_ignore_ascii_case(raw.trim()))
    }

    /// Letra usada nos botões da chamada (P / A / J).
    pub fn sigla(&self) -> &'static str {
        match self {
            StatusPresenca::Presente => "P",
            StatusPresenca::Ausente => "A",
            StatusPresenca::Atestado => "J",
        }
    }
}

impl fmt::Display for StatusPresenca {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Linha da tabela `frequencia`.
#[derive(Debug, Clone, FromRow)]
pub struct FrequenciaRow {
    pub student_id: String,
    pub data: String,
    pub status: String,
}

/// Aluno com o seu histórico de frequência (data ISO -> estado).
#[derive(Debug, Clone)]
pub struct AlunoFrequencia {
    pub id: String,
    pub nome: String,
    pub frequencia: BTreeMap<String, StatusPresenca>,
}

impl AlunoFrequencia {
    pub fn status_em(&self, data: &str) -> Option<StatusPresenca> {
        self.frequencia.get(data).copied()
    }
}

/// Conjunto de trabalho da chamada de um dia: só existe em memória até ao `commit`.
#[derive(Debug, Clone, Default)]
pub struct Chamada {
    pendentes: HashMap<String, StatusPresenca>,
}

impl Chamada {
    /// Chamada pré-preenchida com o que já está gravado para `data`.
    pub fn do_dia(alunos: &[AlunoFrequencia], data: &str) -> Self {
        let pendentes = alunos
            .iter()
            .filter_map(|a| a.status_em(data).map(|s| (a.id.clone(), s)))
            .collect();
        Self { pendentes }
    }

    pub fn set_status(&mut self, student_id: &str, status: StatusPresenca) {
        self.pendentes.insert(student_id.to_string(), status);
    }

    pub fn status_de(&self, student_id: &str) -> Option<StatusPresenca> {
        self.pendentes.get(student_id).copied()
    }

    pub fn len(&self) -> usize {
        self.pendentes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pendentes.is_empty()
    }
}

/// O que aconteceu num `commit` da chamada.
#[derive(Debug, Default)]
pub struct ResultadoChamada {
    pub gravados: Vec<String>,
    pub inalterados: usize,
    /// (aluno, erro) das escritas que falharam. As restantes não são desfeitas.
    pub falhas: Vec<(String, String)>,
}

impl ResultadoChamada {
    pub fn teve_falhas(&self) -> bool {
        !self.falhas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aluno(id: &str, freq: &[(&str, StatusPresenca)]) -> AlunoFrequencia {
        AlunoFrequencia {
            id: id.into(),
            nome: id.to_uppercase(),
            frequencia: freq.iter().map(|(d, s)| (d.to_string(), *s)).collect(),
        }
    }

    #[test]
    fn chamada_do_dia_carrega_apenas_o_dia_escolhido() {
        let alunos = vec![
            aluno("a", &[("2025-08-18", StatusPresenca::Presente), ("2025-08-19", StatusPresenca::Ausente)]),
            aluno("b", &[("2025-08-19", StatusPresenca::Atestado)]),
        ];
        let chamada = Chamada::do_dia(&alunos, "2025-08-18");
        assert_eq!(chamada.len(), 1);
        assert_eq!(chamada.status_de("a"), Some(StatusPresenca::Presente));
        assert_eq!(chamada.status_de("b"), None);
    }

    #[test]
    fn set_status_sobrescreve() {
        let mut chamada = Chamada::default();
        chamada.set_status("a", StatusPresenca::Ausente);
        chamada.set_status("a", StatusPresenca::Presente);
        assert_eq!(chamada.status_de("a"), Some(StatusPresenca::Presente));
    }

    #[test]
    fn parse_de_status() {
        assert_eq!(StatusPresenca::parse("ATESTADO"), Some(StatusPresenca::Atestado));
        assert_eq!(StatusPresenca::parse("falta"), None);
    }
}
