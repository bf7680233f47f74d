// src/models/notas.rs
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use std::fmt;

/// Os quatro bimestres do ano letivo, na ordem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bimestre {
    B1,
    B2,
    B3,
    B4,
}

impl Bimestre {
    pub const TODOS: [Bimestre; 4] = [Bimestre::B1, Bimestre::B2, Bimestre::B3, Bimestre::B4];

    pub fn as_str(&self) -> &'static str {
        match self {
            Bimestre::B1 => "b1",
            Bimestre::B2 => "b2",
            Bimestre::B3 => "b3",
            Bimestre::B4 => "b4",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::TODOS.into_iter().find(|b| b.as_str().eq_ignore_ascii_case(raw.trim()))
    }

    pub fn numero(&self) -> u8 {
        match self {
            Bimestre::B1 => 1,
            Bimestre::B2 => 2,
            Bimestre::B3 => 3,
            Bimestre::B4 => 4,
        }
    }
}

impl fmt::Display for Bimestre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bimestre {}", self.numero())
    }
}

/// Uma avaliação lançada. `nota` não é validada contra `valor_max`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Avaliacao {
    pub id: String,
    pub nome: String,
    pub valor_max: Option<f64>,
    pub nota: Option<f64>,
}

impl Avaliacao {
    pub fn nota_ou_zero(&self) -> f64 {
        self.nota.unwrap_or(0.0)
    }

    pub fn valor_max_ou_zero(&self) -> f64 {
        self.valor_max.unwrap_or(0.0)
    }
}

/// Linha da tabela `avaliacoes`.
#[derive(Debug, Clone, FromRow)]
pub struct AvaliacaoRow {
    pub id: String,
    pub student_id: String,
    pub bimestre: String,
    pub posicao: i64,
    pub nome: String,
    pub valor_max: Option<f64>,
    pub nota: Option<f64>,
}

/// Todas as avaliações de um aluno, agrupadas por bimestre.
/// Bimestres sem avaliações existem sempre (lista vazia).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Boletim {
    pub bimestres: BTreeMap<Bimestre, Vec<Avaliacao>>,
}

impl Default for Boletim {
    fn default() -> Self {
        Self {
            bimestres: Bimestre::TODOS.into_iter().map(|b| (b, Vec::new())).collect(),
        }
    }
}

impl Boletim {
    pub fn avaliacoes(&self, bimestre: Bimestre) -> &[Avaliacao] {
        self.bimestres.get(&bimestre).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn push(&mut self, bimestre: Bimestre, avaliacao: Avaliacao) {
        self.bimestres.entry(bimestre).or_default().push(avaliacao);
    }
}

/// Situação final do aluno.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusFinal {
    Aprovado,
    #[serde(rename = "Recuperação")]
    Recuperacao,
    Reprovado,
}

impl StatusFinal {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusFinal::Aprovado => "Aprovado",
            StatusFinal::Recuperacao => "Recuperação",
            StatusFinal::Reprovado => "Reprovado",
        }
    }

    /// Classe CSS do selo de status.
    pub fn css_class(&self) -> &'static str {
        match self {
            StatusFinal::Aprovado => "status-aprovado",
            StatusFinal::Recuperacao => "status-recuperacao",
            StatusFinal::Reprovado => "status-reprovado",
        }
    }
}

impl fmt::Display for StatusFinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TotalBimestre {
    pub nota: f64,
    pub valor_max: f64,
}

/// Resultado da agregação de um boletim.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResumoNotas {
    pub nota_final: f64,
    pub valor_max_final: f64,
    /// 0 quando `valor_max_final` é 0.
    pub percentual: f64,
    pub status: StatusFinal,
    pub por_bimestre: BTreeMap<Bimestre, TotalBimestre>,
}

/// Payload JSON de lançamento de um bimestre (uma entrada por avaliação, pela ordem).
/// Valores numéricos ausentes contam como 0; valores não numéricos são rejeitados na desserialização.
#[derive(Debug, Clone, Deserialize)]
pub struct AvaliacaoInput {
    #[serde(default)]
    pub id: Option<String>,
    pub nome: String,
    #[serde(default, rename = "valorMax", alias = "valor_max")]
    pub valor_max: Option<f64>,
    #[serde(default)]
    pub nota: Option<f64>,
}
