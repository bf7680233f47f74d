// src/models/organizacao.rs
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Papel de um membro numa organização (turma/escola).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Papel {
    #[serde(rename = "professor")]
    Professor,
    #[serde(rename = "student")]
    Aluno,
}

impl Papel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Papel::Professor => "professor",
            Papel::Aluno => "student",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "professor" => Some(Papel::Professor),
            "student" | "aluno" => Some(Papel::Aluno),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Organizacao {
    pub id: String,
    pub name: String,
    pub created_at: Option<String>,
}

/// Linha de `invitation_codes`.
#[derive(Debug, Clone, FromRow)]
pub struct ConviteCodigo {
    pub id: String,
    pub code: String,
    pub organization_id: String,
    pub role: String,
    pub created_by: Option<String>,
    pub prefilled_data: String, // JSON de DadosPreCadastro
    pub used_by_user_id: Option<String>,
    pub used_at: Option<String>,
    pub created_at: Option<String>,
}

impl ConviteCodigo {
    pub fn foi_usado(&self) -> bool {
        self.used_by_user_id.is_some()
    }
}

/// Dados preenchidos pelo professor no pré-cadastro do aluno.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DadosPreCadastro {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub birth_date: Option<String>,
}

/// Convite validado, pronto para ser resgatado.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConviteValido {
    pub codigo_id: String,
    pub code: String,
    pub organization_id: String,
    pub papel: Papel,
    pub dados: DadosPreCadastro,
}

/// Formulário do professor para pré-cadastrar um aluno.
#[derive(Debug, Clone, Deserialize)]
pub struct PreCadastroForm {
    pub full_name: String,
    /// Login escolhido (ex: "pedro.maia"); vira `<login>@<domínio>`.
    pub login: String,
    #[serde(default)]
    pub birth_date: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn papel_aceita_sinonimo_aluno() {
        assert_eq!(Papel::parse("Aluno"), Some(Papel::Aluno));
        assert_eq!(Papel::parse("student"), Some(Papel::Aluno));
        assert_eq!(Papel::Aluno.as_str(), "student");
        assert_eq!(Papel::parse("gestor"), None);
    }

    #[test]
    fn dados_pre_cadastro_tolera_campos_em_falta() {
        let dados: DadosPreCadastro = serde_json::from_str(r#"{"full_name":"Pedro Maia"}"#).unwrap();
        assert_eq!(dados.full_name.as_deref(), Some("Pedro Maia"));
        assert!(dados.email.is_none());
    }
}
