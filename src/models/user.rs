// src/models/user.rs
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// Categoria do perfil. Guardada em `profiles.user_category`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserCategory {
    Aluno,
    Professor,
    Outro,
}

impl UserCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserCategory::Aluno => "aluno",
            UserCategory::Professor => "professor",
            UserCategory::Outro => "outro",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "aluno" => Some(UserCategory::Aluno),
            "professor" => Some(UserCategory::Professor),
            "outro" => Some(UserCategory::Outro),
            _ => None,
        }
    }
}

impl fmt::Display for UserCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Representa uma linha da tabela 'profiles' (conta + dados pessoais)
#[derive(Debug, Clone, FromRow)]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub nickname: Option<String>,
    pub birth_date: Option<String>, // YYYY-MM-DD
    pub user_category: String,
    pub category_details: String, // objeto JSON
    pub avatar_url: Option<String>,
    pub notes: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Profile {
    pub fn category(&self) -> UserCategory {
        UserCategory::parse(&self.user_category).unwrap_or(UserCategory::Outro)
    }

    /// Nome para exibição: nome completo, apelido ou e-mail, nessa ordem.
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .or(self.nickname.as_deref().filter(|n| !n.trim().is_empty()))
            .unwrap_or(&self.email)
    }

    /// Iniciais para o cartão do aluno (ex: "Ana Clara Souza" -> "AC").
    pub fn initials(&self) -> String {
        let initials: String = self
            .display_name()
            .split_whitespace()
            .filter_map(|part| part.chars().next())
            .take(2)
            .collect();
        if initials.is_empty() {
            "?".into()
        } else {
            initials.to_uppercase()
        }
    }
}

/// Campos estruturados gravados depois da criação da conta.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileFields {
    pub full_name: Option<String>,
    pub nickname: Option<String>,
    pub birth_date: Option<String>,
    pub category: Option<UserCategory>,
    /// Detalhes específicos da categoria (turma, disciplina, ...).
    #[serde(default)]
    pub category_details: serde_json::Map<String, serde_json::Value>,
}

// Struct para dados do formulário de login
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}
