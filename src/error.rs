// src/error.rs
use crate::templates::ErroPage;
use askama::Template;
use axum::{http::StatusCode, response::Html, response::IntoResponse};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Erro na base de dados: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Erro de migração da base de dados: {0}")]
    SqlxMigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Erro de variável de ambiente: {0}")]
    EnvVarError(#[from] std::env::VarError),

    #[error("Configuração inválida: {0}")]
    Config(String),

    #[error("Erro ao processar password")]
    PasswordHashingError,

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Erro na sessão: {0}")]
    SessionError(String),

    // --- Erros do fluxo de cadastro / lançamentos ---
    /// Entrada do utilizador malformada ou em falta.
    #[error("Dados inválidos: {0}")]
    Validation(String),

    /// Falha na criação de conta (e-mail malformado, já registado, senha fraca).
    #[error("Erro de autenticação: {0}")]
    Auth(String),

    /// O registo que devia ser atualizado não existe.
    #[error("Registo em falta: {0}")]
    MissingRecord(String),

    #[error("Não encontrado: {0}")]
    NotFound(String),

    #[error("Código de convite não encontrado")]
    CodeNotFound,

    #[error("Código de convite já utilizado")]
    CodeAlreadyUsed,

    #[error("Utilizador já pertence a esta organização")]
    AlreadyMember,

    #[error("Erro interno inesperado")]
    InternalServerError,

    #[error("Não autorizado")]
    Unauthorized,
}

impl AppError {
    /// Mensagem segura para mostrar ao utilizador (inline nos formulários).
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation(msg) | AppError::Auth(msg) => msg.clone(),
            AppError::InvalidCredentials => "E-mail ou senha inválidos.".into(),
            AppError::CodeNotFound => "Código de convite não encontrado.".into(),
            AppError::CodeAlreadyUsed => "Este código de convite já foi utilizado.".into(),
            AppError::AlreadyMember => "Esta conta já está vinculada à turma.".into(),
            AppError::NotFound(_) | AppError::MissingRecord(_) => "Registo não encontrado.".into(),
            AppError::Unauthorized => "Não tem permissão para esta ação.".into(),
            AppError::SqlxError(_) | AppError::SqlxMigrateError(_) => "Erro ao aceder aos dados. Tente novamente.".into(),
            _ => "Ocorreu um erro inesperado.".into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Auth(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Unauthorized => StatusCode::FORBIDDEN,
            AppError::NotFound(_) | AppError::CodeNotFound => StatusCode::NOT_FOUND,
            AppError::CodeAlreadyUsed | AppError::AlreadyMember => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Como converter AppError numa resposta HTTP
impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        // Loga o erro detalhado no servidor
        tracing::error!("Erro processado: {:?}", self);

        let status = self.status_code();
        let pagina = ErroPage {
            status: status.as_u16(),
            mensagem: self.user_message(),
        };
        match pagina.render() {
            Ok(html) => (status, Html(html)).into_response(),
            Err(e) => {
                tracing::error!("Falha ao renderizar página de erro: {}", e);
                (status, "Ocorreu um erro inesperado.").into_response()
            }
        }
    }
}

// Tipo Result padrão para a aplicação
pub type AppResult<T = ()> = Result<T, AppError>;
