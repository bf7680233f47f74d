// src/config.rs
use crate::error::{AppError, AppResult};
use std::{env, net::SocketAddr};

/// Domínio usado para os e-mails gerados no pré-cadastro de alunos.
pub const DEFAULT_EMAIL_DOMAIN: &str = "facillithub.com";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Configuração lida do ambiente (e do `.env`, se existir) no arranque.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    /// Chave para assinar o cookie de avisos. O `Key` do tower-cookies exige 64 bytes.
    pub cookie_secret: String,
    pub email_domain: String,
    pub bind_addr: SocketAddr,
}

impl AppConfig {
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")?;
        let cookie_secret = env::var("COOKIE_SECRET")?;
        let email_domain = env::var("EMAIL_DOMAIN").unwrap_or_else(|_| DEFAULT_EMAIL_DOMAIN.into());
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.into());

        Self::build(database_url, cookie_secret, email_domain, &bind_addr)
    }

    /// Valida os valores brutos. Separado de `from_env` para poder ser testado sem mexer no ambiente.
    pub fn build(
        database_url: String,
        cookie_secret: String,
        email_domain: String,
        bind_addr: &str,
    ) -> AppResult<Self> {
        if database_url.trim().is_empty() {
            return Err(AppError::Config("DATABASE_URL está vazia".into()));
        }
        if cookie_secret.len() < 64 {
            return Err(AppError::Config(format!(
                "COOKIE_SECRET precisa de pelo menos 64 bytes (tem {})",
                cookie_secret.len()
            )));
        }

        let email_domain = email_domain.trim().trim_start_matches('@').to_lowercase();
        if email_domain.is_empty() || !email_domain.contains('.') {
            return Err(AppError::Config(format!("EMAIL_DOMAIN inválido: '{}'", email_domain)));
        }

        let bind_addr = bind_addr
            .parse::<SocketAddr>()
            .map_err(|e| AppError::Config(format!("BIND_ADDR inválido '{}': {}", bind_addr, e)))?;

        Ok(Self {
            database_url,
            cookie_secret,
            email_domain,
            bind_addr,
        })
    }
}
