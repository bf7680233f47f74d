// src/services/auth_service.rs
use crate::{
    error::{AppError, AppResult},
    models::user::Profile,
    services::user_service,
};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

/// Tamanho mínimo da senha aceite no cadastro.
pub const MIN_PASSWORD_LEN: usize = 6;

#[cfg(not(test))]
const BCRYPT_COST: u32 = bcrypt::DEFAULT_COST;
// Custo mínimo nos testes; o custo real torna a suite lenta.
#[cfg(test)]
const BCRYPT_COST: u32 = 4;

/// Verifica se a senha fornecida corresponde ao hash guardado.
pub async fn verify_password(password: &str, stored_hash: &str) -> AppResult<bool> {
    let password = password.to_string();
    let stored_hash = stored_hash.to_string();
    tokio::task::spawn_blocking(move || {
        tracing::debug!("Verificando hash bcrypt...");
        bcrypt::verify(&password, &stored_hash)
    })
    .await
    .map_err(|e| {
        tracing::error!("Erro na task spawn_blocking (verify_password): {:?}", e);
        AppError::InternalServerError
    })?
    .map_err(|e| {
        tracing::error!("Erro bcrypt ao verificar senha: {:?}", e);
        AppError::PasswordHashingError
    })
}

/// Gera um hash bcrypt para uma senha.
pub async fn hash_password(password: &str) -> AppResult<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || {
        tracing::debug!("Gerando hash bcrypt...");
        bcrypt::hash(&password, BCRYPT_COST)
    })
    .await
    .map_err(|e| {
        tracing::error!("Erro na task spawn_blocking (hash_password): {:?}", e);
        AppError::InternalServerError
    })?
    .map_err(|e| {
        tracing::error!("Erro bcrypt ao gerar hash: {:?}", e);
        AppError::PasswordHashingError
    })
}

/// Normaliza e valida um endereço de e-mail (forma `local@dominio.tld`).
pub fn normalizar_email(raw: &str) -> AppResult<String> {
    let email = raw.trim().to_lowercase();
    let valido = match email.split_once('@') {
        Some((local, dominio)) => {
            !local.is_empty()
                && !dominio.contains('@')
                && dominio.contains('.')
                && !dominio.starts_with('.')
                && !dominio.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valido {
        Ok(email)
    } else {
        Err(AppError::Auth(format!("Endereço de e-mail inválido: '{}'.", raw.trim())))
    }
}

pub fn validar_senha(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Auth(format!(
            "A senha deve ter pelo menos {} caracteres.",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Senha e confirmação têm de coincidir (erro de formulário, não de autenticação).
pub fn confirmar_senha(password: &str, confirmacao: &str) -> AppResult<()> {
    if password != confirmacao {
        return Err(AppError::Validation("As senhas não coincidem.".into()));
    }
    Ok(())
}

/// Cria a conta (linha em `profiles` só com credenciais). Devolve o novo ID.
/// Recebe o hash já calculado para não segurar a transação durante o bcrypt.
pub async fn create_account(
    conn: &mut SqliteConnection,
    email: &str,
    password_hash: &str,
) -> AppResult<String> {
    let email = normalizar_email(email)?;
    let user_id = Uuid::new_v4().to_string();
    tracing::info!("Criando conta para {}", email);

    let result = sqlx::query("INSERT INTO profiles (id, email, password_hash) VALUES (?1, ?2, ?3)")
        .bind(&user_id)
        .bind(&email)
        .bind(password_hash)
        .execute(&mut *conn)
        .await;

    if let Err(sqlx::Error::Database(db_err)) = &result {
        if db_err.is_unique_violation() {
            tracing::warn!("Falha ao criar conta: e-mail '{}' já registado.", email);
            return Err(AppError::Auth("Este e-mail já está registado.".into()));
        }
    }
    result?;

    tracing::info!("✅ Conta '{}' criada para {}", user_id, email);
    Ok(user_id)
}

/// Login por e-mail e senha. Não distingue e-mail inexistente de senha errada.
pub async fn sign_in(db_pool: &SqlitePool, email: &str, password: &str) -> AppResult<Profile> {
    let email = email.trim().to_lowercase();
    let Some(profile) = user_service::find_profile_by_email(db_pool, &email).await? else {
        tracing::warn!("Login: e-mail não encontrado: {}", email);
        return Err(AppError::InvalidCredentials);
    };

    if verify_password(password, &profile.password_hash).await? {
        tracing::info!("✅ Login bem-sucedido para: {}", profile.id);
        Ok(profile)
    } else {
        tracing::warn!("Login: senha incorreta para {}", email);
        Err(AppError::InvalidCredentials)
    }
}
