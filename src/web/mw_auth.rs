// src/web/mw_auth.rs
use crate::{
    error::AppError,
    models::organizacao::Papel,
    services::user_service,
    state::AppState,
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

/// Chave da sessão com o ID do utilizador autenticado.
pub const SESSION_USER_KEY: &str = "user_id";

/// Quem está a fazer o pedido. Montado a cada pedido a partir da sessão e posto nas extensões.
#[derive(Clone, Debug)]
pub struct SessaoAtual {
    pub user_id: String,
    pub nome: String,
    pub papel: Option<Papel>,
}

impl SessaoAtual {
    pub fn is_professor(&self) -> bool {
        self.papel == Some(Papel::Professor)
    }
}

// Middleware que verifica se o utilizador está logado
pub async fn require_auth(
    State(state): State<AppState>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user_id = match session.get::<String>(SESSION_USER_KEY).await {
        Ok(Some(user_id)) => user_id,
        Ok(None) => {
            tracing::debug!("Autenticação MW: Não autenticado (sem user_id). Redirecionando para /login");
            return Ok(Redirect::to("/login").into_response());
        }
        Err(e) => {
            tracing::error!("Autenticação MW: Erro ao ler sessão: {:?}", e);
            return Err(AppError::SessionError(format!("Erro ao verificar sessão: {}", e)));
        }
    };

    // A conta pode ter desaparecido desde o login
    let Some(profile) = user_service::find_profile_by_id(&state.db_pool, &user_id).await? else {
        tracing::warn!("Autenticação MW: sessão aponta para conta inexistente '{}'. Limpando.", user_id);
        session
            .flush()
            .await
            .map_err(|e| AppError::SessionError(format!("Falha ao limpar sessão: {}", e)))?;
        return Ok(Redirect::to("/login").into_response());
    };

    let papel = user_service::get_member_role(&state.db_pool, &user_id).await?;
    tracing::debug!("Autenticação MW: '{}' autenticado (papel {:?}).", user_id, papel);

    request.extensions_mut().insert(SessaoAtual {
        user_id,
        nome: profile.display_name().to_string(),
        papel,
    });
    Ok(next.run(request).await)
}
