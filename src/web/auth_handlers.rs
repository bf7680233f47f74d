// src/web/auth_handlers.rs
use crate::{
    error::{AppError, AppResult},
    models::user::LoginForm,
    services::auth_service,
    state::AppState,
    templates::{render, LoginPage},
    web::{flash, mw_auth::SESSION_USER_KEY},
};
use axum::{
    extract::{Form, State},
    response::{IntoResponse, Redirect, Response},
};
use tower_cookies::Cookies;
use tower_sessions::Session;

/// Autentica a sessão para `user_id` (gera novo ID de sessão antes).
pub async fn iniciar_sessao(session: &Session, user_id: &str) -> AppResult<()> {
    session
        .cycle_id()
        .await
        .map_err(|e| AppError::SessionError(format!("Falha ao rodar ID: {}", e)))?;
    session
        .insert(SESSION_USER_KEY, user_id)
        .await
        .map_err(|e| AppError::SessionError(format!("Falha ao inserir na sessão: {}", e)))
}

// GET /login
pub async fn show_login_form(
    State(state): State<AppState>,
    session: Session,
    cookies: Cookies,
) -> AppResult<Response> {
    if session.get::<String>(SESSION_USER_KEY).await.ok().flatten().is_some() {
        tracing::debug!("GET /login: Utilizador já logado, redirecionando para /");
        return Ok(Redirect::to("/").into_response());
    }

    let page = LoginPage {
        error: None,
        aviso: flash::tomar_aviso(&cookies, &state.cookie_key),
    };
    Ok(render(&page)?.into_response())
}

// POST /login
pub async fn handle_login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    tracing::info!("Tentativa de login para: {}", form.email);

    match auth_service::sign_in(&state.db_pool, &form.email, &form.password).await {
        Ok(profile) => {
            iniciar_sessao(&session, &profile.id).await?;
            Ok(Redirect::to("/").into_response())
        }
        // E-mail desconhecido e senha errada dão a mesma mensagem
        Err(e @ AppError::InvalidCredentials) => {
            let page = LoginPage {
                error: Some(e.user_message()),
                aviso: None,
            };
            Ok(render(&page)?.into_response())
        }
        Err(e) => {
            tracing::error!("Erro no login de {}: {:?}", form.email, e);
            Err(e)
        }
    }
}

// GET /logout
pub async fn handle_logout(
    State(state): State<AppState>,
    session: Session,
    cookies: Cookies,
) -> AppResult<Redirect> {
    let user_id: Option<String> = session.get(SESSION_USER_KEY).await.ok().flatten();

    // Apaga todos os dados da sessão atual
    session
        .delete()
        .await
        .map_err(|e| AppError::SessionError(format!("Falha ao apagar sessão: {}", e)))?;

    if let Some(id) = user_id {
        tracing::info!("🚪 Utilizador '{}' desligado.", id);
        flash::definir_aviso(&cookies, &state.cookie_key, "Sessão terminada.");
    } else {
        tracing::info!("🚪 Sessão anónima desligada.");
    }

    Ok(Redirect::to("/login"))
}
