// src/web/mw_professor.rs
use crate::{error::AppError, web::mw_auth::SessaoAtual};
use axum::{
    extract::{Extension, Request},
    middleware::Next,
    response::Response,
};

/// Só deixa passar quem é professor numa organização.
/// Deve ser executado *depois* do middleware `require_auth`.
pub async fn require_professor(
    Extension(sessao): Extension<SessaoAtual>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if sessao.is_professor() {
        Ok(next.run(request).await)
    } else {
        tracing::warn!("Professor MW: Acesso negado para {} (papel {:?}).", sessao.user_id, sessao.papel);
        Err(AppError::Unauthorized)
    }
}
