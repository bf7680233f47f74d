// src/web/convite_handlers.rs
use crate::{
    error::{AppError, AppResult},
    models::organizacao::PreCadastroForm,
    services::cadastro_service,
    state::AppState,
    web::{flash, mw_auth::SessaoAtual},
};
use axum::{
    extract::{Extension, Form, State},
    response::Redirect,
};
use tower_cookies::Cookies;

// POST /turma/convites
pub async fn handle_pre_cadastro(
    State(state): State<AppState>,
    Extension(sessao): Extension<SessaoAtual>,
    cookies: Cookies,
    Form(form): Form<PreCadastroForm>,
) -> AppResult<Redirect> {
    let resultado =
        cadastro_service::pre_cadastrar_aluno(&state.db_pool, &sessao.user_id, &form, &state.config.email_domain)
            .await;

    let aviso = match resultado {
        Ok(codigo) => {
            let email = cadastro_service::derivar_email(&form.login, &state.config.email_domain)?;
            format!(
                "Código {} criado para {} ({}). Entregue-o ao aluno para concluir o cadastro.",
                codigo.code,
                form.full_name.trim(),
                email
            )
        }
        Err(e @ (AppError::Validation(_) | AppError::NotFound(_))) => e.user_message(),
        Err(e) => return Err(e),
    };

    flash::definir_aviso(&cookies, &state.cookie_key, aviso);
    Ok(Redirect::to("/"))
}
