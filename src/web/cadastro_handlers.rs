// src/web/cadastro_handlers.rs
//! Cadastro em vários passos. A etapa atual vive na sessão (chave `cadastro`);
//! cada POST aplica um evento e redireciona para `GET /cadastro`, que mostra a página da etapa.
use crate::{
    error::{AppError, AppResult},
    models::cadastro::{
        CadastroConviteForm, CadastroDiretoForm, CodigoForm, EscolhaFluxoForm, EtapaCadastro, EventoCadastro, Fluxo,
    },
    services::{cadastro_service, organizacao_service},
    state::AppState,
    templates::{render, CadastroCodigoPage, CadastroConvitePage, CadastroDiretoPage, CadastroEscolhaPage},
    web::{auth_handlers::iniciar_sessao, flash},
};
use axum::{
    extract::{Form, State},
    response::{IntoResponse, Redirect, Response},
};
use tower_cookies::Cookies;
use tower_sessions::Session;

const SESSION_CADASTRO_KEY: &str = "cadastro";

async fn etapa_atual(session: &Session) -> AppResult<EtapaCadastro> {
    session
        .get::<EtapaCadastro>(SESSION_CADASTRO_KEY)
        .await
        .map(Option::unwrap_or_default)
        .map_err(|e| AppError::SessionError(format!("Falha ao ler etapa do cadastro: {}", e)))
}

async fn guardar_etapa(session: &Session, etapa: &EtapaCadastro) -> AppResult<()> {
    session
        .insert(SESSION_CADASTRO_KEY, etapa)
        .await
        .map_err(|e| AppError::SessionError(format!("Falha ao guardar etapa do cadastro: {}", e)))
}

async fn limpar_etapa(session: &Session) -> AppResult<()> {
    session
        .remove::<EtapaCadastro>(SESSION_CADASTRO_KEY)
        .await
        .map(|_| ())
        .map_err(|e| AppError::SessionError(format!("Falha ao limpar etapa do cadastro: {}", e)))
}

/// Página correspondente à etapa, com um erro opcional.
fn pagina_da_etapa(etapa: &EtapaCadastro, error: Option<String>) -> AppResult<Response> {
    let html = match etapa {
        EtapaCadastro::DadosPessoais => render(&CadastroDiretoPage {
            error,
            email: String::new(),
            full_name: String::new(),
        })?,
        EtapaCadastro::InserindoCodigo => render(&CadastroCodigoPage {
            error,
            code: String::new(),
        })?,
        EtapaCadastro::CodigoValidado { convite } | EtapaCadastro::CompletandoPerfil { convite } => {
            render(&CadastroConvitePage::new(convite, error))?
        }
        _ => render(&CadastroEscolhaPage { error })?,
    };
    Ok(html.into_response())
}

/// Conta criada: limpa o cadastro, autentica e segue para o início.
async fn concluir(state: &AppState, session: &Session, cookies: &Cookies, user_id: &str) -> AppResult<Response> {
    limpar_etapa(session).await?;
    iniciar_sessao(session, user_id).await?;
    flash::definir_aviso(cookies, &state.cookie_key, "Conta criada. Bem-vindo ao Facillit Hub!");
    Ok(Redirect::to("/").into_response())
}

// GET /cadastro
pub async fn show_cadastro(session: Session) -> AppResult<Response> {
    let etapa = etapa_atual(&session).await?;
    tracing::debug!("GET /cadastro: etapa {}", etapa.nome());

    // Etapas internas do registo nunca ficam na sessão; se aparecerem, recomeça
    if matches!(
        etapa,
        EtapaCadastro::CriandoConta { .. }
            | EtapaCadastro::VinculandoOrganizacao { .. }
            | EtapaCadastro::MarcandoCodigo { .. }
            | EtapaCadastro::Concluido { .. }
    ) {
        limpar_etapa(&session).await?;
        return pagina_da_etapa(&EtapaCadastro::default(), None);
    }
    pagina_da_etapa(&etapa, None)
}

// POST /cadastro (escolher fluxo ou voltar)
pub async fn handle_escolha(session: Session, Form(form): Form<EscolhaFluxoForm>) -> AppResult<Response> {
    let evento = match form.fluxo.trim() {
        "direto" => EventoCadastro::Escolher(Fluxo::Direto),
        "convite" => EventoCadastro::Escolher(Fluxo::Convite),
        "voltar" => EventoCadastro::Voltar,
        outro => {
            let msg = format!("Opção de cadastro desconhecida: '{}'", outro);
            return pagina_da_etapa(&EtapaCadastro::default(), Some(msg));
        }
    };

    let etapa = etapa_atual(&session).await?;
    match etapa.clone().avancar(evento) {
        Ok(proxima) => {
            guardar_etapa(&session, &proxima).await?;
            Ok(Redirect::to("/cadastro").into_response())
        }
        Err(e) => pagina_da_etapa(&etapa, Some(e.user_message())),
    }
}

// POST /cadastro/codigo
pub async fn handle_codigo(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CodigoForm>,
) -> AppResult<Response> {
    let etapa = etapa_atual(&session).await?;
    if etapa != EtapaCadastro::InserindoCodigo {
        return pagina_da_etapa(&etapa, Some("Escolha primeiro o cadastro com convite.".into()));
    }

    let mut conn = state.db_pool.acquire().await?;
    let convite = match organizacao_service::validar_codigo(&mut conn, &form.code).await {
        Ok(convite) => convite,
        Err(e @ (AppError::Validation(_) | AppError::CodeNotFound | AppError::CodeAlreadyUsed)) => {
            let page = CadastroCodigoPage {
                error: Some(e.user_message()),
                code: form.code.trim().to_string(),
            };
            return Ok(render(&page)?.into_response());
        }
        Err(e) => return Err(e),
    };
    drop(conn);

    let proxima = etapa
        .avancar(EventoCadastro::CodigoAceite(convite))?
        .avancar(EventoCadastro::Continuar)?;
    guardar_etapa(&session, &proxima).await?;
    Ok(Redirect::to("/cadastro").into_response())
}

// POST /cadastro/convite
pub async fn handle_cadastro_convite(
    State(state): State<AppState>,
    session: Session,
    cookies: Cookies,
    Form(form): Form<CadastroConviteForm>,
) -> AppResult<Response> {
    let etapa = etapa_atual(&session).await?;
    let Some(convite) = etapa.convite().cloned() else {
        return pagina_da_etapa(&etapa, Some("Valide primeiro o código de convite.".into()));
    };
    // Só confirma que a submissão é válida nesta etapa
    etapa.clone().avancar(EventoCadastro::Submeter)?;

    match cadastro_service::register_with_code(&state.db_pool, &convite.code, &form).await {
        Ok(user_id) => concluir(&state, &session, &cookies, &user_id).await,
        // O código deixou de servir entretanto: volta a pedir um
        Err(e @ (AppError::CodeNotFound | AppError::CodeAlreadyUsed)) => {
            guardar_etapa(&session, &EtapaCadastro::InserindoCodigo).await?;
            pagina_da_etapa(&EtapaCadastro::InserindoCodigo, Some(e.user_message()))
        }
        Err(e @ (AppError::Validation(_) | AppError::Auth(_) | AppError::AlreadyMember)) => {
            pagina_da_etapa(&etapa, Some(e.user_message()))
        }
        Err(e) => Err(e),
    }
}

// POST /cadastro/direto
pub async fn handle_cadastro_direto(
    State(state): State<AppState>,
    session: Session,
    cookies: Cookies,
    Form(form): Form<CadastroDiretoForm>,
) -> AppResult<Response> {
    let etapa = etapa_atual(&session).await?;
    if etapa != EtapaCadastro::DadosPessoais {
        return pagina_da_etapa(&etapa, Some("Escolha primeiro o cadastro sem convite.".into()));
    }

    match cadastro_service::register_direct(&state.db_pool, &form).await {
        Ok(user_id) => concluir(&state, &session, &cookies, &user_id).await,
        Err(e @ (AppError::Validation(_) | AppError::Auth(_))) => {
            let page = CadastroDiretoPage {
                error: Some(e.user_message()),
                email: form.email.trim().to_string(),
                full_name: form.full_name.trim().to_string(),
            };
            Ok(render(&page)?.into_response())
        }
        Err(e) => Err(e),
    }
}
