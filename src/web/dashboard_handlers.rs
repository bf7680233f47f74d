// src/web/dashboard_handlers.rs
use crate::{
    error::{AppError, AppResult},
    models::{organizacao::Papel, user::Profile},
    services::{frequencia_service, notas_service, organizacao_service, user_service},
    state::AppState,
    templates::{render, AlunoLinha, DashboardPage, FichaAlunoPage, Nav, ResumoView},
    web::{flash, mw_auth::SessaoAtual},
};
use axum::{
    extract::{Extension, Path, State},
    response::{IntoResponse, Response},
};
use sqlx::SqlitePool;
use tower_cookies::Cookies;

/// Linhas da turma do professor: boletim resumido e número de faltas de cada aluno.
pub async fn linhas_da_turma(db_pool: &SqlitePool, alunos: &[Profile]) -> AppResult<Vec<AlunoLinha>> {
    let ids: Vec<String> = alunos.iter().map(|a| a.id.clone()).collect();
    let boletins = notas_service::carregar_boletins(db_pool, &ids).await?;

    let mut linhas = Vec::with_capacity(alunos.len());
    for aluno in alunos {
        let faltas = frequencia_service::dias_de_falta(db_pool, &aluno.id).await?.len();
        let boletim = boletins.get(&aluno.id).cloned().unwrap_or_default();
        linhas.push(AlunoLinha::new(aluno, &boletim, faltas));
    }
    Ok(linhas)
}

// GET /
pub async fn dashboard_handler(
    State(state): State<AppState>,
    Extension(sessao): Extension<SessaoAtual>,
    cookies: Cookies,
) -> AppResult<Response> {
    tracing::debug!("GET /: painel de {} ({:?})", sessao.user_id, sessao.papel);
    let organizacao = organizacao_service::get_minha_organizacao(&state.db_pool, &sessao.user_id)
        .await?
        .map(|o| o.name);

    let mut page = DashboardPage {
        nav: Nav::from(&sessao),
        aviso: flash::tomar_aviso(&cookies, &state.cookie_key),
        organizacao,
        alunos: Vec::new(),
        meu_resumo: None,
        dias_de_falta: Vec::new(),
        email_domain: state.config.email_domain.clone(),
    };

    match sessao.papel {
        Some(Papel::Professor) => {
            let alunos = user_service::students_by_teacher(&state.db_pool, &sessao.user_id).await?;
            page.alunos = linhas_da_turma(&state.db_pool, &alunos).await?;
        }
        Some(Papel::Aluno) => {
            let boletim = notas_service::carregar_boletim(&state.db_pool, &sessao.user_id).await?;
            page.meu_resumo = Some(ResumoView::do_boletim(&boletim));
            page.dias_de_falta = frequencia_service::dias_de_falta(&state.db_pool, &sessao.user_id).await?;
        }
        None => {}
    }

    Ok(render(&page)?.into_response())
}

// GET /alunos/{id}
pub async fn ficha_aluno_handler(
    State(state): State<AppState>,
    Extension(sessao): Extension<SessaoAtual>,
    Path(student_id): Path<String>,
) -> AppResult<Response> {
    if !user_service::pode_ver_aluno(&state.db_pool, &sessao.user_id, &student_id).await? {
        tracing::warn!("{} tentou abrir a ficha de {} sem acesso.", sessao.user_id, student_id);
        return Err(AppError::Unauthorized);
    }

    let profile = user_service::find_profile_by_id(&state.db_pool, &student_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("aluno {}", student_id)))?;
    let boletim = notas_service::carregar_boletim(&state.db_pool, &student_id).await?;
    let dias_de_falta = frequencia_service::dias_de_falta(&state.db_pool, &student_id).await?;

    let page = FichaAlunoPage::new(Nav::from(&sessao), &profile, &boletim, dias_de_falta);
    Ok(render(&page)?.into_response())
}
