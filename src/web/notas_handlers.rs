// src/web/notas_handlers.rs
use crate::{
    error::{AppError, AppResult},
    models::notas::{AvaliacaoInput, Bimestre, Boletim, ResumoNotas},
    services::{notas_service, user_service},
    state::AppState,
    templates::{render, Nav, NotasAlunoPage, NotasPage, ResumoView},
    web::{dashboard_handlers::linhas_da_turma, flash, mw_auth::SessaoAtual},
};
use axum::{
    extract::{Extension, Path, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tower_cookies::Cookies;

/// Resposta do lançamento: o boletim relido e o resumo recalculado.
#[derive(Debug, Serialize)]
pub struct NotasResposta {
    pub boletim: Boletim,
    pub resumo: ResumoNotas,
}

#[derive(Debug, Serialize)]
struct ErroJson {
    erro: String,
}

// Erros do endpoint JSON saem em JSON, não na página HTML de erro
fn erro_json(e: AppError) -> Response {
    tracing::warn!("POST /notas falhou: {:?}", e);
    (e.status_code(), Json(ErroJson { erro: e.user_message() })).into_response()
}

async fn exigir_aluno_da_turma(state: &AppState, sessao: &SessaoAtual, student_id: &str) -> AppResult<()> {
    if user_service::professor_tem_aluno(&state.db_pool, &sessao.user_id, student_id).await? {
        Ok(())
    } else {
        tracing::warn!("Professor {} sem acesso às notas de {}", sessao.user_id, student_id);
        Err(AppError::Unauthorized)
    }
}

// GET /notas
pub async fn notas_turma_handler(
    State(state): State<AppState>,
    Extension(sessao): Extension<SessaoAtual>,
    cookies: Cookies,
) -> AppResult<Response> {
    let alunos = user_service::students_by_teacher(&state.db_pool, &sessao.user_id).await?;
    let page = NotasPage {
        nav: Nav::from(&sessao),
        aviso: flash::tomar_aviso(&cookies, &state.cookie_key),
        alunos: linhas_da_turma(&state.db_pool, &alunos).await?,
    };
    Ok(render(&page)?.into_response())
}

// GET /notas/{id}
pub async fn notas_aluno_handler(
    State(state): State<AppState>,
    Extension(sessao): Extension<SessaoAtual>,
    Path(student_id): Path<String>,
) -> AppResult<Response> {
    exigir_aluno_da_turma(&state, &sessao, &student_id).await?;

    let profile = user_service::find_profile_by_id(&state.db_pool, &student_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("aluno {}", student_id)))?;
    let boletim = notas_service::carregar_boletim(&state.db_pool, &student_id).await?;

    let page = NotasAlunoPage {
        nav: Nav::from(&sessao),
        aluno_id: profile.id.clone(),
        aluno_nome: profile.display_name().to_string(),
        resumo: ResumoView::do_boletim(&boletim),
    };
    Ok(render(&page)?.into_response())
}

// POST /notas/{id}/{bimestre}  (JSON: [{ "nome", "valorMax", "nota" }, ...])
// Valores não numéricos são recusados pelo próprio extrator `Json`.
pub async fn salvar_bimestre_handler(
    State(state): State<AppState>,
    Extension(sessao): Extension<SessaoAtual>,
    Path((student_id, bimestre)): Path<(String, String)>,
    Json(avaliacoes): Json<Vec<AvaliacaoInput>>,
) -> Response {
    let resultado: AppResult<NotasResposta> = async {
        let bimestre = Bimestre::parse(&bimestre)
            .ok_or_else(|| AppError::Validation(format!("Bimestre inválido: '{}'", bimestre)))?;
        exigir_aluno_da_turma(&state, &sessao, &student_id).await?;

        let boletim = notas_service::salvar_bimestre(&state.db_pool, &student_id, bimestre, &avaliacoes).await?;
        let resumo = notas_service::calcular_resumo(&boletim);
        tracing::info!(
            "Notas de {} ({}) gravadas por {}: {:.1}% {}",
            student_id,
            bimestre,
            sessao.user_id,
            resumo.percentual,
            resumo.status
        );
        Ok(NotasResposta { boletim, resumo })
    }
    .await;

    match resultado {
        Ok(resposta) => Json(resposta).into_response(),
        Err(e) => erro_json(e),
    }
}
