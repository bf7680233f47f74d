// src/web/frequencia_handlers.rs
use crate::{
    error::AppResult,
    models::frequencia::{Chamada, StatusPresenca},
    services::{frequencia_service, user_service},
    state::AppState,
    templates::{render, FrequenciaPage, LinhaChamada, Nav},
    web::{flash, mw_auth::SessaoAtual},
};
use axum::{
    extract::{Extension, Form, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Local;
use serde::Deserialize;
use std::collections::HashMap;
use tower_cookies::Cookies;

/// Prefixo dos campos de estado no formulário da chamada (`status_<id do aluno>`).
const STATUS_PREFIX: &str = "status_";

#[derive(Deserialize, Debug)]
pub struct FrequenciaQuery {
    data: Option<String>,
}

fn hoje() -> String {
    Local::now().date_naive().format("%Y-%m-%d").to_string()
}

/// Monta a chamada a partir dos campos `status_<id>` do formulário.
/// Campos com estado desconhecido são ignorados.
pub fn chamada_do_formulario(campos: &HashMap<String, String>) -> Chamada {
    let mut chamada = Chamada::default();
    for (campo, valor) in campos {
        let Some(student_id) = campo.strip_prefix(STATUS_PREFIX) else {
            continue;
        };
        match StatusPresenca::parse(valor) {
            Some(status) => chamada.set_status(student_id, status),
            None => tracing::warn!("Estado de chamada desconhecido '{}' para {}", valor, student_id),
        }
    }
    chamada
}

// GET /frequencia?data=YYYY-MM-DD
pub async fn frequencia_page_handler(
    State(state): State<AppState>,
    Extension(sessao): Extension<SessaoAtual>,
    cookies: Cookies,
    Query(params): Query<FrequenciaQuery>,
) -> AppResult<Response> {
    let data = match params.data.as_deref().filter(|d| !d.trim().is_empty()) {
        Some(d) => frequencia_service::validar_data(d)?,
        None => hoje(),
    };
    tracing::debug!("GET /frequencia: chamada de {} para {}", data, sessao.user_id);

    let perfis = user_service::students_by_teacher(&state.db_pool, &sessao.user_id).await?;
    let alunos = frequencia_service::carregar_alunos_com_frequencia(&state.db_pool, &perfis).await?;
    let chamada = Chamada::do_dia(&alunos, &data);

    let page = FrequenciaPage {
        nav: Nav::from(&sessao),
        aviso: flash::tomar_aviso(&cookies, &state.cookie_key),
        linhas: alunos
            .iter()
            .map(|a| LinhaChamada::new(a, chamada.status_de(&a.id)))
            .collect(),
        data,
    };
    Ok(render(&page)?.into_response())
}

// POST /frequencia (campos: data, status_<id>...)
pub async fn frequencia_commit_handler(
    State(state): State<AppState>,
    Extension(sessao): Extension<SessaoAtual>,
    cookies: Cookies,
    Form(campos): Form<HashMap<String, String>>,
) -> AppResult<Redirect> {
    let data = frequencia_service::validar_data(campos.get("data").map(String::as_str).unwrap_or_default())?;
    let chamada = chamada_do_formulario(&campos);

    // Só alunos da turma deste professor entram na chamada
    let perfis = user_service::students_by_teacher(&state.db_pool, &sessao.user_id).await?;
    let alunos = frequencia_service::carregar_alunos_com_frequencia(&state.db_pool, &perfis).await?;
    let resultado = frequencia_service::commit_chamada(&state.db_pool, &data, &chamada, &alunos).await?;

    let aviso = if resultado.teve_falhas() {
        let nomes: Vec<&str> = resultado
            .falhas
            .iter()
            .filter_map(|(id, _)| alunos.iter().find(|a| &a.id == id).map(|a| a.nome.as_str()))
            .collect();
        format!(
            "Chamada de {}: {} gravados, {} falharam ({}). Confira e grave de novo.",
            data,
            resultado.gravados.len(),
            resultado.falhas.len(),
            nomes.join(", ")
        )
    } else {
        format!(
            "Chamada de {} gravada: {} alterações, {} sem mudança.",
            data,
            resultado.gravados.len(),
            resultado.inalterados
        )
    };
    flash::definir_aviso(&cookies, &state.cookie_key, aviso);

    // Recarrega a lista a partir da base
    Ok(Redirect::to(&format!("/frequencia?data={}", urlencoding::encode(&data))))
}
