// src/web/routes.rs
use crate::{
    state::AppState,
    web::{
        auth_handlers, cadastro_handlers, convite_handlers, dashboard_handlers, frequencia_handlers, mw_auth,
        mw_professor, notas_handlers,
    },
};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};

pub fn create_router(app_state: AppState) -> Router {
    // --- Rotas Públicas ---
    let public_routes = Router::new()
        .route("/login", get(auth_handlers::show_login_form).post(auth_handlers::handle_login))
        .route("/logout", get(auth_handlers::handle_logout))
        .route(
            "/cadastro",
            get(cadastro_handlers::show_cadastro).post(cadastro_handlers::handle_escolha),
        )
        .route("/cadastro/codigo", post(cadastro_handlers::handle_codigo))
        .route("/cadastro/convite", post(cadastro_handlers::handle_cadastro_convite))
        .route("/cadastro/direto", post(cadastro_handlers::handle_cadastro_direto));

    // --- Rotas de Professor ---
    // Exigem login E papel professor
    let professor_routes = Router::new()
        .route("/notas", get(notas_handlers::notas_turma_handler))
        .route("/notas/{id}", get(notas_handlers::notas_aluno_handler))
        .route("/notas/{id}/{bimestre}", post(notas_handlers::salvar_bimestre_handler))
        .route(
            "/frequencia",
            get(frequencia_handlers::frequencia_page_handler).post(frequencia_handlers::frequencia_commit_handler),
        )
        .route("/turma/convites", post(convite_handlers::handle_pre_cadastro))
        // mw_auth é aplicado no router pai
        .route_layer(middleware::from_fn(mw_professor::require_professor));

    // --- Rotas Autenticadas ---
    let authenticated_routes = Router::new()
        .route("/", get(dashboard_handlers::dashboard_handler))
        .route("/alunos/{id}", get(dashboard_handlers::ficha_aluno_handler))
        .merge(professor_routes)
        .route_layer(middleware::from_fn_with_state(app_state.clone(), mw_auth::require_auth));

    Router::new()
        .merge(public_routes)
        .merge(authenticated_routes)
        .with_state(app_state)
}
