// src/web/mod.rs
pub mod auth_handlers;
pub mod cadastro_handlers;
pub mod convite_handlers;
pub mod dashboard_handlers;
pub mod flash;
pub mod frequencia_handlers;
pub mod mw_auth;
pub mod mw_professor;
pub mod notas_handlers;
pub mod routes;
