// src/services/mod.rs
pub mod auth_service;
pub mod cadastro_service;
pub mod frequencia_service;
pub mod notas_service;
pub mod organizacao_service;
pub mod user_service;
