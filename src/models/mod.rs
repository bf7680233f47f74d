// src/models/mod.rs
pub mod cadastro;
pub mod frequencia;
pub mod notas;
pub mod organizacao;
pub mod user;
