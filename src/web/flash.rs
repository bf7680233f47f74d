// src/web/flash.rs
//! Avisos de uma só leitura ("flash") entre um POST e o redirect seguinte,
//! guardados num cookie assinado.
use tower_cookies::{Cookie, Cookies, Key};

const AVISO_COOKIE: &str = "aviso";

pub fn definir_aviso(cookies: &Cookies, key: &Key, texto: impl AsRef<str>) {
    // Codificado para o valor do cookie ficar em ASCII
    let valor = urlencoding::encode(texto.as_ref()).into_owned();
    let cookie = Cookie::build((AVISO_COOKIE, valor)).path("/").http_only(true).build();
    cookies.signed(key).add(cookie);
}

/// Lê e apaga o aviso. Cookies com assinatura inválida são ignorados.
pub fn tomar_aviso(cookies: &Cookies, key: &Key) -> Option<String> {
    let cookie = cookies.signed(key).get(AVISO_COOKIE)?;
    cookies.remove(Cookie::build((AVISO_COOKIE, "")).path("/").build());

    match urlencoding::decode(cookie.value()) {
        Ok(texto) => Some(texto.into_owned()),
        Err(e) => {
            tracing::warn!("Aviso com codificação inválida descartado: {}", e);
            None
        }
    }
}
