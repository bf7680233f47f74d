// src/services/organizacao_service.rs
use crate::{
    error::{AppError, AppResult},
    models::organizacao::{ConviteCodigo, ConviteValido, DadosPreCadastro, Organizacao, Papel},
};
use chrono::Utc;
use rand::Rng;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

/// Tamanho dos códigos de convite.
pub const CODE_LEN: usize = 8;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
/// Tentativas de gerar um código livre antes de desistir.
const CODE_ATTEMPTS: usize = 5;

/// Primeira organização à qual o utilizador pertence.
pub async fn get_minha_organizacao(db_pool: &SqlitePool, user_id: &str) -> AppResult<Option<Organizacao>> {
    let org = sqlx::query_as::<_, Organizacao>(
        r#"
        SELECT o.id, o.name, o.created_at
        FROM organization_members m
        JOIN organizations o ON o.id = m.organization_id
        WHERE m.user_id = ?1
        ORDER BY m.created_at ASC, m.id ASC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .fetch_optional(db_pool)
    .await?;
    Ok(org)
}

pub async fn criar_organizacao(conn: &mut SqliteConnection, name: &str) -> AppResult<Organizacao> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("O nome da turma não pode ficar vazio.".into()));
    }
    let id = Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO organizations (id, name) VALUES (?1, ?2)")
        .bind(&id)
        .bind(name)
        .execute(&mut *conn)
        .await?;
    tracing::info!("Organização '{}' criada ({})", name, id);
    Ok(Organizacao {
        id,
        name: name.to_string(),
        created_at: None,
    })
}

/// Gera um código de `CODE_LEN` caracteres maiúsculos alfanuméricos.
pub fn gerar_codigo() -> String {
    let mut rng = rand::rng();
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Cria um código de convite (papel `student`) com os dados pré-preenchidos do aluno.
pub async fn criar_codigo_convite(
    db_pool: &SqlitePool,
    organization_id: &str,
    created_by: &str,
    dados: &DadosPreCadastro,
) -> AppResult<ConviteCodigo> {
    let prefilled = serde_json::to_string(dados).map_err(|e| {
        tracing::error!("Erro ao serializar dados do pré-cadastro: {:?}", e);
        AppError::InternalServerError
    })?;

    for tentativa in 1..=CODE_ATTEMPTS {
        let id = Uuid::new_v4().to_string();
        let code = gerar_codigo();

        let result = sqlx::query(
            r#"
            INSERT INTO invitation_codes (id, code, organization_id, role, created_by, prefilled_data)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&id)
        .bind(&code)
        .bind(organization_id)
        .bind(Papel::Aluno.as_str())
        .bind(created_by)
        .bind(&prefilled)
        .execute(db_pool)
        .await;

        match result {
            Ok(_) => {
                tracing::info!("✅ Código {} criado para a organização {}", code, organization_id);
                return find_codigo(db_pool, &code)
                    .await?
                    .ok_or(AppError::InternalServerError);
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                tracing::warn!("Código {} já existe (tentativa {}), gerando outro.", code, tentativa);
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_foreign_key_violation() => {
                return Err(AppError::NotFound(format!("organização {}", organization_id)));
            }
            Err(e) => return Err(e.into()),
        }
    }

    tracing::error!("Não foi possível gerar um código livre após {} tentativas.", CODE_ATTEMPTS);
    Err(AppError::InternalServerError)
}

pub async fn find_codigo(db_pool: &SqlitePool, code: &str) -> AppResult<Option<ConviteCodigo>> {
    let mut conn = db_pool.acquire().await?;
    find_codigo_conn(&mut conn, code).await
}

async fn find_codigo_conn(conn: &mut SqliteConnection, code: &str) -> AppResult<Option<ConviteCodigo>> {
    Ok(sqlx::query_as::<_, ConviteCodigo>(
        r#"
        SELECT id, code, organization_id, role, created_by, prefilled_data, used_by_user_id, used_at, created_at
        FROM invitation_codes
        WHERE code = ?1
        "#,
    )
    .bind(code)
    .fetch_optional(&mut *conn)
    .await?)
}

/// Valida um código de convite (sem diferença entre maiúsculas e minúsculas).
/// Não encontrado, já usado e falha de leitura são erros distintos.
pub async fn validar_codigo(conn: &mut SqliteConnection, code: &str) -> AppResult<ConviteValido> {
    let code = code.trim().to_uppercase();
    if code.is_empty() {
        return Err(AppError::Validation("Informe o código de convite.".into()));
    }

    let convite = find_codigo_conn(conn, &code).await.map_err(|e| {
        tracing::error!("Erro ao validar código {}: {:?}", code, e);
        e
    })?;

    let Some(convite) = convite else {
        tracing::debug!("Código {} não encontrado.", code);
        return Err(AppError::CodeNotFound);
    };
    if convite.foi_usado() {
        tracing::warn!("Código {} já foi usado por {:?}.", code, convite.used_by_user_id);
        return Err(AppError::CodeAlreadyUsed);
    }

    let papel = Papel::parse(&convite.role).unwrap_or_else(|| {
        tracing::warn!("Código {} com papel desconhecido '{}', assumindo aluno.", code, convite.role);
        Papel::Aluno
    });
    let dados: DadosPreCadastro = serde_json::from_str(&convite.prefilled_data).unwrap_or_else(|e| {
        tracing::warn!("Dados pré-preenchidos ilegíveis no código {}: {}", code, e);
        DadosPreCadastro::default()
    });

    Ok(ConviteValido {
        codigo_id: convite.id,
        code: convite.code,
        organization_id: convite.organization_id,
        papel,
        dados,
    })
}

/// Vincula o utilizador à organização com o papel indicado.
pub async fn link_to_organization(
    conn: &mut SqliteConnection,
    user_id: &str,
    organization_id: &str,
    papel: Papel,
) -> AppResult<()> {
    tracing::info!("Vinculando {} à organização {} como {}", user_id, organization_id, papel.as_str());
    let result = sqlx::query(
        "INSERT INTO organization_members (id, user_id, organization_id, role) VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(organization_id)
    .bind(papel.as_str())
    .execute(&mut *conn)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            tracing::warn!("{} já é membro de {}", user_id, organization_id);
            Err(AppError::AlreadyMember)
        }
        Err(sqlx::Error::Database(db_err)) if db_err.is_foreign_key_violation() => {
            tracing::warn!("Vínculo com referência inválida: user {} / org {}", user_id, organization_id);
            Err(AppError::MissingRecord(format!("user {} / organização {}", user_id, organization_id)))
        }
        Err(e) => Err(e.into()),
    }
}

/// Há um convite por resgatar que já reserva este e-mail?
pub async fn email_reservado(db_pool: &SqlitePool, email: &str) -> AppResult<bool> {
    let reservado: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM invitation_codes
            WHERE used_by_user_id IS NULL
              AND json_extract(prefilled_data, '$.email') = ?1
        )
        "#,
    )
    .bind(email)
    .fetch_one(db_pool)
    .await?;
    Ok(reservado)
}

/// Marca o código como usado. Só tem efeito uma vez: um código já consumido dá `CodeAlreadyUsed`.
pub async fn mark_code_used(conn: &mut SqliteConnection, codigo_id: &str, user_id: &str) -> AppResult<()> {
    let rows_affected = sqlx::query(
        r#"
        UPDATE invitation_codes
        SET used_by_user_id = ?1, used_at = ?2
        WHERE id = ?3 AND used_by_user_id IS NULL
        "#,
    )
    .bind(user_id)
    .bind(Utc::now().to_rfc3339())
    .bind(codigo_id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if rows_affected == 0 {
        tracing::warn!("Código {} não pôde ser marcado (inexistente ou já usado).", codigo_id);
        return Err(AppError::CodeAlreadyUsed);
    }
    tracing::info!("Código {} consumido por {}", codigo_id, user_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::test_pool, services::user_service::tests::seed_turma};

    #[test]
    fn codigo_gerado_tem_formato_fixo() {
        for _ in 0..50 {
            let code = gerar_codigo();
            assert_eq!(code.len(), CODE_LEN);
            assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()), "{code}");
        }
    }

    #[test]
    fn todas_as_posicoes_usam_o_alfabeto_inteiro() {
        let mut vistos = vec![std::collections::HashSet::new(); CODE_LEN];
        for _ in 0..20_000 {
            for (pos, c) in gerar_codigo().bytes().enumerate() {
                vistos[pos].insert(c);
            }
        }
        for (pos, chars) in vistos.iter().enumerate() {
            assert_eq!(chars.len(), CODE_ALPHABET.len(), "posição {pos}");
        }
    }

    #[tokio::test]
    async fn codigo_so_pode_ser_usado_uma_vez() {
        let pool = test_pool().await;
        let (org, prof, alunos) = seed_turma(&pool).await;
        let dados = DadosPreCadastro {
            full_name: Some("Pedro Maia".into()),
            email: Some("pedro.maia@facillithub.com".into()),
            birth_date: Some("2012-05-06".into()),
        };
        let criado = criar_codigo_convite(&pool, &org, &prof, &dados).await.unwrap();
        assert!(!criado.foi_usado());

        let mut conn = pool.acquire().await.unwrap();
        let valido = validar_codigo(&mut conn, &criado.code.to_lowercase()).await.unwrap();
        assert_eq!(valido.organization_id, org);
        assert_eq!(valido.papel, Papel::Aluno);
        assert_eq!(valido.dados, dados);

        mark_code_used(&mut conn, &valido.codigo_id, &alunos[0]).await.unwrap();
        assert!(matches!(validar_codigo(&mut conn, &criado.code).await, Err(AppError::CodeAlreadyUsed)));
        assert!(matches!(
            mark_code_used(&mut conn, &valido.codigo_id, &alunos[1]).await,
            Err(AppError::CodeAlreadyUsed)
        ));
        drop(conn);

        let usado = find_codigo(&pool, &criado.code).await.unwrap().unwrap();
        assert_eq!(usado.used_by_user_id.as_deref(), Some(alunos[0].as_str()));
        assert!(usado.used_at.is_some());
    }

    #[tokio::test]
    async fn erros_de_validacao_sao_distintos() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        assert!(matches!(validar_codigo(&mut conn, "   ").await, Err(AppError::Validation(_))));
        assert!(matches!(validar_codigo(&mut conn, "NAOEXISTE").await, Err(AppError::CodeNotFound)));
    }

    #[tokio::test]
    async fn vinculo_repetido_ou_invalido_falha() {
        let pool = test_pool().await;
        let (org, prof, _) = seed_turma(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        assert!(matches!(
            link_to_organization(&mut conn, &prof, &org, Papel::Professor).await,
            Err(AppError::AlreadyMember)
        ));
        assert!(matches!(
            link_to_organization(&mut conn, &prof, "org-inexistente", Papel::Professor).await,
            Err(AppError::MissingRecord(_))
        ));
    }

    #[tokio::test]
    async fn organizacao_do_utilizador() {
        let pool = test_pool().await;
        let (org, prof, _) = seed_turma(&pool).await;
        let minha = get_minha_organizacao(&pool, &prof).await.unwrap().unwrap();
        assert_eq!(minha.id, org);
        assert_eq!(minha.name, "8º Ano B");
        assert!(get_minha_organizacao(&pool, "ninguem").await.unwrap().is_none());
    }
}
