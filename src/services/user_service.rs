// src/services/user_service.rs
use crate::{
    error::{AppError, AppResult},
    models::{
        organizacao::Papel,
        user::{Profile, ProfileFields},
    },
};
use sqlx::{SqliteConnection, SqlitePool};

const PROFILE_COLUMNS: &str = r#"
    p.id, p.email, p.password_hash, p.full_name, p.nickname, p.birth_date,
    p.user_category, p.category_details, p.avatar_url, p.notes, p.created_at, p.updated_at
"#;

/// Busca um perfil pelo ID.
pub async fn find_profile_by_id(db_pool: &SqlitePool, user_id: &str) -> AppResult<Option<Profile>> {
    tracing::debug!("Buscando perfil por ID: {}", user_id);
    let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles p WHERE p.id = ?1");
    let profile = sqlx::query_as::<_, Profile>(&sql)
        .bind(user_id)
        .fetch_optional(db_pool)
        .await?;

    if profile.is_none() {
        tracing::debug!("Perfil '{}' não encontrado.", user_id);
    }
    Ok(profile)
}

pub async fn find_profile_by_email(db_pool: &SqlitePool, email: &str) -> AppResult<Option<Profile>> {
    let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles p WHERE p.email = ?1");
    Ok(sqlx::query_as::<_, Profile>(&sql)
        .bind(email)
        .fetch_optional(db_pool)
        .await?)
}

/// Grava os campos estruturados do perfil de uma conta já criada.
/// Campos `None` ficam como estão; os detalhes da categoria são substituídos por inteiro.
pub async fn update_profile(
    conn: &mut SqliteConnection,
    user_id: &str,
    fields: &ProfileFields,
) -> AppResult<()> {
    tracing::info!("Atualizando perfil de {}", user_id);

    let details = serde_json::to_string(&fields.category_details).map_err(|e| {
        tracing::error!("Erro ao serializar detalhes da categoria: {:?}", e);
        AppError::InternalServerError
    })?;

    let rows_affected = sqlx::query(
        r#"
        UPDATE profiles
        SET
            full_name = COALESCE(?1, full_name),
            nickname = COALESCE(?2, nickname),
            birth_date = COALESCE(?3, birth_date),
            user_category = COALESCE(?4, user_category),
            category_details = ?5,
            updated_at = datetime('now')
        WHERE id = ?6
        "#,
    )
    .bind(fields.full_name.as_deref())
    .bind(fields.nickname.as_deref())
    .bind(fields.birth_date.as_deref())
    .bind(fields.category.map(|c| c.as_str()))
    .bind(details)
    .bind(user_id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if rows_affected == 0 {
        tracing::warn!("Falha ao atualizar perfil: '{}' não existe.", user_id);
        return Err(AppError::MissingRecord(format!("perfil {}", user_id)));
    }
    Ok(())
}

/// Papel do utilizador na sua primeira organização, se tiver alguma.
pub async fn get_member_role(db_pool: &SqlitePool, user_id: &str) -> AppResult<Option<Papel>> {
    let role: Option<String> = sqlx::query_scalar(
        "SELECT role FROM organization_members WHERE user_id = ?1 ORDER BY created_at ASC, id ASC LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(db_pool)
    .await?;

    Ok(role.as_deref().and_then(Papel::parse))
}

/// Alunos (papel `student`) de todas as organizações onde o utilizador é professor.
pub async fn students_by_teacher(db_pool: &SqlitePool, teacher_id: &str) -> AppResult<Vec<Profile>> {
    tracing::debug!("Buscando alunos do professor {}", teacher_id);
    let sql = format!(
        r#"
        SELECT DISTINCT {PROFILE_COLUMNS}
        FROM profiles p
        JOIN organization_members aluno ON aluno.user_id = p.id AND aluno.role = 'student'
        JOIN organization_members prof ON prof.organization_id = aluno.organization_id
        WHERE prof.user_id = ?1 AND prof.role = 'professor'
        ORDER BY p.full_name ASC, p.email ASC
        "#
    );
    let alunos = sqlx::query_as::<_, Profile>(&sql)
        .bind(teacher_id)
        .fetch_all(db_pool)
        .await?;
    tracing::debug!("Encontrados {} alunos.", alunos.len());
    Ok(alunos)
}

/// O aluno pertence a alguma turma deste professor?
pub async fn professor_tem_aluno(db_pool: &SqlitePool, teacher_id: &str, student_id: &str) -> AppResult<bool> {
    let found: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1
            FROM organization_members aluno
            JOIN organization_members prof ON prof.organization_id = aluno.organization_id
            WHERE aluno.user_id = ?2 AND aluno.role = 'student'
              AND prof.user_id = ?1 AND prof.role = 'professor'
        )
        "#,
    )
    .bind(teacher_id)
    .bind(student_id)
    .fetch_one(db_pool)
    .await?;
    Ok(found)
}

/// Quem está logado pode ver a ficha deste aluno? (o próprio ou um professor dele)
pub async fn pode_ver_aluno(db_pool: &SqlitePool, viewer_id: &str, student_id: &str) -> AppResult<bool> {
    if viewer_id == student_id {
        return Ok(true);
    }
    professor_tem_aluno(db_pool, viewer_id, student_id).await
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{db::test_pool, models::user::UserCategory};

    /// Cria perfil + organização + vínculos diretamente, para os testes dos serviços.
    pub(crate) async fn seed_turma(pool: &SqlitePool) -> (String, String, Vec<String>) {
        sqlx::query("INSERT INTO organizations (id, name) VALUES ('org1', '8º Ano B')")
            .execute(pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO profiles (id, email, password_hash, full_name, user_category) VALUES ('prof', 'prof@facillithub.com', 'x', 'Marta Lima', 'professor')")
            .execute(pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO organization_members (id, user_id, organization_id, role) VALUES ('m0', 'prof', 'org1', 'professor')")
            .execute(pool)
            .await
            .unwrap();

        let mut alunos = Vec::new();
        for (i, nome) in ["Ana Clara Souza", "Bruno Martins"].iter().enumerate() {
            let id = format!("aluno{}", i + 1);
            sqlx::query("INSERT INTO profiles (id, email, password_hash, full_name, user_category) VALUES (?1, ?2, 'x', ?3, 'aluno')")
                .bind(&id)
                .bind(format!("{}@facillithub.com", id))
                .bind(*nome)
                .execute(pool)
                .await
                .unwrap();
            sqlx::query("INSERT INTO organization_members (id, user_id, organization_id, role) VALUES (?1, ?2, 'org1', 'student')")
                .bind(format!("m{}", i + 1))
                .bind(&id)
                .execute(pool)
                .await
                .unwrap();
            alunos.push(id);
        }
        ("org1".into(), "prof".into(), alunos)
    }

    #[tokio::test]
    async fn update_profile_em_conta_inexistente_falha() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let err = update_profile(&mut conn, "fantasma", &ProfileFields::default()).await.unwrap_err();
        assert!(matches!(err, AppError::MissingRecord(_)));
    }

    #[tokio::test]
    async fn update_profile_grava_campos_e_detalhes() {
        let pool = test_pool().await;
        let (_, _, alunos) = seed_turma(&pool).await;
        let mut fields = ProfileFields {
            nickname: Some("Aninha".into()),
            birth_date: Some("2012-03-04".into()),
            category: Some(UserCategory::Aluno),
            ..Default::default()
        };
        fields.category_details.insert("turma".into(), "8º Ano B".into());

        let mut conn = pool.acquire().await.unwrap();
        update_profile(&mut conn, &alunos[0], &fields).await.unwrap();
        drop(conn);

        let p = find_profile_by_id(&pool, &alunos[0]).await.unwrap().unwrap();
        assert_eq!(p.full_name.as_deref(), Some("Ana Clara Souza"));
        assert_eq!(p.nickname.as_deref(), Some("Aninha"));
        let details: serde_json::Value = serde_json::from_str(&p.category_details).unwrap();
        assert_eq!(details["turma"], "8º Ano B");
    }

    #[tokio::test]
    async fn alunos_do_professor() {
        let pool = test_pool().await;
        let (_, prof, alunos) = seed_turma(&pool).await;

        let lista = students_by_teacher(&pool, &prof).await.unwrap();
        assert_eq!(lista.iter().map(|p| p.id.clone()).collect::<Vec<_>>(), alunos);
        assert!(students_by_teacher(&pool, &alunos[0]).await.unwrap().is_empty());

        assert!(professor_tem_aluno(&pool, &prof, &alunos[1]).await.unwrap());
        assert!(!professor_tem_aluno(&pool, &alunos[0], &alunos[1]).await.unwrap());
        assert!(pode_ver_aluno(&pool, &alunos[1], &alunos[1]).await.unwrap());

        assert_eq!(get_member_role(&pool, &prof).await.unwrap(), Some(Papel::Professor));
        assert_eq!(get_member_role(&pool, &alunos[0]).await.unwrap(), Some(Papel::Aluno));
    }
}
