// src/services/cadastro_service.rs
use crate::{
    error::{AppError, AppResult},
    models::{
        cadastro::{CadastroConviteForm, CadastroDiretoForm, EtapaCadastro, EventoCadastro, Fluxo},
        organizacao::{ConviteCodigo, ConviteValido, DadosPreCadastro, Papel, PreCadastroForm},
        user::{ProfileFields, UserCategory},
    },
    services::{auth_service, organizacao_service, user_service},
};
use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};

/// Reduz um login a `[a-z0-9._-]` (minúsculas, tudo o resto é descartado).
pub fn sanitize_login(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'))
        .collect()
}

/// `<login sanitizado>@<domínio>`. Login vazio depois de sanitizar é erro de validação.
pub fn derivar_email(login: &str, dominio: &str) -> AppResult<String> {
    let handle = sanitize_login(login);
    if handle.is_empty() {
        return Err(AppError::Validation(
            "O login precisa de letras ou números (a-z, 0-9, '.', '_' ou '-').".into(),
        ));
    }
    Ok(format!("{}@{}", handle, dominio))
}

fn texto_ou_none(raw: &str) -> Option<String> {
    let t = raw.trim();
    (!t.is_empty()).then(|| t.to_string())
}

/// Data de nascimento opcional; se vier, tem de ser `YYYY-MM-DD`.
fn data_nascimento(raw: &str) -> AppResult<Option<String>> {
    match texto_ou_none(raw) {
        None => Ok(None),
        Some(d) => NaiveDate::parse_from_str(&d, "%Y-%m-%d")
            .map(|_| Some(d.clone()))
            .map_err(|_| AppError::Validation(format!("Data de nascimento inválida: '{}'", d))),
    }
}

/// Avança a etapa registada (só para diagnóstico em caso de falha).
fn avancar(etapa: &mut EtapaCadastro, evento: EventoCadastro) -> AppResult<()> {
    *etapa = etapa.clone().avancar(evento)?;
    Ok(())
}

/// Professor pré-cadastra um aluno: deriva o e-mail e emite um código de convite da sua turma.
pub async fn pre_cadastrar_aluno(
    db_pool: &SqlitePool,
    teacher_id: &str,
    form: &PreCadastroForm,
    email_domain: &str,
) -> AppResult<ConviteCodigo> {
    let full_name = texto_ou_none(&form.full_name)
        .ok_or_else(|| AppError::Validation("Informe o nome completo do aluno.".into()))?;
    let email = derivar_email(&form.login, email_domain)?;
    let birth_date = data_nascimento(&form.birth_date)?;

    if user_service::get_member_role(db_pool, teacher_id).await? != Some(Papel::Professor) {
        tracing::warn!("Pré-cadastro recusado: {} não é professor.", teacher_id);
        return Err(AppError::Unauthorized);
    }
    let org = organizacao_service::get_minha_organizacao(db_pool, teacher_id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if user_service::find_profile_by_email(db_pool, &email).await?.is_some() {
        return Err(AppError::Validation(format!("O login '{}' já está em uso.", email)));
    }
    if organizacao_service::email_reservado(db_pool, &email).await? {
        return Err(AppError::Validation(format!(
            "Já existe um convite pendente para '{}'.",
            email
        )));
    }

    let dados = DadosPreCadastro {
        full_name: Some(full_name),
        email: Some(email),
        birth_date,
    };
    organizacao_service::criar_codigo_convite(db_pool, &org.id, teacher_id, &dados).await
}

/// Resgata um convite: cria a conta, completa o perfil, vincula à organização e consome o código,
/// tudo numa transação. Qualquer falha desfaz tudo: nem conta órfã, nem código gasto.
pub async fn register_with_code(
    db_pool: &SqlitePool,
    code: &str,
    form: &CadastroConviteForm,
) -> AppResult<String> {
    auth_service::confirmar_senha(&form.password, &form.password_confirm)?;
    auth_service::validar_senha(&form.password)?;
    let birth_date = data_nascimento(&form.birth_date)?;
    let password_hash = auth_service::hash_password(&form.password).await?;

    let mut tx = db_pool.begin().await?;
    let convite = organizacao_service::validar_codigo(&mut tx, code).await?;

    let mut etapa = EtapaCadastro::CriandoConta { fluxo: Fluxo::Convite };
    let resultado = passos_convite(&mut tx, &mut etapa, &convite, form, birth_date, &password_hash).await;

    match resultado {
        Ok(user_id) => {
            tx.commit().await?;
            tracing::info!("✅ Cadastro com convite {} concluído para {}", convite.code, user_id);
            Ok(user_id)
        }
        Err(e) => {
            tracing::warn!("Cadastro com convite {} falhou em {}: {}", convite.code, etapa.nome(), e);
            tx.rollback().await?;
            Err(e)
        }
    }
}

async fn passos_convite(
    conn: &mut SqliteConnection,
    etapa: &mut EtapaCadastro,
    convite: &ConviteValido,
    form: &CadastroConviteForm,
    birth_date: Option<String>,
    password_hash: &str,
) -> AppResult<String> {
    let email = convite
        .dados
        .email
        .clone()
        .ok_or_else(|| AppError::Validation("Este convite não tem e-mail associado. Fale com o professor.".into()))?;

    let user_id = auth_service::create_account(conn, &email, password_hash).await?;
    avancar(etapa, EventoCadastro::ContaCriada { user_id: user_id.clone(), vincular: true })?;

    let fields = ProfileFields {
        full_name: texto_ou_none(&form.full_name).or_else(|| convite.dados.full_name.clone()),
        nickname: texto_ou_none(&form.nickname),
        birth_date: birth_date.or_else(|| convite.dados.birth_date.clone()),
        category: Some(match convite.papel {
            Papel::Professor => UserCategory::Professor,
            Papel::Aluno => UserCategory::Aluno,
        }),
        ..Default::default()
    };
    user_service::update_profile(conn, &user_id, &fields).await?;

    organizacao_service::link_to_organization(conn, &user_id, &convite.organization_id, convite.papel).await?;
    avancar(etapa, EventoCadastro::Vinculado)?;

    // Sempre por último: se algo acima falhar, o código continua válido
    organizacao_service::mark_code_used(conn, &convite.codigo_id, &user_id).await?;
    avancar(etapa, EventoCadastro::CodigoMarcado)?;

    Ok(user_id)
}

/// Cadastro sem convite. Um professor pode criar a sua turma no mesmo passo.
pub async fn register_direct(db_pool: &SqlitePool, form: &CadastroDiretoForm) -> AppResult<String> {
    auth_service::confirmar_senha(&form.password, &form.password_confirm)?;
    auth_service::validar_senha(&form.password)?;
    auth_service::normalizar_email(&form.email)?;

    let category = UserCategory::parse(&form.user_category)
        .ok_or_else(|| AppError::Validation("Escolha a categoria: aluno, professor ou outro.".into()))?;
    let nome_organizacao = texto_ou_none(&form.nome_organizacao);
    if nome_organizacao.is_some() && category != UserCategory::Professor {
        return Err(AppError::Validation("Só professores podem criar uma turma.".into()));
    }

    let mut fields = ProfileFields {
        full_name: texto_ou_none(&form.full_name),
        nickname: texto_ou_none(&form.nickname),
        birth_date: data_nascimento(&form.birth_date)?,
        category: Some(category),
        ..Default::default()
    };
    let detalhe = match category {
        UserCategory::Aluno => texto_ou_none(&form.turma).map(|t| ("turma", t)),
        UserCategory::Professor => texto_ou_none(&form.disciplina).map(|d| ("disciplina", d)),
        UserCategory::Outro => None,
    };
    if let Some((chave, valor)) = detalhe {
        fields.category_details.insert(chave.into(), valor.into());
    }

    let password_hash = auth_service::hash_password(&form.password).await?;
    let mut tx = db_pool.begin().await?;

    let mut etapa = EtapaCadastro::CriandoConta { fluxo: Fluxo::Direto };
    let resultado: AppResult<String> = async {
        let user_id = auth_service::create_account(&mut tx, &form.email, &password_hash).await?;
        avancar(
            &mut etapa,
            EventoCadastro::ContaCriada { user_id: user_id.clone(), vincular: nome_organizacao.is_some() },
        )?;
        user_service::update_profile(&mut tx, &user_id, &fields).await?;

        if let Some(nome) = &nome_organizacao {
            let org = organizacao_service::criar_organizacao(&mut tx, nome).await?;
            organizacao_service::link_to_organization(&mut tx, &user_id, &org.id, Papel::Professor).await?;
            avancar(&mut etapa, EventoCadastro::Vinculado)?;
        }
        Ok(user_id)
    }
    .await;

    match resultado {
        Ok(user_id) => {
            tx.commit().await?;
            tracing::info!("✅ Cadastro direto concluído para {} ({})", user_id, category);
            Ok(user_id)
        }
        Err(e) => {
            tracing::warn!("Cadastro direto falhou em {}: {}", etapa.nome(), e);
            tx.rollback().await?;
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::DEFAULT_EMAIL_DOMAIN,
        db::test_pool,
        services::user_service::tests::seed_turma,
    };

    fn form_convite(senha: &str) -> CadastroConviteForm {
        CadastroConviteForm {
            password: senha.into(),
            password_confirm: senha.into(),
            nickname: "Pedrinho".into(),
            ..Default::default()
        }
    }

    async fn convite_para_pedro(pool: &SqlitePool) -> (String, String) {
        let (org, prof, _) = seed_turma(pool).await;
        let form = PreCadastroForm {
            full_name: "Pedro Maia".into(),
            login: "Pedro.Maia".into(),
            birth_date: "2012-05-06".into(),
        };
        let codigo = pre_cadastrar_aluno(pool, &prof, &form, DEFAULT_EMAIL_DOMAIN).await.unwrap();
        (org, codigo.code)
    }

    async fn codigo_valido(pool: &SqlitePool, code: &str) -> AppResult<ConviteValido> {
        let mut conn = pool.acquire().await?;
        organizacao_service::validar_codigo(&mut conn, code).await
    }

    #[test]
    fn sanitize_e_idempotente_e_usa_so_o_alfabeto_permitido() {
        let entradas = ["Pedro.Maia", "  ana clara!! ", "JOÃO_silva-2", "ção", "a@b#c$", "", "...__--", "Ünïcödé 99"];
        for raw in entradas {
            let uma = sanitize_login(raw);
            assert_eq!(sanitize_login(&uma), uma, "{raw}");
            assert!(
                uma.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "._-".contains(c)),
                "{raw} -> {uma}"
            );
        }
        assert_eq!(sanitize_login("Pedro.Maia"), "pedro.maia");
        assert_eq!(sanitize_login("JOÃO_silva-2"), "joo_silva-2");
    }

    #[test]
    fn email_derivado() {
        assert_eq!(derivar_email("Pedro Maia", "facillithub.com").unwrap(), "pedromaia@facillithub.com");
        assert!(matches!(derivar_email("!!! çã ", "facillithub.com"), Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn resgate_do_convite_cria_conta_vinculada_e_consome_o_codigo() {
        let pool = test_pool().await;
        let (org, code) = convite_para_pedro(&pool).await;

        let user_id = register_with_code(&pool, &code.to_lowercase(), &form_convite("segredo1")).await.unwrap();

        let perfil = user_service::find_profile_by_id(&pool, &user_id).await.unwrap().unwrap();
        assert_eq!(perfil.email, "pedro.maia@facillithub.com");
        assert_eq!(perfil.full_name.as_deref(), Some("Pedro Maia"));
        assert_eq!(perfil.nickname.as_deref(), Some("Pedrinho"));
        assert_eq!(perfil.birth_date.as_deref(), Some("2012-05-06"));
        assert_eq!(perfil.category(), UserCategory::Aluno);

        let minha = organizacao_service::get_minha_organizacao(&pool, &user_id).await.unwrap().unwrap();
        assert_eq!(minha.id, org);
        assert_eq!(user_service::get_member_role(&pool, &user_id).await.unwrap(), Some(Papel::Aluno));

        assert!(matches!(codigo_valido(&pool, &code).await, Err(AppError::CodeAlreadyUsed)));
        assert!(matches!(
            register_with_code(&pool, &code, &form_convite("outra123")).await,
            Err(AppError::CodeAlreadyUsed)
        ));
    }

    #[tokio::test]
    async fn falha_no_vinculo_mantem_o_codigo_valido_e_nao_deixa_conta() {
        let pool = test_pool().await;
        let (_, code) = convite_para_pedro(&pool).await;
        sqlx::query(
            "CREATE TRIGGER recusa_vinculo BEFORE INSERT ON organization_members \
             BEGIN SELECT RAISE(ABORT, 'vinculo recusado'); END;",
        )
        .execute(&pool)
        .await
        .unwrap();

        let err = register_with_code(&pool, &code, &form_convite("segredo1")).await.unwrap_err();
        assert!(matches!(err, AppError::SqlxError(_)), "{err:?}");

        // O código continua resgatável e a conta não ficou criada
        let convite = codigo_valido(&pool, &code).await.unwrap();
        assert_eq!(convite.code, code);
        assert!(user_service::find_profile_by_email(&pool, "pedro.maia@facillithub.com")
            .await
            .unwrap()
            .is_none());

        sqlx::query("DROP TRIGGER recusa_vinculo").execute(&pool).await.unwrap();
        register_with_code(&pool, &code, &form_convite("segredo1")).await.unwrap();
    }

    #[tokio::test]
    async fn senhas_diferentes_nao_tocam_na_base() {
        let pool = test_pool().await;
        let (_, code) = convite_para_pedro(&pool).await;
        let mut form = form_convite("segredo1");
        form.password_confirm = "segredo2".into();

        assert!(matches!(register_with_code(&pool, &code, &form).await, Err(AppError::Validation(_))));
        assert!(codigo_valido(&pool, &code).await.is_ok());

        let curta = form_convite("123");
        assert!(matches!(register_with_code(&pool, &code, &curta).await, Err(AppError::Auth(_))));
    }

    #[tokio::test]
    async fn codigo_inexistente() {
        let pool = test_pool().await;
        assert!(matches!(
            register_with_code(&pool, "ZZZZ9999", &form_convite("segredo1")).await,
            Err(AppError::CodeNotFound)
        ));
    }

    #[tokio::test]
    async fn professor_direto_cria_turma_e_pode_emitir_convites() {
        let pool = test_pool().await;
        let form = CadastroDiretoForm {
            email: "marta@escola.org".into(),
            password: "segredo1".into(),
            password_confirm: "segredo1".into(),
            full_name: "Marta Lima".into(),
            user_category: "professor".into(),
            disciplina: "Matemática".into(),
            nome_organizacao: "9º Ano A".into(),
            ..Default::default()
        };
        let prof = register_direct(&pool, &form).await.unwrap();

        assert_eq!(user_service::get_member_role(&pool, &prof).await.unwrap(), Some(Papel::Professor));
        let perfil = user_service::find_profile_by_id(&pool, &prof).await.unwrap().unwrap();
        let details: serde_json::Value = serde_json::from_str(&perfil.category_details).unwrap();
        assert_eq!(details["disciplina"], "Matemática");

        let pre = PreCadastroForm { full_name: "Rita".into(), login: "rita".into(), birth_date: String::new() };
        let codigo = pre_cadastrar_aluno(&pool, &prof, &pre, "escola.org").await.unwrap();
        assert_eq!(codigo.code.len(), organizacao_service::CODE_LEN);

        // Mesmo login outra vez: o e-mail já está reservado por um convite pendente
        let err = pre_cadastrar_aluno(&pool, &prof, &pre, "escola.org").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)), "{err:?}");
        assert!(err.user_message().contains("rita@escola.org"));
        let pendentes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invitation_codes WHERE used_by_user_id IS NULL")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(pendentes, 1);
    }

    #[tokio::test]
    async fn aluno_direto_nao_pode_criar_turma_nem_emitir_convites() {
        let pool = test_pool().await;
        let mut form = CadastroDiretoForm {
            email: "lia@escola.org".into(),
            password: "segredo1".into(),
            password_confirm: "segredo1".into(),
            user_category: "aluno".into(),
            turma: "8º Ano B".into(),
            nome_organizacao: "Turma da Lia".into(),
            ..Default::default()
        };
        assert!(matches!(register_direct(&pool, &form).await, Err(AppError::Validation(_))));

        form.nome_organizacao.clear();
        let aluno = register_direct(&pool, &form).await.unwrap();
        assert!(organizacao_service::get_minha_organizacao(&pool, &aluno).await.unwrap().is_none());

        let pre = PreCadastroForm { full_name: "Rui".into(), login: "rui".into(), birth_date: String::new() };
        assert!(matches!(
            pre_cadastrar_aluno(&pool, &aluno, &pre, "escola.org").await,
            Err(AppError::Unauthorized)
        ));

        // E-mail repetido
        assert!(matches!(register_direct(&pool, &form).await, Err(AppError::Auth(_))));
    }
}
