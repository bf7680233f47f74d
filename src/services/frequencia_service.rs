// src/services/frequencia_service.rs
use crate::{
    error::{AppError, AppResult},
    models::{
        frequencia::{AlunoFrequencia, Chamada, FrequenciaRow, ResultadoChamada, StatusPresenca},
        user::Profile,
    },
};
use chrono::NaiveDate;
use futures_util::future::join_all;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::{BTreeMap, HashMap};

/// Valida uma data ISO (`YYYY-MM-DD`) e devolve-a normalizada.
pub fn validar_data(raw: &str) -> AppResult<String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| AppError::Validation(format!("Data inválida: '{}'", raw.trim())))
}

/// Grava (ou sobrescreve) o estado de um aluno num dia.
pub async fn gravar_status(
    db_pool: &SqlitePool,
    student_id: &str,
    data: &str,
    status: StatusPresenca,
) -> AppResult<()> {
    tracing::debug!("Gravando {} para {} em {}", status, student_id, data);
    sqlx::query(
        r#"
        INSERT INTO frequencia (student_id, data, status)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(student_id, data) DO UPDATE SET
           status = excluded.status,
           updated_at = datetime('now')
        "#,
    )
    .bind(student_id)
    .bind(data)
    .bind(status.as_str())
    .execute(db_pool)
    .await?;
    Ok(())
}

/// Carrega os alunos indicados com o respetivo histórico de frequência.
/// Estados desconhecidos na base são ignorados (com aviso).
pub async fn carregar_alunos_com_frequencia(
    db_pool: &SqlitePool,
    alunos: &[Profile],
) -> AppResult<Vec<AlunoFrequencia>> {
    if alunos.is_empty() {
        return Ok(Vec::new());
    }

    let mut query = QueryBuilder::<Sqlite>::new("SELECT student_id, data, status FROM frequencia WHERE student_id IN (");
    let mut ids = query.separated(", ");
    for aluno in alunos {
        ids.push_bind(&aluno.id);
    }
    ids.push_unseparated(") ORDER BY data ASC");
    let rows = query.build_query_as::<FrequenciaRow>().fetch_all(db_pool).await?;

    let mut por_aluno: HashMap<String, BTreeMap<String, StatusPresenca>> = HashMap::new();
    for row in rows {
        match StatusPresenca::parse(&row.status) {
            Some(status) => {
                por_aluno.entry(row.student_id).or_default().insert(row.data, status);
            }
            None => tracing::warn!(
                "Estado de frequência desconhecido '{}' para {} em {}",
                row.status,
                row.student_id,
                row.data
            ),
        }
    }

    Ok(alunos
        .iter()
        .map(|p| AlunoFrequencia {
            id: p.id.clone(),
            nome: p.display_name().to_string(),
            frequencia: por_aluno.remove(&p.id).unwrap_or_default(),
        })
        .collect())
}

/// Datas em que o aluno faltou sem justificação.
pub async fn dias_de_falta(db_pool: &SqlitePool, student_id: &str) -> AppResult<Vec<String>> {
    let dias = sqlx::query_scalar(
        "SELECT data FROM frequencia WHERE student_id = ?1 AND status = 'ausente' ORDER BY data ASC",
    )
    .bind(student_id)
    .fetch_all(db_pool)
    .await?;
    Ok(dias)
}

/// Grava a chamada de `data`: uma escrita por aluno cujo estado pendente difere do gravado.
/// As escritas correm em simultâneo; falhas individuais ficam registadas no resultado e no log,
/// sem desfazer as que correram bem. Quem chama deve reler a lista depois.
pub async fn commit_chamada(
    db_pool: &SqlitePool,
    data: &str,
    chamada: &Chamada,
    alunos: &[AlunoFrequencia],
) -> AppResult<ResultadoChamada> {
    let data = validar_data(data)?;
    let mut resultado = ResultadoChamada::default();

    let mut alterados: Vec<(&str, StatusPresenca)> = Vec::new();
    for aluno in alunos {
        match chamada.status_de(&aluno.id) {
            Some(novo) if aluno.status_em(&data) != Some(novo) => alterados.push((aluno.id.as_str(), novo)),
            _ => resultado.inalterados += 1,
        }
    }

    tracing::info!(
        "Chamada de {}: {} alterações, {} sem mudança",
        data,
        alterados.len(),
        resultado.inalterados
    );

    let escritas = alterados
        .iter()
        .map(|(id, status)| gravar_status(db_pool, id, &data, *status));
    let respostas = join_all(escritas).await;

    for ((id, _), resposta) in alterados.iter().zip(respostas) {
        match resposta {
            Ok(()) => resultado.gravados.push(id.to_string()),
            Err(e) => {
                tracing::error!("Falha ao gravar frequência de {} em {}: {:?}", id, data, e);
                resultado.falhas.push((id.to_string(), e.to_string()));
            }
        }
    }

    Ok(resultado)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::test_pool, services::user_service::{self, tests::seed_turma}};

    async fn alunos(pool: &SqlitePool, prof: &str) -> Vec<AlunoFrequencia> {
        let perfis = user_service::students_by_teacher(pool, prof).await.unwrap();
        carregar_alunos_com_frequencia(pool, &perfis).await.unwrap()
    }

    #[test]
    fn valida_datas() {
        assert_eq!(validar_data(" 2025-08-18 ").unwrap(), "2025-08-18");
        assert!(validar_data("18/08/2025").is_err());
        assert!(validar_data("2025-02-30").is_err());
    }

    #[tokio::test]
    async fn carrega_apenas_os_alunos_pedidos() {
        let pool = test_pool().await;
        let (_, prof, ids) = seed_turma(&pool).await;
        gravar_status(&pool, &ids[0], "2025-08-18", StatusPresenca::Ausente).await.unwrap();
        gravar_status(&pool, &ids[1], "2025-08-18", StatusPresenca::Presente).await.unwrap();
        gravar_status(&pool, &ids[1], "2025-08-19", StatusPresenca::Ausente).await.unwrap();

        let perfis = user_service::students_by_teacher(&pool, &prof).await.unwrap();
        let so_um = carregar_alunos_com_frequencia(&pool, &perfis[1..2]).await.unwrap();
        assert_eq!(so_um.len(), 1);
        assert_eq!(so_um[0].id, ids[1]);
        assert_eq!(so_um[0].frequencia.len(), 2);

        assert!(carregar_alunos_com_frequencia(&pool, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ultima_chamada_prevalece() {
        let pool = test_pool().await;
        let (_, prof, ids) = seed_turma(&pool).await;
        let dia = "2025-08-20";

        let mut chamada = Chamada::default();
        chamada.set_status(&ids[0], StatusPresenca::Ausente);
        let r = commit_chamada(&pool, dia, &chamada, &alunos(&pool, &prof).await).await.unwrap();
        assert_eq!(r.gravados, vec![ids[0].clone()]);

        let mut chamada = Chamada::default();
        chamada.set_status(&ids[0], StatusPresenca::Presente);
        commit_chamada(&pool, dia, &chamada, &alunos(&pool, &prof).await).await.unwrap();

        let lista = alunos(&pool, &prof).await;
        assert_eq!(lista[0].frequencia.len(), 1);
        assert_eq!(lista[0].status_em(dia), Some(StatusPresenca::Presente));
        assert!(dias_de_falta(&pool, &ids[0]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn alunos_sem_mudanca_nao_sao_escritos() {
        let pool = test_pool().await;
        let (_, prof, ids) = seed_turma(&pool).await;
        gravar_status(&pool, &ids[0], "2025-08-18", StatusPresenca::Presente).await.unwrap();

        let lista = alunos(&pool, &prof).await;
        let mut chamada = Chamada::do_dia(&lista, "2025-08-18");
        chamada.set_status(&ids[1], StatusPresenca::Atestado);

        let r = commit_chamada(&pool, "2025-08-18", &chamada, &lista).await.unwrap();
        assert_eq!(r.gravados, vec![ids[1].clone()]);
        assert_eq!(r.inalterados, 1);
        assert!(!r.teve_falhas());
    }

    #[tokio::test]
    async fn falha_de_um_aluno_nao_desfaz_os_outros() {
        let pool = test_pool().await;
        let (_, prof, ids) = seed_turma(&pool).await;
        sqlx::query(
            "CREATE TRIGGER recusa_aluno2 BEFORE INSERT ON frequencia WHEN NEW.student_id = 'aluno2' \
             BEGIN SELECT RAISE(ABORT, 'escrita recusada'); END;",
        )
        .execute(&pool)
        .await
        .unwrap();

        let lista = alunos(&pool, &prof).await;
        let mut chamada = Chamada::default();
        chamada.set_status(&ids[0], StatusPresenca::Ausente);
        chamada.set_status(&ids[1], StatusPresenca::Ausente);

        let r = commit_chamada(&pool, "2025-08-21", &chamada, &lista).await.unwrap();
        assert_eq!(r.gravados, vec![ids[0].clone()]);
        assert_eq!(r.falhas.len(), 1);
        assert_eq!(r.falhas[0].0, ids[1]);

        // Relida da base: só a escrita bem-sucedida existe
        let relida = alunos(&pool, &prof).await;
        assert_eq!(relida[0].status_em("2025-08-21"), Some(StatusPresenca::Ausente));
        assert_eq!(relida[1].status_em("2025-08-21"), None);
        assert_eq!(dias_de_falta(&pool, &ids[0]).await.unwrap(), vec!["2025-08-21".to_string()]);
    }

    #[tokio::test]
    async fn data_invalida_nao_grava_nada() {
        let pool = test_pool().await;
        let (_, prof, ids) = seed_turma(&pool).await;
        let mut chamada = Chamada::default();
        chamada.set_status(&ids[0], StatusPresenca::Presente);
        let err = commit_chamada(&pool, "ontem", &chamada, &alunos(&pool, &prof).await).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
