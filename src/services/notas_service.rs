// src/services/notas_service.rs
use crate::{
    error::{AppError, AppResult},
    models::notas::{
        Avaliacao, AvaliacaoInput, AvaliacaoRow, Bimestre, Boletim, ResumoNotas, StatusFinal, TotalBimestre,
    },
};
use sqlx::SqlitePool;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Percentual mínimo para ficar em recuperação.
pub const LIMITE_RECUPERACAO: f64 = 50.0;
/// Percentual mínimo para aprovação.
pub const LIMITE_APROVACAO: f64 = 70.0;

/// Classifica o aluno pelo percentual obtido.
pub fn classificar(percentual: f64) -> StatusFinal {
    if percentual < LIMITE_RECUPERACAO {
        StatusFinal::Reprovado
    } else if percentual < LIMITE_APROVACAO {
        StatusFinal::Recuperacao
    } else {
        StatusFinal::Aprovado
    }
}

/// Soma as notas e os valores máximos de um bimestre (valores em falta contam 0).
pub fn total_bimestre(avaliacoes: &[Avaliacao]) -> TotalBimestre {
    avaliacoes.iter().fold(TotalBimestre::default(), |acc, a| TotalBimestre {
        nota: acc.nota + a.nota_ou_zero(),
        valor_max: acc.valor_max + a.valor_max_ou_zero(),
    })
}

/// Agrega o boletim inteiro: totais por bimestre, totais finais, percentual e status.
/// Sem valor máximo nenhum, o percentual é 0 (e o aluno fica "Reprovado").
pub fn calcular_resumo(boletim: &Boletim) -> ResumoNotas {
    let por_bimestre: BTreeMap<Bimestre, TotalBimestre> = Bimestre::TODOS
        .into_iter()
        .map(|b| (b, total_bimestre(boletim.avaliacoes(b))))
        .collect();

    let nota_final: f64 = por_bimestre.values().map(|t| t.nota).sum();
    let valor_max_final: f64 = por_bimestre.values().map(|t| t.valor_max).sum();
    let percentual = if valor_max_final > 0.0 {
        nota_final / valor_max_final * 100.0
    } else {
        0.0
    };

    ResumoNotas {
        nota_final,
        valor_max_final,
        percentual,
        status: classificar(percentual),
        por_bimestre,
    }
}

/// Carrega o boletim de um aluno, com os quatro bimestres sempre presentes.
pub async fn carregar_boletim(db_pool: &SqlitePool, student_id: &str) -> AppResult<Boletim> {
    let rows = sqlx::query_as::<_, AvaliacaoRow>(
        r#"
        SELECT id, student_id, bimestre, posicao, nome, valor_max, nota
        FROM avaliacoes
        WHERE student_id = ?1
        ORDER BY bimestre ASC, posicao ASC
        "#,
    )
    .bind(student_id)
    .fetch_all(db_pool)
    .await?;

    let mut boletim = Boletim::default();
    for row in rows {
        let Some(bimestre) = Bimestre::parse(&row.bimestre) else {
            tracing::warn!("Avaliação {} com bimestre desconhecido '{}', ignorada.", row.id, row.bimestre);
            continue;
        };
        boletim.push(
            bimestre,
            Avaliacao {
                id: row.id,
                nome: row.nome,
                valor_max: row.valor_max,
                nota: row.nota,
            },
        );
    }
    Ok(boletim)
}

/// Boletins de vários alunos de uma vez (página de notas da turma).
pub async fn carregar_boletins(db_pool: &SqlitePool, student_ids: &[String]) -> AppResult<HashMap<String, Boletim>> {
    let mut boletins = HashMap::with_capacity(student_ids.len());
    for id in student_ids {
        boletins.insert(id.clone(), carregar_boletim(db_pool, id).await?);
    }
    Ok(boletins)
}

/// Substitui todas as avaliações de um bimestre de um aluno pela lista recebida, na mesma ordem.
/// Devolve o boletim relido da base.
pub async fn salvar_bimestre(
    db_pool: &SqlitePool,
    student_id: &str,
    bimestre: Bimestre,
    avaliacoes: &[AvaliacaoInput],
) -> AppResult<Boletim> {
    if let Some(pos) = avaliacoes.iter().position(|a| a.nome.trim().is_empty()) {
        return Err(AppError::Validation(format!("A avaliação {} não tem nome.", pos + 1)));
    }

    tracing::info!(
        "Lançando {} avaliações no {} do aluno {}",
        avaliacoes.len(),
        bimestre.as_str(),
        student_id
    );

    let mut tx = db_pool.begin().await?;

    sqlx::query("DELETE FROM avaliacoes WHERE student_id = ?1 AND bimestre = ?2")
        .bind(student_id)
        .bind(bimestre.as_str())
        .execute(&mut *tx)
        .await?;

    for (posicao, a) in avaliacoes.iter().enumerate() {
        let id = a
            .id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let result = sqlx::query(
            r#"
            INSERT INTO avaliacoes (id, student_id, bimestre, posicao, nome, valor_max, nota)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&id)
        .bind(student_id)
        .bind(bimestre.as_str())
        .bind(posicao as i64)
        .bind(a.nome.trim())
        .bind(a.valor_max.unwrap_or(0.0))
        .bind(a.nota.unwrap_or(0.0))
        .execute(&mut *tx)
        .await;

        if let Err(sqlx::Error::Database(db_err)) = &result {
            if db_err.is_foreign_key_violation() {
                tracing::warn!("Lançamento de notas para aluno inexistente: {}", student_id);
                return Err(AppError::NotFound(format!("aluno {}", student_id)));
            }
            if db_err.is_unique_violation() {
                return Err(AppError::Validation(format!("Avaliação repetida: {}", id)));
            }
        }
        result?;
    }

    tx.commit().await?;
    carregar_boletim(db_pool, student_id).await
}
