// src/templates.rs
use crate::{
    error::{AppError, AppResult},
    models::{
        frequencia::{AlunoFrequencia, StatusPresenca},
        notas::{Bimestre, Boletim, ResumoNotas},
        organizacao::{ConviteValido, Papel},
        user::Profile,
    },
    services::notas_service,
    web::mw_auth::SessaoAtual,
};
use askama::Template;
use axum::response::Html;

/// Renderiza um template; falhas de renderização viram erro interno.
pub fn render<T: Template>(template: &T) -> AppResult<Html<String>> {
    template.render().map(Html).map_err(|e| {
        tracing::error!("Falha ao renderizar template: {}", e);
        AppError::InternalServerError
    })
}

/// Números das notas sem casas decimais inúteis ("13", "7.5").
pub fn numero(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{:.0}", v)
    } else {
        format!("{:.2}", v).trim_end_matches('0').to_string()
    }
}

// --- Dados partilhados pelas páginas autenticadas ---

/// Cabeçalho com o nome e os links que o utilizador pode ver.
#[derive(Debug, Clone)]
pub struct Nav {
    pub nome: String,
    pub is_professor: bool,
}

impl From<&SessaoAtual> for Nav {
    fn from(sessao: &SessaoAtual) -> Self {
        Nav {
            nome: sessao.nome.clone(),
            is_professor: sessao.is_professor(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AvaliacaoView {
    pub id: String,
    pub nome: String,
    pub nota: String,
    pub valor_max: String,
}

#[derive(Debug, Clone)]
pub struct BimestreView {
    pub chave: &'static str,
    pub titulo: String,
    pub nota: String,
    pub valor_max: String,
    pub avaliacoes: Vec<AvaliacaoView>,
}

/// Boletim pronto a mostrar: totais por bimestre e finais, percentual e status.
#[derive(Debug, Clone)]
pub struct ResumoView {
    pub nota_final: String,
    pub valor_max_final: String,
    pub percentual: String,
    pub status: &'static str,
    pub status_class: &'static str,
    pub bimestres: Vec<BimestreView>,
}

impl ResumoView {
    pub fn new(boletim: &Boletim, resumo: &ResumoNotas) -> Self {
        let bimestres = Bimestre::TODOS
            .into_iter()
            .map(|b| {
                let total = resumo.por_bimestre.get(&b).copied().unwrap_or_default();
                BimestreView {
                    chave: b.as_str(),
                    titulo: b.to_string(),
                    nota: numero(total.nota),
                    valor_max: numero(total.valor_max),
                    avaliacoes: boletim
                        .avaliacoes(b)
                        .iter()
                        .map(|a| AvaliacaoView {
                            id: a.id.clone(),
                            nome: a.nome.clone(),
                            nota: numero(a.nota_ou_zero()),
                            valor_max: numero(a.valor_max_ou_zero()),
                        })
                        .collect(),
                }
            })
            .collect();

        ResumoView {
            nota_final: numero(resumo.nota_final),
            valor_max_final: numero(resumo.valor_max_final),
            percentual: format!("{:.1}", resumo.percentual),
            status: resumo.status.as_str(),
            status_class: resumo.status.css_class(),
            bimestres,
        }
    }

    pub fn do_boletim(boletim: &Boletim) -> Self {
        Self::new(boletim, &notas_service::calcular_resumo(boletim))
    }
}

/// Linha de aluno nas listas da turma.
#[derive(Debug, Clone)]
pub struct AlunoLinha {
    pub id: String,
    pub nome: String,
    pub iniciais: String,
    pub resumo: ResumoView,
    pub faltas: usize,
}

impl AlunoLinha {
    pub fn new(profile: &Profile, boletim: &Boletim, faltas: usize) -> Self {
        AlunoLinha {
            id: profile.id.clone(),
            nome: profile.display_name().to_string(),
            iniciais: profile.initials(),
            resumo: ResumoView::do_boletim(boletim),
            faltas,
        }
    }
}

// --- Páginas públicas ---

/// Página de erro; a mensagem pode conter texto vindo do pedido.
#[derive(Template)]
#[template(path = "erro.html")]
pub struct ErroPage {
    pub status: u16,
    pub mensagem: String,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginPage {
    pub error: Option<String>,
    pub aviso: Option<String>,
}

#[derive(Template)]
#[template(path = "cadastro_escolha.html")]
pub struct CadastroEscolhaPage {
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "cadastro_codigo.html")]
pub struct CadastroCodigoPage {
    pub error: Option<String>,
    pub code: String,
}

#[derive(Template)]
#[template(path = "cadastro_convite.html")]
pub struct CadastroConvitePage {
    pub error: Option<String>,
    pub code: String,
    pub email: String,
    pub full_name: String,
    pub birth_date: String,
    pub e_professor: bool,
}

impl CadastroConvitePage {
    pub fn new(convite: &ConviteValido, error: Option<String>) -> Self {
        CadastroConvitePage {
            error,
            code: convite.code.clone(),
            email: convite.dados.email.clone().unwrap_or_default(),
            full_name: convite.dados.full_name.clone().unwrap_or_default(),
            birth_date: convite.dados.birth_date.clone().unwrap_or_default(),
            e_professor: convite.papel == Papel::Professor,
        }
    }
}

#[derive(Template)]
#[template(path = "cadastro_direto.html")]
pub struct CadastroDiretoPage {
    pub error: Option<String>,
    pub email: String,
    pub full_name: String,
}

// --- Páginas autenticadas ---

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardPage {
    pub nav: Nav,
    pub aviso: Option<String>,
    pub organizacao: Option<String>,
    /// Professor: a turma.
    pub alunos: Vec<AlunoLinha>,
    /// Aluno: o próprio boletim e faltas.
    pub meu_resumo: Option<ResumoView>,
    pub dias_de_falta: Vec<String>,
    pub email_domain: String,
}

#[derive(Template)]
#[template(path = "notas.html")]
pub struct NotasPage {
    pub nav: Nav,
    pub aviso: Option<String>,
    pub alunos: Vec<AlunoLinha>,
}

#[derive(Template)]
#[template(path = "notas_aluno.html")]
pub struct NotasAlunoPage {
    pub nav: Nav,
    pub aluno_id: String,
    pub aluno_nome: String,
    pub resumo: ResumoView,
}

/// Uma opção de estado na chamada.
#[derive(Debug, Clone)]
pub struct OpcaoStatus {
    pub valor: &'static str,
    pub sigla: &'static str,
    pub marcado: bool,
}

#[derive(Debug, Clone)]
pub struct LinhaChamada {
    pub id: String,
    pub nome: String,
    pub opcoes: Vec<OpcaoStatus>,
    pub faltas: usize,
}

impl LinhaChamada {
    pub fn new(aluno: &AlunoFrequencia, pendente: Option<StatusPresenca>) -> Self {
        LinhaChamada {
            id: aluno.id.clone(),
            nome: aluno.nome.clone(),
            opcoes: StatusPresenca::TODOS
                .into_iter()
                .map(|s| OpcaoStatus {
                    valor: s.as_str(),
                    sigla: s.sigla(),
                    marcado: pendente == Some(s),
                })
                .collect(),
            faltas: aluno
                .frequencia
                .values()
                .filter(|s| **s == StatusPresenca::Ausente)
                .count(),
        }
    }
}

#[derive(Template)]
#[template(path = "frequencia.html")]
pub struct FrequenciaPage {
    pub nav: Nav,
    pub aviso: Option<String>,
    pub data: String,
    pub linhas: Vec<LinhaChamada>,
}

/// Par chave/valor dos detalhes da categoria.
#[derive(Debug, Clone)]
pub struct Detalhe {
    pub chave: String,
    pub valor: String,
}

#[derive(Template)]
#[template(path = "ficha_aluno.html")]
pub struct FichaAlunoPage {
    pub nav: Nav,
    pub nome: String,
    pub iniciais: String,
    pub email: String,
    pub nickname: String,
    pub birth_date: String,
    pub categoria: String,
    pub detalhes: Vec<Detalhe>,
    pub notes: String,
    pub resumo: ResumoView,
    pub dias_de_falta: Vec<String>,
}

impl FichaAlunoPage {
    pub fn new(nav: Nav, profile: &Profile, boletim: &Boletim, dias_de_falta: Vec<String>) -> Self {
        let detalhes = serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(&profile.category_details)
            .unwrap_or_else(|e| {
                tracing::warn!("Detalhes de categoria ilegíveis no perfil {}: {}", profile.id, e);
                Default::default()
            })
            .into_iter()
            .map(|(chave, valor)| Detalhe {
                chave,
                valor: match valor {
                    serde_json::Value::String(s) => s,
                    outro => outro.to_string(),
                },
            })
            .collect();

        FichaAlunoPage {
            nav,
            nome: profile.display_name().to_string(),
            iniciais: profile.initials(),
            email: profile.email.clone(),
            nickname: profile.nickname.clone().unwrap_or_default(),
            birth_date: profile.birth_date.clone().unwrap_or_default(),
            categoria: profile.category().to_string(),
            detalhes,
            notes: profile.notes.clone().unwrap_or_default(),
            resumo: ResumoView::do_boletim(boletim),
            dias_de_falta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::notas::Avaliacao;

    #[test]
    fn numeros_sem_zeros_a_mais() {
        assert_eq!(numero(23.0), "23");
        assert_eq!(numero(7.5), "7.5");
        assert_eq!(numero(0.25), "0.25");
    }

    #[test]
    fn resumo_view_tem_os_quatro_bimestres() {
        let mut boletim = Boletim::default();
        boletim.push(
            Bimestre::B1,
            Avaliacao { id: "a1".into(), nome: "Prova Mensal".into(), valor_max: Some(15.0), nota: Some(13.0) },
        );
        boletim.push(
            Bimestre::B1,
            Avaliacao { id: "a2".into(), nome: "Trabalho".into(), valor_max: Some(10.0), nota: Some(10.0) },
        );
        let view = ResumoView::do_boletim(&boletim);
        assert_eq!(view.bimestres.len(), 4);
        assert_eq!(view.bimestres[0].nota, "23");
        assert_eq!(view.nota_final, "23");
        assert_eq!(view.valor_max_final, "25");
        assert_eq!(view.percentual, "92.0");
        assert_eq!(view.status, "Aprovado");
    }

    #[test]
    fn login_renderiza_erro_escapado() {
        let html = LoginPage { error: Some("<b>E-mail ou senha inválidos.".into()), aviso: None }
            .render()
            .unwrap();
        assert!(html.contains("&lt;b&gt;E-mail ou senha inválidos."));
        assert!(!html.contains("<b>E-mail"));
    }
}
