// src/models/cadastro.rs
use crate::{
    error::{AppError, AppResult},
    models::organizacao::ConviteValido,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fluxo {
    /// Cadastro livre: e-mail, senha e dados pessoais.
    Direto,
    /// Cadastro com código de convite emitido por um professor.
    Convite,
}

/// Etapas do cadastro. A parte interativa (até `CriandoConta`) vive na sessão;
/// o resto é percorrido dentro da transação de registo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "etapa")]
pub enum EtapaCadastro {
    EscolhendoFluxo,
    DadosPessoais,
    InserindoCodigo,
    CodigoValidado { convite: ConviteValido },
    CompletandoPerfil { convite: ConviteValido },
    CriandoConta { fluxo: Fluxo },
    VinculandoOrganizacao { fluxo: Fluxo, user_id: String },
    MarcandoCodigo { user_id: String },
    Concluido { user_id: String },
}

#[derive(Debug, Clone)]
pub enum EventoCadastro {
    Escolher(Fluxo),
    CodigoAceite(ConviteValido),
    Continuar,
    Submeter,
    /// `vincular` indica se ainda há uma organização a ligar (sempre no fluxo com convite).
    ContaCriada { user_id: String, vincular: bool },
    Vinculado,
    CodigoMarcado,
    Voltar,
}

impl Default for EtapaCadastro {
    fn default() -> Self {
        EtapaCadastro::EscolhendoFluxo
    }
}

impl EtapaCadastro {
    pub fn nome(&self) -> &'static str {
        match self {
            EtapaCadastro::EscolhendoFluxo => "EscolhendoFluxo",
            EtapaCadastro::DadosPessoais => "DadosPessoais",
            EtapaCadastro::InserindoCodigo => "InserindoCodigo",
            EtapaCadastro::CodigoValidado { .. } => "CodigoValidado",
            EtapaCadastro::CompletandoPerfil { .. } => "CompletandoPerfil",
            EtapaCadastro::CriandoConta { .. } => "CriandoConta",
            EtapaCadastro::VinculandoOrganizacao { .. } => "VinculandoOrganizacao",
            EtapaCadastro::MarcandoCodigo { .. } => "MarcandoCodigo",
            EtapaCadastro::Concluido { .. } => "Concluido",
        }
    }

    /// Convite em uso, nas etapas que o têm.
    pub fn convite(&self) -> Option<&ConviteValido> {
        match self {
            EtapaCadastro::CodigoValidado { convite } | EtapaCadastro::CompletandoPerfil { convite } => Some(convite),
            _ => None,
        }
    }

    /// Aplica um evento. Transições não previstas são erro de validação e não mudam nada.
    pub fn avancar(self, evento: EventoCadastro) -> AppResult<EtapaCadastro> {
        use EtapaCadastro as E;
        use EventoCadastro as Ev;

        let proxima = match (&self, evento) {
            (E::EscolhendoFluxo, Ev::Escolher(Fluxo::Direto)) => E::DadosPessoais,
            (E::EscolhendoFluxo, Ev::Escolher(Fluxo::Convite)) => E::InserindoCodigo,

            (E::InserindoCodigo, Ev::CodigoAceite(convite)) => E::CodigoValidado { convite },
            (E::CodigoValidado { convite }, Ev::Continuar) => E::CompletandoPerfil { convite: convite.clone() },

            (E::DadosPessoais, Ev::Submeter) => E::CriandoConta { fluxo: Fluxo::Direto },
            (E::CompletandoPerfil { .. }, Ev::Submeter) => E::CriandoConta { fluxo: Fluxo::Convite },

            (E::CriandoConta { fluxo: Fluxo::Convite }, Ev::ContaCriada { user_id, .. }) => {
                E::VinculandoOrganizacao { fluxo: Fluxo::Convite, user_id }
            }
            (E::CriandoConta { fluxo: Fluxo::Direto }, Ev::ContaCriada { user_id, vincular: true }) => {
                E::VinculandoOrganizacao { fluxo: Fluxo::Direto, user_id }
            }
            (E::CriandoConta { fluxo: Fluxo::Direto }, Ev::ContaCriada { user_id, vincular: false }) => {
                E::Concluido { user_id }
            }

            (E::VinculandoOrganizacao { fluxo: Fluxo::Convite, user_id }, Ev::Vinculado) => {
                E::MarcandoCodigo { user_id: user_id.clone() }
            }
            (E::VinculandoOrganizacao { fluxo: Fluxo::Direto, user_id }, Ev::Vinculado) => {
                E::Concluido { user_id: user_id.clone() }
            }
            (E::MarcandoCodigo { user_id }, Ev::CodigoMarcado) => E::Concluido { user_id: user_id.clone() },

            (
                E::DadosPessoais | E::InserindoCodigo | E::CodigoValidado { .. } | E::CompletandoPerfil { .. },
                Ev::Voltar,
            ) => E::EscolhendoFluxo,

            (_, evento) => {
                tracing::warn!("Transição de cadastro inválida: {} com {:?}", self.nome(), evento);
                return Err(AppError::Validation(
                    "Passo de cadastro fora de ordem. Recomece o cadastro.".into(),
                ));
            }
        };

        tracing::debug!("Cadastro: {} -> {}", self.nome(), proxima.nome());
        Ok(proxima)
    }
}

// --- Formulários ---

#[derive(Debug, Deserialize)]
pub struct EscolhaFluxoForm {
    pub fluxo: String, // "direto" ou "convite"
}

#[derive(Debug, Deserialize)]
pub struct CodigoForm {
    pub code: String,
}

/// Completar o perfil depois de validar o convite.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CadastroConviteForm {
    pub password: String,
    pub password_confirm: String,
    #[serde(default)]
    pub nickname: String,
    /// Sobrepõe o nome pré-preenchido, se vier preenchido.
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub birth_date: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CadastroDiretoForm {
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub birth_date: String,
    #[serde(default)]
    pub user_category: String,
    /// Aluno: turma
    #[serde(default)]
    pub turma: String,
    /// Professor: disciplina
    #[serde(default)]
    pub disciplina: String,
    /// Professor: cria a organização (turma/escola) e fica como professor dela.
    #[serde(default)]
    pub nome_organizacao: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::organizacao::{DadosPreCadastro, Papel};

    fn convite() -> ConviteValido {
        ConviteValido {
            codigo_id: "c1".into(),
            code: "ABCD1234".into(),
            organization_id: "org".into(),
            papel: Papel::Aluno,
            dados: DadosPreCadastro::default(),
        }
    }

    #[test]
    fn fluxo_com_convite_percorre_todas_as_etapas() {
        let etapa = EtapaCadastro::default()
            .avancar(EventoCadastro::Escolher(Fluxo::Convite))
            .and_then(|e| e.avancar(EventoCadastro::CodigoAceite(convite())))
            .and_then(|e| e.avancar(EventoCadastro::Continuar))
            .unwrap();
        assert_eq!(etapa.convite().map(|c| c.code.as_str()), Some("ABCD1234"));

        let etapa = etapa
            .avancar(EventoCadastro::Submeter)
            .and_then(|e| e.avancar(EventoCadastro::ContaCriada { user_id: "u1".into(), vincular: true }))
            .and_then(|e| e.avancar(EventoCadastro::Vinculado))
            .unwrap();
        assert_eq!(etapa, EtapaCadastro::MarcandoCodigo { user_id: "u1".into() });

        let etapa = etapa.avancar(EventoCadastro::CodigoMarcado).unwrap();
        assert_eq!(etapa, EtapaCadastro::Concluido { user_id: "u1".into() });
    }

    #[test]
    fn fluxo_direto_sem_organizacao_termina_apos_criar_conta() {
        let etapa = EtapaCadastro::default()
            .avancar(EventoCadastro::Escolher(Fluxo::Direto))
            .and_then(|e| e.avancar(EventoCadastro::Submeter))
            .and_then(|e| e.avancar(EventoCadastro::ContaCriada { user_id: "u2".into(), vincular: false }))
            .unwrap();
        assert_eq!(etapa, EtapaCadastro::Concluido { user_id: "u2".into() });
    }

    #[test]
    fn fluxo_direto_com_organizacao_nao_marca_codigo() {
        let etapa = EtapaCadastro::CriandoConta { fluxo: Fluxo::Direto }
            .avancar(EventoCadastro::ContaCriada { user_id: "u3".into(), vincular: true })
            .and_then(|e| e.avancar(EventoCadastro::Vinculado))
            .unwrap();
        assert_eq!(etapa, EtapaCadastro::Concluido { user_id: "u3".into() });
    }

    #[test]
    fn nao_submete_sem_codigo_validado() {
        let err = EtapaCadastro::InserindoCodigo.avancar(EventoCadastro::Submeter).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn voltar_regressa_a_escolha() {
        let etapa = EtapaCadastro::CodigoValidado { convite: convite() }
            .avancar(EventoCadastro::Voltar)
            .unwrap();
        assert_eq!(etapa, EtapaCadastro::EscolhendoFluxo);
        assert!(EtapaCadastro::MarcandoCodigo { user_id: "u".into() }
            .avancar(EventoCadastro::Voltar)
            .is_err());
    }

    #[test]
    fn etapa_sobrevive_a_serializacao_da_sessao() {
        let etapa = EtapaCadastro::CompletandoPerfil { convite: convite() };
        let json = serde_json::to_value(&etapa).unwrap();
        assert_eq!(json["etapa"], "CompletandoPerfil");
        let de_volta: EtapaCadastro = serde_json::from_value(json).unwrap();
        assert_eq!(de_volta, etapa);
    }
}
