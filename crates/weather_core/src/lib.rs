//! # Weather Core
//!
//! Crate compartilhada da estação meteorológica: codec do protocolo serial
//! de frames fixos do sensor de nuvens, fórmulas de calibração, agregação
//! mediana-com-quórum, tipos do ciclo de medição, política de segurança e
//! configuração TOML.
//!
//! ## Módulos
//! - [`frame`] – Codec de blocos de 15 bytes, handshake e padrões de resposta
//! - [`commands`] – Tabela de comandos do dispositivo
//! - [`calibration`] – Conversões bruto → grandeza física
//! - [`aggregate`] – Mediana com quórum mínimo
//! - [`types`] – Leituras, chave e veredito de segurança
//! - [`safety`] – Política de segurança plugável
//! - [`config`] – Configuração unificada via TOML

pub mod aggregate;
pub mod calibration;
pub mod commands;
pub mod config;
pub mod frame;
pub mod safety;
pub mod types;

// Re-exports convenientes
pub use config::StationConfig;
pub use frame::{QueryOutcome, ResponsePattern};
pub use types::{Safety, SwitchState, WeatherReadings};
