//! Tipos compartilhados do ciclo de medição.
//!
//! Porta direta das propriedades da classe Python para structs Rust com
//! serde. Toda grandeza agregada é `Option`: ou o quórum foi atingido e há
//! valor, ou o campo fica ausente — nunca um default numérico parcial.

use serde::{Deserialize, Serialize};
use std::fmt;

// ──────────────────────────────────────────────
// Chave do dispositivo
// ──────────────────────────────────────────────

/// Posição da chave do dispositivo, resolvida por consenso de duas sondas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SwitchState {
    Open,
    Closed,
    #[default]
    Unknown,
}

impl fmt::Display for SwitchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SwitchState::Open => "OPEN",
            SwitchState::Closed => "CLOSED",
            SwitchState::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

// ──────────────────────────────────────────────
// Veredito de segurança
// ──────────────────────────────────────────────

/// Veredito do avaliador de segurança para um ciclo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Safety {
    Safe,
    Unsafe,
}

impl fmt::Display for Safety {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Safety::Safe => "SAFE",
            Safety::Unsafe => "UNSAFE",
        };
        f.write_str(s)
    }
}

// ──────────────────────────────────────────────
// Leituras agregadas de um ciclo
// ──────────────────────────────────────────────

/// Conjunto de leituras agregadas de um ciclo de medição.
///
/// Internamente em f64; os logs persistem as colunas numéricas em f32.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeatherReadings {
    /// Temperatura ambiente (K)
    pub ambient_temp_k: Option<f64>,
    /// Temperatura IR do céu (K)
    pub sky_temp_k: Option<f64>,
    /// Velocidade do vento (km/h)
    pub wind_speed_kmh: Option<f64>,
    /// Tensão interna de referência (V)
    pub internal_voltage_v: Option<f64>,
    /// Resistência do LDR (kΩ)
    pub ldr_resistance_kohm: Option<f64>,
    /// Temperatura do NTC do sensor de chuva (K)
    pub rain_sensor_temp_k: Option<f64>,
    /// Ciclo de trabalho do PWM do aquecedor (%)
    pub pwm_percent: Option<f64>,
    /// Contadores de erro internos, unidos por espaço (ex.: "0 0 0 0")
    pub errors: Option<String>,
    /// Posição da chave
    pub switch: SwitchState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_readings_are_all_absent() {
        let r = WeatherReadings::default();
        assert_eq!(r.ambient_temp_k, None);
        assert_eq!(r.sky_temp_k, None);
        assert_eq!(r.errors, None);
        assert_eq!(r.switch, SwitchState::Unknown);
    }

    #[test]
    fn display_matches_log_columns() {
        assert_eq!(SwitchState::Open.to_string(), "OPEN");
        assert_eq!(SwitchState::Closed.to_string(), "CLOSED");
        assert_eq!(SwitchState::Unknown.to_string(), "UNKNOWN");
        assert_eq!(Safety::Safe.to_string(), "SAFE");
        assert_eq!(Safety::Unsafe.to_string(), "UNSAFE");
    }
}
