//! Configuração unificada via TOML.
//!
//! Um único `config.toml` cobre transporte serial, disciplina de
//! amostragem, resolução da chave e persistência. Seções parciais caem nos
//! defaults do dispositivo de referência.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Configuração do transporte serial.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Caminho do dispositivo (ex.: /dev/ttyAMA0)
    pub device: String,
    /// Baud rate fixo do dispositivo
    pub baud: u32,
    /// Timeout de cada leitura bloqueante (segundos)
    pub read_timeout_secs: f64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device: "/dev/ttyAMA0".into(),
            baud: 9600,
            read_timeout_secs: 2.0,
        }
    }
}

/// Disciplina de amostragem e retry por consulta.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Amostras por grandeza em cada ciclo
    pub samples: usize,
    /// Sucessos mínimos para aceitar a mediana
    pub quorum: usize,
    /// Tentativas por consulta antes de desistir
    pub max_tries: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            samples: 5,
            quorum: 4,
            max_tries: 5,
        }
    }
}

/// Rodadas do resolvedor de consenso da chave.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchConfig {
    /// Rodadas externas antes de resolver UNKNOWN
    pub rounds: usize,
    /// Tentativas internas de cada sonda
    pub probe_tries: usize,
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            rounds: 3,
            probe_tries: 2,
        }
    }
}

/// Persistência dos logs de telemetria.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Diretório dos logs diários
    pub log_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("/var/log/weather_station"),
        }
    }
}

/// Configuração raiz da estação.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub serial: SerialConfig,
    pub sampling: SamplingConfig,
    pub switch: SwitchConfig,
    pub store: StoreConfig,
    /// Intervalo entre ciclos de medição (segundos)
    pub interval_secs: f64,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            sampling: SamplingConfig::default(),
            switch: SwitchConfig::default(),
            store: StoreConfig::default(),
            interval_secs: 60.0,
        }
    }
}

/// Erros de carga/salvamento da configuração.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Erro de E/S em {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Erro ao serializar TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl StationConfig {
    /// Carrega configuração de um arquivo TOML; qualquer falha cai no
    /// default com aviso.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str::<StationConfig>(&content) {
                    Ok(config) => {
                        info!("Configuração carregada de {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        warn!("Erro ao parsear {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    warn!("Erro ao ler {}: {}", path.display(), e);
                }
            }
        }

        info!("Usando configuração padrão");
        StationConfig::default()
    }

    /// Salva configuração em arquivo TOML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// Retorna o caminho padrão do config.toml (ao lado do executável).
    pub fn default_path() -> PathBuf {
        let exe_dir = std::env::current_exe()
            .map(|p| p.parent().unwrap_or(Path::new(".")).to_path_buf())
            .unwrap_or_else(|_| PathBuf::from("."));
        exe_dir.join("config.toml")
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.serial.device.is_empty() {
            errors.push("Dispositivo serial não pode ser vazio".into());
        }
        if self.serial.baud == 0 {
            errors.push("Baud rate não pode ser 0".into());
        }
        if self.serial.read_timeout_secs <= 0.0 {
            errors.push(format!(
                "Timeout de leitura inválido: {}",
                self.serial.read_timeout_secs
            ));
        }
        if self.sampling.samples == 0 {
            errors.push("Número de amostras não pode ser 0".into());
        }
        if self.sampling.quorum == 0 || self.sampling.quorum > self.sampling.samples {
            errors.push(format!(
                "Quórum inválido: {} (1–{})",
                self.sampling.quorum, self.sampling.samples
            ));
        }
        if self.sampling.max_tries == 0 {
            errors.push("max_tries não pode ser 0".into());
        }
        if self.switch.rounds == 0 || self.switch.probe_tries == 0 {
            errors.push("Rodadas/tentativas da chave não podem ser 0".into());
        }
        if self.interval_secs < 1.0 || self.interval_secs > 86_400.0 {
            errors.push(format!(
                "Intervalo de ciclo inválido: {} (1–86400)",
                self.interval_secs
            ));
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = StationConfig::default();
        let errors = config.validate();
        assert!(errors.is_empty(), "Erros: {:?}", errors);
    }

    #[test]
    fn roundtrip_toml() {
        let config = StationConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: StationConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.serial.baud, parsed.serial.baud);
        assert_eq!(config.sampling.quorum, parsed.sampling.quorum);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let partial = r#"
[serial]
device = "/dev/ttyUSB0"
"#;
        let config: StationConfig = toml::from_str(partial).unwrap();
        assert_eq!(config.serial.device, "/dev/ttyUSB0");
        // Outros campos devem ter valor padrão
        assert_eq!(config.serial.baud, 9600);
        assert_eq!(config.sampling.samples, 5);
        assert_eq!(config.switch.rounds, 3);
    }

    #[test]
    fn quorum_above_samples_is_invalid() {
        let config = StationConfig {
            sampling: SamplingConfig {
                samples: 3,
                quorum: 4,
                max_tries: 5,
            },
            ..Default::default()
        };
        assert!(!config.validate().is_empty());
    }
}
