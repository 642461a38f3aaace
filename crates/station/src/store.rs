//! Persistência dos logs diários de condição e telemetria.
//!
//! Dois arquivos CSV por dia UT: o log de condição (timestamp + veredito)
//! e o log de telemetria (todas as colunas do ciclo). O append relê o
//! arquivo do dia, acrescenta a linha e reescreve tudo num arquivo
//! temporário que substitui o original por rename, mantendo o cabeçalho
//! consistente mesmo quando colunas surgem vazias.

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use weather_core::types::{Safety, SwitchState, WeatherReadings};

/// Formato do timestamp nas linhas de log.
pub const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S UT";

/// Sufixo de dia nos nomes de arquivo (ex.: `telemetry_20260828UT.txt`).
const DAY_FORMAT: &str = "%Y%m%d";

/// Erros de persistência dos logs.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Erro de E/S em {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Erro de CSV em {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Linha do log de condição.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionRow {
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "Safe")]
    pub safe: Safety,
}

/// Linha do log de telemetria. Colunas numéricas em f32; valor ausente
/// (sem quórum) vira célula vazia e volta como `None` na releitura.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryRow {
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "Safe")]
    pub safe: Safety,
    #[serde(rename = "Ambient Temperature")]
    pub ambient_temperature: Option<f32>,
    #[serde(rename = "Sky Temperature")]
    pub sky_temperature: Option<f32>,
    #[serde(rename = "Wind Speed")]
    pub wind_speed: Option<f32>,
    #[serde(rename = "Internal Voltage")]
    pub internal_voltage: Option<f32>,
    #[serde(rename = "LDR Resistance")]
    pub ldr_resistance: Option<f32>,
    #[serde(rename = "Rain Sensor Temperature")]
    pub rain_sensor_temperature: Option<f32>,
    #[serde(rename = "PWM")]
    pub pwm: Option<f32>,
    #[serde(rename = "Errors")]
    pub errors: Option<String>,
    #[serde(rename = "Switch")]
    pub switch: SwitchState,
}

impl TelemetryRow {
    fn from_readings(when: DateTime<Utc>, safe: Safety, readings: &WeatherReadings) -> Self {
        Self {
            timestamp: when.format(TIMESTAMP_FORMAT).to_string(),
            safe,
            ambient_temperature: readings.ambient_temp_k.map(|v| v as f32),
            sky_temperature: readings.sky_temp_k.map(|v| v as f32),
            wind_speed: readings.wind_speed_kmh.map(|v| v as f32),
            internal_voltage: readings.internal_voltage_v.map(|v| v as f32),
            ldr_resistance: readings.ldr_resistance_kohm.map(|v| v as f32),
            rain_sensor_temperature: readings.rain_sensor_temp_k.map(|v| v as f32),
            pwm: readings.pwm_percent.map(|v| v as f32),
            errors: readings.errors.clone(),
            switch: readings.switch,
        }
    }
}

/// Armazém dos logs diários.
pub struct TelemetryStore {
    log_dir: PathBuf,
}

impl TelemetryStore {
    /// Cria o armazém, garantindo a existência do diretório de logs.
    pub fn new(log_dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(log_dir).map_err(|source| StoreError::Io {
            path: log_dir.to_path_buf(),
            source,
        })?;
        info!("Logs diários em {}", log_dir.display());
        Ok(Self {
            log_dir: log_dir.to_path_buf(),
        })
    }

    fn condition_path(&self, day: NaiveDate) -> PathBuf {
        self.log_dir
            .join(format!("condition_{}UT.txt", day.format(DAY_FORMAT)))
    }

    fn telemetry_path(&self, day: NaiveDate) -> PathBuf {
        self.log_dir
            .join(format!("telemetry_{}UT.txt", day.format(DAY_FORMAT)))
    }

    /// Acrescenta uma linha ao log de condição do dia.
    pub fn append_condition(&self, when: DateTime<Utc>, safe: Safety) -> Result<(), StoreError> {
        let path = self.condition_path(when.date_naive());
        let row = ConditionRow {
            timestamp: when.format(TIMESTAMP_FORMAT).to_string(),
            safe,
        };
        append_row(&path, row)
    }

    /// Acrescenta uma linha ao log de telemetria do dia.
    pub fn append_telemetry(
        &self,
        when: DateTime<Utc>,
        safe: Safety,
        readings: &WeatherReadings,
    ) -> Result<(), StoreError> {
        let path = self.telemetry_path(when.date_naive());
        append_row(&path, TelemetryRow::from_readings(when, safe, readings))
    }

    /// Relê o log de telemetria de um dia. Dia sem arquivo é erro de E/S,
    /// não uma lista vazia.
    pub fn read_day(&self, day: NaiveDate) -> Result<Vec<TelemetryRow>, StoreError> {
        let path = self.telemetry_path(day);
        read_rows(&path)
    }
}

fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    let mut reader = csv::Reader::from_path(path).map_err(|source| StoreError::Csv {
        path: path.to_path_buf(),
        source,
    })?;
    reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(|source| StoreError::Csv {
            path: path.to_path_buf(),
            source,
        })
}

/// Append por reescrita: carrega as linhas existentes, acrescenta a nova e
/// grava tudo num `.tmp` que substitui o arquivo por rename.
fn append_row<T: Serialize + DeserializeOwned>(path: &Path, row: T) -> Result<(), StoreError> {
    let mut rows: Vec<T> = if path.exists() {
        read_rows(path)?
    } else {
        debug!("Criando novo log diário: {}", path.display());
        Vec::new()
    };
    rows.push(row);

    let tmp_path = path.with_extension("tmp");
    {
        let mut writer = csv::Writer::from_path(&tmp_path).map_err(|source| StoreError::Csv {
            path: tmp_path.clone(),
            source,
        })?;
        for r in &rows {
            writer.serialize(r).map_err(|source| StoreError::Csv {
                path: tmp_path.clone(),
                source,
            })?;
        }
        writer.flush().map_err(|source| StoreError::Io {
            path: tmp_path.clone(),
            source,
        })?;
    }

    std::fs::rename(&tmp_path, path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
