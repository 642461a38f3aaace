//! # Weather Station
//!
//! Daemon da estação meteorológica: consulta o sensor de nuvens pela porta
//! serial, agrega as leituras de um ciclo, avalia a segurança e persiste os
//! logs diários de condição e telemetria.
//!
//! ## Uso
//! ```bash
//! weather_station           # Loop contínuo
//! weather_station --once    # Um ciclo e sai (diagnóstico)
//! ```

mod sensor;
mod store;

use chrono::Utc;
use sensor::CloudSensor;
use std::time::{Duration, Instant};
use store::TelemetryStore;
use tracing::{error, info, warn};
use weather_core::config::StationConfig;
use weather_core::safety::{AlwaysUnsafe, SafetyPolicy};

fn main() {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ── Carregar config ──
    let config_path = StationConfig::default_path();
    let config = StationConfig::load(&config_path);

    // Salva config padrão se não existir
    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }

    for problem in config.validate() {
        warn!("Configuração: {problem}");
    }

    let once = std::env::args().any(|a| a == "--once");
    let interval = Duration::from_secs_f64(config.interval_secs);

    // ── Sensor ──
    let mut sensor = CloudSensor::connect(&config);
    sensor.identify();
    if !sensor.is_online() {
        warn!("Sensor offline – os ciclos registrarão leituras ausentes");
    }

    // ── Armazém de logs ──
    let store = match TelemetryStore::new(&config.store.log_dir) {
        Ok(s) => s,
        Err(e) => {
            error!("Não foi possível preparar o diretório de logs: {e}");
            std::process::exit(1);
        }
    };

    let policy = AlwaysUnsafe;

    // ── Banner ──
    println!();
    println!("══════════════════════════════════════════════");
    println!("   ☁ WEATHER STATION – ATIVO (Rust)");
    println!("══════════════════════════════════════════════");
    println!("  Porta:     {}", config.serial.device);
    println!(
        "  Sensor:    {} (fw {})",
        sensor.name.as_deref().unwrap_or("?"),
        sensor
            .firmware_version
            .map(|v| v.to_string())
            .unwrap_or_else(|| "?".into())
    );
    println!("  Intervalo: {:.1}s", config.interval_secs);
    println!("  Logs:      {}", config.store.log_dir.display());
    println!("══════════════════════════════════════════════");
    println!();

    // ── Loop principal ──
    loop {
        let cycle_start = Instant::now();

        let readings = sensor.collect();
        let safe = policy.evaluate(&readings);
        let now = Utc::now();

        if let Err(e) = store.append_condition(now, safe) {
            error!("Erro ao gravar log de condição: {e}");
            std::process::exit(1);
        }
        if let Err(e) = store.append_telemetry(now, safe, &readings) {
            error!("Erro ao gravar log de telemetria: {e}");
            std::process::exit(1);
        }

        info!(
            "Ciclo gravado | céu {} | ambiente {} | chave {} | {safe}",
            readings
                .sky_temp_k
                .map(|v| format!("{v:.1} K"))
                .unwrap_or_else(|| "—".into()),
            readings
                .ambient_temp_k
                .map(|v| format!("{v:.1} K"))
                .unwrap_or_else(|| "—".into()),
            readings.switch
        );

        if once {
            break;
        }

        // Dormir pelo tempo restante do intervalo
        let elapsed = cycle_start.elapsed();
        if elapsed < interval {
            std::thread::sleep(interval - elapsed);
        }
    }
}
