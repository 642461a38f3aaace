//! Motor de consultas ao sensor de nuvens.
//!
//! Uma consulta lógica = enviar o comando, ler exatamente `(n+1)*15` bytes
//! com timeout de 2 s por leitura, validar handshake e payload, e repetir
//! imediatamente (sem backoff) até `max_tries`. Falha de protocolo nunca é
//! fatal: vira resultado ausente com `warn!`.
//!
//! ## Latência máxima de um ciclo
//!
//! Tudo é síncrono e limitado: cada grandeza custa no pior caso
//! `samples × max_tries × timeout`. Com os defaults (5 amostras, 5
//! tentativas, 2 s): ambiente 50 s + céu 50 s + valores compostos 50 s +
//! vento (3 + 5) × 2 s + PWM 10 s + erros 10 s + chave 3 × 2 × 2 × 2 s =
//! ~250 s. Não há cancelamento além desses limites.

use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use weather_core::aggregate::{aggregate_samples, median_with_quorum};
use weather_core::calibration;
use weather_core::commands;
use weather_core::config::StationConfig;
use weather_core::frame::{self, CharClass, QueryOutcome, ResponsePattern, BLOCK_SIZE};
use weather_core::types::{SwitchState, WeatherReadings};

// ──────────────────────────────────────────────
// Transporte
// ──────────────────────────────────────────────

/// Transporte serial do sensor, atrás de um trait para que os testes
/// conduzam o motor de consultas com respostas roteirizadas.
pub trait Transport: Send {
    fn send(&mut self, data: &[u8]) -> std::io::Result<()>;
    fn read_exact_bytes(&mut self, buf: &mut [u8]) -> std::io::Result<()>;
    /// Bytes já recebidos e ainda não lidos (para limpar o buffer).
    fn bytes_waiting(&mut self) -> std::io::Result<usize>;
}

/// Transporte real sobre a porta serial (9600 8N1, timeout 2 s).
pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialTransport {
    pub fn open(device: &str, baud: u32, timeout: Duration) -> Result<Self, serialport::Error> {
        let port = serialport::new(device, baud).timeout(timeout).open()?;
        Ok(Self { port })
    }
}

impl Transport for SerialTransport {
    fn send(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.port.write_all(data)?;
        self.port.flush()
    }

    fn read_exact_bytes(&mut self, buf: &mut [u8]) -> std::io::Result<()> {
        self.port.read_exact(buf)
    }

    fn bytes_waiting(&mut self) -> std::io::Result<usize> {
        self.port
            .bytes_to_read()
            .map(|n| n as usize)
            .map_err(std::io::Error::other)
    }
}

// ──────────────────────────────────────────────
// Sensor
// ──────────────────────────────────────────────

/// Driver do sensor de nuvens.
///
/// Se a porta serial não abre na construção, o transporte fica ausente e
/// toda consulta da sessão responde `None` (dispositivo offline) em vez de
/// falhar.
pub struct CloudSensor {
    transport: Option<Box<dyn Transport>>,
    config: StationConfig,
    pub name: Option<String>,
    pub firmware_version: Option<f64>,
    pub serial_number: Option<String>,
}

impl CloudSensor {
    /// Abre a porta serial configurada. Falha de conexão desabilita as
    /// consultas da sessão, não derruba o processo.
    pub fn connect(config: &StationConfig) -> Self {
        info!("Conectando ao sensor de nuvens em {}", config.serial.device);
        let timeout = Duration::from_secs_f64(config.serial.read_timeout_secs);
        let transport: Option<Box<dyn Transport>> =
            match SerialTransport::open(&config.serial.device, config.serial.baud, timeout) {
                Ok(t) => {
                    info!("Sensor conectado em {}", config.serial.device);
                    Some(Box::new(t))
                }
                Err(e) => {
                    error!("Não foi possível conectar ao sensor: {e}");
                    None
                }
            };
        Self::from_transport(transport, config)
    }

    /// Constrói o driver sobre um transporte já aberto (testes/simulação).
    pub fn with_transport(transport: Box<dyn Transport>, config: &StationConfig) -> Self {
        Self::from_transport(Some(transport), config)
    }

    fn from_transport(transport: Option<Box<dyn Transport>>, config: &StationConfig) -> Self {
        Self {
            transport,
            config: config.clone(),
            name: None,
            firmware_version: None,
            serial_number: None,
        }
    }

    pub fn is_online(&self) -> bool {
        self.transport.is_some()
    }

    /// Descarta bytes pendentes no buffer de recepção.
    pub fn clear_buffer(&mut self) {
        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        let mut byte = [0u8; 1];
        while transport.bytes_waiting().unwrap_or(0) > 0 {
            if transport.read_exact_bytes(&mut byte).is_err() {
                break;
            }
            debug!("Limpando buffer: {:?}", byte[0] as char);
        }
    }

    /// Sequência de identificação da sessão: limpa o buffer, reinicia os
    /// ponteiros RS-232 e consulta nome, firmware e número de série.
    pub fn identify(&mut self) {
        if !self.is_online() {
            return;
        }
        self.clear_buffer();
        self.reset_rs232_buffer();

        let tries = self.config.sampling.max_tries;
        self.name = self
            .query_one(commands::GET_NAME.code, &ResponsePattern::single("!N"), tries)
            .map(|s| s.trim().to_string());
        if let Some(name) = &self.name {
            info!("Nome do dispositivo: \"{name}\"");
        }

        self.firmware_version = self
            .query_one(commands::GET_FIRMWARE.code, &ResponsePattern::single("!V"), tries)
            .and_then(|s| s.trim().parse::<f64>().ok());
        if let Some(fw) = self.firmware_version {
            info!("Versão do firmware: {fw}");
        }

        // Padrão completo do chamador: exatamente 4 dígitos após '!K'
        self.serial_number = self
            .query_one(
                commands::GET_SERIAL_NUMBER.code,
                &ResponsePattern::exact("!K", 4, CharClass::Digits),
                tries,
            )
            .map(|s| s.trim().to_string());
        if let Some(sn) = &self.serial_number {
            info!("Número de série: {sn}");
        }
    }

    /// Reinicia os ponteiros do buffer RS-232 do dispositivo (`!z`). A
    /// resposta é um único bloco de handshake, lida e descartada.
    fn reset_rs232_buffer(&mut self) {
        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        if let Err(e) = transport.send(commands::RESET_BUFFER.code.as_bytes()) {
            debug!("Falha ao enviar reset de buffer: {e}");
            return;
        }
        let mut block = [0u8; BLOCK_SIZE];
        if let Err(e) = transport.read_exact_bytes(&mut block) {
            debug!("Sem resposta ao reset de buffer: {e}");
        }
    }

    // ──────────────────────────────────────────
    // Motor de consultas
    // ──────────────────────────────────────────

    /// Uma troca requisição/resposta com retry limitado.
    ///
    /// Aceita somente quando handshake E payload validam; qualquer rejeição
    /// reenvia imediatamente, até `max_tries`. Esgotadas as tentativas,
    /// retorna `None` com `warn!` — nunca um erro fatal.
    pub fn query(
        &mut self,
        command: &str,
        pattern: &ResponsePattern,
        max_tries: usize,
    ) -> Option<Vec<String>> {
        let Some(transport) = self.transport.as_mut() else {
            debug!("Sensor offline – ignorando consulta {command}");
            return None;
        };

        match commands::describe(command) {
            Some(desc) => info!("Enviando comando: {desc}"),
            None => warn!("Enviando comando desconhecido: {command:?}"),
        }

        let n_bytes = pattern.response_len();
        for attempt in 1..=max_tries {
            debug!("Tentativa {attempt}: enviando {command:?}");
            if let Err(e) = transport.send(command.as_bytes()) {
                debug!("Falha de escrita na serial: {e}");
                continue;
            }

            let mut buf = vec![0u8; n_bytes];
            if let Err(e) = transport.read_exact_bytes(&mut buf) {
                debug!("Timeout/erro de leitura: {e}");
                continue;
            }

            match frame::decode(&buf, pattern) {
                QueryOutcome::Matched(fields) => {
                    debug!("Resposta casou: {:?}", String::from_utf8_lossy(&buf));
                    return Some(fields);
                }
                QueryOutcome::HandshakeMismatch => {
                    debug!(
                        "Bloco de handshake inválido: {:?}",
                        String::from_utf8_lossy(&buf[n_bytes - BLOCK_SIZE..])
                    );
                }
                QueryOutcome::PayloadMismatch => {
                    debug!(
                        "Payload não casa com o padrão: {:?}",
                        String::from_utf8_lossy(&buf[..n_bytes - BLOCK_SIZE])
                    );
                }
            }
        }

        warn!("Sem resposta válida para {command} após {max_tries} tentativas");
        None
    }

    /// Consulta de campo único, desembrulhada.
    pub fn query_one(
        &mut self,
        command: &str,
        pattern: &ResponsePattern,
        max_tries: usize,
    ) -> Option<String> {
        self.query(command, pattern, max_tries)
            .and_then(|mut fields| {
                if fields.len() == 1 {
                    fields.pop()
                } else {
                    None
                }
            })
    }

    /// Variante invertida: frame com handshake PRIMEIRO e dado depois.
    /// Usada exclusivamente pela família do anemômetro (`v!`/`V!`). Mesmo
    /// retry e timeout da consulta padrão.
    pub fn reversed_query(
        &mut self,
        command: &str,
        expect_prefix: &str,
        max_tries: usize,
    ) -> Option<String> {
        let Some(transport) = self.transport.as_mut() else {
            debug!("Sensor offline – ignorando consulta {command}");
            return None;
        };

        match commands::describe(command) {
            Some(desc) => info!("Enviando comando: {desc}"),
            None => warn!("Enviando comando desconhecido: {command:?}"),
        }

        let n_bytes = 2 * BLOCK_SIZE;
        for attempt in 1..=max_tries {
            debug!("Tentativa {attempt}: enviando {command:?}");
            if let Err(e) = transport.send(command.as_bytes()) {
                debug!("Falha de escrita na serial: {e}");
                continue;
            }

            let mut buf = vec![0u8; n_bytes];
            if let Err(e) = transport.read_exact_bytes(&mut buf) {
                debug!("Timeout/erro de leitura: {e}");
                continue;
            }

            match frame::decode_reversed(&buf, expect_prefix) {
                QueryOutcome::Matched(mut fields) => {
                    debug!("Resposta casou: {:?}", String::from_utf8_lossy(&buf));
                    return fields.pop();
                }
                outcome => {
                    debug!(
                        "Resposta invertida não casa ({outcome:?}): {:?}",
                        String::from_utf8_lossy(&buf)
                    );
                }
            }
        }

        warn!("Sem resposta válida para {command} após {max_tries} tentativas");
        None
    }

    // ──────────────────────────────────────────
    // Grandezas agregadas (n amostras / quórum / mediana)
    // ──────────────────────────────────────────

    /// Temperatura ambiente em kelvin (`!T` → `!2`, centésimos de °C).
    pub fn get_ambient_temperature(&mut self) -> Option<f64> {
        let (samples, quorum, tries) = self.sampling_params();
        let pattern = ResponsePattern::single("!2");
        let value = aggregate_samples(samples, quorum, || {
            let raw = self
                .query_one(commands::GET_SENSOR_TEMPERATURE.code, &pattern, tries)?
                .trim()
                .parse::<i32>()
                .ok()?;
            Some(calibration::hundredths_c_to_kelvin(raw))
        });
        if let Some(k) = value {
            info!("Temperatura ambiente: {k:.1} K");
        }
        value
    }

    /// Temperatura IR do céu em kelvin (`!S` → `!1`, centésimos de °C).
    pub fn get_sky_temperature(&mut self) -> Option<f64> {
        let (samples, quorum, tries) = self.sampling_params();
        let pattern = ResponsePattern::single("!1");
        let value = aggregate_samples(samples, quorum, || {
            let raw = self
                .query_one(commands::GET_SKY_TEMPERATURE.code, &pattern, tries)?
                .trim()
                .parse::<i32>()
                .ok()?;
            Some(calibration::hundredths_c_to_kelvin(raw))
        });
        if let Some(k) = value {
            info!("Temperatura do céu: {k:.1} K");
        }
        value
    }

    /// Valores analógicos compostos (`!C` → `!6 !4 !5`): tensão interna,
    /// resistência do LDR e temperatura do NTC de chuva.
    ///
    /// Uma única consulta alimenta as três grandezas; cada uma tem seu
    /// próprio quórum sobre as mesmas `samples` rodadas.
    pub fn get_values(&mut self) -> (Option<f64>, Option<f64>, Option<f64>) {
        let (samples, quorum, tries) = self.sampling_params();
        let pattern = match ResponsePattern::multi(&["!6", "!4", "!5"]) {
            Ok(p) => p,
            Err(e) => {
                error!("Padrão de valores compostos inválido: {e}");
                return (None, None, None);
            }
        };

        let mut voltages = Vec::with_capacity(samples);
        let mut ldrs = Vec::with_capacity(samples);
        let mut rains = Vec::with_capacity(samples);

        for _ in 0..samples {
            let Some(fields) = self.query(commands::GET_VALUES.code, &pattern, tries) else {
                continue;
            };
            // Zener: leitura 0 é descartada, não calibrada
            if let Ok(raw) = fields[0].trim().parse::<i32>() {
                if raw != 0 {
                    voltages.push(calibration::internal_voltage_v(raw));
                }
            }
            if let Ok(raw) = fields[1].trim().parse::<i32>() {
                if raw != 0 {
                    ldrs.push(calibration::ldr_resistance_kohm(raw));
                }
            }
            if let Ok(raw) = fields[2].trim().parse::<i32>() {
                if raw != 0 {
                    rains.push(calibration::rain_sensor_temperature_k(raw));
                }
            }
        }

        let voltage = median_with_quorum(&voltages, quorum);
        let ldr = median_with_quorum(&ldrs, quorum);
        let rain = median_with_quorum(&rains, quorum);
        if let Some(v) = voltage {
            info!("Tensão interna: {v:.2} V");
        }
        if let Some(r) = ldr {
            info!("Resistência do LDR: {r:.1} kΩ");
        }
        if let Some(t) = rain {
            info!("Temperatura do sensor de chuva: {t:.1} K");
        }
        (voltage, ldr, rain)
    }

    // ──────────────────────────────────────────
    // Grandezas de consulta única
    // ──────────────────────────────────────────

    /// Ciclo de trabalho do PWM do aquecedor, em % (`!Q` → `!Q`).
    pub fn get_pwm(&mut self) -> Option<f64> {
        let tries = self.config.sampling.max_tries;
        let raw = self
            .query_one(commands::GET_PWM.code, &ResponsePattern::single("!Q"), tries)?
            .trim()
            .parse::<i32>()
            .ok()?;
        let pwm = calibration::pwm_duty_percent(raw);
        info!("PWM: {pwm:.1}%");
        Some(pwm)
    }

    /// Contador de frequência do sensor de chuva, 0–1023 (`!E` → `!R`).
    /// Operação de diagnóstico; não entra no log de telemetria.
    pub fn get_rain_frequency(&mut self) -> Option<i32> {
        let tries = self.config.sampling.max_tries;
        let raw = self
            .query_one(
                commands::GET_RAIN_FREQUENCY.code,
                &ResponsePattern::single("!R"),
                tries,
            )?
            .trim()
            .parse::<i32>()
            .ok()?;
        info!("Frequência de chuva (0-1023): {raw}");
        Some(raw)
    }

    /// Contadores de erro internos do sensor IR (`!D` → `!E1..!E4`),
    /// unidos por espaço. Os contadores zeram após a leitura.
    pub fn get_errors(&mut self) -> Option<String> {
        let tries = self.config.sampling.max_tries;
        let pattern = match ResponsePattern::multi(&["!E1", "!E2", "!E3", "!E4"]) {
            Ok(p) => p,
            Err(e) => {
                error!("Padrão de contadores de erro inválido: {e}");
                return None;
            }
        };
        let fields = self.query(commands::GET_ERRORS.code, &pattern, tries)?;
        let joined = fields
            .iter()
            .map(|f| f.trim())
            .collect::<Vec<_>>()
            .join(" ");
        info!("Erros internos do IR: {joined:?}");
        Some(joined)
    }

    // ──────────────────────────────────────────
    // Resolvedor de consenso da chave
    // ──────────────────────────────────────────

    /// Resolve a posição da chave por consenso de duas sondas, porque o
    /// protocolo não tem consulta única autoritativa: `!F` casa `!X`
    /// (aberta) ou `!Y` (fechada).
    ///
    /// Até `rounds` rodadas; em cada uma as duas sondas rodam com
    /// `probe_tries` tentativas internas. Só uma sonda casando decide;
    /// ambas ou nenhuma é inconclusivo. Rodadas esgotadas → UNKNOWN.
    pub fn get_switch(&mut self) -> SwitchState {
        let rounds = self.config.switch.rounds;
        let probe_tries = self.config.switch.probe_tries;
        let open_pattern = ResponsePattern::single("!X");
        let closed_pattern = ResponsePattern::single("!Y");

        for _ in 0..rounds {
            let open = self
                .query_one(commands::GET_SWITCH.code, &open_pattern, probe_tries)
                .is_some();
            let closed = self
                .query_one(commands::GET_SWITCH.code, &closed_pattern, probe_tries)
                .is_some();
            match (open, closed) {
                (true, false) => {
                    info!("Chave: OPEN");
                    return SwitchState::Open;
                }
                (false, true) => {
                    info!("Chave: CLOSED");
                    return SwitchState::Closed;
                }
                // Ambas ou nenhuma: rodada inconclusiva
                _ => {}
            }
        }

        warn!("Chave irresoluta após {rounds} rodadas");
        SwitchState::Unknown
    }

    // ──────────────────────────────────────────
    // Anemômetro (frames invertidos)
    // ──────────────────────────────────────────

    /// O dispositivo tem anemômetro? (`v!` → `!v`, frame invertido.)
    pub fn wind_speed_enabled(&mut self) -> bool {
        let tries = self.config.sampling.max_tries;
        match self.reversed_query(commands::ANEMOMETER_PRESENT.code, "!v", tries) {
            Some(value) => {
                let enabled = value.trim().parse::<i32>().map(|v| v == 1).unwrap_or(false);
                if enabled {
                    debug!("Anemômetro habilitado");
                } else {
                    debug!("Anemômetro não habilitado");
                }
                enabled
            }
            None => {
                debug!("Anemômetro não habilitado");
                false
            }
        }
    }

    /// Velocidade do vento em km/h (`V!` → `!w`, frame invertido), somente
    /// se a sonda de presença responder afirmativamente.
    pub fn get_wind_speed(&mut self) -> Option<f64> {
        if !self.wind_speed_enabled() {
            return None;
        }
        let tries = self.config.sampling.max_tries;
        let raw = self
            .reversed_query(commands::GET_WIND_SPEED.code, "!w", tries)?
            .trim()
            .parse::<i32>()
            .ok()?;
        let speed = f64::from(raw);
        info!("Velocidade do vento: {speed} km/h");
        Some(speed)
    }

    // ──────────────────────────────────────────
    // Ciclo completo
    // ──────────────────────────────────────────

    /// Executa um ciclo completo de medição e retorna as leituras
    /// agregadas. Campos sem quórum ficam ausentes; o ciclo nunca aborta
    /// por falha de protocolo.
    pub fn collect(&mut self) -> WeatherReadings {
        let mut readings = WeatherReadings::default();
        readings.ambient_temp_k = self.get_ambient_temperature();
        readings.sky_temp_k = self.get_sky_temperature();
        readings.wind_speed_kmh = self.get_wind_speed();
        let (voltage, ldr, rain) = self.get_values();
        readings.internal_voltage_v = voltage;
        readings.ldr_resistance_kohm = ldr;
        readings.rain_sensor_temp_k = rain;
        readings.pwm_percent = self.get_pwm();
        let _ = self.get_rain_frequency();
        readings.errors = self.get_errors();
        readings.switch = self.get_switch();
        readings
    }

    fn sampling_params(&self) -> (usize, usize, usize) {
        (
            self.config.sampling.samples,
            self.config.sampling.quorum,
            self.config.sampling.max_tries,
        )
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
