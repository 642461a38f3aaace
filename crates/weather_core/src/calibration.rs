//! Fórmulas de calibração do sensor.
//!
//! Conversões do manual do dispositivo (Rs232_Comms v1.0, seção
//! "Converting values sent by the device to meaningful units"). Cada função
//! é determinística: valor bruto do ADC (0–1023) ou contagem do firmware →
//! grandeza física.

/// Zero absoluto em °C.
pub const ABSOLUTE_ZERO_C: f64 = 273.15;

/// Fundo de escala do ADC de 10 bits.
const ADC_FULL_SCALE: f64 = 1023.0;

/// Constante do diodo zener de referência (item 4 do manual).
const ZENER_CONSTANT: f64 = 3.0;

/// Resistor de pull-up do LDR, em kΩ (item 6).
const LDR_PULLUP_KOHM: f64 = 56.0;

/// Pull-up e resistência a 25 °C do NTC de chuva, em kΩ (item 7).
const RAIN_PULLUP_KOHM: f64 = 1.0;
const RAIN_RES_AT_25C_KOHM: f64 = 1.0;

/// Beta do NTC de chuva (aproximação de Steinhart–Hart).
const RAIN_BETA: f64 = 3450.0;

/// Leituras analógicas passam por este clamp antes das fórmulas com divisor,
/// evitando os extremos degenerados do ADC.
fn clamp_adc(raw: i32) -> f64 {
    f64::from(raw.clamp(1, 1022))
}

/// Temperatura reportada em centésimos de °C → kelvin.
///
/// Vale tanto para a temperatura ambiente (`!T`) quanto para a do céu
/// (`!S`): `K = raw/100 + 273.15` (itens 1 e 5).
pub fn hundredths_c_to_kelvin(raw: i32) -> f64 {
    f64::from(raw) / 100.0 + ABSOLUTE_ZERO_C
}

/// Tensão interna de referência, em volts: `V = 1023 * 3 / raw` (item 4).
pub fn internal_voltage_v(raw: i32) -> f64 {
    ADC_FULL_SCALE * ZENER_CONSTANT / clamp_adc(raw)
}

/// Resistência do LDR, em kΩ: `R = 56 / (1023/raw - 1)` (item 6).
pub fn ldr_resistance_kohm(raw: i32) -> f64 {
    LDR_PULLUP_KOHM / (ADC_FULL_SCALE / clamp_adc(raw) - 1.0)
}

/// Temperatura do NTC do sensor de chuva, em kelvin (item 7).
///
/// Aproximação beta com β = 3450 e referência a 25 °C:
/// `r = ln((pullup / (1023/raw - 1)) / R25)`, `K = 1 / (r/β + 1/298.15)`.
pub fn rain_sensor_temperature_k(raw: i32) -> f64 {
    let resistance = RAIN_PULLUP_KOHM / (ADC_FULL_SCALE / clamp_adc(raw) - 1.0);
    let r = (resistance / RAIN_RES_AT_25C_KOHM).ln();
    1.0 / (r / RAIN_BETA + 1.0 / (ABSOLUTE_ZERO_C + 25.0))
}

/// Ciclo de trabalho do PWM em %: `100 * raw / 1023` (item 3).
pub fn pwm_duty_percent(raw: i32) -> f64 {
    100.0 * f64::from(raw) / ADC_FULL_SCALE
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ambient_raw_1000_is_283_15_kelvin() {
        // 10.00 °C → 283.15 K
        assert!((hundredths_c_to_kelvin(1000) - 283.15).abs() < 1e-9);
    }

    #[test]
    fn negative_hundredths_are_valid() {
        // -5.00 °C → 268.15 K
        assert!((hundredths_c_to_kelvin(-500) - 268.15).abs() < 1e-9);
    }

    #[test]
    fn internal_voltage_midscale() {
        // raw = 1023*3/V → raw 613 ≈ 5.007 V
        let v = internal_voltage_v(613);
        assert!((v - 5.007).abs() < 0.01, "V = {v}");
    }

    #[test]
    fn adc_extremes_are_clamped() {
        // 0 e valores acima de 1022 caem no intervalo [1, 1022]
        assert_eq!(internal_voltage_v(0), internal_voltage_v(1));
        assert_eq!(ldr_resistance_kohm(1023), ldr_resistance_kohm(1022));
        assert_eq!(
            rain_sensor_temperature_k(20_000),
            rain_sensor_temperature_k(1022)
        );
    }

    #[test]
    fn ldr_resistance_midscale() {
        // raw 512: 56 / (1023/512 - 1) ≈ 56.11 kΩ
        let r = ldr_resistance_kohm(512);
        assert!((r - 56.11).abs() < 0.01, "R = {r}");
    }

    #[test]
    fn rain_ntc_at_unity_ratio_is_reference_temp() {
        // Com pullup = R25 = 1 kΩ, raw ≈ 511.5 dá razão 1 → ln 1 = 0 →
        // exatamente a temperatura de referência (298.15 K). raw 511 e 512
        // devem cercar esse ponto.
        let above = rain_sensor_temperature_k(511);
        let below = rain_sensor_temperature_k(512);
        assert!(above > 298.15 && below < 298.15, "{above} / {below}");
        assert!((above - 298.15).abs() < 0.5);
        assert!((below - 298.15).abs() < 0.5);
    }

    #[test]
    fn rain_ntc_decreases_with_raw() {
        // Raw maior → NTC mais resistivo → mais frio
        let mut last = rain_sensor_temperature_k(1);
        for raw in [100, 300, 500, 700, 900, 1022] {
            let t = rain_sensor_temperature_k(raw);
            assert!(t < last, "não monotônico em raw = {raw}");
            last = t;
        }
    }

    #[test]
    fn pwm_duty_bounds() {
        assert_eq!(pwm_duty_percent(0), 0.0);
        assert!((pwm_duty_percent(1023) - 100.0).abs() < 1e-9);
        assert!((pwm_duty_percent(512) - 50.048_875).abs() < 1e-3);
    }
}
