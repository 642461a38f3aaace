//! Tabela de comandos do sensor (Rs232_Comms v1.0–v1.2).
//!
//! Cada comando é um token ASCII curto; a descrição serve apenas para
//! diagnóstico nos logs. Os padrões de resposta correspondentes são
//! construídos pelo motor de consultas.

/// Um comando do protocolo com sua descrição legível.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub code: &'static str,
    pub description: &'static str,
}

/// Nome interno do dispositivo (responde `!N`).
pub const GET_NAME: Command = Command { code: "!A", description: "Get internal name" };
/// Versão do firmware (responde `!V`).
pub const GET_FIRMWARE: Command = Command { code: "!B", description: "Get firmware version" };
/// Valores analógicos compostos: zener, LDR, NTC de chuva (responde `!6 !4 !5`).
pub const GET_VALUES: Command = Command { code: "!C", description: "Get values" };
/// Contadores de erro internos do sensor IR (responde `!E1..!E4`).
pub const GET_ERRORS: Command = Command { code: "!D", description: "Get internal errors" };
/// Frequência do sensor de chuva (responde `!R`).
pub const GET_RAIN_FREQUENCY: Command = Command { code: "!E", description: "Get rain frequency" };
/// Estado da chave (responde `!X` aberta ou `!Y` fechada).
pub const GET_SWITCH: Command = Command { code: "!F", description: "Get switch status" };
pub const SET_SWITCH_OPEN: Command = Command { code: "!G", description: "Set switch open" };
pub const SET_SWITCH_CLOSED: Command = Command { code: "!H", description: "Set switch closed" };
pub const SET_PWM: Command = Command { code: "!Pxxxx", description: "Set PWM value to xxxx" };
/// Ciclo de trabalho PWM do aquecedor (responde `!Q`).
pub const GET_PWM: Command = Command { code: "!Q", description: "Get PWM value" };
/// Temperatura IR do céu, em centésimos de °C (responde `!1`).
pub const GET_SKY_TEMPERATURE: Command = Command { code: "!S", description: "Get sky IR temperature" };
/// Temperatura do sensor ambiente, em centésimos de °C (responde `!2`).
pub const GET_SENSOR_TEMPERATURE: Command = Command { code: "!T", description: "Get sensor temperature" };
/// Reinicia os ponteiros do buffer RS-232 (responde só o handshake).
pub const RESET_BUFFER: Command = Command { code: "!z", description: "Reset RS232 buffer pointers" };
/// Número de série de 4 dígitos (responde `!K`).
pub const GET_SERIAL_NUMBER: Command = Command { code: "!K", description: "Get serial number" };
/// Sonda de presença do anemômetro – frame invertido (responde `!v`).
pub const ANEMOMETER_PRESENT: Command = Command { code: "v!", description: "Query if anemometer enabled" };
/// Velocidade do vento em km/h – frame invertido (responde `!w`).
pub const GET_WIND_SPEED: Command = Command { code: "V!", description: "Get wind speed" };

/// Tabela completa, para diagnóstico.
pub const COMMANDS: &[Command] = &[
    GET_NAME,
    GET_FIRMWARE,
    GET_VALUES,
    GET_ERRORS,
    GET_RAIN_FREQUENCY,
    GET_SWITCH,
    SET_SWITCH_OPEN,
    SET_SWITCH_CLOSED,
    SET_PWM,
    GET_PWM,
    GET_SKY_TEMPERATURE,
    GET_SENSOR_TEMPERATURE,
    RESET_BUFFER,
    GET_SERIAL_NUMBER,
    ANEMOMETER_PRESENT,
    GET_WIND_SPEED,
];

/// Descrição de um código de comando, se conhecido.
pub fn describe(code: &str) -> Option<&'static str> {
    COMMANDS.iter().find(|c| c.code == code).map(|c| c.description)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_commands_have_descriptions() {
        assert_eq!(describe("!T"), Some("Get sensor temperature"));
        assert_eq!(describe("V!"), Some("Get wind speed"));
    }

    #[test]
    fn unknown_command_is_none() {
        assert_eq!(describe("!!"), None);
    }

    #[test]
    fn codes_are_unique() {
        for (i, a) in COMMANDS.iter().enumerate() {
            for b in &COMMANDS[i + 1..] {
                assert_ne!(a.code, b.code);
            }
        }
    }
}
