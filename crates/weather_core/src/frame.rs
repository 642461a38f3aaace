//! Codec de frames do protocolo serial do sensor de nuvens.
//!
//! O dispositivo responde em blocos fixos de 15 bytes. Uma resposta com
//! `n` campos ocupa `(n + 1) * 15` bytes:
//!
//! ```text
//! ┌────────────────┬────────────────┬─────────────────────┐
//! │ Bloco campo 1  │ … campo n      │ Bloco de handshake  │
//! │ 15 bytes       │ 15 bytes cada  │ 15 bytes            │
//! └────────────────┴────────────────┴─────────────────────┘
//! ```
//!
//! O bloco de handshake é o sentinela literal `'!' + DC1 + 12 espaços + '0'`
//! e confirma que o framing está sincronizado; sua validade é independente
//! da validade do payload. Cada campo do payload é um prefixo curto
//! (ex.: `"!2"`) seguido de uma região de captura de largura fixa.
//!
//! Na variante invertida (consultas do anemômetro) o bloco de handshake vem
//! PRIMEIRO e o campo de dados depois.

use thiserror::Error;

/// Tamanho de um bloco do protocolo.
pub const BLOCK_SIZE: usize = 15;

/// Byte de controle DC1 presente no bloco de handshake.
pub const DC1: u8 = 0x11;

/// Largura de captura para padrões de um único campo.
const SINGLE_FIELD_WIDTH: usize = 13;

/// Verifica se um bloco de 15 bytes é o sentinela de handshake
/// (`'!' + DC1 + 12 espaços + '0'`).
pub fn check_handshake(block: &[u8]) -> bool {
    block.len() == BLOCK_SIZE
        && block[0] == b'!'
        && block[1] == DC1
        && block[2..14].iter().all(|&b| b == b' ')
        && block[14] == b'0'
}

/// Monta o bloco de handshake esperado (usado em testes e diagnósticos).
pub fn handshake_block() -> [u8; BLOCK_SIZE] {
    let mut block = [b' '; BLOCK_SIZE];
    block[0] = b'!';
    block[1] = DC1;
    block[14] = b'0';
    block
}

/// Classe de caracteres aceita numa região de captura.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    /// Alfanumérico, espaço em branco, `_` ou `.` (classe `[\s\w\d.]`
    /// do firmware de referência).
    Loose,
    /// Somente dígitos ASCII (ex.: número de série).
    Digits,
}

impl CharClass {
    fn accepts(self, byte: u8) -> bool {
        match self {
            CharClass::Loose => {
                byte.is_ascii_alphanumeric()
                    || byte.is_ascii_whitespace()
                    || byte == b'_'
                    || byte == b'.'
            }
            CharClass::Digits => byte.is_ascii_digit(),
        }
    }
}

/// Um campo esperado no payload: prefixo literal + captura de largura fixa.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternField {
    pub prefix: String,
    pub width: usize,
    pub class: CharClass,
}

/// Erros de construção de padrões.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("Padrão multi-campo requer pelo menos 2 prefixos (recebeu {0})")]
    TooFewFields(usize),
}

/// Forma esperada do payload de uma resposta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponsePattern {
    fields: Vec<PatternField>,
}

impl ResponsePattern {
    /// Padrão de um único campo: prefixo curto + captura de 13 bytes.
    pub fn single(prefix: &str) -> Self {
        Self {
            fields: vec![PatternField {
                prefix: prefix.to_string(),
                width: SINGLE_FIELD_WIDTH,
                class: CharClass::Loose,
            }],
        }
    }

    /// Padrão completo fornecido pelo chamador (prefixo com largura e classe
    /// explícitas), sem derivação automática de largura. Usado quando o
    /// formato é mais restrito que o padrão, ex.: número de série
    /// (`!K` + 4 dígitos).
    pub fn exact(prefix: &str, width: usize, class: CharClass) -> Self {
        Self {
            fields: vec![PatternField {
                prefix: prefix.to_string(),
                width,
                class,
            }],
        }
    }

    /// Padrão multi-campo.
    ///
    /// Peculiaridade herdada do firmware de referência, preservada porque o
    /// alinhamento dos frames depende dela: a largura de TODOS os campos é
    /// `15 - len(prefixo do SEGUNDO campo)`, qualquer que seja o campo
    /// sendo dimensionado.
    pub fn multi(prefixes: &[&str]) -> Result<Self, PatternError> {
        if prefixes.len() < 2 {
            return Err(PatternError::TooFewFields(prefixes.len()));
        }
        let width = BLOCK_SIZE - prefixes[1].len();
        Ok(Self {
            fields: prefixes
                .iter()
                .map(|p| PatternField {
                    prefix: p.to_string(),
                    width,
                    class: CharClass::Loose,
                })
                .collect(),
        })
    }

    /// Número de campos esperados.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Total de bytes a ler do transporte: `(campos + 1) * 15`.
    pub fn response_len(&self) -> usize {
        (self.fields.len() + 1) * BLOCK_SIZE
    }

    pub fn fields(&self) -> &[PatternField] {
        &self.fields
    }
}

/// Resultado de uma tentativa de decodificação.
///
/// Nunca carrega capturas parciais: ou todos os campos casam, ou nada é
/// retornado.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    /// Handshake e payload válidos; um valor capturado por campo.
    Matched(Vec<String>),
    /// O bloco de handshake não é o sentinela esperado.
    HandshakeMismatch,
    /// Handshake OK, mas o payload não casa com o padrão.
    PayloadMismatch,
}

/// Decodifica uma resposta na ordem padrão (payload primeiro, handshake no
/// final). Os dois testes são independentes: handshake válido com payload
/// inválido é rejeitado, e vice-versa.
pub fn decode(buffer: &[u8], pattern: &ResponsePattern) -> QueryOutcome {
    let expected = pattern.response_len();
    if buffer.len() != expected {
        return QueryOutcome::PayloadMismatch;
    }

    let (payload, handshake) = buffer.split_at(expected - BLOCK_SIZE);
    if !check_handshake(handshake) {
        return QueryOutcome::HandshakeMismatch;
    }

    match match_payload(payload, pattern.fields()) {
        Some(captures) => QueryOutcome::Matched(captures),
        None => QueryOutcome::PayloadMismatch,
    }
}

/// Decodifica uma resposta invertida (handshake primeiro, um campo depois),
/// usada pelas consultas do anemômetro.
pub fn decode_reversed(buffer: &[u8], prefix: &str) -> QueryOutcome {
    if buffer.len() != 2 * BLOCK_SIZE {
        return QueryOutcome::PayloadMismatch;
    }

    let (handshake, payload) = buffer.split_at(BLOCK_SIZE);
    if !check_handshake(handshake) {
        return QueryOutcome::HandshakeMismatch;
    }

    let field = PatternField {
        prefix: prefix.to_string(),
        width: SINGLE_FIELD_WIDTH,
        class: CharClass::Loose,
    };
    match match_payload(payload, std::slice::from_ref(&field)) {
        Some(captures) => QueryOutcome::Matched(captures),
        None => QueryOutcome::PayloadMismatch,
    }
}

/// Casa os campos contra o payload a partir do início do buffer; bytes
/// excedentes após o último campo são ignorados (o casamento é ancorado
/// somente no início, como no firmware de referência).
fn match_payload(payload: &[u8], fields: &[PatternField]) -> Option<Vec<String>> {
    let mut pos = 0usize;
    let mut captures = Vec::with_capacity(fields.len());

    for field in fields {
        let prefix = field.prefix.as_bytes();
        let end = pos + prefix.len() + field.width;
        if end > payload.len() {
            return None;
        }
        if &payload[pos..pos + prefix.len()] != prefix {
            return None;
        }
        let region = &payload[pos + prefix.len()..end];
        if !region.iter().all(|&b| field.class.accepts(b)) {
            return None;
        }
        // A região é ASCII por construção da classe de caracteres
        captures.push(String::from_utf8_lossy(region).into_owned());
        pos = end;
    }

    Some(captures)
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// Bloco de payload de 15 bytes: prefixo + valor, preenchido com espaços.
    fn block(prefix: &str, value: &str) -> Vec<u8> {
        let mut b = format!("{prefix}{value}").into_bytes();
        assert!(b.len() <= BLOCK_SIZE);
        b.resize(BLOCK_SIZE, b' ');
        b
    }

    fn frame(blocks: &[Vec<u8>]) -> Vec<u8> {
        let mut f = Vec::new();
        for b in blocks {
            f.extend_from_slice(b);
        }
        f.extend_from_slice(&handshake_block());
        f
    }

    #[test]
    fn handshake_sentinel_is_recognized() {
        assert!(check_handshake(&handshake_block()));
    }

    #[test]
    fn handshake_rejects_wrong_bytes() {
        let mut b = handshake_block();
        b[1] = b'x';
        assert!(!check_handshake(&b));

        let mut b = handshake_block();
        b[14] = b'1';
        assert!(!check_handshake(&b));

        assert!(!check_handshake(b"!"));
    }

    #[test]
    fn single_field_decodes() {
        let pattern = ResponsePattern::single("!2");
        let buf = frame(&[block("!2", "1000")]);
        assert_eq!(
            decode(&buf, &pattern),
            QueryOutcome::Matched(vec!["1000         ".into()])
        );
    }

    #[test]
    fn valid_payload_bad_handshake_is_rejected() {
        let pattern = ResponsePattern::single("!2");
        let mut buf = frame(&[block("!2", "1000")]);
        let last = buf.len() - 1;
        buf[last] = b'9';
        assert_eq!(decode(&buf, &pattern), QueryOutcome::HandshakeMismatch);
    }

    #[test]
    fn valid_handshake_bad_payload_is_rejected() {
        let pattern = ResponsePattern::single("!2");
        let buf = frame(&[block("!9", "1000")]);
        assert_eq!(decode(&buf, &pattern), QueryOutcome::PayloadMismatch);
    }

    #[test]
    fn multi_field_width_uses_second_prefix() {
        // Regressão da peculiaridade herdada: largura = 15 - len("!4")
        // para TODOS os campos.
        let pattern = ResponsePattern::multi(&["!6", "!4", "!5"]).unwrap();
        for field in pattern.fields() {
            assert_eq!(field.width, BLOCK_SIZE - "!4".len());
        }

        // Com prefixos de 3 bytes (contadores de erro), largura 12.
        let pattern = ResponsePattern::multi(&["!E1", "!E2", "!E3", "!E4"]).unwrap();
        for field in pattern.fields() {
            assert_eq!(field.width, 12);
        }
    }

    #[test]
    fn multi_field_decodes_in_order() {
        let pattern = ResponsePattern::multi(&["!6", "!4", "!5"]).unwrap();
        let buf = frame(&[block("!6", "700"), block("!4", "512"), block("!5", "300")]);
        match decode(&buf, &pattern) {
            QueryOutcome::Matched(fields) => {
                assert_eq!(fields.len(), 3);
                assert_eq!(fields[0].trim(), "700");
                assert_eq!(fields[1].trim(), "512");
                assert_eq!(fields[2].trim(), "300");
            }
            other => panic!("esperava Matched, recebeu {other:?}"),
        }
    }

    #[test]
    fn multi_field_never_returns_partial_captures() {
        let pattern = ResponsePattern::multi(&["!6", "!4", "!5"]).unwrap();
        // Dois primeiros campos bons, terceiro com prefixo errado
        let buf = frame(&[block("!6", "700"), block("!4", "512"), block("!9", "300")]);
        assert_eq!(decode(&buf, &pattern), QueryOutcome::PayloadMismatch);
    }

    #[test]
    fn multi_requires_two_prefixes() {
        assert_eq!(
            ResponsePattern::multi(&["!6"]),
            Err(PatternError::TooFewFields(1))
        );
    }

    #[test]
    fn exact_pattern_bypasses_width_derivation() {
        // Número de série: '!K' + exatamente 4 dígitos
        let pattern = ResponsePattern::exact("!K", 4, CharClass::Digits);
        let buf = frame(&[block("!K", "0123")]);
        assert_eq!(
            decode(&buf, &pattern),
            QueryOutcome::Matched(vec!["0123".into()])
        );

        let buf = frame(&[block("!K", "01a3")]);
        assert_eq!(decode(&buf, &pattern), QueryOutcome::PayloadMismatch);
    }

    #[test]
    fn reversed_layout_has_handshake_first() {
        let mut buf = handshake_block().to_vec();
        buf.extend_from_slice(&block("!v", "1"));
        assert_eq!(
            decode_reversed(&buf, "!v"),
            QueryOutcome::Matched(vec!["1            ".into()])
        );

        // Handshake no lugar errado (ordem padrão) não casa
        let std_order = frame(&[block("!v", "1")]);
        assert_eq!(
            decode_reversed(&std_order, "!v"),
            QueryOutcome::HandshakeMismatch
        );
    }

    #[test]
    fn response_len_counts_handshake_block() {
        assert_eq!(ResponsePattern::single("!2").response_len(), 30);
        assert_eq!(
            ResponsePattern::multi(&["!6", "!4", "!5"]).unwrap().response_len(),
            60
        );
    }
}
