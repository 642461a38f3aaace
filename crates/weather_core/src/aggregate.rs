//! Agregação robusta de amostras ruidosas.
//!
//! O manual do dispositivo recomenda repetir cada leitura e usar uma
//! estatística robusta. A política é uma só para todas as grandezas:
//! `n` tentativas, quórum mínimo de sucessos, mediana dos sucessos.
//! Sem quórum não há valor — nunca uma média de menos amostras.

use tracing::debug;

/// Mediana aritmética. Retorna `None` para entrada vazia.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Mediana condicionada a quórum: `Some(mediana)` somente se houver pelo
/// menos `quorum` valores.
pub fn median_with_quorum(values: &[f64], quorum: usize) -> Option<f64> {
    if values.len() < quorum {
        debug!(
            "Quórum não atingido: {} de {} amostras válidas",
            values.len(),
            quorum
        );
        return None;
    }
    median(values)
}

/// Executa `probe` exatamente `samples` vezes e agrega os sucessos.
///
/// Uma tentativa que retorna `None` simplesmente não contribui amostra;
/// o ciclo continua. O resultado é a mediana se ao menos `quorum`
/// tentativas produziram valor, caso contrário `None`.
pub fn aggregate_samples(
    samples: usize,
    quorum: usize,
    mut probe: impl FnMut() -> Option<f64>,
) -> Option<f64> {
    let mut collected = Vec::with_capacity(samples);
    for _ in 0..samples {
        if let Some(value) = probe() {
            collected.push(value);
        }
    }
    median_with_quorum(&collected, quorum)
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
