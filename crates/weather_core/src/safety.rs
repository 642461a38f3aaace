//! Avaliação de segurança das condições.
//!
//! O firmware de referência ainda não define limiares; a decisão é a
//! constante conservadora UNSAFE. O trait é o ponto de extensão para uma
//! política real baseada em limiares, sem tocar no resto do pipeline.

use crate::types::{Safety, WeatherReadings};

/// Política que mapeia as leituras agregadas de um ciclo num veredito.
pub trait SafetyPolicy {
    fn evaluate(&self, readings: &WeatherReadings) -> Safety;
}

/// Política padrão: sempre UNSAFE, como no dispositivo de referência.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysUnsafe;

impl SafetyPolicy for AlwaysUnsafe {
    fn evaluate(&self, _readings: &WeatherReadings) -> Safety {
        Safety::Unsafe
    }
}
