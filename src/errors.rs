/// Domain-specific error types for the pricing engine.
/// Every pricing call either returns a finite value or one of these:
/// - InvalidParameter is always fatal to the call and never silently corrected
/// - NumericalInstability is propagated by pricers, never papered over
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid parameter {field}={value}: {reason}")]
    InvalidParameter {
        field: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("numerical instability: {0}")]
    NumericalInstability(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl EngineError {
    #[inline]
    pub fn invalid(field: &'static str, value: f64, reason: &'static str) -> Self {
        EngineError::InvalidParameter { field, value, reason }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Io(e.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
