#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Account keys could not be resolved; nothing in the transaction can be trusted.
    #[error("malformed transaction: {reason}")]
    MalformedTransaction { reason: String },

    #[error("decode error in {program_id}: {reason}")]
    Decode { program_id: String, reason: String },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Recoverable failure for a single instruction whose layout did not match
/// its program's expected discriminator, arity or arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    pub reason: String,
}

impl DecodeError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn unrecognized_layout() -> Self {
        Self::new("unrecognized layout")
    }

    pub fn into_error(self, program_id: &str) -> Error {
        Error::Decode {
            program_id: program_id.to_string(),
            reason: self.reason,
        }
    }
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.reason)
    }
}
