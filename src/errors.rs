use thiserror::Error;

/// Everything that can go wrong in the protocol layer.
///
/// Proof *checks* are pure predicates and return `bool`; these variants cover
/// the operations that must fail closed and say why. No operation retries,
/// and no operation returns partially-computed cryptographic state alongside
/// an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed input detected by local validation before any cryptography runs.
    #[error("invalid input for {object_id}: {reason}")]
    InvalidInput { object_id: String, reason: String },

    /// A recomputed hash or proof check disagreed with a stored one.
    #[error("proof or hash check failed for {object_id}: {reason}")]
    ProofFailure { object_id: String, reason: String },

    /// A multi-party operation was requested from an impossible state.
    #[error("protocol state error: {0}")]
    ProtocolState(String),

    /// A value was outside its required modulus range.
    #[error("value out of range: {0}")]
    OutOfRange(String),

    /// The auxiliary transport codec refused to encrypt or decrypt.
    #[error("auxiliary transport failure for guardian {guardian_id}")]
    Auxiliary { guardian_id: String },

    /// Discrete log recovery exceeded the documented search bound.
    #[error("discrete log exceeds the maximum tally bound")]
    DlogExceeded,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid<S: Into<String>, R: Into<String>>(object_id: S, reason: R) -> Error {
        Error::InvalidInput {
            object_id: object_id.into(),
            reason: reason.into(),
        }
    }

    pub fn proof<S: Into<String>, R: Into<String>>(object_id: S, reason: R) -> Error {
        Error::ProofFailure {
            object_id: object_id.into(),
            reason: reason.into(),
        }
    }
}
