//! Error types for the iohc engine.

use thiserror::Error;

/// Result type alias for iohc operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the iohc engine.
#[derive(Error, Debug)]
pub enum Error {
    // Frame structural faults
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    // Integrity, authentication and replay faults
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    // Collaborator failures
    #[error("key vault failure: {0}")]
    KeyVaultFailure(String),

    #[error("crypto backend failure: {0}")]
    CryptoBackendFailure(String),

    #[error("radio backend failure: {0}")]
    RadioBackendFailure(String),

    // Discovery
    #[error("discovery list full (capacity {0})")]
    CapacityExceeded(usize),

    // Configuration
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // Persistence
    #[error("persistence error: {0}")]
    Persistence(String),
}

/// Frame structural faults.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("command parameters too long: {len} bytes (max {max})")]
    ParamsTooLong { len: usize, max: usize },

    #[error("malformed header")]
    MalformedHeader,

    #[error("truncated frame: got {got} bytes, header declares {expected}")]
    Truncated { got: usize, expected: usize },
}

/// Integrity, authentication and replay-protection faults.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("CRC mismatch")]
    CrcMismatch,

    #[error("invalid authentication tag")]
    InvalidTag,

    #[error("2W tag verification requires a challenge binding")]
    MissingChallenge,

    #[error("rolling code replayed or outside acceptance window")]
    ReplayOrOutOfWindow,

    #[error("operation not allowed on the broadcast address")]
    BroadcastNotAllowed,

    #[error("authenticated session expired")]
    SessionExpired,

    #[error("operation invalid in current session state")]
    WrongState,
}

impl Error {
    /// Faults that are absorbed on the receive path: the frame is dropped
    /// and a counter is bumped, nothing surfaces to the caller.
    pub fn is_recoverable_on_receive(&self) -> bool {
        matches!(
            self,
            Error::Frame(_)
                | Error::Auth(
                    AuthError::CrcMismatch
                        | AuthError::InvalidTag
                        | AuthError::MissingChallenge
                        | AuthError::ReplayOrOutOfWindow
                )
        )
    }
}

/// Outcome of a replay-window check that distinguishes a benign duplicate
/// from a rejected code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayVerdict {
    /// Strictly newer and within the window; the counter advances.
    Accept,
    /// Same code as last seen; dropped silently, not an error.
    Duplicate,
}
