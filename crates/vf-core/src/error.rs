use thiserror::Error;

/// Errors originating from the core module.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A spectrum snapshot was built with a zero sample rate.
    #[error("Snapshot invalide : sample rate must be > 0")]
    ZeroSampleRate,

    /// Unknown capture source identifier.
    #[error("Source inconnue : {name}")]
    UnknownSource {
        /// The identifier that did not match any source.
        name: String,
    },
}
