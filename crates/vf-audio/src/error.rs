use thiserror::Error;
use vf_core::traits::StrategyDenied;

/// Terminal outcomes of a capture negotiation.
///
/// Per-strategy failures never surface on their own: they are logged and
/// collected into `NoSourceAvailable` for diagnostics.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NegotiationError {
    /// Every strategy failed, or the list was empty.
    #[error("no audio source available")]
    NoSourceAvailable {
        /// One entry per attempted strategy, in attempt order.
        failures: Vec<StrategyDenied>,
    },

    /// The caller withdrew interest while an attempt was pending.
    #[error("négociation audio annulée")]
    Cancelled,
}

impl NegotiationError {
    /// `true` for the caller-driven cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
