use std::future::Future;

use vf_core::config::CaptureConfig;
use vf_core::traits::{AudioConstraints, CaptureStrategy, SourceType};

use crate::error::NegotiationError;

/// Flux acquis et stratégie qui l'a fourni.
///
/// Owned by the caller, who releases `stream` when capture ends.
#[derive(Debug)]
pub struct CaptureResult<H> {
    /// Raw stream handle returned by the winning strategy.
    pub stream: H,
    /// Which strategy succeeded.
    pub source_type: SourceType,
}

/// Essaie les stratégies de capture dans l'ordre, la première qui réussit gagne.
///
/// Attempts are strictly sequential: one acquisition in flight at a time,
/// no strategy retried, no internal timeout.
///
/// # Example
/// ```
/// use vf_audio::negotiate::CaptureNegotiator;
/// use vf_core::config::CaptureConfig;
///
/// let negotiator = CaptureNegotiator::from_config(&CaptureConfig::default());
/// assert_eq!(negotiator.constraints_for(0).sample_rate, Some(48000));
/// assert_eq!(negotiator.constraints_for(1).sample_rate, None);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct CaptureNegotiator {
    shared: AudioConstraints,
    primary_sample_rate: Option<u32>,
}

impl CaptureNegotiator {
    /// `shared` goes to every attempt; `primary_sample_rate` only to the first.
    #[must_use]
    pub fn new(shared: AudioConstraints, primary_sample_rate: Option<u32>) -> Self {
        Self {
            shared,
            primary_sample_rate,
        }
    }

    /// Build from the `[capture]` config section.
    #[must_use]
    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(config.constraints(), config.primary_hint())
    }

    /// Constraints handed to the strategy at `position` in the priority list.
    #[must_use]
    pub fn constraints_for(&self, position: usize) -> AudioConstraints {
        let hint = if position == 0 {
            self.primary_sample_rate
        } else {
            None
        };
        self.shared.with_sample_rate(hint)
    }

    /// Négocie une source audio.
    ///
    /// Dropping the returned future abandons the in-flight attempt; failed
    /// attempts hold nothing, so nothing is left behind.
    ///
    /// # Errors
    /// [`NegotiationError::NoSourceAvailable`] when the list is empty or
    /// every strategy failed.
    pub async fn negotiate<H: Send>(
        &self,
        strategies: &[Box<dyn CaptureStrategy<H>>],
    ) -> Result<CaptureResult<H>, NegotiationError> {
        let mut failures = Vec::new();

        for (position, strategy) in strategies.iter().enumerate() {
            let source_type = strategy.source_type();
            let constraints = self.constraints_for(position);
            log::debug!(
                "Tentative de capture {source_type} ({}/{}) : {constraints:?}",
                position + 1,
                strategies.len()
            );

            match strategy.acquire(&constraints).await {
                Ok(stream) => {
                    log::info!("Source audio négociée : {source_type}");
                    return Ok(CaptureResult {
                        stream,
                        source_type,
                    });
                }
                Err(denied) => {
                    log::warn!("{denied}");
                    failures.push(denied);
                }
            }
        }

        log::error!(
            "Aucune source audio disponible après {} tentative(s)",
            failures.len()
        );
        Err(NegotiationError::NoSourceAvailable { failures })
    }

    /// Like [`negotiate`](Self::negotiate), but stops as soon as `cancel`
    /// completes.
    ///
    /// Cancellation wins over a simultaneously ready attempt and is reported
    /// as [`NegotiationError::Cancelled`], never as a denial. Strategies
    /// after the in-flight one are not attempted.
    ///
    /// # Errors
    /// `Cancelled` if `cancel` fires first, otherwise as `negotiate`.
    pub async fn negotiate_until<H, C>(
        &self,
        strategies: &[Box<dyn CaptureStrategy<H>>],
        cancel: C,
    ) -> Result<CaptureResult<H>, NegotiationError>
    where
        H: Send,
        C: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            () = cancel => {
                log::info!("Négociation audio annulée par l'appelant");
                Err(NegotiationError::Cancelled)
            }
            result = self.negotiate(strategies) => result,
        }
    }
}
