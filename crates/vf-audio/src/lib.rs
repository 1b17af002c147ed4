//! Audio source negotiation, spectrum analysis and feature extraction.

pub mod analyser;
pub mod capture;
pub mod error;
pub mod features;
pub mod negotiate;
pub mod state;

pub use analyser::Analyser;
pub use capture::{CaptureStream, CpalStrategy};
pub use error::NegotiationError;
pub use features::extract;
pub use negotiate::{CaptureNegotiator, CaptureResult};
