// Wake word detection and verification.

pub mod detector;
pub use detector::{WakeModel, WakeWordDetector};

pub mod phrase;
pub use phrase::PhraseSpotter;

pub mod verifier;
pub use verifier::WakeWordVerifier;
