// Effectors: the outward-facing side of intent execution. The
// orchestrator only ever talks to the capability trait.

use thiserror::Error;

pub mod desktop;
pub use desktop::DesktopEffector;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EffectorError {
    #[error("input injection failed: {0}")]
    Input(String),
    #[error("volume control failed: {0}")]
    Volume(String),
    #[error("power control failed: {0}")]
    Power(String),
    #[error("not supported on this platform")]
    Unsupported,
}

/// Side-effecting operations the assistant can perform on the host.
///
/// Failures are transient runtime errors; callers log them and carry on
/// rather than propagating.
pub trait Effector: Send {
    /// Current output volume as a scalar in [0, 1].
    fn volume_get(&mut self) -> Result<f32, EffectorError>;

    /// Set output volume as a percentage in 0..=100.
    fn volume_set(&mut self, level: u8) -> Result<(), EffectorError>;

    fn next_track(&mut self) -> Result<(), EffectorError>;

    fn prev_track(&mut self) -> Result<(), EffectorError>;

    fn shutdown(&mut self) -> Result<(), EffectorError>;

    fn reboot(&mut self) -> Result<(), EffectorError>;
}
