// Desktop effector: media keys through synthetic input, volume through
// the system mixer CLI, power through the platform shutdown command.

use std::process::Command;

use enigo::{Direction, Enigo, Key, Keyboard, Settings};

use super::{Effector, EffectorError};
use crate::debug;

pub struct DesktopEffector {
    enigo: Enigo,
}

impl DesktopEffector {
    pub fn new() -> Result<Self, EffectorError> {
        let enigo =
            Enigo::new(&Settings::default()).map_err(|e| EffectorError::Input(e.to_string()))?;
        Ok(Self { enigo })
    }

    fn tap(&mut self, key: Key) -> Result<(), EffectorError> {
        debug!("[control] media key {key:?}");
        self.enigo
            .key(key, Direction::Click)
            .map_err(|e| EffectorError::Input(e.to_string()))
    }
}

impl Effector for DesktopEffector {
    #[cfg(unix)]
    fn volume_get(&mut self) -> Result<f32, EffectorError> {
        let output = Command::new("pactl")
            .args(["get-sink-volume", "@DEFAULT_SINK@"])
            .output()
            .map_err(|e| EffectorError::Volume(e.to_string()))?;
        if !output.status.success() {
            return Err(EffectorError::Volume(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        let text = String::from_utf8_lossy(&output.stdout);
        parse_volume_percent(&text)
            .map(|percent| (percent as f32 / 100.0).clamp(0.0, 1.0))
            .ok_or_else(|| EffectorError::Volume("no percentage in pactl output".to_string()))
    }

    #[cfg(not(unix))]
    fn volume_get(&mut self) -> Result<f32, EffectorError> {
        Err(EffectorError::Unsupported)
    }

    #[cfg(unix)]
    fn volume_set(&mut self, level: u8) -> Result<(), EffectorError> {
        let status = Command::new("pactl")
            .args([
                "set-sink-volume",
                "@DEFAULT_SINK@",
                &format!("{}%", level.min(100)),
            ])
            .status()
            .map_err(|e| EffectorError::Volume(e.to_string()))?;
        if status.success() {
            Ok(())
        } else {
            Err(EffectorError::Volume(format!("pactl exited with {status}")))
        }
    }

    #[cfg(not(unix))]
    fn volume_set(&mut self, _level: u8) -> Result<(), EffectorError> {
        Err(EffectorError::Unsupported)
    }

    fn next_track(&mut self) -> Result<(), EffectorError> {
        self.tap(Key::MediaNextTrack)
    }

    fn prev_track(&mut self) -> Result<(), EffectorError> {
        self.tap(Key::MediaPrevTrack)
    }

    #[cfg(unix)]
    fn shutdown(&mut self) -> Result<(), EffectorError> {
        Command::new("systemctl")
            .arg("poweroff")
            .status()
            .map_err(|e| EffectorError::Power(e.to_string()))
            .map(|_| ())
    }

    #[cfg(not(unix))]
    fn shutdown(&mut self) -> Result<(), EffectorError> {
        Command::new("shutdown")
            .args(["/s", "/t", "0"])
            .status()
            .map_err(|e| EffectorError::Power(e.to_string()))
            .map(|_| ())
    }

    #[cfg(unix)]
    fn reboot(&mut self) -> Result<(), EffectorError> {
        Command::new("systemctl")
            .arg("reboot")
            .status()
            .map_err(|e| EffectorError::Power(e.to_string()))
            .map(|_| ())
    }

    #[cfg(not(unix))]
    fn reboot(&mut self) -> Result<(), EffectorError> {
        Command::new("shutdown")
            .args(["/r", "/t", "0"])
            .status()
            .map_err(|e| EffectorError::Power(e.to_string()))
            .map(|_| ())
    }
}

/// Pull the first "NN%" token out of pactl's volume report.
#[cfg_attr(not(unix), allow(dead_code))]
fn parse_volume_percent(text: &str) -> Option<u8> {
    text.split_whitespace()
        .find_map(|token| token.strip_suffix('%'))
        .and_then(|digits| digits.parse::<u8>().ok())
}
