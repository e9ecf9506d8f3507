use feijump_core::host::FrameInput;
use feijump_core::scene::ControlMethod;

use crate::config::TowerPhysicsConfig;

/// Maps the raw input of one control method to a horizontal velocity.
///
/// The method is fixed when the adapter is built and never changes for the
/// lifetime of a session.
#[derive(Debug, Clone)]
pub struct ControlAdapter {
    method: ControlMethod,
    max_velocity: f32,
    mouse_gain: f32,
    tilt_gain: f32,
}

impl ControlAdapter {
    pub fn new(method: ControlMethod, physics: &TowerPhysicsConfig) -> Self {
        Self {
            method,
            max_velocity: physics.max_horizontal_velocity.abs(),
            mouse_gain: physics.mouse_gain,
            tilt_gain: physics.tilt_gain,
        }
    }

    pub fn method(&self) -> ControlMethod {
        self.method
    }

    /// Horizontal velocity for this frame, within `±max_horizontal_velocity`.
    pub fn sample(&self, input: &FrameInput) -> f32 {
        let raw = match self.method {
            ControlMethod::Mouse => match input.pointer_x {
                Some(px) => (px - input.player_x) * self.mouse_gain,
                None => 0.0,
            },
            ControlMethod::Keyboard => {
                let keys = &input.keys;
                // Arrow keys first, then A/D overrides; left wins within each pair.
                let mut v = 0.0;
                if keys.left {
                    v = -self.max_velocity;
                } else if keys.right {
                    v = self.max_velocity;
                }
                if keys.a {
                    v = -self.max_velocity;
                } else if keys.d {
                    v = self.max_velocity;
                }
                v
            },
            ControlMethod::Gyroscope => input.tilt_gamma.unwrap_or(0.0) * self.tilt_gain,
        };
        if raw.is_finite() {
            raw.clamp(-self.max_velocity, self.max_velocity)
        } else {
            0.0
        }
    }
}
