use serde::{Deserialize, Serialize};

use feijump_core::effect::{EffectKind, TimedEffect};

use crate::config::TowerPhysicsConfig;

/// Lifetime of a jump boost after pickup.
pub const JUMP_BOOST_MS: f32 = 5000.0;
/// Lifetime of a slow fall after pickup.
pub const SLOW_FALL_MS: f32 = 5000.0;

/// Optional buffs scattered up the tower.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerUpKind {
    JumpBoost,
    SlowFall,
}

impl EffectKind for PowerUpKind {
    fn duration_ms(&self) -> f32 {
        match self {
            PowerUpKind::JumpBoost => JUMP_BOOST_MS,
            PowerUpKind::SlowFall => SLOW_FALL_MS,
        }
    }
}

/// Running effect on the player.
pub type ActiveEffect = TimedEffect<PowerUpKind>;

/// Power-up placed in the level. Destroyed on pickup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerUp {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub kind: PowerUpKind,
}

/// Tracks the player's jump boost and slow fall, one slot each.
///
/// A slot is either empty or holds a single running effect, so magnitudes
/// never stack: re-acquiring restarts the slot's timer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerUpSystem {
    jump_boost: Option<ActiveEffect>,
    slow_fall: Option<ActiveEffect>,
}

impl PowerUpSystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot_mut(&mut self, kind: PowerUpKind) -> &mut Option<ActiveEffect> {
        match kind {
            PowerUpKind::JumpBoost => &mut self.jump_boost,
            PowerUpKind::SlowFall => &mut self.slow_fall,
        }
    }

    /// Activate `kind`, or restart its window if already active.
    pub fn on_pickup(&mut self, kind: PowerUpKind) {
        let slot = self.slot_mut(kind);
        if let Some(effect) = slot {
            effect.restart();
        } else {
            *slot = Some(ActiveEffect::new(kind));
        }
    }

    /// Advance both timers. Returns the kinds that expired during this tick.
    pub fn tick(&mut self, dt_ms: f32) -> Vec<PowerUpKind> {
        let mut expired = Vec::new();
        for kind in [PowerUpKind::JumpBoost, PowerUpKind::SlowFall] {
            let slot = self.slot_mut(kind);
            if let Some(effect) = slot {
                effect.tick(dt_ms);
                if effect.is_expired() {
                    *slot = None;
                    expired.push(kind);
                }
            }
        }
        expired
    }

    pub fn jump_boost_active(&self) -> bool {
        self.jump_boost.is_some()
    }

    pub fn slow_fall_active(&self) -> bool {
        self.slow_fall.is_some()
    }

    pub fn remaining_ms(&self, kind: PowerUpKind) -> Option<f32> {
        match kind {
            PowerUpKind::JumpBoost => self.jump_boost.as_ref(),
            PowerUpKind::SlowFall => self.slow_fall.as_ref(),
        }
        .map(|e| e.remaining_ms)
    }

    /// Upward impulse magnitude granted by the next landing.
    pub fn jump_impulse(&self, physics: &TowerPhysicsConfig) -> f32 {
        if self.jump_boost_active() {
            physics.boosted_jump_velocity
        } else {
            physics.normal_jump_velocity
        }
    }

    /// Gravity currently acting on the player.
    pub fn gravity(&self, physics: &TowerPhysicsConfig) -> f32 {
        if self.slow_fall_active() {
            physics.slow_fall_gravity
        } else {
            physics.gravity
        }
    }

    pub fn clear(&mut self) {
        self.jump_boost = None;
        self.slow_fall = None;
    }
}
