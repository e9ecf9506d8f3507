use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Trait for game-specific timed effect kinds.
pub trait EffectKind: Clone + Copy + PartialEq + Serialize + DeserializeOwned {
    /// Fixed lifetime of the effect in milliseconds.
    fn duration_ms(&self) -> f32;
}

/// A running effect, generic over the kind enum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct TimedEffect<K: EffectKind> {
    pub kind: K,
    pub remaining_ms: f32,
}

impl<K: EffectKind> TimedEffect<K> {
    pub fn new(kind: K) -> Self {
        Self {
            remaining_ms: kind.duration_ms(),
            kind,
        }
    }

    /// Reset to the full window. Re-acquiring never stacks duration.
    pub fn restart(&mut self) {
        self.remaining_ms = self.kind.duration_ms();
    }

    pub fn tick(&mut self, dt_ms: f32) {
        if dt_ms.is_finite() && dt_ms > 0.0 {
            self.remaining_ms -= dt_ms;
        }
    }

    pub fn is_expired(&self) -> bool {
        self.remaining_ms <= 0.0
    }
}
