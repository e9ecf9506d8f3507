use serde::{Deserialize, Serialize};

/// Identifier the session assigns to every entity it asks the host to spawn.
pub type EntityId = u32;

/// Physics body flavor requested for a spawned entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyKind {
    /// Never moves, participates in collisions.
    Static,
    /// Moved by a tween, ignores gravity, immovable on contact.
    Kinematic,
    /// Integrated by the physics step (the player).
    Dynamic,
}

/// Which sides of a body collide with the player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollisionSides {
    #[default]
    All,
    /// One-way platform: only a body falling onto the top surface collides.
    TopOnly,
}

/// Endless yoyo tween along the x axis with a sine ease-in-out per leg.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HorizontalTween {
    /// Signed distance from the anchor to the far end of the leg.
    pub offset_x: f32,
    /// Duration of one leg (anchor to far end) in milliseconds.
    pub duration_ms: f32,
}

impl HorizontalTween {
    /// Displacement from the anchor after `elapsed_ms` of playback.
    pub fn offset_at(&self, elapsed_ms: f32) -> f32 {
        if self.duration_ms <= 0.0 || !elapsed_ms.is_finite() {
            return 0.0;
        }
        let legs = elapsed_ms.max(0.0) / self.duration_ms;
        let leg = legs.floor() as u64;
        let t = legs.fract();
        // Odd legs run back toward the anchor.
        let progress = if leg % 2 == 0 { t } else { 1.0 - t };
        let eased = (1.0 - (std::f32::consts::PI * progress).cos()) / 2.0;
        self.offset_x * eased
    }
}

/// Commands the core emits to the physics/rendering collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HostCommand {
    SpawnPlayer {
        entity: EntityId,
        x: f32,
        y: f32,
        gravity: f32,
    },
    SpawnPlatform {
        entity: EntityId,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        body: BodyKind,
        collision: CollisionSides,
        tween: Option<HorizontalTween>,
    },
    SpawnPickup {
        entity: EntityId,
        x: f32,
        y: f32,
    },
    SetVelocityX {
        entity: EntityId,
        vx: f32,
    },
    SetVelocityY {
        entity: EntityId,
        vy: f32,
    },
    SetGravity {
        entity: EntityId,
        gravity: f32,
    },
    /// Start a fade-out of the entity's visual. The body stays solid.
    PlayFade {
        entity: EntityId,
        duration_ms: f32,
    },
    Destroy {
        entity: EntityId,
    },
    /// Set the camera's vertical scroll (world y of the top edge).
    ScrollCamera {
        scroll_y: f32,
    },
    SetPhysicsPaused(bool),
    /// Acquire the device-orientation subscription.
    SubscribeOrientation,
    /// Release the device-orientation subscription.
    ReleaseOrientation,
}

impl HostCommand {
    /// The entity a command targets, if any.
    pub fn entity(&self) -> Option<EntityId> {
        match self {
            Self::SpawnPlayer { entity, .. }
            | Self::SpawnPlatform { entity, .. }
            | Self::SpawnPickup { entity, .. }
            | Self::SetVelocityX { entity, .. }
            | Self::SetVelocityY { entity, .. }
            | Self::SetGravity { entity, .. }
            | Self::PlayFade { entity, .. }
            | Self::Destroy { entity } => Some(*entity),
            Self::ScrollCamera { .. }
            | Self::SetPhysicsPaused(_)
            | Self::SubscribeOrientation
            | Self::ReleaseOrientation => None,
        }
    }
}

/// Collision notification delivered by the physics collaborator after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Contact {
    /// The player started touching the entity from above.
    Landing(EntityId),
    /// The player's body overlaps a pickup.
    Overlap(EntityId),
}

/// Keys the keyboard control method reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeldKeys {
    pub left: bool,
    pub right: bool,
    pub a: bool,
    pub d: bool,
}

/// Everything the host samples once per frame before calling into the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameInput {
    /// Wall-clock milliseconds since the previous frame.
    pub dt_ms: f32,
    pub player_x: f32,
    pub player_y: f32,
    /// Pointer x in world coordinates, if a pointer is present.
    pub pointer_x: Option<f32>,
    pub keys: HeldKeys,
    /// Device left-right tilt (gamma) in degrees, if an orientation reading exists.
    pub tilt_gamma: Option<f32>,
}
