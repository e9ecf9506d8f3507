//! Minimal arcade physics that speaks the host command protocol.
//!
//! Screen coordinates, y grows downward. The world applies [`HostCommand`]s,
//! integrates the player, animates kinematic platforms along their tweens and
//! reports [`Contact`]s. It stands in for a real engine in tests and in the
//! headless simulator.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use feijump_core::host::{BodyKind, CollisionSides, Contact, EntityId, HorizontalTween, HostCommand};

/// Player body width.
pub const PLAYER_WIDTH: f32 = 32.0;
/// Player body height.
pub const PLAYER_HEIGHT: f32 = 32.0;
/// Pickup body size (square).
pub const PICKUP_SIZE: f32 = 24.0;
/// Physics substeps per frame.
pub const SUBSTEPS: u32 = 4;
/// Tolerance above a platform top for landing detection.
const LAND_TOLERANCE: f32 = 4.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerBody {
    pub entity: EntityId,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub gravity: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformBody {
    /// Spawn position; tweens oscillate around it.
    pub anchor_x: f32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub body: BodyKind,
    pub collision: CollisionSides,
    pub tween: Option<HorizontalTween>,
    pub fading: bool,
}

impl PlatformBody {
    fn top(&self) -> f32 {
        self.y - self.height / 2.0
    }

    fn bottom(&self) -> f32 {
        self.y + self.height / 2.0
    }

    fn overlaps_x(&self, x: f32, half_w: f32) -> bool {
        x + half_w > self.x - self.width / 2.0 && x - half_w < self.x + self.width / 2.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct HeadlessWorld {
    /// Horizontal bounds the player collides with (`0..width`).
    pub width: f32,
    player: Option<PlayerBody>,
    platforms: HashMap<EntityId, PlatformBody>,
    pickups: HashMap<EntityId, (f32, f32)>,
    paused: bool,
    elapsed_ms: f32,
    camera_y: f32,
    orientation_subscribed: bool,
}

impl HeadlessWorld {
    pub fn new(width: f32) -> Self {
        Self {
            width,
            ..Default::default()
        }
    }

    pub fn apply(&mut self, commands: &[HostCommand]) {
        for command in commands {
            self.apply_one(command);
        }
    }

    fn apply_one(&mut self, command: &HostCommand) {
        match *command {
            HostCommand::SpawnPlayer {
                entity,
                x,
                y,
                gravity,
            } => {
                self.player = Some(PlayerBody {
                    entity,
                    x,
                    y,
                    vx: 0.0,
                    vy: 0.0,
                    gravity,
                });
            },
            HostCommand::SpawnPlatform {
                entity,
                x,
                y,
                width,
                height,
                body,
                collision,
                tween,
            } => {
                self.platforms.insert(
                    entity,
                    PlatformBody {
                        anchor_x: x,
                        x,
                        y,
                        width,
                        height,
                        body,
                        collision,
                        tween,
                        fading: false,
                    },
                );
            },
            HostCommand::SpawnPickup { entity, x, y } => {
                self.pickups.insert(entity, (x, y));
            },
            HostCommand::SetVelocityX { entity, vx } => {
                if let Some(p) = self.player_mut(entity) {
                    p.vx = vx;
                }
            },
            HostCommand::SetVelocityY { entity, vy } => {
                if let Some(p) = self.player_mut(entity) {
                    p.vy = vy;
                }
            },
            HostCommand::SetGravity { entity, gravity } => {
                if let Some(p) = self.player_mut(entity) {
                    p.gravity = gravity;
                }
            },
            HostCommand::PlayFade { entity, .. } => {
                if let Some(platform) = self.platforms.get_mut(&entity) {
                    platform.fading = true;
                }
            },
            HostCommand::Destroy { entity } => {
                if self.player.as_ref().is_some_and(|p| p.entity == entity) {
                    self.player = None;
                }
                self.platforms.remove(&entity);
                self.pickups.remove(&entity);
            },
            HostCommand::ScrollCamera { scroll_y } => self.camera_y = scroll_y,
            HostCommand::SetPhysicsPaused(paused) => self.paused = paused,
            HostCommand::SubscribeOrientation => self.orientation_subscribed = true,
            HostCommand::ReleaseOrientation => self.orientation_subscribed = false,
        }
    }

    fn player_mut(&mut self, entity: EntityId) -> Option<&mut PlayerBody> {
        self.player.as_mut().filter(|p| p.entity == entity)
    }

    /// Advance by `dt_ms` and return the contacts that started during the step.
    pub fn step(&mut self, dt_ms: f32) -> Vec<Contact> {
        if self.paused || !dt_ms.is_finite() || dt_ms <= 0.0 {
            return Vec::new();
        }
        let mut contacts = Vec::new();
        let sub_ms = dt_ms / SUBSTEPS as f32;
        for _ in 0..SUBSTEPS {
            self.elapsed_ms += sub_ms;
            self.move_platforms();
            self.substep(sub_ms / 1000.0, &mut contacts);
        }
        contacts
    }

    fn move_platforms(&mut self) {
        for platform in self.platforms.values_mut() {
            if let Some(tween) = platform.tween {
                platform.x = platform.anchor_x + tween.offset_at(self.elapsed_ms);
            }
        }
    }

    fn substep(&mut self, dt: f32, contacts: &mut Vec<Contact>) {
        let Some(player) = self.player.as_mut() else {
            return;
        };
        let half_w = PLAYER_WIDTH / 2.0;
        let half_h = PLAYER_HEIGHT / 2.0;

        player.vy += player.gravity * dt;
        let prev_bottom = player.y + half_h;
        let prev_top = player.y - half_h;
        player.x += player.vx * dt;
        player.y += player.vy * dt;

        // World bounds, horizontal only.
        if player.x - half_w < 0.0 {
            player.x = half_w;
        } else if player.x + half_w > self.width {
            player.x = self.width - half_w;
        }

        let mut ids: Vec<EntityId> = self.platforms.keys().copied().collect();
        ids.sort_unstable();
        for id in ids {
            let Some(platform) = self.platforms.get(&id) else {
                continue;
            };
            if !platform.overlaps_x(player.x, half_w) {
                continue;
            }
            let bottom = player.y + half_h;
            let top = player.y - half_h;

            // Falling onto the top surface.
            if player.vy >= 0.0
                && prev_bottom <= platform.top() + LAND_TOLERANCE
                && bottom >= platform.top()
            {
                player.y = platform.top() - half_h;
                player.vy = 0.0;
                if !contacts.contains(&Contact::Landing(id)) {
                    contacts.push(Contact::Landing(id));
                }
                continue;
            }

            if platform.collision == CollisionSides::TopOnly {
                continue;
            }
            // Head bump from below.
            if player.vy < 0.0 && prev_top >= platform.bottom() && top < platform.bottom() {
                player.y = platform.bottom() + half_h;
                player.vy = 0.0;
                continue;
            }
            // Side push.
            if top < platform.bottom() && bottom > platform.top() {
                if player.x < platform.x {
                    player.x = platform.x - platform.width / 2.0 - half_w;
                } else {
                    player.x = platform.x + platform.width / 2.0 + half_w;
                }
                player.vx = 0.0;
            }
        }

        let reach = (PLAYER_WIDTH + PICKUP_SIZE) / 2.0;
        let mut touched: Vec<EntityId> = self
            .pickups
            .iter()
            .filter(|(_, (px, py))| {
                (player.x - px).abs() < reach && (player.y - py).abs() < reach
            })
            .map(|(id, _)| *id)
            .collect();
        touched.sort_unstable();
        for id in touched {
            if !contacts.contains(&Contact::Overlap(id)) {
                contacts.push(Contact::Overlap(id));
            }
        }
    }

    pub fn player(&self) -> Option<&PlayerBody> {
        self.player.as_ref()
    }

    pub fn platform(&self, entity: EntityId) -> Option<&PlatformBody> {
        self.platforms.get(&entity)
    }

    pub fn platforms(&self) -> impl Iterator<Item = (EntityId, &PlatformBody)> {
        self.platforms.iter().map(|(id, p)| (*id, p))
    }

    pub fn pickup_count(&self) -> usize {
        self.pickups.len()
    }

    pub fn camera_y(&self) -> f32 {
        self.camera_y
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn orientation_subscribed(&self) -> bool {
        self.orientation_subscribed
    }
}
