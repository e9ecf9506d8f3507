use feijump_core::host::{Contact, FrameInput, HeldKeys};
use feijump_core::scene::ControlMethod;
use feijump_tower::physics::{HeadlessWorld, PLAYER_HEIGHT, PLAYER_WIDTH};

/// Dead zone around the target x for keyboard steering.
const KEY_DEAD_ZONE: f32 = 8.0;
/// Tilt that maps to full speed with the default gain.
const MAX_TILT: f32 = 30.0;

/// Scripted player: climbs to the closest platform above the last one it
/// landed on, approaching from the side while still below it.
#[derive(Debug, Clone)]
pub struct Autopilot {
    method: ControlMethod,
    floor_y: Option<f32>,
}

impl Autopilot {
    pub fn new(method: ControlMethod) -> Self {
        Self {
            method,
            floor_y: None,
        }
    }

    /// Track landings before the contacts are handed to the session.
    pub fn observe(&mut self, contacts: &[Contact], world: &HeadlessWorld) {
        for contact in contacts {
            if let Contact::Landing(entity) = contact
                && let Some(platform) = world.platform(*entity)
            {
                self.floor_y = Some(platform.y);
            }
        }
    }

    /// Forget the floor, e.g. after a restart.
    pub fn reset(&mut self) {
        self.floor_y = None;
    }

    pub fn input(&self, world: &HeadlessWorld, dt_ms: f32) -> FrameInput {
        let Some(player) = world.player() else {
            return FrameInput {
                dt_ms,
                ..Default::default()
            };
        };
        let floor = self.floor_y.unwrap_or(player.y + PLAYER_HEIGHT);
        let target = world
            .platforms()
            .map(|(_, p)| p)
            .filter(|p| p.y < floor - 1.0)
            .max_by(|a, b| a.y.total_cmp(&b.y));

        let target_x = match target {
            Some(p) => {
                let feet = player.y + PLAYER_HEIGHT / 2.0;
                let top = p.y - p.height / 2.0;
                let edge = p.width / 2.0 + PLAYER_WIDTH;
                if feet > top && (player.x - p.x).abs() < edge {
                    // Still below: line up beside the platform, not under it.
                    if player.x < p.x { p.x - edge } else { p.x + edge }
                } else {
                    p.x
                }
            },
            None => player.x,
        };

        let mut input = FrameInput {
            dt_ms,
            player_x: player.x,
            player_y: player.y,
            ..Default::default()
        };
        let dx = target_x - player.x;
        match self.method {
            ControlMethod::Mouse => input.pointer_x = Some(target_x),
            ControlMethod::Keyboard => {
                input.keys = HeldKeys {
                    left: dx < -KEY_DEAD_ZONE,
                    right: dx > KEY_DEAD_ZONE,
                    ..Default::default()
                };
            },
            ControlMethod::Gyroscope => {
                input.tilt_gamma = Some((dx / 10.0).clamp(-MAX_TILT, MAX_TILT));
            },
        }
        input
    }
}
