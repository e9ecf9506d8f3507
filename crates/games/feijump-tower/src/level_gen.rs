//! Procedural tower generation.
//!
//! A tower is a ground platform followed by one section per semester, from the
//! starting semester up to the last, stacked upward (y decreases going up, as in
//! screen space). Each section walks a cursor upward in random steps and places
//! one platform per step, carrying on from the last platform of the section
//! below. The finish platform sits a fixed clearance above the top of the last
//! section, and extra steps close the distance to it. Power-ups follow their own
//! vertical cadence.
//!
//! All randomness comes from the caller's RNG, so a fixed RNG sequence always
//! yields the same tower.

use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use serde::{Deserialize, Serialize};

use feijump_core::host::HorizontalTween;

use crate::config::{GenerationConfig, LevelConfig, LevelLayout, LevelTable, SEMESTER_COUNT};
use crate::error::ConfigError;
use crate::powerups::{PowerUp, PowerUpKind};

/// Height of the player's spawn point above the ground platform.
const SPAWN_HEIGHT: f32 = 50.0;
/// Distance from the bottom of the world to the ground platform.
const GROUND_OFFSET: f32 = 100.0;

/// Coarse tag for a platform. `Moving` wins over `Disappearing` when both apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlatformKind {
    Static,
    Moving,
    Disappearing,
    Finish,
}

/// Horizontal yoyo motion of a moving platform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Oscillation {
    pub amplitude: f32,
    /// +1.0 (starts moving right) or -1.0 (starts moving left).
    pub direction: f32,
    /// Duration of one leg in milliseconds.
    pub duration_ms: f32,
}

impl Oscillation {
    pub fn tween(&self) -> HorizontalTween {
        HorizontalTween {
            offset_x: self.amplitude * self.direction,
            duration_ms: self.duration_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    /// Section the platform belongs to; 0 for the ground and the finish.
    pub semester: u8,
    pub is_moving: bool,
    pub is_disappearing: bool,
    pub is_finish: bool,
    pub movement: Option<Oscillation>,
    /// Set once a landing has scheduled the platform's removal.
    pub consumed: bool,
}

impl Platform {
    pub fn kind(&self) -> PlatformKind {
        if self.is_finish {
            PlatformKind::Finish
        } else if self.is_moving {
            PlatformKind::Moving
        } else if self.is_disappearing {
            PlatformKind::Disappearing
        } else {
            PlatformKind::Static
        }
    }
}

/// Vertical extent of one semester section, for dividers and labels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SemesterBand {
    pub semester: u8,
    /// Bottom line of the section.
    pub start_y: f32,
    /// Top line of the section.
    pub end_y: f32,
}

/// Output of [`generate_level`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedLevel {
    pub level: u32,
    pub semester: u8,
    /// Ground first, then every section platform bottom to top.
    pub platforms: Vec<Platform>,
    pub power_ups: Vec<PowerUp>,
    pub finish: Platform,
    pub bands: Vec<SemesterBand>,
    pub spawn_x: f32,
    pub spawn_y: f32,
}

impl GeneratedLevel {
    /// Every platform including the finish.
    pub fn all_platforms(&self) -> impl Iterator<Item = &Platform> {
        self.platforms.iter().chain(std::iter::once(&self.finish))
    }
}

/// Finish height for a tower whose first section is `semester`.
pub fn finish_height(semester: u8, geometry: &GenerationConfig) -> f32 {
    let sections = f32::from(SEMESTER_COUNT + 1 - semester.clamp(1, SEMESTER_COUNT));
    geometry.world_height
        - geometry.first_section_offset
        - sections * geometry.semester_height
        - geometry.finish_clearance
}

/// Horizontal distance the player can cover between two consecutive platforms.
pub fn horizontal_reach(semester: u8, geometry: &GenerationConfig) -> f32 {
    geometry.reach_base + f32::from(semester) * geometry.reach_per_semester
}

/// Build the tower for `level_id`, starting at `semester`.
pub fn generate_level<R: Rng + ?Sized>(
    levels: &LevelTable,
    level_id: u32,
    semester: u8,
    geometry: &GenerationConfig,
    rng: &mut R,
) -> Result<GeneratedLevel, ConfigError> {
    if !(1..=SEMESTER_COUNT).contains(&semester) {
        return Err(ConfigError::SemesterOutOfRange(semester));
    }
    let config = levels.get(level_id)?;
    config.validate()?;
    geometry.validate()?;

    let mut builder = TowerBuilder {
        config,
        geometry,
        platforms: Vec::new(),
        prev_x: geometry.world_width / 2.0,
        step: 0,
    };

    let ground_y = geometry.world_height - GROUND_OFFSET;
    builder.push(geometry.world_width / 2.0, ground_y, 0, StepKind::Static, None);

    let mut bands = Vec::new();
    for (k, s) in (semester..=SEMESTER_COUNT).enumerate() {
        let start_y = geometry.world_height
            - geometry.first_section_offset
            - k as f32 * geometry.semester_height;
        let end_y = start_y - geometry.semester_height;
        // Later sections continue the walk from the last platform below them.
        let first_y = if k == 0 {
            start_y - geometry.section_padding
        } else {
            builder.last_y() - builder.gap(s, rng)
        };
        builder.section(s, first_y, end_y, rng);
        bands.push(SemesterBand {
            semester: s,
            start_y,
            end_y,
        });
    }

    let finish_y = finish_height(semester, geometry);
    builder.climb_to(SEMESTER_COUNT, finish_y, rng);
    let finish = Platform {
        id: builder.platforms.len() as u32,
        x: geometry.world_width / 2.0,
        y: finish_y,
        width: geometry.platform_width * 2.0,
        semester: 0,
        is_moving: false,
        is_disappearing: false,
        is_finish: true,
        movement: None,
        consumed: false,
    };

    let power_ups = place_power_ups(finish_y, geometry, rng);

    tracing::debug!(
        level = level_id,
        semester,
        platforms = builder.platforms.len(),
        power_ups = power_ups.len(),
        "Generated tower"
    );

    Ok(GeneratedLevel {
        level: level_id,
        semester,
        platforms: builder.platforms,
        power_ups,
        finish,
        bands,
        spawn_x: geometry.world_width / 2.0,
        spawn_y: ground_y - SPAWN_HEIGHT,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepKind {
    Static,
    Moving,
    Disappearing,
    MovingDisappearing,
}

impl StepKind {
    const ALL: [StepKind; 4] = [
        StepKind::Static,
        StepKind::Moving,
        StepKind::Disappearing,
        StepKind::MovingDisappearing,
    ];

    fn moves(self) -> bool {
        matches!(self, StepKind::Moving | StepKind::MovingDisappearing)
    }

    fn disappears(self) -> bool {
        matches!(self, StepKind::Disappearing | StepKind::MovingDisappearing)
    }
}

/// Weights over [`StepKind::ALL`] for the `index`-th step of a section.
fn step_weights(config: &LevelConfig, semester: u8, index: usize) -> [f32; 4] {
    match config.layout {
        LevelLayout::Static => [1.0, 0.0, 0.0, 0.0],
        LevelLayout::Moving => [0.0, 1.0, 0.0, 0.0],
        LevelLayout::Alternating => {
            if index % 2 == 0 {
                [1.0, 0.0, 0.0, 0.0]
            } else {
                [0.0, 1.0, 0.0, 0.0]
            }
        },
        LevelLayout::Disappearing => {
            let m = config.moving_chance_at(semester);
            [0.0, 0.0, 1.0 - m, m]
        },
        LevelLayout::Chaos => {
            let m = config.moving_chance_at(semester);
            let d = config.disappearing_chance_at(semester);
            // Half of the moving platforms also disappear.
            [(1.0 - m) * (1.0 - d), m * 0.5, (1.0 - m) * d, m * 0.5]
        },
    }
}

struct TowerBuilder<'a> {
    config: &'a LevelConfig,
    geometry: &'a GenerationConfig,
    platforms: Vec<Platform>,
    prev_x: f32,
    /// Step index within the current section.
    step: usize,
}

impl TowerBuilder<'_> {
    fn push(
        &mut self,
        x: f32,
        y: f32,
        semester: u8,
        kind: StepKind,
        movement: Option<Oscillation>,
    ) {
        self.platforms.push(Platform {
            id: self.platforms.len() as u32,
            x,
            y,
            width: self.geometry.platform_width,
            semester,
            is_moving: kind.moves(),
            is_disappearing: kind.disappears(),
            is_finish: false,
            movement,
            consumed: false,
        });
        self.prev_x = x;
    }

    fn last_y(&self) -> f32 {
        self.platforms
            .last()
            .map_or(self.geometry.world_height, |p| p.y)
    }

    fn gap<R: Rng + ?Sized>(&self, semester: u8, rng: &mut R) -> f32 {
        let (min_gap, max_gap) = self.config.gap_range(semester);
        rng.random_range(min_gap..=max_gap)
    }

    /// Place the next step of `semester` at height `y`.
    fn place<R: Rng + ?Sized>(&mut self, semester: u8, y: f32, rng: &mut R) {
        let kind = self.pick_kind(semester, self.step, rng);
        let x = self.walk_x(semester, kind.moves(), rng);
        let movement = kind.moves().then(|| Oscillation {
            amplitude: self.config.move_distance(semester),
            direction: if rng.random_bool(0.5) { 1.0 } else { -1.0 },
            duration_ms: self
                .config
                .move_duration_ms(semester, self.geometry.min_period_ms),
        });
        self.push(x, y, semester, kind, movement);
        self.step += 1;
    }

    fn section<R: Rng + ?Sized>(&mut self, semester: u8, first_y: f32, end_y: f32, rng: &mut R) {
        self.step = 0;
        let mut y = first_y;
        while y > end_y {
            self.place(semester, y, rng);
            y -= self.gap(semester, rng);
        }
    }

    /// Keep stepping until the finish is at most one gap above the last platform.
    fn climb_to<R: Rng + ?Sized>(&mut self, semester: u8, finish_y: f32, rng: &mut R) {
        let (min_gap, max_gap) = self.config.gap_range(semester);
        loop {
            let remaining = self.last_y() - finish_y;
            if remaining <= max_gap {
                return;
            }
            // Leave at least one minimum gap below the finish when the range allows.
            let hi = max_gap.min(remaining - min_gap).max(min_gap);
            let y = self.last_y() - rng.random_range(min_gap..=hi);
            self.place(semester, y, rng);
        }
    }

    fn pick_kind<R: Rng + ?Sized>(&self, semester: u8, index: usize, rng: &mut R) -> StepKind {
        let weights = step_weights(self.config, semester, index);
        match WeightedIndex::new(weights) {
            Ok(dist) => StepKind::ALL[dist.sample(rng)],
            Err(_) => StepKind::Static,
        }
    }

    /// Bounded random walk around the previous platform's x.
    fn walk_x<R: Rng + ?Sized>(&self, semester: u8, moving: bool, rng: &mut R) -> f32 {
        let g = self.geometry;
        let inset = if moving { g.moving_margin } else { 0.0 };
        let min_x = g.platform_width + inset;
        let max_x = g.world_width - g.platform_width - inset;
        let reach = horizontal_reach(semester, g);

        let lo = min_x.max(self.prev_x - reach);
        let hi = max_x.min(self.prev_x + reach);
        if lo > hi {
            return self.prev_x.clamp(min_x.min(max_x), max_x.max(min_x));
        }
        rng.random_range(lo..=hi)
    }
}

fn place_power_ups<R: Rng + ?Sized>(
    finish_y: f32,
    geometry: &GenerationConfig,
    rng: &mut R,
) -> Vec<PowerUp> {
    let mut power_ups = Vec::new();
    let mut y = geometry.world_height - geometry.power_up_start_offset;
    let min_x = geometry.power_up_margin;
    let max_x = (geometry.world_width - geometry.power_up_margin).max(min_x);

    while y > finish_y {
        let x = rng.random_range(min_x..=max_x);
        let kind = if rng.random_bool(0.5) {
            PowerUpKind::JumpBoost
        } else {
            PowerUpKind::SlowFall
        };
        power_ups.push(PowerUp {
            id: power_ups.len() as u32,
            x,
            y,
            kind,
        });
        y -= rng.random_range(geometry.power_up_spacing_min..=geometry.power_up_spacing_max);
    }
    power_ups
}
