use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Number of semester sections stacked in a full tower.
pub const SEMESTER_COUNT: u8 = 5;

/// Platform arrangement strategy for a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelLayout {
    /// Static platforms only; gaps and reach grow with the semester.
    Static,
    /// Every platform oscillates.
    Moving,
    /// Static and moving platforms take turns, starting static.
    Alternating,
    /// Every platform vanishes after a landing; later semesters may also move them.
    Disappearing,
    /// Weighted mix of all platform kinds.
    Chaos,
}

/// Static tuning data for one level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelConfig {
    pub id: u32,
    pub name: String,
    pub background_color: String,
    pub layout: LevelLayout,
    /// Oscillation amplitude at semester 0.
    pub base_move_distance: f32,
    /// Amplitude added per semester.
    pub distance_increase: f32,
    /// Oscillation leg duration (ms) at semester 0.
    pub base_speed: f32,
    /// Leg duration removed per semester (ms).
    pub speed_increase: f32,
    pub min_gap: f32,
    pub max_gap: f32,
    #[serde(default)]
    pub min_gap_increase: f32,
    #[serde(default)]
    pub max_gap_increase: f32,
    pub moving_chance: f32,
    pub disappearing_chance: f32,
    /// Growth of both chances per semester.
    #[serde(default)]
    pub chance_increase: f32,
    /// First semester in which platforms may move.
    #[serde(default = "default_moving_from_semester")]
    pub moving_from_semester: u8,
}

fn default_moving_from_semester() -> u8 {
    1
}

impl LevelConfig {
    /// Vertical step range `[min, max]` for a semester.
    pub fn gap_range(&self, semester: u8) -> (f32, f32) {
        let s = f32::from(semester);
        (
            self.min_gap + s * self.min_gap_increase,
            self.max_gap + s * self.max_gap_increase,
        )
    }

    /// Oscillation amplitude for a semester.
    pub fn move_distance(&self, semester: u8) -> f32 {
        self.base_move_distance + f32::from(semester) * self.distance_increase
    }

    /// Oscillation leg duration for a semester, never below `min_period_ms`.
    pub fn move_duration_ms(&self, semester: u8, min_period_ms: f32) -> f32 {
        (self.base_speed - f32::from(semester) * self.speed_increase).max(min_period_ms)
    }

    /// Probability that a platform in this semester moves.
    pub fn moving_chance_at(&self, semester: u8) -> f32 {
        if semester < self.moving_from_semester {
            return 0.0;
        }
        let steps = f32::from(semester - self.moving_from_semester);
        (self.moving_chance + steps * self.chance_increase).clamp(0.0, 1.0)
    }

    /// Probability that a platform in this semester disappears.
    pub fn disappearing_chance_at(&self, semester: u8) -> f32 {
        let steps = f32::from(semester.saturating_sub(1));
        (self.disappearing_chance + steps * self.chance_increase).clamp(0.0, 1.0)
    }

    /// Reject tuning that would make generation ill-defined.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::Invalid {
            level: self.id,
            reason: reason.to_string(),
        };
        let numbers = [
            self.base_move_distance,
            self.distance_increase,
            self.base_speed,
            self.speed_increase,
            self.min_gap,
            self.max_gap,
            self.min_gap_increase,
            self.max_gap_increase,
            self.moving_chance,
            self.disappearing_chance,
            self.chance_increase,
        ];
        if numbers.iter().any(|n| !n.is_finite()) {
            return Err(invalid("non-finite value"));
        }
        for semester in 1..=SEMESTER_COUNT {
            let (lo, hi) = self.gap_range(semester);
            if lo <= 0.0 {
                return Err(invalid("gaps must stay positive in every semester"));
            }
            if lo > hi {
                return Err(invalid("min_gap exceeds max_gap"));
            }
        }
        if !(0.0..=1.0).contains(&self.moving_chance)
            || !(0.0..=1.0).contains(&self.disappearing_chance)
        {
            return Err(invalid("chances must lie in 0..=1"));
        }
        if self.base_speed <= 0.0 {
            return Err(invalid("base_speed must be positive"));
        }
        Ok(())
    }
}

/// Keyed table of every playable level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelTable {
    pub levels: Vec<LevelConfig>,
}

impl Default for LevelTable {
    fn default() -> Self {
        Self {
            levels: vec![
                LevelConfig {
                    id: 1,
                    name: "Stairway".to_string(),
                    background_color: "#003366".to_string(),
                    layout: LevelLayout::Static,
                    base_move_distance: 0.0,
                    distance_increase: 0.0,
                    base_speed: 3000.0,
                    speed_increase: 0.0,
                    min_gap: 100.0,
                    max_gap: 160.0,
                    min_gap_increase: 10.0,
                    max_gap_increase: 15.0,
                    moving_chance: 0.0,
                    disappearing_chance: 0.0,
                    chance_increase: 0.0,
                    moving_from_semester: 1,
                },
                LevelConfig {
                    id: 2,
                    name: "Conveyor".to_string(),
                    background_color: "#1b4d3e".to_string(),
                    layout: LevelLayout::Moving,
                    base_move_distance: 100.0,
                    distance_increase: 15.0,
                    base_speed: 3000.0,
                    speed_increase: 250.0,
                    min_gap: 110.0,
                    max_gap: 150.0,
                    min_gap_increase: 0.0,
                    max_gap_increase: 0.0,
                    moving_chance: 1.0,
                    disappearing_chance: 0.0,
                    chance_increase: 0.0,
                    moving_from_semester: 1,
                },
                LevelConfig {
                    id: 3,
                    name: "Shuffle".to_string(),
                    background_color: "#4b2e83".to_string(),
                    layout: LevelLayout::Alternating,
                    base_move_distance: 120.0,
                    distance_increase: 20.0,
                    base_speed: 2800.0,
                    speed_increase: 250.0,
                    min_gap: 110.0,
                    max_gap: 160.0,
                    min_gap_increase: 0.0,
                    max_gap_increase: 0.0,
                    moving_chance: 0.5,
                    disappearing_chance: 0.0,
                    chance_increase: 0.0,
                    moving_from_semester: 1,
                },
                LevelConfig {
                    id: 4,
                    name: "Vanishing".to_string(),
                    background_color: "#5c2018".to_string(),
                    layout: LevelLayout::Disappearing,
                    base_move_distance: 100.0,
                    distance_increase: 20.0,
                    base_speed: 3000.0,
                    speed_increase: 300.0,
                    min_gap: 110.0,
                    max_gap: 150.0,
                    min_gap_increase: 5.0,
                    max_gap_increase: 10.0,
                    moving_chance: 0.25,
                    disappearing_chance: 1.0,
                    chance_increase: 0.25,
                    moving_from_semester: 3,
                },
                LevelConfig {
                    id: 5,
                    name: "Finals".to_string(),
                    background_color: "#2d2d2d".to_string(),
                    layout: LevelLayout::Chaos,
                    base_move_distance: 120.0,
                    distance_increase: 20.0,
                    base_speed: 2600.0,
                    speed_increase: 250.0,
                    min_gap: 120.0,
                    max_gap: 170.0,
                    min_gap_increase: 0.0,
                    max_gap_increase: 0.0,
                    moving_chance: 0.4,
                    disappearing_chance: 0.3,
                    chance_increase: 0.05,
                    moving_from_semester: 1,
                },
            ],
        }
    }
}

impl LevelTable {
    /// Parse and validate a TOML table (`[[levels]]` entries).
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let table: Self =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        table.validate()?;
        Ok(table)
    }

    /// Load from `FEIJUMP_LEVELS_CONFIG` or `config/levels.toml`. A missing file
    /// means the built-in table; a file that fails to parse or validate is an error.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("FEIJUMP_LEVELS_CONFIG")
            .unwrap_or_else(|_| "config/levels.toml".to_string());
        Self::load_from(Path::new(&path))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let table = Self::from_toml_str(&content)?;
                tracing::info!(
                    path = %path.display(),
                    levels = table.levels.len(),
                    "Loaded level table"
                );
                Ok(table)
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ConfigError::Parse(format!("{}: {e}", path.display()))),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = std::collections::HashSet::new();
        for level in &self.levels {
            if !seen.insert(level.id) {
                return Err(ConfigError::Invalid {
                    level: level.id,
                    reason: "duplicate level id".to_string(),
                });
            }
            level.validate()?;
        }
        Ok(())
    }

    pub fn get(&self, id: u32) -> Result<&LevelConfig, ConfigError> {
        self.levels
            .iter()
            .find(|l| l.id == id)
            .ok_or(ConfigError::UnknownLevel(id))
    }

    /// Every level id, in table order. This is the full progression pool.
    pub fn ids(&self) -> Vec<u32> {
        self.levels.iter().map(|l| l.id).collect()
    }
}

/// Player physics tuning handed to the host and used by the landing rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TowerPhysicsConfig {
    pub normal_jump_velocity: f32,
    pub boosted_jump_velocity: f32,
    pub gravity: f32,
    pub slow_fall_gravity: f32,
    pub max_horizontal_velocity: f32,
    /// Velocity per pixel of pointer offset.
    pub mouse_gain: f32,
    /// Velocity per degree of tilt.
    pub tilt_gain: f32,
}

impl Default for TowerPhysicsConfig {
    fn default() -> Self {
        Self {
            normal_jump_velocity: 600.0,
            boosted_jump_velocity: 850.0,
            gravity: 600.0,
            slow_fall_gravity: 250.0,
            max_horizontal_velocity: 300.0,
            mouse_gain: 2.0,
            tilt_gain: 10.0,
        }
    }
}

/// Tower geometry shared by every level.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub world_width: f32,
    pub world_height: f32,
    pub platform_width: f32,
    pub platform_height: f32,
    /// Height of one semester section.
    pub semester_height: f32,
    /// Distance from the bottom of the world to the first section's start line.
    pub first_section_offset: f32,
    /// Gap between a section's start line and its first platform.
    pub section_padding: f32,
    /// Height of the finish platform above the last section's end line.
    pub finish_clearance: f32,
    /// Horizontal reach at semester 0.
    pub reach_base: f32,
    pub reach_per_semester: f32,
    /// Extra inset from the walls for moving platform anchors.
    pub moving_margin: f32,
    pub min_period_ms: f32,
    /// Distance from the bottom of the world to the first power-up.
    pub power_up_start_offset: f32,
    pub power_up_spacing_min: f32,
    pub power_up_spacing_max: f32,
    pub power_up_margin: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            world_width: 800.0,
            world_height: 600.0,
            platform_width: 100.0,
            platform_height: 20.0,
            semester_height: 1600.0,
            first_section_offset: 250.0,
            section_padding: 100.0,
            finish_clearance: 150.0,
            reach_base: 200.0,
            reach_per_semester: 40.0,
            moving_margin: 100.0,
            min_period_ms: 400.0,
            power_up_start_offset: 400.0,
            power_up_spacing_min: 1000.0,
            power_up_spacing_max: 1500.0,
            power_up_margin: 50.0,
        }
    }
}

impl GenerationConfig {
    /// Reject geometry the generator cannot lay out.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let numbers = [
            self.world_width,
            self.world_height,
            self.platform_width,
            self.platform_height,
            self.semester_height,
            self.first_section_offset,
            self.section_padding,
            self.finish_clearance,
            self.reach_base,
            self.reach_per_semester,
            self.moving_margin,
            self.min_period_ms,
            self.power_up_start_offset,
            self.power_up_spacing_min,
            self.power_up_spacing_max,
            self.power_up_margin,
        ];
        if numbers.iter().any(|n| !n.is_finite()) {
            return Err(ConfigError::Geometry("non-finite value".to_string()));
        }
        let positive = [
            ("world_width", self.world_width),
            ("platform_width", self.platform_width),
            ("semester_height", self.semester_height),
            ("finish_clearance", self.finish_clearance),
            ("min_period_ms", self.min_period_ms),
            ("power_up_spacing_min", self.power_up_spacing_min),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v <= 0.0) {
            return Err(ConfigError::Geometry(format!("{name} must be positive")));
        }
        if self.power_up_spacing_min > self.power_up_spacing_max {
            return Err(ConfigError::Geometry(
                "power_up_spacing_min exceeds power_up_spacing_max".to_string(),
            ));
        }
        Ok(())
    }
}

/// Top-level tower configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TowerConfig {
    pub physics: TowerPhysicsConfig,
    pub generation: GenerationConfig,
    /// Delay between landing on a disappearing platform and its removal.
    pub fade_delay_ms: f32,
}

impl Default for TowerConfig {
    fn default() -> Self {
        Self {
            physics: TowerPhysicsConfig::default(),
            generation: GenerationConfig::default(),
            fade_delay_ms: 300.0,
        }
    }
}

impl TowerConfig {
    /// Load from `FEIJUMP_TOWER_CONFIG` or `config/tower.toml`, falling back to defaults.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("FEIJUMP_TOWER_CONFIG")
            && let Ok(contents) = std::fs::read_to_string(&path)
        {
            match toml::from_str::<Self>(&contents) {
                Ok(config) => return config,
                Err(e) => tracing::warn!("Failed to parse {path}: {e}, using defaults"),
            }
        }
        if let Ok(contents) = std::fs::read_to_string("config/tower.toml")
            && let Ok(config) = toml::from_str::<Self>(&contents)
        {
            return config;
        }
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_is_valid() {
        let table = LevelTable::default();
        assert!(table.validate().is_ok());
        assert_eq!(table.ids(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn unknown_level_is_error() {
        let table = LevelTable::default();
        assert_eq!(table.get(9).unwrap_err(), ConfigError::UnknownLevel(9));
    }

    #[test]
    fn static_gaps_widen_with_semester() {
        let table = LevelTable::default();
        let level = table.get(1).unwrap();
        assert_eq!(level.gap_range(1), (110.0, 175.0));
        assert_eq!(level.gap_range(5), (150.0, 235.0));
    }

    #[test]
    fn move_duration_clamps_to_minimum() {
        let mut level = LevelTable::default().get(2).unwrap().clone();
        level.speed_increase = 1000.0;
        assert_eq!(level.move_duration_ms(5, 400.0), 400.0);
        assert_eq!(level.move_duration_ms(1, 400.0), 2000.0);
    }

    #[test]
    fn vanishing_level_moves_only_from_semester_three() {
        let table = LevelTable::default();
        let level = table.get(4).unwrap();
        assert_eq!(level.moving_chance_at(2), 0.0);
        assert_eq!(level.moving_chance_at(3), 0.25);
        assert_eq!(level.moving_chance_at(5), 0.75);
        assert_eq!(level.disappearing_chance_at(1), 1.0);
    }

    #[test]
    fn chances_increase_monotonically() {
        let table = LevelTable::default();
        let level = table.get(5).unwrap();
        for s in 1..SEMESTER_COUNT {
            assert!(level.moving_chance_at(s + 1) >= level.moving_chance_at(s));
            assert!(level.disappearing_chance_at(s + 1) >= level.disappearing_chance_at(s));
        }
    }

    #[test]
    fn inverted_gap_range_rejected() {
        let mut level = LevelTable::default().get(1).unwrap().clone();
        level.min_gap = 300.0;
        assert!(matches!(
            level.validate(),
            Err(ConfigError::Invalid { level: 1, .. })
        ));
    }

    #[test]
    fn gaps_shrinking_to_zero_rejected() {
        let mut level = LevelTable::default().get(1).unwrap().clone();
        level.min_gap = 10.0;
        level.max_gap = 10.0;
        level.min_gap_increase = -3.0;
        level.max_gap_increase = -3.0;
        assert!(matches!(
            level.validate(),
            Err(ConfigError::Invalid { level: 1, .. })
        ));
    }

    #[test]
    fn default_geometry_is_valid() {
        assert!(GenerationConfig::default().validate().is_ok());
    }

    #[test]
    fn bad_geometry_rejected() {
        let cases = [
            GenerationConfig {
                power_up_spacing_min: 1500.0,
                power_up_spacing_max: 1000.0,
                ..GenerationConfig::default()
            },
            GenerationConfig {
                power_up_spacing_min: 0.0,
                ..GenerationConfig::default()
            },
            GenerationConfig {
                semester_height: 0.0,
                ..GenerationConfig::default()
            },
            GenerationConfig {
                min_period_ms: -1.0,
                ..GenerationConfig::default()
            },
            GenerationConfig {
                world_width: f32::NAN,
                ..GenerationConfig::default()
            },
        ];
        for geometry in cases {
            assert!(matches!(geometry.validate(), Err(ConfigError::Geometry(_))));
        }
    }

    fn scratch_file(name: &str, content: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("feijump-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn invalid_level_file_is_an_error() {
        let path = scratch_file("broken-levels.toml", "levels = 3");
        let result = LevelTable::load_from(&path);
        let _ = std::fs::remove_file(&path);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn level_file_failing_validation_is_an_error() {
        let content = r##"
            [[levels]]
            id = 1
            name = "Broken"
            background_color = "#000000"
            layout = "static"
            base_move_distance = 0.0
            distance_increase = 0.0
            base_speed = 3000.0
            speed_increase = 0.0
            min_gap = 200.0
            max_gap = 100.0
            moving_chance = 0.0
            disappearing_chance = 0.0
        "##;
        let path = scratch_file("inverted-levels.toml", content);
        let result = LevelTable::load_from(&path);
        let _ = std::fs::remove_file(&path);
        assert!(matches!(result, Err(ConfigError::Invalid { level: 1, .. })));
    }

    #[test]
    fn missing_level_file_uses_built_in_table() {
        let path = std::env::temp_dir().join("feijump-no-such-dir/levels.toml");
        assert_eq!(LevelTable::load_from(&path).unwrap(), LevelTable::default());
    }

    #[test]
    fn duplicate_ids_rejected() {
        let mut table = LevelTable::default();
        let dup = table.levels[0].clone();
        table.levels.push(dup);
        assert!(table.validate().is_err());
    }

    #[test]
    fn toml_table_parses() {
        let content = r##"
            [[levels]]
            id = 7
            name = "Custom"
            background_color = "#000000"
            layout = "chaos"
            base_move_distance = 90.0
            distance_increase = 10.0
            base_speed = 2000.0
            speed_increase = 100.0
            min_gap = 100.0
            max_gap = 140.0
            moving_chance = 0.5
            disappearing_chance = 0.5
        "##;
        let table = LevelTable::from_toml_str(content).unwrap();
        let level = table.get(7).unwrap();
        assert_eq!(level.layout, LevelLayout::Chaos);
        assert_eq!(level.moving_from_semester, 1);
        assert_eq!(level.min_gap_increase, 0.0);
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = LevelTable::from_toml_str("levels = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn partial_tower_toml_keeps_defaults() {
        let config: TowerConfig = toml::from_str("fade_delay_ms = 500.0").unwrap();
        assert_eq!(config.fade_delay_ms, 500.0);
        assert_eq!(config.physics.normal_jump_velocity, 600.0);
        assert_eq!(config.generation.world_width, 800.0);
    }
}
