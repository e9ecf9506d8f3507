//! Headless FEI Jump runner: the scene flow driven by the reference physics and
//! a scripted autopilot.

pub mod autopilot;

use rand::SeedableRng;
use rand::rngs::StdRng;

use feijump_core::scene::{ControlMethod, GameMode};
use feijump_core::storage::KeyValueStore;
use feijump_tower::physics::HeadlessWorld;
use feijump_tower::{Flow, FlowEvent, GameError, LevelTable, Scene, SessionEvent, TowerConfig};

use autopilot::Autopilot;

/// Runner settings, read from the environment.
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub save_dir: String,
    pub game_mode: GameMode,
    pub control_method: ControlMethod,
    pub seed: u64,
    pub frames: u32,
    pub frame_ms: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            save_dir: ".feijump".to_string(),
            game_mode: GameMode::default(),
            control_method: ControlMethod::default(),
            seed: 42,
            frames: 3600,
            frame_ms: 1000.0 / 60.0,
        }
    }
}

impl SimConfig {
    /// `FEIJUMP_SAVE_DIR`, `FEIJUMP_MODE`, `FEIJUMP_CONTROL`, `FEIJUMP_SEED` and
    /// `FEIJUMP_FRAMES` override the defaults. Without a seed a random one is drawn.
    pub fn from_env() -> Self {
        let mut config = Self {
            seed: rand::random(),
            ..Self::default()
        };
        if let Ok(dir) = std::env::var("FEIJUMP_SAVE_DIR") {
            config.save_dir = dir;
        }
        if let Some(mode) = parse_env("FEIJUMP_MODE") {
            config.game_mode = mode;
        }
        if let Some(method) = parse_env("FEIJUMP_CONTROL") {
            config.control_method = method;
        }
        if let Some(seed) = parse_env("FEIJUMP_SEED") {
            config.seed = seed;
        }
        if let Some(frames) = parse_env("FEIJUMP_FRAMES") {
            config.frames = frames;
        }
        config
    }
}

fn parse_env<T>(name: &str) -> Option<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Ignoring {name}={raw}: {e}");
            None
        },
    }
}

/// Tallies of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimReport {
    pub frames: u32,
    pub levels_started: u32,
    pub levels_completed: u32,
    pub deaths: u32,
    pub power_ups: u32,
    pub platforms_removed: u32,
    /// Highest camera scroll reached, in whole pixels above the start.
    pub best_climb: i64,
}

pub struct Simulation<S: KeyValueStore> {
    flow: Flow<S>,
    world: HeadlessWorld,
    pilot: Autopilot,
    config: SimConfig,
    report: SimReport,
}

impl<S: KeyValueStore> Simulation<S> {
    pub fn new(
        config: SimConfig,
        levels: LevelTable,
        tower: TowerConfig,
        store: S,
    ) -> Result<Self, GameError> {
        let world = HeadlessWorld::new(tower.generation.world_width);
        let rng = Box::new(StdRng::seed_from_u64(config.seed));
        let flow = Flow::new(levels, tower, store, rng, false);
        let mut sim = Self {
            flow,
            world,
            pilot: Autopilot::new(config.control_method),
            config,
            report: SimReport::default(),
        };
        sim.enter_play()?;
        Ok(sim)
    }

    /// Walk the menu and control selection into a running level.
    fn enter_play(&mut self) -> Result<(), GameError> {
        self.flow.choose_mode(self.config.game_mode)?;
        let mut events = self.flow.choose_control(self.config.control_method)?;
        if matches!(self.flow.scene(), Scene::AwaitingPermission) {
            events.extend(self.flow.permission_result(true)?);
        }
        self.tally(&events);
        self.world.apply(&self.flow.drain_commands());
        self.pilot.reset();
        Ok(())
    }

    /// Run one frame: physics, contacts, autopilot, session.
    pub fn step(&mut self) -> Result<Vec<FlowEvent>, GameError> {
        let dt_ms = self.config.frame_ms;
        let contacts = self.world.step(dt_ms);
        self.pilot.observe(&contacts, &self.world);
        for contact in contacts {
            self.flow.on_contact(contact);
        }

        let input = self.pilot.input(&self.world, dt_ms);
        let events = self.flow.update(&input);
        self.world.apply(&self.flow.drain_commands());
        self.tally(&events);
        self.report.frames += 1;
        self.report.best_climb = self.report.best_climb.max((-self.world.camera_y()) as i64);

        if events.contains(&FlowEvent::ReturnedToMenu) {
            self.enter_play()?;
        }
        Ok(events)
    }

    /// Run the configured number of frames.
    pub fn run(&mut self) -> Result<&SimReport, GameError> {
        for _ in 0..self.config.frames {
            self.step()?;
        }
        Ok(&self.report)
    }

    fn tally(&mut self, events: &[FlowEvent]) {
        for event in events {
            match event {
                FlowEvent::LevelStarted { level, semester } => {
                    tracing::info!(level, semester, "Level started");
                    self.report.levels_started += 1;
                    self.pilot.reset();
                },
                FlowEvent::Session(SessionEvent::LevelComplete { .. }) => {
                    self.report.levels_completed += 1;
                },
                FlowEvent::Session(SessionEvent::Died { .. }) => {
                    self.report.deaths += 1;
                },
                FlowEvent::Session(SessionEvent::Restarted { .. }) => self.pilot.reset(),
                FlowEvent::Session(SessionEvent::PowerUpCollected(kind)) => {
                    tracing::debug!(?kind, "Power-up collected");
                    self.report.power_ups += 1;
                },
                FlowEvent::Session(SessionEvent::PlatformRemoved { .. }) => {
                    self.report.platforms_removed += 1;
                },
                _ => {},
            }
        }
    }

    pub fn report(&self) -> &SimReport {
        &self.report
    }

    pub fn flow(&self) -> &Flow<S> {
        &self.flow
    }

    pub fn world(&self) -> &HeadlessWorld {
        &self.world
    }
}
