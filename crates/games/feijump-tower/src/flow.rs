//! Scene machine around the session: menu, control selection, the orientation
//! permission prompt and play.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use feijump_core::host::{Contact, FrameInput, HostCommand};
use feijump_core::scene::{ControlMethod, GameMode, SceneParams};
use feijump_core::storage::KeyValueStore;

use crate::config::{LevelTable, SEMESTER_COUNT, TowerConfig};
use crate::error::{ConfigError, GameError};
use crate::progression::ProgressionTracker;
use crate::session::{GameSession, SessionEvent, SessionSetup, SessionState};

/// Message shown on the control selection screen after a refused prompt.
pub const PERMISSION_DENIED_MESSAGE: &str = "Gyroscope permission denied";

#[derive(Debug)]
pub enum Scene {
    Menu,
    /// Level and mode chosen, waiting for a control method.
    ControlSelect,
    /// Waiting for the host's answer to the orientation permission prompt.
    AwaitingPermission,
    Playing(Box<GameSession>),
}

/// Scene-level notifications for the host.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowEvent {
    Session(SessionEvent),
    LevelStarted { level: u32, semester: u8 },
    PermissionDenied,
    ReturnedToMenu,
}

#[derive(Debug, Clone, Copy)]
struct PendingStart {
    level: u32,
    game_mode: GameMode,
}

pub struct Flow<S: KeyValueStore> {
    levels: LevelTable,
    config: TowerConfig,
    progression: ProgressionTracker<S>,
    rng: Box<dyn RngCore>,
    scene: Scene,
    mobile: bool,
    semester: u8,
    pending: Option<PendingStart>,
    message: Option<String>,
    outbox: Vec<HostCommand>,
}

impl<S: KeyValueStore> std::fmt::Debug for Flow<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flow")
            .field("scene", &self.scene)
            .field("mobile", &self.mobile)
            .field("semester", &self.semester)
            .finish_non_exhaustive()
    }
}

impl<S: KeyValueStore> Flow<S> {
    /// Build the flow and enter the menu. `mobile` hosts skip control selection
    /// and always play with the gyroscope.
    pub fn new(
        levels: LevelTable,
        config: TowerConfig,
        store: S,
        rng: Box<dyn RngCore>,
        mobile: bool,
    ) -> Self {
        let progression = ProgressionTracker::new(store, levels.ids());
        let mut flow = Self {
            levels,
            config,
            progression,
            rng,
            scene: Scene::Menu,
            mobile,
            semester: 1,
            pending: None,
            message: None,
            outbox: Vec::new(),
        };
        flow.enter_menu();
        flow
    }

    /// Starting semester for every level started from now on.
    pub fn set_semester(&mut self, semester: u8) -> Result<(), GameError> {
        if !(1..=SEMESTER_COUNT).contains(&semester) {
            return Err(ConfigError::SemesterOutOfRange(semester).into());
        }
        self.semester = semester;
        Ok(())
    }

    fn enter_menu(&mut self) {
        self.progression.load();
        self.progression.save();
        self.pending = None;
        self.scene = Scene::Menu;
    }

    /// Menu: pick the next level for `mode`.
    pub fn choose_mode(&mut self, game_mode: GameMode) -> Result<(), GameError> {
        if !matches!(self.scene, Scene::Menu) {
            return Ok(());
        }
        let Some(level) = self.progression.pick_next(&mut *self.rng) else {
            return Err(GameError::InvariantViolation("level table is empty".to_string()));
        };
        self.progression.save();
        self.pending = Some(PendingStart { level, game_mode });
        self.message = None;
        self.scene = if self.mobile {
            Scene::AwaitingPermission
        } else {
            Scene::ControlSelect
        };
        tracing::debug!(level, mode = ?game_mode, "Level picked");
        Ok(())
    }

    /// Control selection: mouse and keyboard start at once, the gyroscope asks
    /// for permission first.
    pub fn choose_control(&mut self, method: ControlMethod) -> Result<Vec<FlowEvent>, GameError> {
        if !matches!(self.scene, Scene::ControlSelect) {
            return Ok(Vec::new());
        }
        if method.requires_permission() {
            self.scene = Scene::AwaitingPermission;
            return Ok(Vec::new());
        }
        self.launch(method, false)
    }

    /// Host's answer to the orientation permission prompt.
    pub fn permission_result(&mut self, granted: bool) -> Result<Vec<FlowEvent>, GameError> {
        if !matches!(self.scene, Scene::AwaitingPermission) {
            return Ok(Vec::new());
        }
        if granted {
            return self.launch(ControlMethod::Gyroscope, true);
        }
        tracing::warn!("Orientation permission denied");
        self.message = Some(PERMISSION_DENIED_MESSAGE.to_string());
        self.scene = Scene::ControlSelect;
        Ok(vec![FlowEvent::PermissionDenied])
    }

    fn launch(&mut self, method: ControlMethod, granted: bool) -> Result<Vec<FlowEvent>, GameError> {
        let Some(pending) = self.pending else {
            return Ok(Vec::new());
        };
        let setup = SessionSetup {
            level: pending.level,
            semester: self.semester,
            control_method: method,
            game_mode: pending.game_mode,
            orientation_granted: granted,
        };
        self.start_session(setup)
    }

    fn start_session(&mut self, setup: SessionSetup) -> Result<Vec<FlowEvent>, GameError> {
        let rng = Box::new(StdRng::seed_from_u64(self.rng.next_u64()));
        let mut session = match GameSession::start(setup, &self.levels, &self.config, rng) {
            Ok(session) => session,
            Err(GameError::PermissionDenied) => {
                self.message = Some(PERMISSION_DENIED_MESSAGE.to_string());
                self.scene = Scene::ControlSelect;
                return Ok(vec![FlowEvent::PermissionDenied]);
            },
            Err(e) => return Err(e),
        };
        self.outbox.extend(session.drain_commands());
        let event = FlowEvent::LevelStarted {
            level: session.setup().level,
            semester: session.setup().semester,
        };
        self.message = None;
        self.scene = Scene::Playing(Box::new(session));
        Ok(vec![event])
    }

    /// Forward a physics contact to the running session.
    pub fn on_contact(&mut self, contact: Contact) {
        if let Scene::Playing(session) = &mut self.scene {
            session.on_contact(contact);
        }
    }

    /// Run one frame of the current scene.
    pub fn update(&mut self, input: &FrameInput) -> Vec<FlowEvent> {
        let Scene::Playing(session) = &mut self.scene else {
            return Vec::new();
        };
        let session_events = session.update(input, &mut self.progression);
        self.outbox.extend(session.drain_commands());

        let mut events = Vec::new();
        for event in session_events {
            let next = match event {
                SessionEvent::LevelComplete { pool_reset, .. } => Some(pool_reset),
                _ => None,
            };
            events.push(FlowEvent::Session(event));
            if let Some(pool_reset) = next {
                events.extend(self.after_completion(pool_reset));
                break;
            }
        }
        events
    }

    fn after_completion(&mut self, pool_reset: bool) -> Vec<FlowEvent> {
        let Scene::Playing(session) = &mut self.scene else {
            return Vec::new();
        };
        let mut setup = session.setup().clone();
        self.outbox.extend(session.shutdown());

        if pool_reset {
            self.enter_menu();
            return vec![FlowEvent::ReturnedToMenu];
        }
        let Some(level) = self.progression.pick_next(&mut *self.rng) else {
            self.enter_menu();
            return vec![FlowEvent::ReturnedToMenu];
        };
        setup.level = level;
        match self.start_session(setup) {
            Ok(events) => events,
            Err(e) => {
                tracing::error!("Failed to start level {level}: {e}");
                self.enter_menu();
                vec![FlowEvent::ReturnedToMenu]
            },
        }
    }

    pub fn toggle_pause(&mut self) -> Option<FlowEvent> {
        match &mut self.scene {
            Scene::Playing(session) => {
                let event = session.toggle_pause();
                self.outbox.extend(session.drain_commands());
                event.map(FlowEvent::Session)
            },
            _ => None,
        }
    }

    /// Quit from the pause menu back to the main menu.
    pub fn quit(&mut self) -> Vec<FlowEvent> {
        let Scene::Playing(session) = &mut self.scene else {
            return Vec::new();
        };
        let Some(event) = session.quit(&mut self.progression) else {
            return Vec::new();
        };
        self.outbox.extend(session.shutdown());
        self.enter_menu();
        vec![FlowEvent::Session(event), FlowEvent::ReturnedToMenu]
    }

    pub fn drain_commands(&mut self) -> Vec<HostCommand> {
        std::mem::take(&mut self.outbox)
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn session(&self) -> Option<&GameSession> {
        match &self.scene {
            Scene::Playing(session) => Some(&**session),
            _ => None,
        }
    }

    pub fn session_state(&self) -> Option<SessionState> {
        self.session().map(GameSession::state)
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn progression(&self) -> &ProgressionTracker<S> {
        &self.progression
    }

    pub fn is_mobile(&self) -> bool {
        self.mobile
    }

    /// Transition bag for whatever scene is current.
    pub fn scene_params(&self) -> Option<SceneParams> {
        if let Some(session) = self.session() {
            return Some(session.scene_params(&self.progression));
        }
        let pending = self.pending?;
        Some(SceneParams {
            level: pending.level,
            semester: self.semester,
            control_method: if self.mobile {
                ControlMethod::Gyroscope
            } else {
                ControlMethod::default()
            },
            game_mode: pending.game_mode,
            levels: self.progression.remaining().to_vec(),
            played_levels: self.progression.played().to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use feijump_core::storage::MemoryStore;

    use super::*;
    use crate::progression::PROGRESS_KEY;

    fn flow(mobile: bool) -> Flow<MemoryStore> {
        Flow::new(
            LevelTable::default(),
            TowerConfig::default(),
            MemoryStore::new(),
            Box::new(StdRng::seed_from_u64(7)),
            mobile,
        )
    }

    fn playing_level(flow: &Flow<MemoryStore>) -> u32 {
        flow.session().map(|s| s.setup().level).unwrap()
    }

    fn finish(flow: &mut Flow<MemoryStore>) -> Vec<FlowEvent> {
        let session = flow.session().unwrap();
        let finish = session.finish_entity().unwrap();
        let input = FrameInput {
            dt_ms: 16.0,
            player_x: session.level().spawn_x,
            player_y: session.level().spawn_y,
            ..Default::default()
        };
        flow.on_contact(Contact::Landing(finish));
        flow.update(&input)
    }

    #[test]
    fn menu_saves_progress_on_entry() {
        let f = flow(false);
        assert!(matches!(f.scene(), Scene::Menu));
        assert!(f.progression().store().get_item(PROGRESS_KEY).unwrap().is_some());
    }

    #[test]
    fn desktop_goes_through_control_selection() {
        let mut f = flow(false);
        f.choose_mode(GameMode::Hard).unwrap();
        assert!(matches!(f.scene(), Scene::ControlSelect));

        let events = f.choose_control(ControlMethod::Keyboard).unwrap();
        assert!(matches!(events[0], FlowEvent::LevelStarted { semester: 1, .. }));
        let session = f.session().unwrap();
        assert_eq!(session.setup().control_method, ControlMethod::Keyboard);
        assert_eq!(session.setup().game_mode, GameMode::Hard);
        assert!(!f.drain_commands().is_empty());
    }

    #[test]
    fn mobile_asks_permission_directly() {
        let mut f = flow(true);
        f.choose_mode(GameMode::Easy).unwrap();
        assert!(matches!(f.scene(), Scene::AwaitingPermission));
        f.permission_result(true).unwrap();
        let session = f.session().unwrap();
        assert_eq!(session.setup().control_method, ControlMethod::Gyroscope);
        assert!(f.drain_commands().contains(&HostCommand::SubscribeOrientation));
    }

    #[test]
    fn denied_permission_returns_to_control_selection() {
        let mut f = flow(false);
        f.choose_mode(GameMode::Hard).unwrap();
        f.choose_control(ControlMethod::Gyroscope).unwrap();
        assert!(matches!(f.scene(), Scene::AwaitingPermission));

        let events = f.permission_result(false).unwrap();
        assert_eq!(events, vec![FlowEvent::PermissionDenied]);
        assert!(matches!(f.scene(), Scene::ControlSelect));
        assert_eq!(f.message(), Some(PERMISSION_DENIED_MESSAGE));
        assert!(f.session().is_none());

        f.choose_control(ControlMethod::Mouse).unwrap();
        assert!(f.session().is_some());
        assert_eq!(f.message(), None);
    }

    #[test]
    fn completion_starts_another_unplayed_level() {
        let mut f = flow(false);
        f.set_semester(3).unwrap();
        f.choose_mode(GameMode::Easy).unwrap();
        f.choose_control(ControlMethod::Mouse).unwrap();
        let first = playing_level(&f);

        let events = finish(&mut f);
        assert!(events.contains(&FlowEvent::Session(SessionEvent::LevelComplete {
            level: first,
            pool_reset: false
        })));
        let next = playing_level(&f);
        assert_ne!(next, first);
        assert_eq!(f.progression().played(), &[first]);
        let setup = f.session().unwrap().setup();
        assert_eq!(setup.semester, 3);
        assert_eq!(setup.control_method, ControlMethod::Mouse);
        assert_eq!(setup.game_mode, GameMode::Easy);
    }

    #[test]
    fn finishing_every_level_returns_to_menu() {
        let mut f = flow(false);
        f.choose_mode(GameMode::Hard).unwrap();
        f.choose_control(ControlMethod::Keyboard).unwrap();
        for _ in 0..4 {
            finish(&mut f);
            assert!(f.session().is_some());
        }
        let events = finish(&mut f);
        assert_eq!(events.last(), Some(&FlowEvent::ReturnedToMenu));
        assert!(matches!(f.scene(), Scene::Menu));
        assert_eq!(f.progression().remaining().len(), 5);
        assert!(f.progression().played().is_empty());
    }

    #[test]
    fn quit_marks_played_and_returns_to_menu() {
        let mut f = flow(false);
        f.choose_mode(GameMode::Hard).unwrap();
        f.choose_control(ControlMethod::Keyboard).unwrap();
        let level = playing_level(&f);

        assert!(f.quit().is_empty(), "quit needs the pause menu");
        f.toggle_pause();
        let events = f.quit();
        assert_eq!(events.last(), Some(&FlowEvent::ReturnedToMenu));
        assert!(matches!(f.scene(), Scene::Menu));
        assert_eq!(f.progression().played(), &[level]);
    }

    #[test]
    fn semester_must_be_in_range() {
        let mut f = flow(false);
        assert!(f.set_semester(0).is_err());
        assert!(f.set_semester(6).is_err());
        assert!(f.set_semester(5).is_ok());
    }

    #[test]
    fn params_follow_pending_choice() {
        let mut f = flow(true);
        assert_eq!(f.scene_params(), None);
        f.choose_mode(GameMode::Easy).unwrap();
        let params = f.scene_params().unwrap();
        assert_eq!(params.control_method, ControlMethod::Gyroscope);
        assert_eq!(params.game_mode, GameMode::Easy);
        assert_eq!(params.levels.len(), 5);
    }
}
