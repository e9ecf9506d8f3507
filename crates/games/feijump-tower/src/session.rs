//! One play attempt of a tower: the `Playing`/`Paused`/`Dead`/`LevelComplete`
//! state machine.
//!
//! The session never talks to the engine directly. It queues [`HostCommand`]s
//! that the host drains after every call, and it learns about collisions
//! through [`GameSession::on_contact`], which only records the contact; the
//! next [`GameSession::update`] resolves it after the fall check, the camera
//! and the control sample.

use std::collections::HashMap;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use feijump_core::host::{BodyKind, CollisionSides, Contact, EntityId, FrameInput, HostCommand};
use feijump_core::scene::{ControlMethod, GameMode, SceneParams};
use feijump_core::scheduler::{Scheduler, TimerHandle};
use feijump_core::storage::KeyValueStore;

use crate::config::{LevelTable, TowerConfig};
use crate::controls::ControlAdapter;
use crate::error::GameError;
use crate::level_gen::{GeneratedLevel, Platform, generate_level};
use crate::powerups::{PowerUpKind, PowerUpSystem};
use crate::progression::ProgressionTracker;

/// Entity id of the player body. Everything else is numbered from 1.
pub const PLAYER_ENTITY: EntityId = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Playing,
    Paused,
    /// Fell out of view. The next update restarts the same level.
    Dead,
    /// Reached the finish. Terminal for this session.
    LevelComplete,
    /// Quit from the pause menu. Terminal for this session.
    Quit,
}

/// Everything needed to (re)start a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSetup {
    pub level: u32,
    pub semester: u8,
    pub control_method: ControlMethod,
    pub game_mode: GameMode,
    /// Whether the host granted device-orientation access.
    pub orientation_granted: bool,
}

/// Notable things that happened during a call into the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionEvent {
    Restarted { level: u32, semester: u8 },
    Died { level: u32, semester: u8 },
    Bounced { platform: u32, impulse: f32 },
    PlatformRemoved { platform: u32 },
    PowerUpCollected(PowerUpKind),
    PowerUpExpired(PowerUpKind),
    LevelComplete { level: u32, pool_reset: bool },
    Paused,
    Resumed,
    QuitToMenu { level: u32 },
}

/// What a spawned entity stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Platform(usize),
    Finish,
    PowerUp(usize),
}

/// Delayed work owned by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionTimer {
    RemovePlatform(EntityId),
}

pub struct GameSession {
    setup: SessionSetup,
    levels: LevelTable,
    config: TowerConfig,
    rng: Box<dyn RngCore>,
    state: SessionState,
    level: GeneratedLevel,
    power_ups: PowerUpSystem,
    controls: ControlAdapter,
    timers: Scheduler<SessionTimer>,
    /// Pending removal of each consumed disappearing platform.
    fades: HashMap<EntityId, TimerHandle>,
    camera_y: f32,
    entities: HashMap<EntityId, Target>,
    next_entity: EntityId,
    contacts: Vec<Contact>,
    outbox: Vec<HostCommand>,
    orientation_held: bool,
}

impl std::fmt::Debug for GameSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameSession")
            .field("setup", &self.setup)
            .field("state", &self.state)
            .field("camera_y", &self.camera_y)
            .field("entities", &self.entities.len())
            .finish_non_exhaustive()
    }
}

impl GameSession {
    /// Generate the level and queue the spawn commands.
    ///
    /// Fails with [`GameError::Config`] when the level table has no usable entry
    /// and with [`GameError::PermissionDenied`] when gyroscope control was asked
    /// for without an orientation grant.
    pub fn start(
        setup: SessionSetup,
        levels: &LevelTable,
        config: &TowerConfig,
        mut rng: Box<dyn RngCore>,
    ) -> Result<Self, GameError> {
        if setup.control_method.requires_permission() && !setup.orientation_granted {
            tracing::warn!(level = setup.level, "Gyroscope session refused without permission");
            return Err(GameError::PermissionDenied);
        }
        let level = generate_level(
            levels,
            setup.level,
            setup.semester,
            &config.generation,
            &mut *rng,
        )?;

        let mut session = Self {
            controls: ControlAdapter::new(setup.control_method, &config.physics),
            setup,
            levels: levels.clone(),
            config: config.clone(),
            rng,
            state: SessionState::Playing,
            level,
            power_ups: PowerUpSystem::new(),
            timers: Scheduler::new(),
            fades: HashMap::new(),
            camera_y: 0.0,
            entities: HashMap::new(),
            next_entity: PLAYER_ENTITY + 1,
            contacts: Vec::new(),
            outbox: Vec::new(),
            orientation_held: false,
        };
        session.spawn_world();
        tracing::info!(
            level = session.setup.level,
            semester = session.setup.semester,
            control = ?session.setup.control_method,
            mode = ?session.setup.game_mode,
            "Session started"
        );
        Ok(session)
    }

    fn spawn_world(&mut self) {
        let physics = &self.config.physics;
        self.outbox.push(HostCommand::SpawnPlayer {
            entity: PLAYER_ENTITY,
            x: self.level.spawn_x,
            y: self.level.spawn_y,
            gravity: physics.gravity,
        });
        self.outbox.push(HostCommand::SetVelocityY {
            entity: PLAYER_ENTITY,
            vy: -physics.normal_jump_velocity,
        });

        let collision = match self.setup.game_mode {
            GameMode::Easy => CollisionSides::TopOnly,
            GameMode::Hard => CollisionSides::All,
        };
        let height = self.config.generation.platform_height;

        for idx in 0..self.level.platforms.len() {
            let entity = self.alloc_entity(Target::Platform(idx));
            let command = platform_spawn(&self.level.platforms[idx], entity, height, collision);
            self.outbox.push(command);
        }
        let finish = self.alloc_entity(Target::Finish);
        self.outbox
            .push(platform_spawn(&self.level.finish, finish, height, collision));

        for idx in 0..self.level.power_ups.len() {
            let entity = self.alloc_entity(Target::PowerUp(idx));
            let p = &self.level.power_ups[idx];
            self.outbox.push(HostCommand::SpawnPickup {
                entity,
                x: p.x,
                y: p.y,
            });
        }

        self.camera_y = 0.0;
        self.outbox.push(HostCommand::ScrollCamera { scroll_y: 0.0 });

        if self.setup.control_method == ControlMethod::Gyroscope && !self.orientation_held {
            self.orientation_held = true;
            self.outbox.push(HostCommand::SubscribeOrientation);
        }
    }

    fn alloc_entity(&mut self, target: Target) -> EntityId {
        let entity = self.next_entity;
        self.next_entity += 1;
        self.entities.insert(entity, target);
        entity
    }

    /// Record a collision reported by the physics step. Resolved on the next update.
    pub fn on_contact(&mut self, contact: Contact) {
        if self.state == SessionState::Playing {
            self.contacts.push(contact);
        }
    }

    pub fn on_landing(&mut self, entity: EntityId) {
        self.on_contact(Contact::Landing(entity));
    }

    pub fn on_overlap(&mut self, entity: EntityId) {
        self.on_contact(Contact::Overlap(entity));
    }

    /// Run one frame.
    pub fn update<S: KeyValueStore>(
        &mut self,
        input: &FrameInput,
        progression: &mut ProgressionTracker<S>,
    ) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        match self.state {
            SessionState::Playing => {},
            SessionState::Dead => {
                self.restart(&mut events);
                return events;
            },
            SessionState::Paused | SessionState::LevelComplete | SessionState::Quit => {
                return events;
            },
        }
        let dt_ms = if input.dt_ms.is_finite() {
            input.dt_ms.max(0.0)
        } else {
            0.0
        };

        let world_height = self.config.generation.world_height;
        if input.player_y > self.camera_y + world_height {
            self.die(&mut events);
            return events;
        }

        let follow_y = input.player_y - world_height / 2.0;
        if follow_y < self.camera_y {
            self.camera_y = follow_y;
            self.outbox.push(HostCommand::ScrollCamera {
                scroll_y: self.camera_y,
            });
        }

        self.outbox.push(HostCommand::SetVelocityX {
            entity: PLAYER_ENTITY,
            vx: self.controls.sample(input),
        });

        for contact in std::mem::take(&mut self.contacts) {
            match contact {
                Contact::Landing(entity) => self.land(entity, progression, &mut events),
                Contact::Overlap(entity) => self.pick_up(entity, &mut events),
            }
            if self.state != SessionState::Playing {
                return events;
            }
        }

        for kind in self.power_ups.tick(dt_ms) {
            if kind == PowerUpKind::SlowFall {
                self.outbox.push(HostCommand::SetGravity {
                    entity: PLAYER_ENTITY,
                    gravity: self.config.physics.gravity,
                });
            }
            events.push(SessionEvent::PowerUpExpired(kind));
        }

        for timer in self.timers.advance(dt_ms) {
            match timer {
                SessionTimer::RemovePlatform(entity) => {
                    self.fades.remove(&entity);
                    if let Some(Target::Platform(idx)) = self.entities.remove(&entity) {
                        self.outbox.push(HostCommand::Destroy { entity });
                        events.push(SessionEvent::PlatformRemoved {
                            platform: self.level.platforms[idx].id,
                        });
                    }
                },
            }
        }

        events
    }

    fn land<S: KeyValueStore>(
        &mut self,
        entity: EntityId,
        progression: &mut ProgressionTracker<S>,
        events: &mut Vec<SessionEvent>,
    ) {
        let idx = match self.entities.get(&entity).copied() {
            Some(Target::Platform(idx)) => idx,
            Some(Target::Finish) => {
                self.complete(progression, events);
                return;
            },
            Some(Target::PowerUp(_)) | None => return,
        };

        let impulse = self.power_ups.jump_impulse(&self.config.physics);
        self.outbox.push(HostCommand::SetVelocityY {
            entity: PLAYER_ENTITY,
            vy: -impulse,
        });

        let platform = &mut self.level.platforms[idx];
        events.push(SessionEvent::Bounced {
            platform: platform.id,
            impulse,
        });
        if platform.is_disappearing && !platform.consumed {
            platform.consumed = true;
            let fade = self.config.fade_delay_ms;
            self.outbox.push(HostCommand::PlayFade {
                entity,
                duration_ms: fade,
            });
            let handle = self
                .timers
                .delayed_call(fade, SessionTimer::RemovePlatform(entity));
            self.fades.insert(entity, handle);
        }
    }

    fn pick_up(&mut self, entity: EntityId, events: &mut Vec<SessionEvent>) {
        let Some(Target::PowerUp(idx)) = self.entities.get(&entity).copied() else {
            return;
        };
        self.entities.remove(&entity);
        let kind = self.level.power_ups[idx].kind;
        self.power_ups.on_pickup(kind);
        if kind == PowerUpKind::SlowFall {
            self.outbox.push(HostCommand::SetGravity {
                entity: PLAYER_ENTITY,
                gravity: self.config.physics.slow_fall_gravity,
            });
        }
        self.outbox.push(HostCommand::Destroy { entity });
        events.push(SessionEvent::PowerUpCollected(kind));
    }

    fn complete<S: KeyValueStore>(
        &mut self,
        progression: &mut ProgressionTracker<S>,
        events: &mut Vec<SessionEvent>,
    ) {
        self.state = SessionState::LevelComplete;
        self.cancel_fades();
        self.contacts.clear();
        self.outbox.push(HostCommand::SetPhysicsPaused(true));
        let pool_reset = progression.mark_completed(self.setup.level);
        tracing::info!(
            level = self.setup.level,
            semester = self.setup.semester,
            pool_reset,
            "Level complete"
        );
        events.push(SessionEvent::LevelComplete {
            level: self.setup.level,
            pool_reset,
        });
    }

    fn die(&mut self, events: &mut Vec<SessionEvent>) {
        tracing::info!(
            level = self.setup.level,
            semester = self.setup.semester,
            "Player fell"
        );
        self.teardown();
        self.state = SessionState::Dead;
        events.push(SessionEvent::Died {
            level: self.setup.level,
            semester: self.setup.semester,
        });
    }

    fn restart(&mut self, events: &mut Vec<SessionEvent>) {
        let level = match generate_level(
            &self.levels,
            self.setup.level,
            self.setup.semester,
            &self.config.generation,
            &mut *self.rng,
        ) {
            Ok(level) => level,
            Err(e) => {
                tracing::error!("Failed to regenerate level {}: {e}", self.setup.level);
                return;
            },
        };
        self.level = level;
        self.state = SessionState::Playing;
        self.spawn_world();
        tracing::debug!(level = self.setup.level, "Session restarted");
        events.push(SessionEvent::Restarted {
            level: self.setup.level,
            semester: self.setup.semester,
        });
    }

    /// Cancel timers, drop effects and destroy every spawned entity.
    fn teardown(&mut self) {
        self.cancel_fades();
        self.timers.resume();
        self.power_ups.clear();
        self.contacts.clear();
        let mut spawned: Vec<EntityId> = self.entities.drain().map(|(e, _)| e).collect();
        spawned.sort_unstable();
        self.outbox.push(HostCommand::Destroy {
            entity: PLAYER_ENTITY,
        });
        self.outbox
            .extend(spawned.into_iter().map(|entity| HostCommand::Destroy { entity }));
        self.outbox.push(HostCommand::SetPhysicsPaused(false));
        self.release_orientation();
    }

    fn cancel_fades(&mut self) {
        for (_, handle) in self.fades.drain() {
            self.timers.cancel(handle);
        }
    }

    fn release_orientation(&mut self) {
        if self.orientation_held {
            self.orientation_held = false;
            self.outbox.push(HostCommand::ReleaseOrientation);
        }
    }

    /// Freeze physics and every pending session timer.
    pub fn pause(&mut self) -> Option<SessionEvent> {
        if self.state != SessionState::Playing {
            return None;
        }
        self.state = SessionState::Paused;
        self.timers.pause();
        self.outbox.push(HostCommand::SetPhysicsPaused(true));
        tracing::debug!(level = self.setup.level, "Paused");
        Some(SessionEvent::Paused)
    }

    pub fn resume(&mut self) -> Option<SessionEvent> {
        if self.state != SessionState::Paused {
            return None;
        }
        self.state = SessionState::Playing;
        self.timers.resume();
        self.outbox.push(HostCommand::SetPhysicsPaused(false));
        tracing::debug!(level = self.setup.level, "Resumed");
        Some(SessionEvent::Resumed)
    }

    pub fn toggle_pause(&mut self) -> Option<SessionEvent> {
        match self.state {
            SessionState::Playing => self.pause(),
            SessionState::Paused => self.resume(),
            _ => None,
        }
    }

    /// Give up from the pause menu. The level counts as played.
    pub fn quit<S: KeyValueStore>(
        &mut self,
        progression: &mut ProgressionTracker<S>,
    ) -> Option<SessionEvent> {
        if self.state != SessionState::Paused {
            return None;
        }
        progression.mark_completed(self.setup.level);
        self.teardown();
        self.state = SessionState::Quit;
        tracing::info!(level = self.setup.level, "Quit to menu");
        Some(SessionEvent::QuitToMenu {
            level: self.setup.level,
        })
    }

    /// Release everything the session still holds on the host. Call before
    /// dropping a session that did not end through death or quit.
    pub fn shutdown(&mut self) -> Vec<HostCommand> {
        if self.state != SessionState::Quit {
            self.teardown();
        }
        self.drain_commands()
    }

    /// Commands queued since the last drain, in emission order.
    pub fn drain_commands(&mut self) -> Vec<HostCommand> {
        std::mem::take(&mut self.outbox)
    }

    /// Transition bag for the menu and control-selection scenes.
    pub fn scene_params<S: KeyValueStore>(
        &self,
        progression: &ProgressionTracker<S>,
    ) -> SceneParams {
        SceneParams {
            level: self.setup.level,
            semester: self.setup.semester,
            control_method: self.setup.control_method,
            game_mode: self.setup.game_mode,
            levels: progression.remaining().to_vec(),
            played_levels: progression.played().to_vec(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn setup(&self) -> &SessionSetup {
        &self.setup
    }

    pub fn level(&self) -> &GeneratedLevel {
        &self.level
    }

    pub fn power_ups(&self) -> &PowerUpSystem {
        &self.power_ups
    }

    pub fn camera_y(&self) -> f32 {
        self.camera_y
    }

    pub fn config(&self) -> &TowerConfig {
        &self.config
    }

    /// Session timers still waiting to fire.
    pub fn pending_timers(&self) -> usize {
        self.timers.pending()
    }

    /// Time left before a consumed platform is removed, for syncing its fade.
    pub fn fade_remaining_ms(&self, entity: EntityId) -> Option<f32> {
        self.fades
            .get(&entity)
            .and_then(|handle| self.timers.remaining(*handle))
    }

    /// Live entity currently standing for the platform with generator id `platform`.
    pub fn platform_entity(&self, platform: u32) -> Option<EntityId> {
        self.entities.iter().find_map(|(entity, target)| match target {
            Target::Platform(idx) if self.level.platforms[*idx].id == platform => Some(*entity),
            Target::Finish if self.level.finish.id == platform => Some(*entity),
            _ => None,
        })
    }

    /// Live entity of the finish platform.
    pub fn finish_entity(&self) -> Option<EntityId> {
        self.entities
            .iter()
            .find_map(|(entity, target)| (*target == Target::Finish).then_some(*entity))
    }

    /// Live entity of the power-up with generator id `power_up`.
    pub fn power_up_entity(&self, power_up: u32) -> Option<EntityId> {
        self.entities.iter().find_map(|(entity, target)| match target {
            Target::PowerUp(idx) if self.level.power_ups[*idx].id == power_up => Some(*entity),
            _ => None,
        })
    }

    /// Platform an entity stands for, if it is still alive.
    pub fn platform_of(&self, entity: EntityId) -> Option<&Platform> {
        match self.entities.get(&entity)? {
            Target::Platform(idx) => self.level.platforms.get(*idx),
            Target::Finish => Some(&self.level.finish),
            Target::PowerUp(_) => None,
        }
    }
}

fn platform_spawn(
    platform: &Platform,
    entity: EntityId,
    height: f32,
    collision: CollisionSides,
) -> HostCommand {
    let tween = platform.movement.map(|m| m.tween());
    HostCommand::SpawnPlatform {
        entity,
        x: platform.x,
        y: platform.y,
        width: platform.width,
        height,
        body: if tween.is_some() {
            BodyKind::Kinematic
        } else {
            BodyKind::Static
        },
        collision,
        tween,
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use feijump_core::storage::MemoryStore;
    use feijump_core::test_helpers::{destroyed_entities, last_gravity, last_velocity_y};

    use super::*;
    use crate::config::TowerPhysicsConfig;

    fn setup(level: u32) -> SessionSetup {
        SessionSetup {
            level,
            semester: 1,
            control_method: ControlMethod::Keyboard,
            game_mode: GameMode::Hard,
            orientation_granted: false,
        }
    }

    fn start(setup: SessionSetup) -> GameSession {
        GameSession::start(
            setup,
            &LevelTable::default(),
            &TowerConfig::default(),
            Box::new(StdRng::seed_from_u64(42)),
        )
        .unwrap()
    }

    /// First seed whose tower satisfies `wanted`.
    fn start_where(setup: SessionSetup, wanted: impl Fn(&GameSession) -> bool) -> GameSession {
        (0..64u64)
            .map(|seed| {
                GameSession::start(
                    setup.clone(),
                    &LevelTable::default(),
                    &TowerConfig::default(),
                    Box::new(StdRng::seed_from_u64(seed)),
                )
                .unwrap()
            })
            .find(|s| wanted(s))
            .expect("no seed produced the wanted tower")
    }

    fn power_up_of(session: &GameSession, kind: PowerUpKind) -> Option<EntityId> {
        let id = session.level().power_ups.iter().find(|p| p.kind == kind)?.id;
        session.power_up_entity(id)
    }

    fn tracker() -> ProgressionTracker<MemoryStore> {
        ProgressionTracker::new(MemoryStore::new(), vec![1, 2, 3, 4, 5])
    }

    /// Input with the player standing at the spawn point.
    fn frame(session: &GameSession, dt_ms: f32) -> FrameInput {
        FrameInput {
            dt_ms,
            player_x: session.level().spawn_x,
            player_y: session.level().spawn_y,
            ..Default::default()
        }
    }

    fn first_disappearing(session: &GameSession) -> (u32, EntityId) {
        let platform = session
            .level()
            .platforms
            .iter()
            .find(|p| p.is_disappearing)
            .expect("level 4 platforms disappear");
        (platform.id, session.platform_entity(platform.id).unwrap())
    }

    #[test]
    fn start_spawns_world_and_launches_player() {
        let mut s = start(setup(1));
        let cmds = s.drain_commands();
        let physics = TowerPhysicsConfig::default();
        assert!(matches!(cmds[0], HostCommand::SpawnPlayer { entity: PLAYER_ENTITY, .. }));
        assert_eq!(
            last_velocity_y(&cmds, PLAYER_ENTITY),
            Some(-physics.normal_jump_velocity)
        );
        let platforms = cmds
            .iter()
            .filter(|c| matches!(c, HostCommand::SpawnPlatform { .. }))
            .count();
        assert_eq!(platforms, s.level().platforms.len() + 1);
        let pickups = cmds
            .iter()
            .filter(|c| matches!(c, HostCommand::SpawnPickup { .. }))
            .count();
        assert_eq!(pickups, s.level().power_ups.len());
        assert_eq!(s.state(), SessionState::Playing);
    }

    #[test]
    fn unknown_level_refuses_to_start() {
        let err = GameSession::start(
            setup(99),
            &LevelTable::default(),
            &TowerConfig::default(),
            Box::new(StdRng::seed_from_u64(0)),
        )
        .unwrap_err();
        assert!(matches!(err, GameError::Config(_)));
    }

    #[test]
    fn gyroscope_needs_grant() {
        let mut denied = setup(1);
        denied.control_method = ControlMethod::Gyroscope;
        let err = GameSession::start(
            denied.clone(),
            &LevelTable::default(),
            &TowerConfig::default(),
            Box::new(StdRng::seed_from_u64(0)),
        )
        .unwrap_err();
        assert_eq!(err, GameError::PermissionDenied);

        denied.orientation_granted = true;
        let mut s = start(denied);
        assert!(s.drain_commands().contains(&HostCommand::SubscribeOrientation));
    }

    #[test]
    fn easy_mode_platforms_are_one_way() {
        let mut easy = setup(2);
        easy.game_mode = GameMode::Easy;
        let mut s = start(easy);
        let hard = start(setup(2));
        assert_eq!(s.level(), hard.level(), "generator output is mode independent");
        for cmd in s.drain_commands() {
            if let HostCommand::SpawnPlatform { collision, .. } = cmd {
                assert_eq!(collision, CollisionSides::TopOnly);
            }
        }
    }

    #[test]
    fn moving_platforms_spawn_kinematic_with_tween() {
        let mut s = start(setup(2));
        let kinematic = s
            .drain_commands()
            .into_iter()
            .filter(|c| {
                matches!(
                    c,
                    HostCommand::SpawnPlatform {
                        body: BodyKind::Kinematic,
                        tween: Some(_),
                        ..
                    }
                )
            })
            .count();
        assert_eq!(kinematic, s.level().platforms.len() - 1);
    }

    #[test]
    fn landing_bounces_with_normal_impulse() {
        let mut s = start(setup(1));
        let mut progress = tracker();
        let entity = s.platform_entity(1).unwrap();
        s.drain_commands();

        s.on_landing(entity);
        let events = s.update(&frame(&s, 16.0), &mut progress);
        assert!(events.contains(&SessionEvent::Bounced {
            platform: 1,
            impulse: 600.0
        }));
        assert_eq!(last_velocity_y(&s.drain_commands(), PLAYER_ENTITY), Some(-600.0));
    }

    #[test]
    fn boosted_landing_on_vanishing_platform_removes_it_after_fade() {
        let mut s = start_where(setup(4), |s| power_up_of(s, PowerUpKind::JumpBoost).is_some());
        let mut progress = tracker();
        let (platform, entity) = first_disappearing(&s);
        let boost = power_up_of(&s, PowerUpKind::JumpBoost).unwrap();
        s.on_overlap(boost);
        s.update(&frame(&s, 16.0), &mut progress);
        assert!(s.power_ups().jump_boost_active());
        s.drain_commands();

        s.on_landing(entity);
        s.update(&frame(&s, 16.0), &mut progress);
        let cmds = s.drain_commands();
        let physics = TowerPhysicsConfig::default();
        assert_eq!(
            last_velocity_y(&cmds, PLAYER_ENTITY),
            Some(-physics.boosted_jump_velocity)
        );
        assert!(cmds.contains(&HostCommand::PlayFade {
            entity,
            duration_ms: 300.0
        }));
        assert!(destroyed_entities(&cmds).is_empty(), "not removed instantly");
        assert!(s.platform_of(entity).is_some_and(|p| p.consumed));

        assert_eq!(s.fade_remaining_ms(entity), Some(284.0));
        s.update(&frame(&s, 200.0), &mut progress);
        assert!(destroyed_entities(&s.drain_commands()).is_empty());
        assert_eq!(s.fade_remaining_ms(entity), Some(84.0));

        let events = s.update(&frame(&s, 100.0), &mut progress);
        assert!(events.contains(&SessionEvent::PlatformRemoved { platform }));
        assert_eq!(destroyed_entities(&s.drain_commands()), vec![entity]);
        assert!(s.platform_of(entity).is_none());
        assert_eq!(s.fade_remaining_ms(entity), None);
    }

    #[test]
    fn second_landing_does_not_reschedule_removal() {
        let mut s = start(setup(4));
        let mut progress = tracker();
        let (_, entity) = first_disappearing(&s);
        s.on_landing(entity);
        s.update(&frame(&s, 16.0), &mut progress);
        s.on_landing(entity);
        s.update(&frame(&s, 16.0), &mut progress);
        assert_eq!(s.pending_timers(), 1);
        assert_eq!(s.fade_remaining_ms(entity), Some(268.0));
    }

    #[test]
    fn slow_fall_pickup_and_expiry_swap_gravity() {
        let mut s = start_where(setup(1), |s| power_up_of(s, PowerUpKind::SlowFall).is_some());
        let mut progress = tracker();
        let entity = power_up_of(&s, PowerUpKind::SlowFall).unwrap();
        s.drain_commands();

        s.on_overlap(entity);
        let events = s.update(&frame(&s, 0.0), &mut progress);
        assert!(events.contains(&SessionEvent::PowerUpCollected(PowerUpKind::SlowFall)));
        let cmds = s.drain_commands();
        assert_eq!(last_gravity(&cmds, PLAYER_ENTITY), Some(250.0));
        assert_eq!(destroyed_entities(&cmds), vec![entity]);

        let events = s.update(&frame(&s, 5000.0), &mut progress);
        assert!(events.contains(&SessionEvent::PowerUpExpired(PowerUpKind::SlowFall)));
        assert_eq!(last_gravity(&s.drain_commands(), PLAYER_ENTITY), Some(600.0));
    }

    #[test]
    fn pause_freezes_power_up_and_fade_timers() {
        let mut s = start_where(setup(4), |s| power_up_of(s, PowerUpKind::SlowFall).is_some());
        let mut progress = tracker();
        let (_, platform) = first_disappearing(&s);
        let slow_fall = power_up_of(&s, PowerUpKind::SlowFall).unwrap();
        s.on_overlap(slow_fall);
        s.update(&frame(&s, 0.0), &mut progress);
        s.update(&frame(&s, 3000.0), &mut progress);
        s.on_landing(platform);
        s.update(&frame(&s, 0.0), &mut progress);
        assert_eq!(s.power_ups().remaining_ms(PowerUpKind::SlowFall), Some(2000.0));

        assert_eq!(s.pause(), Some(SessionEvent::Paused));
        assert!(s.drain_commands().contains(&HostCommand::SetPhysicsPaused(true)));
        assert!(s.update(&frame(&s, 5000.0), &mut progress).is_empty());
        assert_eq!(s.resume(), Some(SessionEvent::Resumed));

        assert_eq!(s.power_ups().remaining_ms(PowerUpKind::SlowFall), Some(2000.0));
        assert_eq!(s.pending_timers(), 1, "fade timer survived the pause");
        assert_eq!(s.fade_remaining_ms(platform), Some(300.0));
        assert!(destroyed_entities(&s.drain_commands()).is_empty());
    }

    #[test]
    fn falling_below_camera_kills_and_restarts() {
        let mut s = start(setup(3));
        let mut progress = tracker();
        progress.mark_completed(5);
        let before = progress.state().clone();
        s.drain_commands();

        let mut input = frame(&s, 16.0);
        input.player_y = s.camera_y() + 601.0;
        let events = s.update(&input, &mut progress);
        assert_eq!(
            events,
            vec![SessionEvent::Died {
                level: 3,
                semester: 1
            }]
        );
        assert_eq!(s.state(), SessionState::Dead);
        assert!(destroyed_entities(&s.drain_commands()).contains(&PLAYER_ENTITY));

        let events = s.update(&frame(&s, 16.0), &mut progress);
        assert_eq!(
            events,
            vec![SessionEvent::Restarted {
                level: 3,
                semester: 1
            }]
        );
        assert_eq!(s.state(), SessionState::Playing);
        assert_eq!(progress.state(), &before, "death never touches progression");
    }

    #[test]
    fn death_cancels_pending_fades() {
        let mut s = start(setup(4));
        let mut progress = tracker();
        let (_, entity) = first_disappearing(&s);
        s.on_landing(entity);
        s.update(&frame(&s, 0.0), &mut progress);
        assert_eq!(s.pending_timers(), 1);

        let mut input = frame(&s, 16.0);
        input.player_y = 10_000.0;
        s.update(&input, &mut progress);
        assert_eq!(s.pending_timers(), 0);
        assert_eq!(s.fade_remaining_ms(entity), None);
    }

    #[test]
    fn camera_only_scrolls_up() {
        let mut s = start(setup(1));
        let mut progress = tracker();
        let mut input = frame(&s, 16.0);
        input.player_y = -1000.0;
        s.update(&input, &mut progress);
        assert_eq!(s.camera_y(), -1300.0);

        input.player_y = -800.0;
        s.update(&input, &mut progress);
        assert_eq!(s.camera_y(), -1300.0);
        assert_eq!(s.state(), SessionState::Playing);
    }

    #[test]
    fn finish_completes_level_and_updates_progression() {
        let mut s = start(setup(3));
        let mut progress = tracker();
        let finish = s.finish_entity().unwrap();
        s.drain_commands();
        s.on_landing(finish);
        let events = s.update(&frame(&s, 16.0), &mut progress);
        assert_eq!(
            events,
            vec![SessionEvent::LevelComplete {
                level: 3,
                pool_reset: false
            }]
        );
        assert_eq!(s.state(), SessionState::LevelComplete);
        assert_eq!(progress.remaining(), &[1, 2, 4, 5]);
        assert_eq!(progress.played(), &[3]);
        assert_eq!(last_velocity_y(&s.drain_commands(), PLAYER_ENTITY), None);
    }

    #[test]
    fn quit_requires_pause_and_marks_played() {
        let mut s = start(setup(2));
        let mut progress = tracker();
        assert_eq!(s.quit(&mut progress), None);

        s.pause();
        assert_eq!(s.quit(&mut progress), Some(SessionEvent::QuitToMenu { level: 2 }));
        assert_eq!(s.state(), SessionState::Quit);
        assert_eq!(progress.played(), &[2]);
        assert!(s.update(&frame(&s, 16.0), &mut progress).is_empty());
    }

    #[test]
    fn gyroscope_subscription_released_on_death_and_quit() {
        let mut gyro = setup(1);
        gyro.control_method = ControlMethod::Gyroscope;
        gyro.orientation_granted = true;
        let mut s = start(gyro);
        let mut progress = tracker();

        let mut input = frame(&s, 16.0);
        input.player_y = 5000.0;
        s.update(&input, &mut progress);
        assert!(s.drain_commands().contains(&HostCommand::ReleaseOrientation));

        s.update(&frame(&s, 16.0), &mut progress);
        assert!(s.drain_commands().contains(&HostCommand::SubscribeOrientation));

        s.pause();
        s.quit(&mut progress);
        let cmds = s.drain_commands();
        assert_eq!(
            cmds.iter()
                .filter(|c| **c == HostCommand::ReleaseOrientation)
                .count(),
            1
        );
        assert!(!s.shutdown().contains(&HostCommand::ReleaseOrientation));
    }

    #[test]
    fn scene_params_copy_progression() {
        let s = start(setup(5));
        let mut progress = tracker();
        progress.mark_completed(1);
        let params = s.scene_params(&progress);
        assert_eq!(params.level, 5);
        assert_eq!(params.levels, vec![2, 3, 4, 5]);
        assert_eq!(params.played_levels, vec![1]);
    }

    #[test]
    fn contacts_ignored_while_paused() {
        let mut s = start(setup(1));
        let mut progress = tracker();
        let entity = s.platform_entity(1).unwrap();
        s.pause();
        s.on_landing(entity);
        s.resume();
        let events = s.update(&frame(&s, 16.0), &mut progress);
        assert!(events.is_empty());
    }
}
