use crate::autopilot::Autopilot;
use crate::config::{AppConfig, VehicleConfig};
use crate::events::RaceEvent;
use crate::observers::{EventLog, HudLog, LeaderboardDisplay, ObserverContext, ObserverSet, RaceObserver};
use crate::race::{RaceController, RaceError, RaceHost, RacePhase, RaceSettings};
use crate::scheduler::{Scheduler, TimerHandle};
use crate::storage::SaveStore;
use crate::track::{GateId, TrackLayout};
use crate::transform::Transform;
use crate::vehicle::{Vehicle, VehiclePawn};
use crate::world::{EntityHandle, SimWorld, WorldHost};
use glam::{Quat, Vec3};
use tracing::{info, warn};

fn race_host<'a>(pawn: &'a mut Option<VehiclePawn>, world: &'a mut SimWorld) -> RaceHost<'a> {
    RaceHost::new(pawn.as_mut().map(|pawn| pawn as &mut dyn Vehicle), world)
}

/// Start pose on the finish line, facing the first gate of the lap.
pub fn start_transform(track: &TrackLayout) -> Transform {
    let finish = track.finish_line();
    let origin = finish.position();
    let heading = track
        .next_marker(finish.id)
        .and_then(|id| track.gate(id))
        .map(|gate| gate.position() - origin)
        .filter(|dir| dir.truncate().length_squared() > 1e-6)
        .map(|dir| dir.y.atan2(dir.x))
        .unwrap_or(0.0);
    Transform::from_translation_rotation(origin, Quat::from_rotation_z(heading))
}

/// Frame driver tying the controller to a world, a player vehicle, timers and observers.
pub struct TimeTrialSession {
    controller: RaceController,
    world: SimWorld,
    pawn: Option<VehiclePawn>,
    vehicle_entity: Option<EntityHandle>,
    vehicle_config: VehicleConfig,
    scheduler: Scheduler,
    flip_timer: Option<TimerHandle>,
    observers: ObserverSet,
    current_gate: Option<GateId>,
}

impl TimeTrialSession {
    pub fn new(config: &AppConfig, track: TrackLayout, store: Box<dyn SaveStore>) -> Self {
        let start = start_transform(&track);
        let controller = RaceController::new(RaceSettings::from_config(config), track, store);
        let mut session = Self {
            controller,
            world: SimWorld::new(),
            pawn: None,
            vehicle_entity: None,
            vehicle_config: config.vehicle.clone(),
            scheduler: Scheduler::new(),
            flip_timer: None,
            observers: ObserverSet::new(),
            current_gate: None,
        };
        session.world.add_player_start(start);
        session.spawn_player_vehicle(start);
        session
    }

    pub fn with_default_observers(mut self) -> Self {
        self.register_observer(Box::new(HudLog::new()));
        self.register_observer(Box::new(LeaderboardDisplay::new()));
        self.register_observer(Box::new(EventLog::default()));
        self
    }

    pub fn register_observer(&mut self, observer: Box<dyn RaceObserver>) {
        self.observers.register(observer);
    }

    pub fn observers(&self) -> &ObserverSet {
        &self.observers
    }

    pub fn controller(&self) -> &RaceController {
        &self.controller
    }

    pub fn world(&self) -> &SimWorld {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut SimWorld {
        &mut self.world
    }

    pub fn pawn(&self) -> Option<&VehiclePawn> {
        self.pawn.as_ref()
    }

    pub fn pawn_mut(&mut self) -> Option<&mut VehiclePawn> {
        self.pawn.as_mut()
    }

    pub fn vehicle_entity(&self) -> Option<EntityHandle> {
        self.vehicle_entity
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn phase(&self) -> RacePhase {
        self.controller.phase()
    }

    pub fn start_race(&mut self) -> Result<(), RaceError> {
        let mut host = race_host(&mut self.pawn, &mut self.world);
        let outcome = self.controller.start_race(&mut host);
        if let Err(err) = &outcome {
            warn!("start_race ignored: {err}");
        }
        self.dispatch_events();
        outcome
    }

    pub fn finish_race(&mut self) -> Result<(), RaceError> {
        let mut host = race_host(&mut self.pawn, &mut self.world);
        let outcome = self.controller.handle_race_finished(&mut host).map(|_| ());
        if let Err(err) = &outcome {
            warn!("finish ignored: {err}");
        }
        self.dispatch_events();
        outcome
    }

    pub fn reset_race(&mut self) {
        let mut host = race_host(&mut self.pawn, &mut self.world);
        self.controller.reset(&mut host);
        self.current_gate = None;
    }

    pub fn tick(&mut self, delta: f32) {
        if let Some(pawn) = self.pawn.as_mut() {
            pawn.tick(delta);
        }
        for fired in self.scheduler.tick(delta) {
            if Some(fired) == self.flip_timer {
                if let Some(pawn) = self.pawn.as_mut() {
                    pawn.flip_check();
                }
            }
        }

        let entered = self.detect_gate_entry();
        if let (Some(pawn), Some(entity)) = (self.pawn.as_ref(), self.vehicle_entity) {
            self.world.set_entity_transform(entity, pawn.transform());
        }

        let mut host = race_host(&mut self.pawn, &mut self.world);
        self.controller.tick(delta, &mut host);
        if let Some(gate) = entered {
            if self.controller.phase() == RacePhase::Running {
                if let Err(err) = self.controller.on_gate_passed(gate, &mut host) {
                    warn!("gate pass ignored: {err}");
                }
            }
        }

        if let Some(pawn) = self.pawn.as_ref() {
            self.observers.dispatch_telemetry(pawn.forward_speed(), pawn.current_gear());
        }
        self.dispatch_events();
    }

    /// Steers the player vehicle at the controller's current target gate.
    pub fn apply_autopilot(&mut self, autopilot: &Autopilot) {
        let track = self.controller.track();
        let target = self.controller.target_gate().and_then(|id| track.gate(id)).map(|gate| gate.position());
        if let (Some(pawn), Some(target)) = (self.pawn.as_mut(), target) {
            autopilot.drive(pawn, target);
        }
    }

    /// Replaces a lost vehicle with a fresh one at the player start.
    pub fn handle_vehicle_destroyed(&mut self) -> Option<EntityHandle> {
        if let Some(entity) = self.vehicle_entity.take() {
            self.world.despawn(entity);
        }
        self.pawn = None;
        if let Some(timer) = self.flip_timer.take() {
            self.scheduler.clear_timer(timer);
        }
        let Some(spawn) = self.world.find_spawn_point() else {
            warn!("no player start, vehicle not respawned");
            return None;
        };
        let entity = self.spawn_player_vehicle(spawn);
        info!(entity = entity.index(), "vehicle respawned");
        Some(entity)
    }

    /// Cancels timers and flushes any undelivered events to observers.
    pub fn shutdown(&mut self) {
        self.scheduler.clear_all();
        self.flip_timer = None;
        self.dispatch_events();
    }

    fn spawn_player_vehicle(&mut self, spawn: Transform) -> EntityHandle {
        let entity = self.world.spawn_vehicle(spawn);
        self.world.possess(entity);
        let mut pawn = VehiclePawn::kinematic(&self.vehicle_config, spawn);
        self.controller.sync_vehicle_input(&mut pawn);
        self.pawn = Some(pawn);
        self.vehicle_entity = Some(entity);
        self.flip_timer = Some(self.scheduler.set_timer(self.vehicle_config.flip_check_interval, true));
        entity
    }

    /// Reports a gate only on the frame the vehicle enters it.
    fn detect_gate_entry(&mut self) -> Option<GateId> {
        let position: Vec3 = self.pawn.as_ref()?.transform().translation;
        let inside = self.controller.track().gate_at(position);
        let entered = if inside != self.current_gate { inside } else { None };
        self.current_gate = inside;
        entered
    }

    fn dispatch_events(&mut self) {
        let events: Vec<RaceEvent> = self.controller.drain_events();
        if events.is_empty() {
            return;
        }
        let ctx = ObserverContext {
            store: self.controller.store(),
            settings: self.controller.settings(),
            total_laps: self.controller.total_laps(),
        };
        self.observers.dispatch_events(&ctx, &events);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemorySaveStore;

    fn session(laps: u32) -> TimeTrialSession {
        let track = TrackLayout::circuit("test", laps, 60.0, 6, 8.0).expect("track");
        TimeTrialSession::new(&AppConfig::default(), track, Box::new(MemorySaveStore::new())).with_default_observers()
    }

    #[test]
    fn start_pose_faces_first_gate() {
        let track = TrackLayout::circuit("ring", 1, 100.0, 4, 5.0).expect("track");
        let start = start_transform(&track);
        assert_eq!(start.translation, Vec3::new(100.0, 0.0, 0.0));
        let expected = (Vec3::new(0.0, 100.0, 0.0) - start.translation).normalize();
        assert!((start.forward() - expected).length() < 1e-4);
    }

    #[test]
    fn vehicle_input_follows_race_phase() {
        let mut session = session(1);
        assert!(!session.pawn().expect("pawn").input_enabled());
        session.start_race().expect("start");
        assert!(session.pawn().expect("pawn").input_enabled());
        session.finish_race().expect("finish");
        assert!(!session.pawn().expect("pawn").input_enabled());
        assert!(session.finish_race().is_err());
    }

    #[test]
    fn respawned_vehicle_is_possessed_with_running_input() {
        let mut session = session(2);
        session.start_race().expect("start");
        let old = session.vehicle_entity().expect("vehicle");
        let new = session.handle_vehicle_destroyed().expect("respawn");
        assert_ne!(old, new);
        assert_eq!(session.world_mut().possessed(), Some(new));
        assert!(session.pawn().expect("pawn").input_enabled());
        assert_eq!(session.world_mut().vehicle_entities(), vec![new]);
        assert_eq!(session.scheduler().len(), 1);
    }

    #[test]
    fn autopilot_completes_a_lap() {
        let mut session = session(1);
        session.start_race().expect("start");
        let autopilot = Autopilot::default();
        let step = 1.0 / 60.0;
        for _ in 0..(120 * 60) {
            session.apply_autopilot(&autopilot);
            session.tick(step);
            if session.phase() == RacePhase::Finished {
                break;
            }
        }
        assert_eq!(session.phase(), RacePhase::Finished);
        let result = session.controller().result().expect("result");
        assert_eq!(result.lap_times.len(), 1);
        let hud = session.observers().get::<HudLog>().expect("hud");
        assert!(hud.lines().any(|line| line.starts_with("Finished in")));
        let board = session.observers().get::<LeaderboardDisplay>().expect("board");
        assert_eq!(board.last_table().len(), 1);
    }
}
