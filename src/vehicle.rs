use crate::config::VehicleConfig;
use crate::transform::Transform;
use glam::{Quat, Vec3};
use tracing::{debug, info};

/// What the race controller needs from the player's vehicle.
pub trait Vehicle {
    fn transform(&self) -> Transform;
    fn forward_speed(&self) -> f32;
    fn current_gear(&self) -> i32;
    fn set_input_enabled(&mut self, enabled: bool);
}

/// Movement backend driven by [`VehiclePawn`]. Gear `0` is neutral, negative gears are reverse.
pub trait VehicleMovement {
    fn forward_speed(&self) -> f32;
    fn current_gear(&self) -> i32;
    fn set_steering(&mut self, value: f32);
    fn set_throttle(&mut self, value: f32);
    fn set_brake(&mut self, value: f32);
    fn set_handbrake(&mut self, engaged: bool);
    fn set_max_torque(&mut self, torque: f32);
    fn base_max_torque(&self) -> f32;
    fn transform(&self) -> Transform;
    fn set_transform(&mut self, transform: Transform);
    fn reset_velocity(&mut self);
    fn is_moving_on_ground(&self) -> bool;
    fn step(&mut self, delta: f32);

    fn up_vector(&self) -> Vec3 {
        self.transform().up()
    }
}

/// Flat-ground point-mass car with bicycle-model steering. Good enough to drive a demo lap.
#[derive(Debug, Clone)]
pub struct KinematicVehicle {
    transform: Transform,
    speed: f32,
    steering: f32,
    throttle: f32,
    brake: f32,
    handbrake: bool,
    max_torque: f32,
    base_max_torque: f32,
    mass: f32,
    max_speed: f32,
    brake_deceleration: f32,
    drag: f32,
    steering_limit: f32,
    wheelbase: f32,
    gear_count: u32,
}

impl KinematicVehicle {
    pub fn new(config: &VehicleConfig, transform: Transform) -> Self {
        Self {
            transform,
            speed: 0.0,
            steering: 0.0,
            throttle: 0.0,
            brake: 0.0,
            handbrake: false,
            max_torque: config.max_torque,
            base_max_torque: config.max_torque,
            mass: config.mass.max(1.0),
            max_speed: config.max_speed.max(0.0),
            brake_deceleration: config.brake_deceleration.max(0.0),
            drag: config.drag.max(0.0),
            steering_limit: config.steering_limit,
            wheelbase: config.wheelbase.max(0.1),
            gear_count: config.gear_count.max(1),
        }
    }

    pub fn throttle(&self) -> f32 {
        self.throttle
    }

    pub fn brake(&self) -> f32 {
        self.brake
    }

    pub fn steering(&self) -> f32 {
        self.steering
    }

    pub fn handbrake(&self) -> bool {
        self.handbrake
    }

    pub fn max_torque(&self) -> f32 {
        self.max_torque
    }

    /// Top speed scales with the torque ratio so boosting raises it too.
    fn speed_cap(&self) -> f32 {
        let ratio = if self.base_max_torque > 0.0 { self.max_torque / self.base_max_torque } else { 1.0 };
        self.max_speed * ratio.max(0.0)
    }
}

impl VehicleMovement for KinematicVehicle {
    fn forward_speed(&self) -> f32 {
        self.speed
    }

    fn current_gear(&self) -> i32 {
        if self.speed.abs() < 0.5 {
            return 0;
        }
        if self.speed < 0.0 {
            return -1;
        }
        let band = self.max_speed / self.gear_count as f32;
        if band <= 0.0 {
            return 1;
        }
        ((self.speed / band) as i32 + 1).clamp(1, self.gear_count as i32)
    }

    fn set_steering(&mut self, value: f32) {
        self.steering = value.clamp(-1.0, 1.0);
    }

    fn set_throttle(&mut self, value: f32) {
        self.throttle = value.clamp(0.0, 1.0);
    }

    fn set_brake(&mut self, value: f32) {
        self.brake = value.clamp(0.0, 1.0);
    }

    fn set_handbrake(&mut self, engaged: bool) {
        self.handbrake = engaged;
    }

    fn set_max_torque(&mut self, torque: f32) {
        self.max_torque = torque.max(0.0);
    }

    fn base_max_torque(&self) -> f32 {
        self.base_max_torque
    }

    fn transform(&self) -> Transform {
        self.transform
    }

    fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
    }

    fn reset_velocity(&mut self) {
        self.speed = 0.0;
    }

    fn is_moving_on_ground(&self) -> bool {
        self.transform.up().z > 0.0
    }

    fn step(&mut self, delta: f32) {
        if !(delta > 0.0) {
            return;
        }
        if self.is_moving_on_ground() {
            let mut accel = self.throttle * self.max_torque / self.mass;
            let mut stopping = self.brake * self.brake_deceleration;
            if self.handbrake {
                accel = 0.0;
                stopping = stopping.max(self.brake_deceleration * 0.5);
            }
            self.speed += accel * delta;
            let slowdown = (stopping + self.drag * self.speed.abs()) * delta;
            self.speed = if self.speed > 0.0 { (self.speed - slowdown).max(0.0) } else { (self.speed + slowdown).min(0.0) };
            self.speed = self.speed.min(self.speed_cap());

            let wheel_angle = self.steering * self.steering_limit;
            let yaw_rate = self.speed / self.wheelbase * wheel_angle.tan();
            self.transform.rotation = (Quat::from_rotation_z(yaw_rate * delta) * self.transform.rotation).normalize();
        }
        let forward = self.transform.forward();
        self.transform.translation += forward * self.speed * delta;
    }
}

/// Driver-facing wrapper: routes input to the movement backend and owns boost and flip recovery.
pub struct VehiclePawn {
    movement: Box<dyn VehicleMovement>,
    config: VehicleConfig,
    input_enabled: bool,
    boosting: bool,
    boost_stored: f32,
    brake_lights: bool,
    previous_flip_check: bool,
}

impl VehiclePawn {
    pub fn new(movement: Box<dyn VehicleMovement>, config: VehicleConfig) -> Self {
        let boost_stored = config.initial_boost.clamp(0.0, config.boost_capacity);
        Self {
            movement,
            config,
            input_enabled: false,
            boosting: false,
            boost_stored,
            brake_lights: false,
            previous_flip_check: false,
        }
    }

    pub fn kinematic(config: &VehicleConfig, transform: Transform) -> Self {
        Self::new(Box::new(KinematicVehicle::new(config, transform)), config.clone())
    }

    pub fn movement(&self) -> &dyn VehicleMovement {
        self.movement.as_ref()
    }

    pub fn movement_mut(&mut self) -> &mut dyn VehicleMovement {
        self.movement.as_mut()
    }

    pub fn config(&self) -> &VehicleConfig {
        &self.config
    }

    pub fn input_enabled(&self) -> bool {
        self.input_enabled
    }

    pub fn is_boosting(&self) -> bool {
        self.boosting
    }

    pub fn boost_stored(&self) -> f32 {
        self.boost_stored
    }

    pub fn brake_lights_on(&self) -> bool {
        self.brake_lights
    }

    pub fn steering(&mut self, value: f32) {
        if self.input_enabled {
            self.movement.set_steering(value);
        }
    }

    pub fn throttle(&mut self, value: f32) {
        if self.input_enabled {
            self.movement.set_throttle(value);
            self.movement.set_brake(0.0);
        }
    }

    pub fn brake(&mut self, value: f32) {
        if self.input_enabled {
            self.movement.set_brake(value);
            self.movement.set_throttle(0.0);
        }
    }

    pub fn brake_start(&mut self) {
        if self.input_enabled {
            self.brake_lights = true;
        }
    }

    pub fn brake_stop(&mut self) {
        if self.input_enabled {
            self.brake_lights = false;
            self.movement.set_brake(0.0);
        }
    }

    pub fn handbrake_start(&mut self) {
        if self.input_enabled {
            self.movement.set_handbrake(true);
            self.brake_lights = true;
        }
    }

    pub fn handbrake_stop(&mut self) {
        if self.input_enabled {
            self.movement.set_handbrake(false);
            self.brake_lights = false;
        }
    }

    pub fn boost_start(&mut self) {
        if self.input_enabled && self.boost_stored > 0.0 && !self.boosting {
            self.boosting = true;
            let boosted = self.movement.base_max_torque() * self.config.boost_torque_multiplier;
            self.movement.set_max_torque(boosted);
        }
    }

    pub fn boost_stop(&mut self) {
        if self.input_enabled {
            self.end_boost();
        }
    }

    fn end_boost(&mut self) {
        self.boosting = false;
        let base = self.movement.base_max_torque();
        self.movement.set_max_torque(base);
    }

    pub fn add_boost(&mut self, amount: f32) {
        self.boost_stored = (self.boost_stored + amount).clamp(0.0, self.config.boost_capacity);
    }

    /// Driver-requested reset.
    pub fn request_reset(&mut self) {
        if self.input_enabled {
            self.reset_vehicle();
        }
    }

    /// Lifts the vehicle above its current position, upright at its current heading, at rest.
    pub fn reset_vehicle(&mut self) {
        let current = self.movement.transform();
        let translation = current.translation + Vec3::Z * self.config.reset_lift;
        let rotation = Quat::from_rotation_z(current.yaw());
        self.movement.set_transform(Transform { translation, rotation, scale: Vec3::ONE });
        self.movement.reset_velocity();
        info!(x = translation.x, y = translation.y, z = translation.z, "vehicle reset");
    }

    /// Resets the vehicle when this and the previous check both found it upside down.
    pub fn flip_check(&mut self) -> bool {
        let up_dot = self.movement.up_vector().dot(Vec3::Z);
        if up_dot < self.config.flip_check_min_dot {
            let reset = self.previous_flip_check;
            if reset {
                self.reset_vehicle();
            }
            self.previous_flip_check = true;
            debug!(up_dot, reset, "vehicle flipped");
            reset
        } else {
            self.previous_flip_check = false;
            false
        }
    }

    pub fn tick(&mut self, delta: f32) {
        if self.boosting {
            self.boost_stored -= delta * self.config.boost_drain_per_second;
            if self.boost_stored <= 0.0 {
                self.boost_stored = 0.0;
                self.end_boost();
            }
        }
        self.movement.step(delta);
    }
}

impl Vehicle for VehiclePawn {
    fn transform(&self) -> Transform {
        self.movement.transform()
    }

    fn forward_speed(&self) -> f32 {
        self.movement.forward_speed()
    }

    fn current_gear(&self) -> i32 {
        self.movement.current_gear()
    }

    /// Disabling input also releases the pedals so a finished car coasts to a stop.
    fn set_input_enabled(&mut self, enabled: bool) {
        if self.input_enabled == enabled {
            return;
        }
        self.input_enabled = enabled;
        if !enabled {
            self.movement.set_throttle(0.0);
            self.movement.set_steering(0.0);
            if self.boosting {
                self.end_boost();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pawn() -> VehiclePawn {
        let mut pawn = VehiclePawn::kinematic(&VehicleConfig::default(), Transform::IDENTITY);
        pawn.set_input_enabled(true);
        pawn
    }

    #[test]
    fn throttle_and_brake_are_exclusive() {
        let mut vehicle = KinematicVehicle::new(&VehicleConfig::default(), Transform::IDENTITY);
        vehicle.set_brake(1.0);
        let mut pawn = VehiclePawn::new(Box::new(vehicle), VehicleConfig::default());
        pawn.set_input_enabled(true);
        pawn.throttle(0.8);
        pawn.tick(1.0);
        assert!(pawn.forward_speed() > 0.0);

        pawn.brake(1.0);
        pawn.tick(0.1);
        let after_brake = pawn.forward_speed();
        pawn.tick(0.1);
        assert!(pawn.forward_speed() < after_brake, "brake zeroed throttle so the car slows");
    }

    #[test]
    fn disabled_input_ignores_commands() {
        let mut pawn = VehiclePawn::kinematic(&VehicleConfig::default(), Transform::IDENTITY);
        pawn.throttle(1.0);
        pawn.boost_start();
        pawn.handbrake_start();
        pawn.tick(1.0);
        assert_eq!(pawn.forward_speed(), 0.0);
        assert!(!pawn.is_boosting());
        assert!(!pawn.brake_lights_on());
    }

    #[test]
    fn brake_lights_follow_brake_and_handbrake() {
        let mut pawn = pawn();
        pawn.brake_start();
        assert!(pawn.brake_lights_on());
        pawn.brake_stop();
        assert!(!pawn.brake_lights_on());
        pawn.handbrake_start();
        assert!(pawn.brake_lights_on());
        pawn.handbrake_stop();
        assert!(!pawn.brake_lights_on());
    }

    #[test]
    fn boost_raises_torque_and_drains_to_zero() {
        let mut pawn = pawn();
        pawn.boost_start();
        assert!(pawn.is_boosting());

        pawn.tick(1.0);
        assert!((pawn.boost_stored() - 80.0).abs() < 1e-4);
        pawn.tick(4.5);
        assert_eq!(pawn.boost_stored(), 0.0);
        assert!(!pawn.is_boosting());

        pawn.boost_start();
        assert!(!pawn.is_boosting(), "empty tank cannot boost");
        pawn.add_boost(250.0);
        assert_eq!(pawn.boost_stored(), 100.0);
        pawn.boost_start();
        pawn.boost_stop();
        assert!(!pawn.is_boosting());
        assert_eq!(pawn.movement().base_max_torque(), VehicleConfig::default().max_torque);
    }

    #[test]
    fn boost_multiplies_base_torque() {
        let config = VehicleConfig::default();
        let vehicle = KinematicVehicle::new(&config, Transform::IDENTITY);
        let mut pawn = VehiclePawn::new(Box::new(vehicle), config.clone());
        pawn.set_input_enabled(true);
        pawn.boost_start();
        pawn.throttle(1.0);
        pawn.tick(0.5);
        let boosted = pawn.forward_speed();

        let mut plain = VehiclePawn::kinematic(&config, Transform::IDENTITY);
        plain.set_input_enabled(true);
        plain.throttle(1.0);
        plain.tick(0.5);
        assert!(boosted > plain.forward_speed());
    }

    #[test]
    fn flip_check_resets_on_second_failure() {
        let mut pawn = pawn();
        let upside_down = Quat::from_rotation_z(0.7) * Quat::from_rotation_x(std::f32::consts::PI);
        let start = Vec3::new(10.0, -4.0, 0.0);
        pawn.movement_mut().set_transform(Transform::from_translation_rotation(start, upside_down));

        assert!(!pawn.flip_check());
        assert!(pawn.flip_check());

        let pose = pawn.transform();
        assert!((pose.translation - (start + Vec3::new(0.0, 0.0, 0.5))).length() < 1e-4);
        assert!(pose.up().dot(Vec3::Z) > 0.999);
        assert_eq!(pawn.forward_speed(), 0.0);
    }

    #[test]
    fn upright_check_clears_flip_flag() {
        let mut pawn = pawn();
        let upside_down = Quat::from_rotation_x(std::f32::consts::PI);
        pawn.movement_mut().set_transform(Transform::from_translation_rotation(Vec3::ZERO, upside_down));
        assert!(!pawn.flip_check());
        pawn.movement_mut().set_transform(Transform::IDENTITY);
        assert!(!pawn.flip_check());
        pawn.movement_mut().set_transform(Transform::from_translation_rotation(Vec3::ZERO, upside_down));
        assert!(!pawn.flip_check(), "one failing check after an upright one is not enough");
    }

    #[test]
    fn reset_keeps_yaw_and_drops_roll() {
        let mut pawn = pawn();
        let heading = 1.2;
        let tilted = Quat::from_rotation_z(heading) * Quat::from_rotation_x(0.4);
        pawn.movement_mut().set_transform(Transform::from_translation_rotation(Vec3::ZERO, tilted));
        pawn.request_reset();
        let pose = pawn.transform();
        assert!((pose.yaw() - heading).abs() < 1e-4);
        assert!((pose.translation.z - 0.5).abs() < 1e-6);
    }

    #[test]
    fn steering_turns_the_heading() {
        let mut pawn = pawn();
        pawn.throttle(1.0);
        pawn.steering(1.0);
        for _ in 0..60 {
            pawn.tick(1.0 / 60.0);
        }
        assert!(pawn.transform().yaw() > 0.0);
        assert!(pawn.current_gear() >= 1);
    }

    #[test]
    fn disabling_input_releases_throttle() {
        let mut pawn = pawn();
        pawn.throttle(1.0);
        pawn.tick(1.0);
        pawn.set_input_enabled(false);
        let speed = pawn.forward_speed();
        pawn.tick(1.0);
        assert!(pawn.forward_speed() < speed);
    }
}
