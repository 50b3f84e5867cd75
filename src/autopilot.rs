use crate::vehicle::{Vehicle, VehiclePawn};
use crate::wrap_angle;
use glam::Vec3;

/// Pure-pursuit driver aiming the pawn at a point, used by the headless demo.
#[derive(Debug, Clone, Copy)]
pub struct Autopilot {
    pub throttle: f32,
    pub steering_gain: f32,
    /// Heading error (radians) under which the driver fires the boost.
    pub boost_alignment: f32,
    pub min_boost_speed: f32,
}

impl Default for Autopilot {
    fn default() -> Self {
        Self { throttle: 1.0, steering_gain: 2.5, boost_alignment: 0.08, min_boost_speed: 15.0 }
    }
}

impl Autopilot {
    pub fn with_throttle(throttle: f32) -> Self {
        Self { throttle: throttle.clamp(0.0, 1.0), ..Self::default() }
    }

    pub fn drive(&self, pawn: &mut VehiclePawn, target: Vec3) {
        let pose = pawn.transform();
        let to_target = target - pose.translation;
        if to_target.truncate().length_squared() < 1e-4 {
            return;
        }
        let desired = to_target.y.atan2(to_target.x);
        let error = wrap_angle(desired - pose.yaw());
        let steer = (error * self.steering_gain).clamp(-1.0, 1.0);
        pawn.steering(steer);
        pawn.throttle(self.throttle * (1.0 - 0.5 * steer.abs()));

        let aligned = error.abs() < self.boost_alignment && pawn.forward_speed() > self.min_boost_speed;
        if aligned && !pawn.is_boosting() {
            pawn.boost_start();
        } else if !aligned && pawn.is_boosting() {
            pawn.boost_stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VehicleConfig;
    use crate::transform::Transform;

    #[test]
    fn steers_towards_target_on_the_left() {
        let mut pawn = VehiclePawn::kinematic(&VehicleConfig::default(), Transform::IDENTITY);
        pawn.set_input_enabled(true);
        let autopilot = Autopilot::default();
        for _ in 0..120 {
            autopilot.drive(&mut pawn, Vec3::new(0.0, 50.0, 0.0));
            pawn.tick(1.0 / 60.0);
        }
        let pose = pawn.transform();
        assert!(pose.yaw() > 0.5, "heading should swing left, got {}", pose.yaw());
        assert!(pose.translation.y > 0.0);
    }

    #[test]
    fn does_nothing_while_input_is_disabled() {
        let mut pawn = VehiclePawn::kinematic(&VehicleConfig::default(), Transform::IDENTITY);
        let autopilot = Autopilot::default();
        autopilot.drive(&mut pawn, Vec3::new(100.0, 0.0, 0.0));
        pawn.tick(1.0);
        assert_eq!(pawn.forward_speed(), 0.0);
    }
}
