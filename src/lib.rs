pub mod autopilot;
pub mod cli;
pub mod config;
pub mod demo;
pub mod events;
pub mod ghost;
pub mod leaderboard;
pub mod observers;
pub mod race;
pub mod scheduler;
pub mod session;
pub mod storage;
pub mod time;
pub mod track;
pub mod transform;
pub mod vehicle;
pub mod world;

pub use race::{RaceController, RaceError, RaceHost, RacePhase, RaceResult, RaceSettings};
pub use session::TimeTrialSession;

pub(crate) fn wrap_angle(mut radians: f32) -> f32 {
    let two_pi = 2.0 * std::f32::consts::PI;
    while radians > std::f32::consts::PI {
        radians -= two_pi;
    }
    while radians < -std::f32::consts::PI {
        radians += two_pi;
    }
    radians
}
