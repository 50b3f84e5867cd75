use crate::leaderboard::format_race_time;
use crate::world::EntityHandle;
use bevy_ecs::prelude::Resource;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum RaceEvent {
    RaceStarted { world_time: f32 },
    LapUpdated { lap: u32, world_time: f32 },
    RaceFinished { total_time: f32, best_lap: Option<f32> },
    NewLeaderboardRecord { made_top: bool },
    GhostSpawned { entity: EntityHandle, best_time: f32 },
    GhostSaved { best_time: f32, frames: usize },
}

impl RaceEvent {
    pub fn label(&self) -> &'static str {
        match self {
            RaceEvent::RaceStarted { .. } => "RaceStarted",
            RaceEvent::LapUpdated { .. } => "LapUpdated",
            RaceEvent::RaceFinished { .. } => "RaceFinished",
            RaceEvent::NewLeaderboardRecord { .. } => "NewLeaderboardRecord",
            RaceEvent::GhostSpawned { .. } => "GhostSpawned",
            RaceEvent::GhostSaved { .. } => "GhostSaved",
        }
    }
}

impl fmt::Display for RaceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RaceEvent::RaceStarted { world_time } => write!(f, "RaceStarted world_time={world_time:.3}"),
            RaceEvent::LapUpdated { lap, world_time } => {
                write!(f, "LapUpdated lap={lap} world_time={world_time:.3}")
            }
            RaceEvent::RaceFinished { total_time, best_lap } => match best_lap {
                Some(best) => write!(
                    f,
                    "RaceFinished total={} best_lap={}",
                    format_race_time(*total_time),
                    format_race_time(*best)
                ),
                None => write!(f, "RaceFinished total={} best_lap=none", format_race_time(*total_time)),
            },
            RaceEvent::NewLeaderboardRecord { made_top } => write!(f, "NewLeaderboardRecord made_top={made_top}"),
            RaceEvent::GhostSpawned { entity, best_time } => {
                write!(f, "GhostSpawned entity={} best={}", entity.index(), format_race_time(*best_time))
            }
            RaceEvent::GhostSaved { best_time, frames } => {
                write!(f, "GhostSaved best={} frames={frames}", format_race_time(*best_time))
            }
        }
    }
}

#[derive(Default, Resource)]
pub struct EventBus {
    events: Vec<RaceEvent>,
}

impl EventBus {
    pub fn push(&mut self, event: RaceEvent) {
        self.events.push(event);
    }

    pub fn pending(&self) -> &[RaceEvent] {
        &self.events
    }

    pub fn drain(&mut self) -> Vec<RaceEvent> {
        self.events.drain(..).collect()
    }
}
