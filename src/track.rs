use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type GateId = u32;

#[derive(Debug, Error, PartialEq)]
pub enum TrackError {
    #[error("track has no gates")]
    NoGates,
    #[error("track needs exactly one finish line, found {0}")]
    FinishLineCount(usize),
    #[error("duplicate gate id {0}")]
    DuplicateGate(GateId),
}

/// A checkpoint the vehicle drives through. Passing the finish line counts a lap.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackGate {
    pub id: GateId,
    pub position: [f32; 3],
    pub radius: f32,
    #[serde(default)]
    pub finish_line: bool,
}

impl TrackGate {
    pub fn new(id: GateId, position: Vec3, radius: f32) -> Self {
        Self { id, position: position.to_array(), radius, finish_line: false }
    }

    pub fn finish(id: GateId, position: Vec3, radius: f32) -> Self {
        Self { finish_line: true, ..Self::new(id, position, radius) }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    pub fn contains(&self, point: Vec3) -> bool {
        self.position().distance_squared(point) <= self.radius * self.radius
    }
}

/// Ordered gate loop plus the lap count of the event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackLayout {
    pub name: String,
    pub total_laps: u32,
    gates: Vec<TrackGate>,
}

impl TrackLayout {
    pub fn new(name: impl Into<String>, total_laps: u32, gates: Vec<TrackGate>) -> Result<Self, TrackError> {
        if gates.is_empty() {
            return Err(TrackError::NoGates);
        }
        let finish_lines = gates.iter().filter(|gate| gate.finish_line).count();
        if finish_lines != 1 {
            return Err(TrackError::FinishLineCount(finish_lines));
        }
        for (i, gate) in gates.iter().enumerate() {
            if gates[..i].iter().any(|other| other.id == gate.id) {
                return Err(TrackError::DuplicateGate(gate.id));
            }
        }
        Ok(Self { name: name.into(), total_laps, gates })
    }

    /// Evenly spaced gates on a circle, gate 0 being the finish line.
    pub fn circuit(
        name: impl Into<String>,
        total_laps: u32,
        radius: f32,
        gate_count: u32,
        gate_radius: f32,
    ) -> Result<Self, TrackError> {
        let gates = (0..gate_count)
            .map(|i| {
                let angle = i as f32 / gate_count as f32 * std::f32::consts::TAU;
                let position = Vec3::new(radius * angle.cos(), radius * angle.sin(), 0.0);
                if i == 0 {
                    TrackGate::finish(i, position, gate_radius)
                } else {
                    TrackGate::new(i, position, gate_radius)
                }
            })
            .collect();
        Self::new(name, total_laps, gates)
    }

    pub fn gates(&self) -> &[TrackGate] {
        &self.gates
    }

    pub fn gate(&self, id: GateId) -> Option<&TrackGate> {
        self.gates.iter().find(|gate| gate.id == id)
    }

    pub fn finish_line(&self) -> &TrackGate {
        self.gates.iter().find(|gate| gate.finish_line).unwrap_or(&self.gates[0])
    }

    pub fn is_finish_line(&self, id: GateId) -> bool {
        self.gate(id).is_some_and(|gate| gate.finish_line)
    }

    /// The gate that follows `id` in driving order, wrapping around the loop.
    pub fn next_marker(&self, id: GateId) -> Option<GateId> {
        let index = self.gates.iter().position(|gate| gate.id == id)?;
        Some(self.gates[(index + 1) % self.gates.len()].id)
    }

    /// First gate whose trigger volume contains `point`.
    pub fn gate_at(&self, point: Vec3) -> Option<GateId> {
        self.gates.iter().find(|gate| gate.contains(point)).map(|gate| gate.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_layouts_without_single_finish_line() {
        assert_eq!(TrackLayout::new("empty", 1, vec![]).unwrap_err(), TrackError::NoGates);
        let no_finish = vec![TrackGate::new(0, Vec3::ZERO, 1.0)];
        assert_eq!(TrackLayout::new("t", 1, no_finish).unwrap_err(), TrackError::FinishLineCount(0));
        let dup = vec![TrackGate::finish(0, Vec3::ZERO, 1.0), TrackGate::new(0, Vec3::X, 1.0)];
        assert_eq!(TrackLayout::new("t", 1, dup).unwrap_err(), TrackError::DuplicateGate(0));
    }

    #[test]
    fn circuit_needs_at_least_one_gate() {
        assert_eq!(TrackLayout::circuit("ring", 1, 100.0, 0, 5.0).unwrap_err(), TrackError::NoGates);
        let single = TrackLayout::circuit("ring", 1, 100.0, 1, 5.0).expect("track");
        assert_eq!(single.next_marker(0), Some(0));
    }

    #[test]
    fn next_marker_wraps_around() {
        let track = TrackLayout::circuit("ring", 3, 100.0, 4, 5.0).expect("track");
        assert_eq!(track.finish_line().id, 0);
        assert_eq!(track.next_marker(0), Some(1));
        assert_eq!(track.next_marker(3), Some(0));
        assert_eq!(track.next_marker(42), None);
    }

    #[test]
    fn gate_detection_uses_radius() {
        let track = TrackLayout::circuit("ring", 1, 100.0, 4, 5.0).expect("track");
        assert_eq!(track.gate_at(Vec3::new(98.0, 1.0, 0.0)), Some(0));
        assert_eq!(track.gate_at(Vec3::new(0.0, 0.0, 0.0)), None);
        assert!(track.is_finish_line(0));
        assert!(!track.is_finish_line(2));
    }
}
