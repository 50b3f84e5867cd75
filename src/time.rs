/// World clock advanced by the frame driver. Race timing reads `elapsed_seconds` the way the
/// game reads world time, so a paused driver freezes every timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Time {
    elapsed: f64,
    pub delta: f32,
}

impl Time {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&mut self, delta: f32) {
        let delta = if delta.is_finite() { delta.max(0.0) } else { 0.0 };
        self.delta = delta;
        self.elapsed += delta as f64;
    }

    pub fn delta_seconds(&self) -> f32 {
        self.delta
    }

    pub fn elapsed_seconds(&self) -> f32 {
        self.elapsed as f32
    }
}
