/// Identifies a timer registered with [`Scheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

#[derive(Debug, Clone)]
struct TimerSlot {
    handle: TimerHandle,
    interval: f32,
    remaining: f32,
    repeating: bool,
}

/// Frame-driven timers. Callers own the reaction: `tick` reports which handles fired.
#[derive(Debug, Default)]
pub struct Scheduler {
    timers: Vec<TimerSlot>,
    next_id: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_timer(&mut self, interval: f32, repeating: bool) -> TimerHandle {
        let interval = interval.max(f32::EPSILON);
        self.next_id += 1;
        let handle = TimerHandle(self.next_id);
        self.timers.push(TimerSlot { handle, interval, remaining: interval, repeating });
        handle
    }

    pub fn clear_timer(&mut self, handle: TimerHandle) -> bool {
        let before = self.timers.len();
        self.timers.retain(|slot| slot.handle != handle);
        self.timers.len() != before
    }

    pub fn clear_all(&mut self) {
        self.timers.clear();
    }

    pub fn is_active(&self, handle: TimerHandle) -> bool {
        self.timers.iter().any(|slot| slot.handle == handle)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Advances every timer by `delta`. A repeating timer fires at most once per call and keeps
    /// its leftover time; one-shot timers are removed after firing.
    pub fn tick(&mut self, delta: f32) -> Vec<TimerHandle> {
        let mut fired = Vec::new();
        if !(delta > 0.0) {
            return fired;
        }
        for slot in &mut self.timers {
            slot.remaining -= delta;
            if slot.remaining <= 0.0 {
                fired.push(slot.handle);
                if slot.repeating {
                    slot.remaining = (slot.remaining + slot.interval).max(0.0);
                    if slot.remaining <= 0.0 {
                        slot.remaining = slot.interval;
                    }
                }
            }
        }
        self.timers.retain(|slot| slot.repeating || slot.remaining > 0.0);
        fired
    }
}
