//! Timing of the compiler stages, for performance debugging.

//! Only active if the `GAIKAN_TIME_GUARD` env var is set to a truthy
//! value or `enabled_set(true)` was called in the thread. When
//! active, a `StageTimes` prints one line per stage plus the total
//! when dropped.

use std::{time::{Instant, Duration}, cell::Cell};

thread_local!{
    pub static ENABLED: Cell<bool> = Cell::new(
        crate::options::env_flag("GAIKAN_TIME_GUARD").ok().flatten().unwrap_or(false));
}

/// Enable stage timing in this thread.
pub fn enabled_set(on: bool) {
    ENABLED.with(|cell| cell.set(on))
}

pub fn enabled() -> bool {
    ENABLED.with(|old| old.get())
}

pub enum StageTimes {
    Disabled,
    Enabled {
        name: &'static str,
        start: Instant,
        stages: Vec<(&'static str, Duration)>,
    },
}

impl StageTimes {
    pub fn new(name: &'static str) -> Self {
        if enabled() {
            StageTimes::Enabled { name, start: Instant::now(), stages: Vec::new() }
        } else {
            StageTimes::Disabled
        }
    }

    /// Run `f`, recording its duration under `stage`.
    pub fn stage<T>(&mut self, stage: &'static str, f: impl FnOnce() -> T) -> T {
        match self {
            StageTimes::Disabled => f(),
            StageTimes::Enabled { stages, .. } => {
                let now = Instant::now();
                let r = f();
                stages.push((stage, now.elapsed()));
                r
            }
        }
    }
}

impl Drop for StageTimes {
    fn drop(&mut self) {
        match self {
            StageTimes::Disabled => (),
            StageTimes::Enabled { name, start, stages } => {
                for (stage, elapsed) in stages.iter() {
                    eprintln!("time {name}/{stage}: {elapsed:?}");
                }
                eprintln!("time {name}: {:?}", start.elapsed());
            },
        }
    }
}
