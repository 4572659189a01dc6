//! Execution timing for decision audit records

use std::time::{Duration, Instant};

/// Wall-clock timer for one engine invocation.
///
/// Feeds the `execution_time_ms` field of the decision log; kept separate
/// from the evaluation logic so evaluate/route stay clock-free.
#[derive(Debug, Clone)]
pub struct ExecutionTimer {
    started_at: Instant,
}

impl ExecutionTimer {
    /// Start timing now
    pub fn start() -> Self {
        Self {
            started_at: Instant::now(),
        }
    }

    /// Elapsed time since start
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Elapsed whole milliseconds, as stored on the decision log entry
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_is_monotonic() {
        let timer = ExecutionTimer::start();
        let first = timer.elapsed();
        std::thread::sleep(Duration::from_millis(2));
        assert!(timer.elapsed() >= first);
        assert!(timer.elapsed_ms() <= timer.elapsed().as_millis() as u64);
    }
}
