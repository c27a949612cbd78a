use crate::errors::MonitorError;
use crate::runtime::{Clock, ProcessTable};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Satisfied { polls: u64 },
    TimedOut { polls: u64 },
}

/// Checks immediately, then sleeps `interval` between checks until the check
/// returns true. With `max_wait` unset, or too large for the clock to
/// represent, this never gives up.
pub fn poll_until<F>(
    clock: &dyn Clock,
    interval: Duration,
    max_wait: Option<Duration>,
    mut check: F,
) -> Result<PollOutcome, MonitorError>
where
    F: FnMut() -> Result<bool, MonitorError>,
{
    let deadline = max_wait.and_then(|wait| clock.now().checked_add(wait));
    let mut polls = 0u64;
    loop {
        polls += 1;
        if check()? {
            return Ok(PollOutcome::Satisfied { polls });
        }
        let now = clock.now();
        let next = now.checked_add(interval).ok_or_else(|| {
            MonitorError::InvalidConfig(format!("poll interval {interval:?} overflows the clock"))
        })?;
        let wake = match deadline {
            Some(deadline) if now >= deadline => return Ok(PollOutcome::TimedOut { polls }),
            Some(deadline) => next.min(deadline),
            None => next,
        };
        clock.sleep_until(wake)?;
    }
}

/// Image-name based presence checks against the process table.
pub struct ProcessWatcher<'a> {
    table: &'a dyn ProcessTable,
    clock: &'a dyn Clock,
    max_wait: Option<Duration>,
}

impl<'a> ProcessWatcher<'a> {
    pub fn new(table: &'a dyn ProcessTable, clock: &'a dyn Clock) -> Self {
        Self {
            table,
            clock,
            max_wait: None,
        }
    }

    pub fn with_max_wait(mut self, max_wait: Option<Duration>) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn is_running(&self, image_name: &str) -> Result<bool, MonitorError> {
        self.table.is_running(image_name)
    }

    pub fn wait_for_start(
        &self,
        image_name: &str,
        interval: Duration,
    ) -> Result<PollOutcome, MonitorError> {
        self.wait_for(image_name, interval, true)
    }

    pub fn wait_for_stop(
        &self,
        image_name: &str,
        interval: Duration,
    ) -> Result<PollOutcome, MonitorError> {
        self.wait_for(image_name, interval, false)
    }

    // A failed query counts as "no change" so a transient table error can
    // neither fake a start nor end a live session.
    fn wait_for(
        &self,
        image_name: &str,
        interval: Duration,
        want_running: bool,
    ) -> Result<PollOutcome, MonitorError> {
        poll_until(self.clock, interval, self.max_wait, || {
            match self.is_running(image_name) {
                Ok(running) => {
                    debug!(process = image_name, running, "polled process table");
                    Ok(running == want_running)
                }
                Err(error) => {
                    warn!(process = image_name, %error, "process table query failed");
                    Ok(false)
                }
            }
        })
    }
}
