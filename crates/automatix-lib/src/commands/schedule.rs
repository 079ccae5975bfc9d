use log::info;
use std::thread;
use std::time::Duration;

use super::update::Updater;
use crate::domain::{PullRequestGateway, RepositoryTarget};
use crate::infrastructure::CommandRunner;

/// When update cycles run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// A single cycle, then return.
    Once,
    /// A cycle, then sleep for the interval, forever.
    Every(Duration),
}

impl Schedule {
    /// Schedule for a `periodic_interval_min` setting, `0` meaning a single run.
    #[must_use]
    pub fn from_minutes(minutes: u32) -> Self {
        if minutes == 0 {
            Self::Once
        } else {
            Self::Every(Duration::from_secs(u64::from(minutes) * 60))
        }
    }
}

/// Process every target once, in order. A failing repository does not stop
/// the others.
///
/// Returns `true` if no repository failed.
pub fn run_cycle<G, R>(updater: &Updater<G, R>, targets: &[RepositoryTarget]) -> bool
where
    G: PullRequestGateway,
    R: CommandRunner,
{
    info!("--");
    let mut success = true;
    for target in targets {
        if !updater.process_repository(target) {
            success = false;
        }
    }
    success
}

/// Run update cycles according to `schedule`.
///
/// With [`Schedule::Once`] the result of the single cycle is returned. With
/// [`Schedule::Every`] this never returns, failures are logged and retried in
/// the next cycle.
pub fn run<G, R>(updater: &Updater<G, R>, targets: &[RepositoryTarget], schedule: Schedule) -> bool
where
    G: PullRequestGateway,
    R: CommandRunner,
{
    loop {
        let success = run_cycle(updater, targets);

        let Schedule::Every(interval) = schedule else {
            return success;
        };

        info!("--");
        info!(
            "next module update check in {}min",
            interval.as_secs() / 60
        );
        thread::sleep(interval);
    }
}
