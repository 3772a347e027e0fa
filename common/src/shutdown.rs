use std::{
    fmt::Display,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use tracing::{debug, warn};

/// Shared stop request, set from signal handlers and polled by the loop.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag {
    requested: Arc<AtomicBool>,
}

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` only for the call that flipped the flag.
    pub fn trigger(&self) -> bool {
        !self.requested.swap(true, Ordering::SeqCst)
    }

    pub fn is_triggered(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupFailure {
    pub step: &'static str,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub completed: Vec<&'static str>,
    pub failures: Vec<CleanupFailure>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Records the outcome of each teardown step. A failed step is logged and
/// never prevents the next one from running.
#[derive(Debug, Default)]
pub struct Cleanup {
    report: CleanupReport,
}

impl Cleanup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step<E: Display>(&mut self, name: &'static str, result: Result<(), E>) {
        match result {
            Ok(()) => {
                debug!(step = name, "cleanup step done");
                self.report.completed.push(name);
            }
            Err(err) => {
                warn!(step = name, "cleanup step failed: {err}");
                self.report.failures.push(CleanupFailure {
                    step: name,
                    error: err.to_string(),
                });
            }
        }
    }

    pub fn finish(self) -> CleanupReport {
        self.report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_reports_first_trigger_only() {
        let flag = ShutdownFlag::new();
        let observer = flag.clone();
        assert!(!observer.is_triggered());
        assert!(flag.trigger());
        assert!(!flag.trigger());
        assert!(observer.is_triggered());
    }

    #[test]
    fn failures_do_not_stop_later_steps() {
        let mut cleanup = Cleanup::new();
        cleanup.step::<String>("first", Ok(()));
        cleanup.step("second", Err("broker gone"));
        cleanup.step::<String>("third", Ok(()));
        let report = cleanup.finish();

        assert_eq!(report.completed, vec!["first", "third"]);
        assert_eq!(
            report.failures,
            vec![CleanupFailure {
                step: "second",
                error: "broker gone".to_string(),
            }]
        );
        assert!(!report.is_clean());
    }
}
