/// Change-detection state machine: holds the last known fingerprint and the
/// count of unchanged checks, and decides what each fetch outcome means.
///
/// Performs no I/O and owns no timers; the runner feeds it fetch results and
/// carries out the returned [`Step`].
use crate::fetch::{FetchError, Fingerprint};

/// Unchanged checks between pulse notifications.
pub const PULSE_EVERY: u64 = 300;
/// Unchanged checks between local progress lines in pulse mode.
pub const PROGRESS_EVERY: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Seeding,
    Watching,
    Changed,
    Aborted,
}

/// How unchanged checks are reported. Pulse takes priority over debug.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Pulse,
    Debug,
    Default,
}

impl Verbosity {
    pub fn from_flags(pulse_check: bool, debug_mode: bool) -> Self {
        if pulse_check {
            Verbosity::Pulse
        } else if debug_mode {
            Verbosity::Debug
        } else {
            Verbosity::Default
        }
    }
}

/// What to do about one unchanged check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    Silent,
    /// Local progress line (pulse mode, every 10th check).
    Progress(String),
    /// "Still monitoring" notification (pulse mode, every 300th check).
    Pulse(String),
    /// Counter plus both fingerprints (debug mode).
    Diagnostic(String),
    /// Plain "no update" line (default mode).
    NoUpdate(String),
}

/// Outcome of feeding one fetch result to the watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Fetch failed; nothing changed.
    Skipped,
    Unchanged(Report),
    /// Content differs from the baseline; the watch is over.
    Changed {
        message: String,
        fingerprint: Fingerprint,
    },
    /// The watcher is not in the watching state.
    Stopped,
}

#[derive(Debug)]
pub struct Watcher {
    state: WatchState,
    fingerprint: Option<Fingerprint>,
    checks: u64,
    verbosity: Verbosity,
    label: String,
}

impl Watcher {
    pub fn new(source_url: &str, verbosity: Verbosity) -> Self {
        Self {
            state: WatchState::Seeding,
            fingerprint: None,
            checks: 0,
            verbosity,
            label: domain_label(source_url),
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    pub fn checks(&self) -> u64 {
        self.checks
    }

    #[allow(dead_code)]
    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        self.fingerprint.as_ref()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Record the baseline from the seed fetch.
    ///
    /// Moves to `Watching` on success and `Aborted` on failure. Has no effect
    /// outside the `Seeding` state.
    pub fn seed(&mut self, outcome: Result<Fingerprint, FetchError>) -> WatchState {
        if self.state != WatchState::Seeding {
            return self.state;
        }
        self.state = match outcome {
            Ok(fp) => {
                self.fingerprint = Some(fp);
                WatchState::Watching
            }
            Err(_) => WatchState::Aborted,
        };
        self.state
    }

    /// Compare one fetch result against the stored fingerprint.
    pub fn observe(&mut self, outcome: Result<Fingerprint, FetchError>) -> Step {
        if self.state != WatchState::Watching {
            return Step::Stopped;
        }
        let current = match outcome {
            Ok(fp) => fp,
            Err(_) => return Step::Skipped,
        };

        match &self.fingerprint {
            Some(last) if *last == current => {
                self.checks += 1;
                Step::Unchanged(self.report(&current, last))
            }
            _ => {
                self.fingerprint = Some(current.clone());
                self.state = WatchState::Changed;
                Step::Changed {
                    message: format!("The webpage at {} has been updated.", self.label),
                    fingerprint: current,
                }
            }
        }
    }

    fn report(&self, current: &Fingerprint, last: &Fingerprint) -> Report {
        let n = self.checks;
        match self.verbosity {
            Verbosity::Pulse if n % PULSE_EVERY == 0 => Report::Pulse(format!(
                "Still monitoring the webpage for updates. {n} checks made."
            )),
            Verbosity::Pulse if n % PROGRESS_EVERY == 0 => {
                Report::Progress(format!("Checked {n} times. No update detected."))
            }
            Verbosity::Pulse => Report::Silent,
            Verbosity::Debug => Report::Diagnostic(format!(
                "Search no.: {n}. Current hash: {current}, Last hash: {last}"
            )),
            Verbosity::Default => Report::NoUpdate(format!("No update detected at {}", self.label)),
        }
    }
}

/// Short label for notification text, e.g. `https://www.example.com/page` -> `example.com`.
///
/// Cosmetic only: strips the scheme and a `www.` prefix, then cuts at the first
/// `.com`. Without a `.com`, falls back to the host part of the URL.
pub fn domain_label(url: &str) -> String {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let rest = rest.rsplit_once("www.").map_or(rest, |(_, after)| after);

    match rest.find(".com") {
        Some(idx) => format!("{}.com", &rest[..idx]),
        None => rest
            .split(['/', '?', '#'])
            .next()
            .unwrap_or(rest)
            .to_string(),
    }
}
