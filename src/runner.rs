/// Main monitoring loop: seed, then sleep / fetch / compare until the page changes.
use crate::config::Settings;
use crate::fetch::{FetchError, Fingerprint, PageFetcher};
use crate::notify::Notifier;
use crate::watcher::{Report, Step, WatchState, Watcher};

/// How a completed run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Unchanged checks made before the change was seen.
    pub checks: u64,
    /// Fingerprint of the changed page.
    pub fingerprint: Fingerprint,
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("initial fetch failed, nothing to compare against: {0}")]
    SeedFetch(#[source] FetchError),
    #[error("watcher left the watching state unexpectedly ({0:?})")]
    Stopped(WatchState),
}

/// Watch `settings.source_url` until its content changes.
///
/// A failed seed fetch is fatal. Later fetch failures skip the check,
/// and notification failures are logged by the notifier and otherwise ignored.
pub async fn run<F, N>(
    settings: &Settings,
    fetcher: &F,
    notifier: &N,
) -> Result<RunOutcome, RunError>
where
    F: PageFetcher + ?Sized,
    N: Notifier + ?Sized,
{
    let url = settings.source_url.as_str();
    let mut watcher = Watcher::new(url, settings.verbosity);

    let baseline = fetcher.fetch(url).await.map_err(RunError::SeedFetch)?;
    watcher.seed(Ok(baseline));
    tracing::info!(
        url,
        label = watcher.label(),
        interval_secs = settings.check_interval.as_secs(),
        verbosity = ?settings.verbosity,
        "baseline recorded, watching for changes"
    );

    loop {
        tokio::time::sleep(settings.check_interval).await;

        let outcome = fetcher.fetch(url).await;
        match watcher.observe(outcome) {
            Step::Skipped => {
                tracing::debug!(checks = watcher.checks(), "check skipped after fetch error");
            }
            Step::Unchanged(report) => emit(report, notifier).await,
            Step::Changed {
                message,
                fingerprint,
            } => {
                tracing::info!(
                    url,
                    checks = watcher.checks(),
                    %fingerprint,
                    "page content changed"
                );
                println!("{message}");
                let _ = notifier.notify(&message).await;
                return Ok(RunOutcome {
                    checks: watcher.checks(),
                    fingerprint,
                });
            }
            Step::Stopped => return Err(RunError::Stopped(watcher.state())),
        }
    }
}

async fn emit<N>(report: Report, notifier: &N)
where
    N: Notifier + ?Sized,
{
    match report {
        Report::Silent => {}
        Report::Pulse(message) => {
            let _ = notifier.notify(&message).await;
        }
        Report::Progress(line) | Report::Diagnostic(line) | Report::NoUpdate(line) => {
            println!("{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PushoverConfig;
    use crate::fetch::fingerprint;
    use crate::notify::NotifyError;
    use crate::watcher::Verbosity;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replays a fixed list of fetch results; `None` is a failed fetch.
    /// Panics when fetched past the end, i.e. if polling continued after a change.
    struct ScriptedFetcher {
        script: Mutex<VecDeque<Option<&'static str>>>,
        calls: Mutex<usize>,
    }

    impl ScriptedFetcher {
        fn new(script: Vec<Option<&'static str>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl PageFetcher for ScriptedFetcher {
        async fn fetch(&self, url: &str) -> Result<Fingerprint, FetchError> {
            *self.calls.lock().unwrap() += 1;
            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .expect("fetched after script ended");
            match next {
                Some(body) => Ok(fingerprint(body)),
                None => Err(FetchError::Transport {
                    url: url.to_string(),
                    message: "simulated outage".to_string(),
                }),
            }
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        messages: Mutex<Vec<String>>,
        fail: bool,
    }

    impl RecordingNotifier {
        fn messages(&self) -> Vec<String> {
            self.messages.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, message: &str) -> Result<(), NotifyError> {
            self.messages.lock().unwrap().push(message.to_string());
            if self.fail {
                Err(NotifyError::MissingCredentials)
            } else {
                Ok(())
            }
        }
    }

    fn settings(verbosity: Verbosity) -> Settings {
        Settings {
            source_url: "https://www.example.com/page".to_string(),
            check_interval: Duration::ZERO,
            verbosity,
            pushover: PushoverConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_seed_failure_aborts_without_notifying() {
        let fetcher = ScriptedFetcher::new(vec![None]);
        let notifier = RecordingNotifier::default();

        let err = run(&settings(Verbosity::Default), &fetcher, &notifier)
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::SeedFetch(_)));
        assert_eq!(fetcher.calls(), 1);
        assert!(notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn test_change_notifies_once_and_stops_fetching() {
        let fetcher = ScriptedFetcher::new(vec![
            Some("v1"),
            Some("v1"),
            Some("v1"),
            Some("v2"),
            Some("v3"),
        ]);
        let notifier = RecordingNotifier::default();

        let outcome = run(&settings(Verbosity::Default), &fetcher, &notifier)
            .await
            .unwrap();
        assert_eq!(outcome.checks, 2);
        assert_eq!(outcome.fingerprint, fingerprint("v2"));
        assert_eq!(fetcher.calls(), 4);
        assert_eq!(
            notifier.messages(),
            vec!["The webpage at example.com has been updated.".to_string()]
        );
    }

    #[tokio::test]
    async fn test_failed_checks_are_skipped() {
        let fetcher = ScriptedFetcher::new(vec![
            Some("v1"),
            None,
            Some("v1"),
            None,
            None,
            Some("v1"),
            Some("v2"),
        ]);
        let notifier = RecordingNotifier::default();

        let outcome = run(&settings(Verbosity::Debug), &fetcher, &notifier)
            .await
            .unwrap();
        // Only the two successful unchanged fetches count.
        assert_eq!(outcome.checks, 2);
        assert_eq!(notifier.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_pulse_mode_sends_one_pulse_per_300_checks() {
        let mut script = vec![Some("v1"); 1 + 600];
        script.push(Some("v2"));
        let fetcher = ScriptedFetcher::new(script);
        let notifier = RecordingNotifier::default();

        let outcome = run(&settings(Verbosity::Pulse), &fetcher, &notifier)
            .await
            .unwrap();
        assert_eq!(outcome.checks, 600);
        assert_eq!(
            notifier.messages(),
            vec![
                "Still monitoring the webpage for updates. 300 checks made.".to_string(),
                "Still monitoring the webpage for updates. 600 checks made.".to_string(),
                "The webpage at example.com has been updated.".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_stop_watching() {
        let mut script = vec![Some("v1"); 1 + 300];
        script.push(Some("v1"));
        script.push(Some("v2"));
        let fetcher = ScriptedFetcher::new(script);
        let notifier = RecordingNotifier {
            fail: true,
            ..Default::default()
        };

        let outcome = run(&settings(Verbosity::Pulse), &fetcher, &notifier)
            .await
            .unwrap();
        assert_eq!(outcome.checks, 301);
        assert_eq!(notifier.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_unchanged_checks_never_notify_outside_pulse_mode() {
        let mut script = vec![Some("same"); 1 + 350];
        script.push(Some("changed"));
        for verbosity in [Verbosity::Debug, Verbosity::Default] {
            let fetcher = ScriptedFetcher::new(script.clone());
            let notifier = RecordingNotifier::default();
            let outcome = run(&settings(verbosity), &fetcher, &notifier).await.unwrap();
            assert_eq!(outcome.checks, 350);
            assert_eq!(notifier.messages().len(), 1);
        }
    }
}
