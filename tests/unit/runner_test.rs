//! Tests for src/suite - spec selection, runner lifecycle and outcome mapping
//!
//! Runners here have no cluster client; specs that need one fail.

use async_trait::async_trait;
use netcheck::config::{Parallelism, SuiteConfig};
use netcheck::error::{NcError, Result};
use netcheck::reporter::Reporter;
use netcheck::suite::{
    functional_suite, Runner, Spec, SpecFilter, SpecReport, SpecState, Suite, SuiteHooks, SuiteReport,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn config() -> SuiteConfig {
    SuiteConfig {
        spec_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

fn passing(text: &str) -> Spec {
    Spec::new(&["[sig-network] Fake"], text, |_ctx| async { Ok(()) })
}

fn failing(text: &str) -> Spec {
    Spec::new(&["[sig-network] Fake"], text, |_ctx| async {
        Err(NcError::Assertion("connectivity is expected to the exposed service".to_string()))
    })
}

fn states(report: &SuiteReport) -> Vec<SpecState> {
    report.specs.iter().map(|s| s.state).collect()
}

/// Records every reporter callback
#[derive(Clone, Default)]
struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Reporter for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    async fn spec_will_run(&mut self, spec: &SpecReport) -> Result<()> {
        self.events.lock().unwrap().push(format!("will_run {}", spec.text));
        Ok(())
    }

    async fn spec_did_complete(&mut self, spec: &SpecReport) -> Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(format!("did_complete {} {}", spec.text, spec.state));
        Ok(())
    }

    async fn suite_did_end(&mut self, suite: &SuiteReport) -> Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(format!("suite_did_end {}", suite.specs.len()));
        Ok(())
    }
}

/// Reporter that fails every callback
struct Broken;

#[async_trait]
impl Reporter for Broken {
    fn name(&self) -> &str {
        "broken"
    }

    async fn spec_did_complete(&mut self, _spec: &SpecReport) -> Result<()> {
        Err(NcError::Config("disk full".to_string()))
    }
}

struct Hooks {
    fail_setup: bool,
    fail_teardown: bool,
    calls: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl SuiteHooks for Hooks {
    fn name(&self) -> &str {
        "fake-namespace"
    }

    async fn before_suite(&self) -> Result<()> {
        self.calls.lock().unwrap().push("before");
        if self.fail_setup {
            return Err(NcError::SuiteSetup("namespace creation forbidden".to_string()));
        }
        Ok(())
    }

    async fn after_suite(&self) -> Result<()> {
        self.calls.lock().unwrap().push("after");
        if self.fail_teardown {
            return Err(NcError::Timeout {
                description: "namespace to be gone".to_string(),
                timeout: Duration::from_secs(120),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Outcome mapping
// ============================================================================

#[tokio::test]
async fn test_pass_fail_and_skip() {
    let mut suite = Suite::new("Tests Suite");
    suite.add(passing("passes"));
    suite.add(failing("fails"));
    suite.add(Spec::new(&["Fake"], "skips", |_ctx| async {
        Err(NcError::Skipped("cluster does not support IPv6".to_string()))
    }));

    let report = Runner::new(config(), None).run(&suite, &SpecFilter::default()).await;

    assert_eq!(states(&report), vec![SpecState::Passed, SpecState::Failed, SpecState::Skipped]);
    assert!(report.specs[1]
        .failure
        .as_deref()
        .unwrap()
        .contains("connectivity is expected"));
    assert_eq!(
        report.specs[2].failure.as_deref(),
        Some("Skipped: cluster does not support IPv6")
    );
    assert!(!report.succeeded());
    let counts = report.counts();
    assert_eq!((counts.passed, counts.failed, counts.skipped), (1, 1, 1));
}

#[tokio::test]
async fn test_spec_without_client_fails() {
    let mut suite = Suite::new("Tests Suite");
    suite.add(Spec::new(&["Fake"], "needs a cluster", |ctx| async move {
        ctx.client()?;
        Ok(())
    }));

    let report = Runner::new(config(), None).run(&suite, &SpecFilter::default()).await;
    assert_eq!(report.specs[0].state, SpecState::Failed);
    assert!(report.specs[0].failure.as_deref().unwrap().contains("no cluster client"));
}

#[tokio::test]
async fn test_panic_is_caught() {
    let mut suite = Suite::new("Tests Suite");
    suite.add(Spec::new(&["Fake"], "panics", |_ctx| async {
        if true {
            panic!("the VMI object must exist in order to be deleted");
        }
        Ok(())
    }));
    suite.add(passing("still runs"));

    let report = Runner::new(config(), None).run(&suite, &SpecFilter::default()).await;
    assert_eq!(states(&report), vec![SpecState::Panicked, SpecState::Passed]);
    assert!(report.specs[0]
        .failure
        .as_deref()
        .unwrap()
        .contains("the VMI object must exist"));
    assert_eq!(report.counts().errored, 1);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_still_runs_cleanups() {
    let cleaned = Arc::new(Mutex::new(false));
    let flag = cleaned.clone();

    let mut suite = Suite::new("Tests Suite");
    suite.add(Spec::new(&["Fake"], "hangs", move |ctx| {
        let flag = flag.clone();
        async move {
            ctx.defer_cleanup("mark", async move {
                *flag.lock().unwrap() = true;
                Ok(())
            });
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }));

    let report = Runner::new(config(), None).run(&suite, &SpecFilter::default()).await;
    assert_eq!(report.specs[0].state, SpecState::TimedOut);
    assert!(*cleaned.lock().unwrap());
}

// ============================================================================
// Deferred cleanups
// ============================================================================

#[tokio::test]
async fn test_cleanups_run_last_registered_first() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let o = order.clone();

    let mut suite = Suite::new("Tests Suite");
    suite.add(Spec::new(&["Fake"], "cleans up", move |ctx| {
        let o = o.clone();
        async move {
            let vmi = o.clone();
            ctx.defer_cleanup("VMI", async move {
                vmi.lock().unwrap().push("vmi");
                Ok(())
            });
            let service = o.clone();
            ctx.defer_cleanup("Service", async move {
                service.lock().unwrap().push("service");
                Ok(())
            });
            let job = o.clone();
            ctx.defer_cleanup("Job", async move {
                job.lock().unwrap().push("job");
                Ok(())
            });
            Ok(())
        }
    }));

    let report = Runner::new(config(), None).run(&suite, &SpecFilter::default()).await;
    assert_eq!(report.specs[0].state, SpecState::Passed);
    assert_eq!(*order.lock().unwrap(), vec!["job", "service", "vmi"]);
    assert!(report.specs[0]
        .captured_output
        .iter()
        .any(|l| l.contains("Cleanup: VMI")));
}

#[tokio::test]
async fn test_cleanup_failure_fails_passing_spec() {
    let mut suite = Suite::new("Tests Suite");
    suite.add(Spec::new(&["Fake"], "leaks", |ctx| async move {
        ctx.defer_cleanup("Service myservice", async {
            Err(NcError::Assertion(
                "cleaning up the Service entity should have succeeded".to_string(),
            ))
        });
        Ok(())
    }));

    let report = Runner::new(config(), None).run(&suite, &SpecFilter::default()).await;
    assert_eq!(report.specs[0].state, SpecState::Failed);
    let failure = report.specs[0].failure.as_deref().unwrap();
    assert!(failure.contains("cleanup failed"));
    assert!(failure.contains("Service myservice"));
}

#[tokio::test]
async fn test_cleanup_failure_keeps_original_failure() {
    let mut suite = Suite::new("Tests Suite");
    suite.add(Spec::new(&["Fake"], "fails twice", |ctx| async move {
        ctx.defer_cleanup("Job", async { Err(NcError::Config("gone wrong".to_string())) });
        Err(NcError::Assertion("job never finished".to_string()))
    }));

    let report = Runner::new(config(), None).run(&suite, &SpecFilter::default()).await;
    let failure = report.specs[0].failure.as_deref().unwrap();
    assert!(failure.contains("job never finished"));
    assert!(failure.contains("gone wrong"));
}

// ============================================================================
// Scheduling
// ============================================================================

#[tokio::test]
async fn test_fail_fast_skips_remaining() {
    let mut suite = Suite::new("Tests Suite");
    suite.add(passing("one"));
    suite.add(failing("two"));
    suite.add(passing("three"));

    let config = SuiteConfig {
        fail_fast: true,
        ..config()
    };
    let report = Runner::new(config, None).run(&suite, &SpecFilter::default()).await;
    assert_eq!(
        states(&report),
        vec![SpecState::Passed, SpecState::Failed, SpecState::Skipped]
    );
}

#[tokio::test]
async fn test_parallel_process_runs_its_shard() {
    let mut suite = Suite::new("Tests Suite");
    for text in ["a", "b", "c", "d", "e"] {
        suite.add(passing(text));
    }
    let config = SuiteConfig {
        parallel: Parallelism::new(2, 2).unwrap(),
        ..config()
    };
    let report = Runner::new(config, None).run(&suite, &SpecFilter::default()).await;
    let texts: Vec<&str> = report.specs.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, vec!["b", "d"]);
    assert!(report.specs.iter().all(|s| s.process == 2));
    assert_eq!(report.parallel_total, 2);
}

#[tokio::test]
async fn test_filter_applies_before_sharding() {
    let mut suite = Suite::new("Tests Suite");
    suite.add(passing("[test_id:1] a"));
    suite.add(passing("[test_id:2] b"));
    suite.add(passing("[test_id:3] c"));

    let filter = SpecFilter {
        skip: vec!["[test_id:2]".to_string()],
        ..Default::default()
    };
    let report = Runner::new(config(), None).run(&suite, &filter).await;
    let indices: Vec<usize> = report.specs.iter().map(|s| s.index).collect();
    assert_eq!(indices, vec![0, 2]);
    assert_eq!(report.specs[1].test_id.as_deref(), Some("3"));
}

// ============================================================================
// Hooks and reporters
// ============================================================================

#[tokio::test]
async fn test_setup_failure_fails_every_spec() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let mut suite = Suite::new("Tests Suite");
    suite.add(passing("one"));
    suite.add(passing("two"));

    let report = Runner::new(config(), None)
        .with_hooks(Hooks {
            fail_setup: true,
            fail_teardown: false,
            calls: calls.clone(),
        })
        .run(&suite, &SpecFilter::default())
        .await;

    assert_eq!(states(&report), vec![SpecState::Failed, SpecState::Failed]);
    assert!(report.setup_failure.as_deref().unwrap().contains("namespace creation forbidden"));
    assert!(report.specs[0].failure.as_deref().unwrap().starts_with("suite setup failed"));
    assert_eq!(*calls.lock().unwrap(), vec!["before", "after"]);
}

#[tokio::test]
async fn test_teardown_failure_fails_the_run() {
    let mut suite = Suite::new("Tests Suite");
    suite.add(passing("one"));

    let report = Runner::new(config(), None)
        .with_hooks(Hooks {
            fail_setup: false,
            fail_teardown: true,
            calls: Arc::new(Mutex::new(Vec::new())),
        })
        .run(&suite, &SpecFilter::default())
        .await;

    assert_eq!(report.specs[0].state, SpecState::Passed);
    assert!(report.teardown_failure.is_some());
    assert!(!report.succeeded());
}

#[tokio::test]
async fn test_reporters_see_every_callback() {
    let recorder = Recorder::default();
    let events = recorder.events.clone();

    let mut suite = Suite::new("Tests Suite");
    suite.add(passing("one"));
    suite.add(failing("two"));

    let report = Runner::new(config(), None)
        .with_reporter(Broken)
        .with_reporter(recorder)
        .run(&suite, &SpecFilter::default())
        .await;

    assert_eq!(report.specs.len(), 2);
    assert_eq!(
        *events.lock().unwrap(),
        vec![
            "will_run one".to_string(),
            "did_complete one Passed".to_string(),
            "will_run two".to_string(),
            "did_complete two Failed".to_string(),
            "suite_did_end 2".to_string(),
        ]
    );
}

/// Records whether the spec's cleanup had already run at each callback
struct CleanupObserver {
    cleaned: Arc<Mutex<bool>>,
    seen: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Reporter for CleanupObserver {
    fn name(&self) -> &str {
        "cleanup-observer"
    }

    async fn spec_body_did_complete(&mut self, spec: &SpecReport) -> Result<()> {
        let cleaned = *self.cleaned.lock().unwrap();
        self.seen
            .lock()
            .unwrap()
            .push(format!("body {} cleaned={}", spec.state, cleaned));
        Ok(())
    }

    async fn spec_did_complete(&mut self, spec: &SpecReport) -> Result<()> {
        let cleaned = *self.cleaned.lock().unwrap();
        self.seen
            .lock()
            .unwrap()
            .push(format!("complete {} cleaned={}", spec.state, cleaned));
        Ok(())
    }
}

#[tokio::test]
async fn test_body_outcome_reported_before_cleanups() {
    let cleaned = Arc::new(Mutex::new(false));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let flag = cleaned.clone();

    let mut suite = Suite::new("Tests Suite");
    suite.add(Spec::new(&["Fake"], "fails with objects", move |ctx| {
        let flag = flag.clone();
        async move {
            ctx.by("creating the VMI");
            ctx.defer_cleanup("VMI", async move {
                *flag.lock().unwrap() = true;
                Ok(())
            });
            Err(NcError::Assertion("connectivity is expected to the exposed service".to_string()))
        }
    }));

    let report = Runner::new(config(), None)
        .with_reporter(CleanupObserver {
            cleaned: cleaned.clone(),
            seen: seen.clone(),
        })
        .run(&suite, &SpecFilter::default())
        .await;

    assert_eq!(report.specs[0].state, SpecState::Failed);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            "body Failed cleaned=false".to_string(),
            "complete Failed cleaned=true".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_cleanup_failure_only_visible_after_cleanups() {
    let seen = Arc::new(Mutex::new(Vec::new()));

    let mut suite = Suite::new("Tests Suite");
    suite.add(Spec::new(&["Fake"], "leaks", |ctx| async move {
        ctx.defer_cleanup("Job", async {
            Err(NcError::Assertion(
                "cleaning up the Job entity should have succeeded".to_string(),
            ))
        });
        Ok(())
    }));

    Runner::new(config(), None)
        .with_reporter(CleanupObserver {
            cleaned: Arc::new(Mutex::new(false)),
            seen: seen.clone(),
        })
        .run(&suite, &SpecFilter::default())
        .await;

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            "body Passed cleaned=false".to_string(),
            "complete Failed cleaned=false".to_string(),
        ]
    );
}

// ============================================================================
// Functional suite
// ============================================================================

#[test]
fn test_functional_suite_registration() {
    let suite = functional_suite();
    assert_eq!(suite.name, "Tests Suite");
    assert_eq!(suite.specs().len(), 6);
    assert!(suite
        .full_texts()
        .iter()
        .all(|t| t.starts_with("[sig-network] Services ")));
}

#[test]
fn test_functional_suite_focus() {
    let suite = functional_suite();
    let filter = SpecFilter {
        focus: vec!["bridge interface binding".to_string()],
        ..Default::default()
    };
    let selected = suite.select(&filter);
    assert_eq!(selected.len(), 3);
    assert_eq!(selected.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![0, 1, 2]);
}
