//! Tests for src/error/mod.rs - NcError

use netcheck::error::{NcError, ResultExt};
use std::time::Duration;

#[test]
fn test_not_found_error_display() {
    let err = NcError::NotFound {
        kind: "spec".to_string(),
        name: "bridge".to_string(),
    };
    let display = format!("{}", err);
    assert!(display.contains("Resource not found"));
    assert!(display.contains("spec/bridge"));
}

#[test]
fn test_ambiguous_match_error_display() {
    let err = NcError::AmbiguousMatch {
        pattern: "reach".to_string(),
        matches: vec!["spec-1".to_string(), "spec-2".to_string()],
    };
    let display = format!("{}", err);
    assert!(display.contains("Multiple matches"));
    assert!(display.contains("spec-1, spec-2"));
}

#[test]
fn test_timeout_error_display() {
    let err = NcError::Timeout {
        description: "job netcheck-tcp-abcde to end as Succeeded".to_string(),
        timeout: Duration::from_secs(90),
    };
    let display = format!("{}", err);
    assert!(display.contains("90s"));
    assert!(display.contains("netcheck-tcp-abcde"));
}

#[test]
fn test_unexpected_job_outcome_display() {
    let err = NcError::UnexpectedJobOutcome {
        name: "netcheck-tcp-x".to_string(),
        expected: "Failed".to_string(),
        actual: "Succeeded".to_string(),
    };
    assert_eq!(
        err.to_string(),
        "Job netcheck-tcp-x ended as Succeeded, expected Failed"
    );
}

#[test]
fn test_vmi_failed_display() {
    let err = NcError::VmiFailed {
        name: "testvmi-abcde".to_string(),
        phase: "Failed".to_string(),
    };
    assert!(err.to_string().contains("testvmi-abcde"));
    assert!(err.to_string().contains("terminal phase Failed"));
}

#[test]
fn test_is_skip() {
    assert!(NcError::Skipped("no IPv6".to_string()).is_skip());
    assert!(!NcError::Assertion("x".to_string()).is_skip());
}

#[test]
fn test_context_wraps_failures() {
    let err = NcError::Config("bad".to_string()).context("loading");
    match err {
        NcError::Assertion(msg) => {
            assert!(msg.starts_with("loading: "));
            assert!(msg.contains("bad"));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_context_keeps_skips() {
    let err = NcError::Skipped("cluster does not support IPv6".to_string()).context("ignored");
    assert!(err.is_skip());
}

#[test]
fn test_expect_that_annotates_errors() {
    let result: Result<(), NcError> = Err(NcError::Timeout {
        description: "VMI testvmi-x to be gone".to_string(),
        timeout: Duration::from_secs(120),
    });
    let err = result.expect_that("The VMI should be gone within the given timeout").unwrap_err();
    assert!(err.to_string().contains("The VMI should be gone within the given timeout"));
    assert!(err.to_string().contains("testvmi-x"));
}

#[test]
fn test_io_error_conversion() {
    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let err: NcError = io.into();
    assert!(matches!(err, NcError::Io(_)));
}

#[test]
fn test_json_error_conversion() {
    let parse = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
    let err: NcError = parse.into();
    assert!(matches!(err, NcError::Serialization(_)));
}
