//! Integration tests for the logging bootstrap
//!
//! The global subscriber can only be installed once per process, so the
//! install/reinstall sequence lives in a single test.

use bridge_traits::time::LogLevel;
use core_runtime::logging::{
    default_filter_directives, init_logging, redact_if_sensitive, LogFormat, LoggingConfig,
};
use core_runtime::Error;

#[test]
fn test_init_once_then_reject_second_install() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug)
        .with_spans(false);

    init_logging(config.clone()).expect("first install succeeds");

    let second = init_logging(config);
    assert!(matches!(second, Err(Error::Config(_))));
}

#[test]
fn test_format_selection() {
    #[cfg(debug_assertions)]
    assert_eq!(LogFormat::default(), LogFormat::Pretty);

    #[cfg(not(debug_assertions))]
    assert_eq!(LogFormat::default(), LogFormat::Json);
}

#[test]
fn test_default_filter_quietens_transport_crates() {
    let directives = default_filter_directives(LogLevel::Trace);
    for quiet in ["hyper=warn", "h2=warn", "sqlx=warn"] {
        assert!(directives.contains(quiet), "missing {quiet}");
    }
    assert!(directives.contains("core_transfer=trace"));
}

#[test]
fn test_credentials_never_pass_through() {
    assert_eq!(redact_if_sensitive("refresh_token", "1//0g"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("title", "Road Trip"), "Road Trip");
}
