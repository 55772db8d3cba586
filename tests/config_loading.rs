// tests/config_loading.rs

use std::io::Write;
use std::time::Duration;

use tempfile::{NamedTempFile, TempDir};
use watchpool::config::{load_and_validate, load_from_path, Configurer, PoolConfig};
use watchpool::errors::WatchpoolError;
use watchpool::types::{parse_duration, MatchTarget, PayloadMode, WatchBackend};

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn test_full_section_is_parsed() {
    let dir = TempDir::new().unwrap();
    let file = config_file(&format!(
        r#"
[file_watch]
dir = "{}"
regexp = "^report"
match_target = "name"
recursive = true
backend = "native"
poll_interval = "250ms"
job_timeout = "2s"
payload = "minimal"
max_concurrency = 4
queue_length = 16

[file_watch.pool]
command = "cat"
num_workers = 3
allocate_timeout = "5s"

[file_watch.pool.env]
APP_ENV = "test"
"#,
        dir.path().display()
    ));

    let validated = load_and_validate(file.path()).unwrap();
    let cfg = &validated.config;

    assert_eq!(cfg.regexp, "^report");
    assert_eq!(cfg.match_target, MatchTarget::Name);
    assert!(cfg.recursive);
    assert_eq!(cfg.backend, WatchBackend::Native);
    assert_eq!(cfg.poll_interval, Duration::from_millis(250));
    assert_eq!(cfg.job_timeout, Duration::from_secs(2));
    assert_eq!(cfg.payload, PayloadMode::Minimal);
    assert_eq!(cfg.max_concurrency, 4);
    assert_eq!(cfg.queue_length, 16);
    assert_eq!(cfg.pool.command, "cat");
    assert_eq!(cfg.pool.num_workers, 3);
    assert_eq!(cfg.pool.allocate_timeout(), Duration::from_secs(5));
    assert_eq!(cfg.pool.env.get("APP_ENV").map(String::as_str), Some("test"));
    assert_eq!(validated.filter.pattern(), Some("^report"));
    assert_eq!(validated.root, std::fs::canonicalize(dir.path()).unwrap());
}

#[test]
fn test_defaults_apply_to_minimal_section() {
    let dir = TempDir::new().unwrap();
    let file = config_file(&format!("[file_watch]\ndir = \"{}\"\n", dir.path().display()));

    let cfg = load_and_validate(file.path()).unwrap().config;

    assert_eq!(cfg.regexp, "");
    assert_eq!(cfg.match_target, MatchTarget::Path);
    assert!(!cfg.recursive);
    assert_eq!(cfg.backend, WatchBackend::Poll);
    assert_eq!(cfg.poll_interval, Duration::from_millis(100));
    assert_eq!(cfg.job_timeout, Duration::from_secs(10));
    assert_eq!(cfg.payload, PayloadMode::Rich);
    assert_eq!(cfg.max_concurrency, 1);
    assert_eq!(cfg.queue_length, 100);
    assert!(cfg.pool.num_workers >= 1);
}

#[test]
fn test_missing_section_is_disabled() {
    let file = config_file("[server]\ncommand = \"php worker.php\"\n");

    let result = load_and_validate(file.path());

    match result {
        Err(WatchpoolError::Disabled(section)) => assert_eq!(section, "file_watch"),
        Err(e) => panic!("Expected Disabled, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_empty_dir_returns_config_error() {
    let file = config_file("[file_watch]\nregexp = \"x\"\n");

    match load_and_validate(file.path()) {
        Err(WatchpoolError::ConfigError(msg)) => assert!(msg.contains("dir is required")),
        other => panic!("Expected ConfigError, got: {:?}", other.map(|v| v.config)),
    }
}

#[test]
fn test_invalid_regexp_returns_pattern_error() {
    let dir = TempDir::new().unwrap();
    let file = config_file(&format!(
        "[file_watch]\ndir = \"{}\"\nregexp = \"([\"\n",
        dir.path().display()
    ));

    let result = load_and_validate(file.path());

    assert!(matches!(result, Err(WatchpoolError::PatternError(_))));
}

#[test]
fn test_zero_concurrency_is_rejected() {
    let dir = TempDir::new().unwrap();
    let file = config_file(&format!(
        "[file_watch]\ndir = \"{}\"\nmax_concurrency = 0\n",
        dir.path().display()
    ));

    match load_and_validate(file.path()) {
        Err(WatchpoolError::ConfigError(msg)) => assert!(msg.contains("max_concurrency")),
        other => panic!("Expected ConfigError, got: {:?}", other.map(|v| v.config)),
    }
}

#[test]
fn test_bad_duration_is_a_toml_error() {
    let file = config_file("[file_watch]\ndir = \"/tmp\"\njob_timeout = \"10 parsecs\"\n");

    let result = load_and_validate(file.path());

    assert!(matches!(result, Err(WatchpoolError::TomlError(_))));
}

#[test]
fn test_unknown_payload_mode_is_rejected() {
    let file = config_file("[file_watch]\ndir = \"/tmp\"\npayload = \"verbose\"\n");

    assert!(matches!(
        load_and_validate(file.path()),
        Err(WatchpoolError::TomlError(_))
    ));
}

#[test]
fn test_malformed_toml_is_reported() {
    let file = config_file("[file_watch\ndir = ");

    assert!(matches!(
        load_from_path(file.path()),
        Err(WatchpoolError::TomlError(_))
    ));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();

    assert!(matches!(
        load_from_path(dir.path().join("nope.toml")),
        Err(WatchpoolError::IoError(_))
    ));
}

#[test]
fn test_dotted_keys_reach_nested_sections() {
    let file = config_file("[file_watch]\ndir = \"/tmp\"\n[file_watch.pool]\ncommand = \"cat\"\n");
    let configurer = load_from_path(file.path()).unwrap();

    assert!(configurer.has("file_watch.pool"));
    assert!(!configurer.has("file_watch.pool.env"));

    let pool: PoolConfig = configurer.unmarshal_key("file_watch.pool").unwrap();
    assert_eq!(pool.command, "cat");
    assert!(configurer.unmarshal_key::<PoolConfig>("missing").is_err());
}

#[test]
fn test_parse_duration_units() {
    assert_eq!(parse_duration("100ms").unwrap(), Duration::from_millis(100));
    assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
    assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
    assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
    assert!(parse_duration("").is_err());
    assert!(parse_duration("10").is_err());
    assert!(parse_duration("10d").is_err());
    assert_eq!(
        parse_duration(&format!("{}s", u64::MAX)).unwrap(),
        Duration::from_secs(u64::MAX)
    );
    assert_eq!("MINIMAL".parse::<PayloadMode>().unwrap(), PayloadMode::Minimal);
    assert!("other".parse::<PayloadMode>().is_err());
}

#[test]
fn test_parse_duration_rejects_overflowing_values() {
    let hours = parse_duration(&format!("{}h", u64::MAX)).unwrap_err();
    assert!(hours.contains("too large"), "{hours}");

    let minutes = parse_duration(&format!("{}m", u64::MAX / 30)).unwrap_err();
    assert!(minutes.contains("too large"), "{minutes}");

    assert_eq!(
        parse_duration(&format!("{}m", u64::MAX / 60)).unwrap(),
        Duration::from_secs(u64::MAX / 60 * 60)
    );
}

#[test]
fn test_overflowing_duration_in_config_is_a_toml_error() {
    let file = config_file(&format!(
        "[file_watch]\ndir = \"/tmp\"\njob_timeout = \"{}h\"\n",
        u64::MAX
    ));

    assert!(matches!(
        load_and_validate(file.path()),
        Err(WatchpoolError::TomlError(_))
    ));
}
