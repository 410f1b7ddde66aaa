use apiwatch_config::{
    ConfigError, EndpointDefinition, StoreConfig, load_cfg, load_from_dir,
    load_from_path,
};
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::io::Write;

fn write_temp(contents: &str) -> tempfile::TempPath {
    let mut f = tempfile::NamedTempFile::new().expect("temp file");
    f.write_all(contents.as_bytes()).expect("write");
    f.into_temp_path()
}

// ============================================================================
// Single file
// ============================================================================

#[test]
#[serial]
#[allow(unsafe_code)]
fn parses_full_config_with_env_expansion() {
    unsafe {
        std::env::set_var("APIWATCH_TEST_COOKIE", "_ncfa=abc123");
    }

    let yaml = r#"
monitoring:
  enabled: true
  interval_secs: 3600
  pacing_ms: 250
  request_timeout_secs: 10
  history_limit: 5
store:
  kind: file
  path: /tmp/apiwatch/schemas.json
api:
  base_url: https://www.example.com/api
  headers:
    cookie: ${APIWATCH_TEST_COOKIE}
endpoints:
  - path: /v3/profiles
    description: Current user profile
  - path: /v4/feed/private
    params: { count: "10", page: "0" }
    description: Private activity feed
"#;

    let path = write_temp(yaml);
    let cfg = load_from_path(path.to_str().unwrap()).expect("parse yaml");

    assert_eq!(cfg.monitoring.interval_secs, 3600);
    assert_eq!(cfg.monitoring.pacing_ms, 250);
    assert_eq!(cfg.monitoring.history_limit, 5);
    assert_eq!(
        cfg.store,
        StoreConfig::File {
            path: "/tmp/apiwatch/schemas.json".into()
        }
    );
    assert_eq!(cfg.api.headers["cookie"], "_ncfa=abc123");

    assert_eq!(cfg.endpoints.len(), 2);
    assert_eq!(cfg.endpoints[0].method, "GET");
    assert_eq!(cfg.endpoints[1].params["count"], "10");
    assert_eq!(cfg.endpoints[1].endpoint_id(), "GET /v4/feed/private");
}

#[test]
#[serial]
fn missing_sections_use_defaults() {
    let yaml = r#"
api: { base_url: "https://api.local" }
"#;
    let path = write_temp(yaml);
    let cfg = load_from_path(path.to_str().unwrap()).expect("parse ok");

    assert!(cfg.monitoring.enabled);
    assert_eq!(cfg.monitoring.interval_secs, 86_400);
    assert_eq!(cfg.store, StoreConfig::default());
    assert!(cfg.endpoints.is_empty());
}

#[test]
#[serial]
fn invalid_yaml_returns_parse_error() {
    let yaml = "this is: [ definitely: not: valid: yaml";
    let path = write_temp(yaml);
    let err = load_from_path(path.to_str().unwrap()).expect_err("should fail");
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
#[serial]
fn missing_file_returns_io_error() {
    let err = load_from_path("/definitely/not/here.yaml").expect_err("missing");
    assert!(matches!(err, ConfigError::Io { .. }));
}

// ============================================================================
// Validation
// ============================================================================

#[test]
#[serial]
fn rejects_zero_history_limit() {
    let yaml = r#"
monitoring: { history_limit: 0 }
api: { base_url: "https://api.local" }
"#;
    let path = write_temp(yaml);
    let err = load_from_path(path.to_str().unwrap()).expect_err("invalid");
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
#[serial]
fn rejects_duplicate_endpoint_ids() {
    let yaml = r#"
api: { base_url: "https://api.local" }
endpoints:
  - path: /v3/profiles
  - path: /v3/profiles/
    method: get
"#;
    let path = write_temp(yaml);
    let err = load_from_path(path.to_str().unwrap()).expect_err("duplicate");
    match err {
        ConfigError::Invalid(msg) => assert!(msg.contains("GET /v3/profiles")),
        other => panic!("expected invalid, got {other:?}"),
    }
}

#[test]
#[serial]
fn rejects_missing_base_url() {
    let path = write_temp("endpoints: []");
    let err = load_from_path(path.to_str().unwrap()).expect_err("no base url");
    assert!(matches!(err, ConfigError::Invalid(_)));
}

// ============================================================================
// Directory configs
// ============================================================================

#[test]
#[serial]
fn merges_directory_fragments_in_path_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(
        dir.path().join("00-main.yaml"),
        "api: { base_url: \"https://api.local\" }\nmonitoring: { pacing_ms: 100 }\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("10-profiles.yaml"),
        "endpoints:\n  - path: /v3/profiles\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("20-social.yml"),
        "endpoints:\n  - path: /v3/social/friends/summary\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("README.txt"), "ignored").unwrap();

    let cfg = load_cfg(dir.path().to_str().unwrap()).expect("dir config");

    assert_eq!(cfg.monitoring.pacing_ms, 100);
    assert_eq!(
        cfg.endpoints,
        vec![
            EndpointDefinition::new("/v3/profiles"),
            EndpointDefinition::new("/v3/social/friends/summary"),
        ]
    );
}

#[test]
#[serial]
fn duplicate_section_across_fragments_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(
        dir.path().join("a.yaml"),
        "api: { base_url: \"https://a\" }\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("b.yaml"),
        "api: { base_url: \"https://b\" }\n",
    )
    .unwrap();

    let err = load_from_dir(dir.path().to_str().unwrap()).expect_err("dup");
    assert!(matches!(
        err,
        ConfigError::DuplicateSection { section: "api", .. }
    ));
}
