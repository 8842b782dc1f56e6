use super::*;

use std::{
    collections::HashMap,
    env,
    time::{SystemTime, UNIX_EPOCH},
};

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn file_values_override_defaults() {
    let mut settings = Settings::default();
    apply_file(
        &mut settings,
        r#"
backend_url = "https://backend.example"
stall_timeout_secs = 45
animate_progress = false
"#,
    )
    .expect("parse");

    assert_eq!(settings.backend_url, "https://backend.example");
    assert_eq!(settings.stall_timeout_secs, 45);
    assert_eq!(settings.connect_timeout_secs, 30);
    assert!(!settings.animate_progress);
}

#[test]
fn malformed_file_is_an_error() {
    let mut settings = Settings::default();
    assert!(apply_file(&mut settings, "stall_timeout_secs = \"soon\"").is_err());
}

#[test]
fn prefixed_env_wins_over_plain_env() {
    let mut settings = Settings::default();
    apply_env(
        &mut settings,
        env_from(&[
            ("BACKEND_URL", "https://plain.example"),
            ("APP__BACKEND_URL", "https://prefixed.example"),
            ("APP__STALL_TIMEOUT_SECS", "12"),
            ("APP__CONNECT_TIMEOUT_SECS", "not-a-number"),
        ]),
    );

    assert_eq!(settings.backend_url, "https://prefixed.example");
    assert_eq!(settings.stall_timeout_secs, 12);
    assert_eq!(settings.connect_timeout_secs, 30);
}

#[test]
fn controller_config_carries_timeouts_and_endpoint() {
    let settings = Settings {
        backend_url: "https://backend.example/base".into(),
        connect_timeout_secs: 5,
        stall_timeout_secs: 60,
        animate_progress: false,
    };
    let config = settings.controller_config().expect("config");

    assert_eq!(
        config.endpoint.as_str(),
        "https://backend.example/base/api/generate-video"
    );
    assert_eq!(config.connect_timeout, Duration::from_secs(5));
    assert_eq!(config.stall_timeout, Duration::from_secs(60));
    assert_eq!(config.synthesized_progress.total_duration(), Duration::ZERO);
}

#[test]
fn invalid_backend_url_is_rejected() {
    let settings = Settings {
        backend_url: "definitely not a url".into(),
        ..Settings::default()
    };
    assert!(settings.controller_config().is_err());
}

#[test]
fn explicit_missing_config_file_is_an_error() {
    let missing = env::temp_dir().join("angle_video_missing_config.toml");
    assert!(load_settings(Some(&missing)).is_err());
}

#[test]
fn explicit_config_file_is_loaded() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let path = env::temp_dir().join(format!("angle_video_config_{suffix}.toml"));
    fs::write(&path, "connect_timeout_secs = 7\n").expect("write config");

    let settings = load_settings(Some(&path)).expect("load");
    assert_eq!(settings.connect_timeout_secs, 7);

    fs::remove_file(path).expect("cleanup");
}
