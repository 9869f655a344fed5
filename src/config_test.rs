use std::collections::HashMap;

use super::*;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn empty_environment_matches_default() {
    let cfg = ChatConfig::from_lookup(lookup(&[])).expect("config");
    assert_eq!(cfg, ChatConfig::default());
    assert_eq!(cfg.realtime_url, "http://127.0.0.1:5000");
    assert_eq!(cfg.join_timeout, Duration::from_secs(5));
    assert_eq!(cfg.typing_idle, Duration::from_secs(2));
    assert_eq!(cfg.history_limit, 50);
    assert_eq!(cfg.max_message_chars, 500);
    assert_eq!(cfg.transports, vec![TransportKind::WebSocket, TransportKind::Polling]);
}

#[test]
fn overrides_are_parsed() {
    let cfg = ChatConfig::from_lookup(lookup(&[
        ("CHAT_API_BASE_URL", "https://donate.example.org/api/"),
        ("CHAT_TRANSPORTS", "polling"),
        ("CHAT_JOIN_TIMEOUT_MS", "1500"),
        ("CHAT_TYPING_IDLE_MS", " 750 "),
        ("CHAT_HISTORY_LIMIT", "20"),
        ("CHAT_MAX_MESSAGE_CHARS", "140"),
        ("CHAT_BANNER_TTL_MS", "3000"),
        ("CHAT_CONNECT_TIMEOUT_SECS", "3"),
        ("CHAT_POLL_WAIT_SECS", "5"),
    ]))
    .expect("config");

    assert_eq!(cfg.api_base_url, "https://donate.example.org/api");
    assert_eq!(cfg.realtime_url, "https://donate.example.org");
    assert_eq!(cfg.transports, vec![TransportKind::Polling]);
    assert_eq!(cfg.join_timeout, Duration::from_millis(1500));
    assert_eq!(cfg.typing_idle, Duration::from_millis(750));
    assert_eq!(cfg.history_limit, 20);
    assert_eq!(cfg.max_message_chars, 140);
    assert_eq!(cfg.banner_ttl, Duration::from_secs(3));
    assert_eq!(cfg.connect_timeout, Duration::from_secs(3));
    assert_eq!(cfg.poll_wait, Duration::from_secs(5));
}

#[test]
fn explicit_realtime_url_wins_over_api_origin() {
    let cfg = ChatConfig::from_lookup(lookup(&[
        ("CHAT_API_BASE_URL", "https://api.example.org/v1"),
        ("CHAT_REALTIME_URL", "https://rt.example.org:8443/"),
    ]))
    .expect("config");
    assert_eq!(cfg.realtime_url, "https://rt.example.org:8443");
}

#[test]
fn invalid_numbers_fall_back_to_defaults() {
    let cfg = ChatConfig::from_lookup(lookup(&[("CHAT_JOIN_TIMEOUT_MS", "soon"), ("CHAT_HISTORY_LIMIT", "-3")]))
        .expect("config");
    assert_eq!(cfg.join_timeout, Duration::from_millis(DEFAULT_JOIN_TIMEOUT_MS));
    assert_eq!(cfg.history_limit, DEFAULT_HISTORY_LIMIT);
}

#[test]
fn unknown_transport_is_an_error() {
    let err = ChatConfig::from_lookup(lookup(&[("CHAT_TRANSPORTS", "websocket,smoke-signals")]))
        .expect_err("unknown transport");
    assert!(matches!(err, ConfigError::Invalid { key: "CHAT_TRANSPORTS", ref value } if value == "smoke-signals"));
    assert!(err.to_string().contains("CHAT_TRANSPORTS"));

    assert!(ChatConfig::from_lookup(lookup(&[("CHAT_TRANSPORTS", " , ")])).is_err());
}

#[test]
fn duplicate_transports_collapse() {
    let cfg = ChatConfig::from_lookup(lookup(&[("CHAT_TRANSPORTS", "ws,websocket,polling")])).expect("config");
    assert_eq!(cfg.transports, vec![TransportKind::WebSocket, TransportKind::Polling]);
}

#[test]
fn origin_strips_path_only() {
    assert_eq!(origin_of("http://localhost:5000/api/v2"), "http://localhost:5000");
    assert_eq!(origin_of("https://example.org"), "https://example.org");
    assert_eq!(origin_of("relative/api"), "relative/api");
}

#[test]
fn from_env_reads_process_environment() {
    unsafe { std::env::set_var("CHAT_MAX_MESSAGE_CHARS", "280") };
    let cfg = ChatConfig::from_env().expect("config");
    assert_eq!(cfg.max_message_chars, 280);
    unsafe { std::env::remove_var("CHAT_MAX_MESSAGE_CHARS") };
}
