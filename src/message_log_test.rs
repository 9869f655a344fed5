use super::*;
use crate::test_support::history_message;

fn ids(log: &MessageLog) -> Vec<&str> {
    log.messages().iter().map(|m| m.id.as_str()).collect()
}

#[test]
fn pushes_wait_for_history() {
    let mut log = MessageLog::new();
    assert!(!log.push_live(history_message("p1")));
    assert!(!log.push_live(history_message("p2")));
    assert!(log.is_empty());
    assert!(!log.is_loaded());

    let added = log.load_history(vec![history_message("h1"), history_message("h2")]);
    assert_eq!(added, 4);
    assert_eq!(ids(&log), vec!["h1", "h2", "p1", "p2"]);
    assert!(log.is_loaded());
}

#[test]
fn push_already_in_history_is_dropped() {
    let mut log = MessageLog::new();
    log.push_live(history_message("h2"));
    log.load_history(vec![history_message("h1"), history_message("h2")]);
    assert_eq!(ids(&log), vec!["h1", "h2"]);

    assert!(!log.push_live(history_message("h1")));
    assert!(log.push_live(history_message("p3")));
    assert_eq!(ids(&log), vec!["h1", "h2", "p3"]);
}

#[test]
fn history_failure_releases_buffer() {
    let mut log = MessageLog::new();
    log.push_live(history_message("p1"));
    log.push_live(history_message("p1"));
    assert_eq!(log.history_failed(), 1);
    assert_eq!(ids(&log), vec!["p1"]);
}

#[test]
fn arrival_order_is_kept_after_load() {
    let mut log = MessageLog::new();
    log.load_history(Vec::new());
    let mut late = history_message("b");
    late.timestamp = "2020-01-01T00:00:00Z".into();
    log.push_live(history_message("a"));
    log.push_live(late);
    assert_eq!(ids(&log), vec!["a", "b"]);
}

#[test]
fn messages_without_id_are_kept() {
    let mut log = MessageLog::new();
    log.history_failed();
    assert!(log.push_live(history_message("")));
    assert!(log.push_live(history_message("")));
    assert_eq!(log.len(), 2);
}

#[test]
fn clear_resets_to_waiting() {
    let mut log = MessageLog::new();
    log.load_history(vec![history_message("h1")]);
    log.clear();
    assert!(log.is_empty());
    assert!(!log.is_loaded());
    assert!(!log.push_live(history_message("h1")));
}
