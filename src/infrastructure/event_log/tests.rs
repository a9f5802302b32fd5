use super::{
    Event, EventLogger, FileEventLogger, MemoryEventLogger, NullEventLogger, now_millis,
};
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn unique_path(label: &str) -> std::path::PathBuf {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_nanos();
    std::env::temp_dir().join(format!(
        "vibeit-event-log-{label}-{}-{timestamp}.jsonl",
        std::process::id()
    ))
}

#[test]
fn file_event_logger_appends_one_json_object_per_line() {
    let path = unique_path("writer");
    let logger = FileEventLogger::open(&path).expect("event log file should open");
    logger.log(Event::new("registry", "loaded").with_data("workspaces", Value::from(3)));
    logger.log(
        Event::new("provision", "hook_warning")
            .with_text("item", "node_modules")
            .with_path("workspace", Path::new("/p/myapp-wt-1")),
    );

    let raw = fs::read_to_string(&path).expect("event log should be readable");
    let lines: Vec<&str> = raw.lines().collect();
    assert_eq!(lines.len(), 2);

    let first: Value = serde_json::from_str(lines[0]).expect("first line should be json");
    assert_eq!(first["event"], Value::from("registry"));
    assert_eq!(first["kind"], Value::from("loaded"));
    assert_eq!(first["data"]["workspaces"], Value::from(3));

    let second: Value = serde_json::from_str(lines[1]).expect("second line should be json");
    assert_eq!(second["data"]["item"], Value::from("node_modules"));
    assert_eq!(second["data"]["workspace"], Value::from("/p/myapp-wt-1"));

    let _ = fs::remove_file(path);
}

#[test]
fn memory_event_logger_filters_by_event_name() {
    let logger = MemoryEventLogger::default();
    logger.log(Event::new("session", "attach"));
    logger.log(Event::new("registry", "loaded"));
    logger.log(Event::new("session", "kill"));

    assert_eq!(
        logger.kinds("session"),
        vec!["attach".to_string(), "kill".to_string()]
    );
    assert_eq!(logger.events().len(), 3);
}

#[test]
fn null_event_logger_is_noop() {
    let logger = NullEventLogger;
    logger.log(Event::new("test", "noop"));
}

#[test]
fn now_millis_matches_event_timestamps() {
    let before = now_millis();
    let event = Event::new("app", "started");
    let after = now_millis();

    assert!(before > 1_700_000_000_000);
    assert!((before..=after).contains(&event.ts));
}
