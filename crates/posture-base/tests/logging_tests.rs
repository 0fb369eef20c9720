use log::{LevelFilter, Log};
use posture_base::logging::{
    FileLogger, StdoutLogger, default_level, format_line, format_timestamp, format_today,
    parse_level,
};
use std::fs;

fn temp_log_dir(tag: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("posture-log-{}-{}", std::process::id(), tag));
    let _ = fs::remove_dir_all(&dir);
    dir
}

#[test]
fn test_stdout_logger_respects_level() {
    let logger = StdoutLogger::new(LevelFilter::Warn);

    let warn = log::MetadataBuilder::new().level(log::Level::Warn).build();
    let info = log::MetadataBuilder::new().level(log::Level::Info).build();
    assert!(logger.enabled(&warn));
    assert!(!logger.enabled(&info));

    let record = log::RecordBuilder::new()
        .level(log::Level::Error)
        .file(Some("controller.rs"))
        .line(Some(42))
        .args(format_args!("stream stopped"))
        .build();
    logger.log(&record);
    logger.flush();
}

#[test]
fn test_format_line_layout() {
    let record = log::RecordBuilder::new()
        .level(log::Level::Info)
        .file(Some("pump.rs"))
        .line(Some(12))
        .args(format_args!("client connected"))
        .build();
    let line = format_line(&record);

    assert!(line.contains(" [INFO] [thread:"));
    assert!(line.ends_with("pump.rs:12 - client connected"));
}

#[test]
fn test_format_timestamp_structure() {
    let ts = format_timestamp();
    assert_eq!(ts.len(), 19);
    assert_eq!(&ts[4..5], "-");
    assert_eq!(&ts[10..11], "T");
    assert_eq!(&ts[16..17], ":");
    assert!(ts.starts_with(&format_today()));
}

#[test]
fn test_file_logger_creates_directory_and_file() {
    let dir = temp_log_dir("create");
    let logger = FileLogger::new(&dir, LevelFilter::Debug).expect("create logger");

    assert!(dir.is_dir());
    assert!(logger.current_path().exists());

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_file_logger_filters_below_level() {
    let dir = temp_log_dir("filter");
    let logger = FileLogger::new(&dir, LevelFilter::Warn).expect("create logger");

    let debug = log::RecordBuilder::new()
        .level(log::Level::Debug)
        .args(format_args!("frame 17 annotated"))
        .build();
    let warn = log::RecordBuilder::new()
        .level(log::Level::Warn)
        .args(format_args!("skipping frame 18"))
        .build();
    logger.log(&debug);
    logger.log(&warn);
    logger.flush();

    let content = fs::read_to_string(logger.current_path()).expect("read log");
    assert!(!content.contains("frame 17 annotated"));
    assert!(content.contains("[WARN]"));
    assert!(content.contains("skipping frame 18"));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_file_logger_invalid_directory() {
    let file = std::env::temp_dir().join(format!("posture-log-{}-notadir", std::process::id()));
    fs::write(&file, b"x").expect("write marker file");

    assert!(FileLogger::new(file.join("logs"), LevelFilter::Info).is_err());

    fs::remove_file(&file).ok();
}

#[test]
fn test_parse_level() {
    assert_eq!(parse_level("DEBUG"), Some(LevelFilter::Debug));
    assert_eq!(parse_level(" warn "), Some(LevelFilter::Warn));
    assert_eq!(parse_level("off"), Some(LevelFilter::Off));
    assert_eq!(parse_level("verbose"), None);
}

#[test]
fn test_default_level_matches_build() {
    let expected = if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    assert_eq!(default_level(), expected);
}
