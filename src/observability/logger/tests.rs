use super::*;
use tempfile::tempdir;

#[test]
fn test_logger_creation() {
    let temp_dir = tempdir().unwrap();
    let log_path = temp_dir.path().join("test.md");

    let logger = Logger::new(Some(&log_path), Some("debug")).unwrap();
    assert_eq!(logger.log_file(), &log_path);
    assert_eq!(logger.log_level(), "DEBUG");
}

#[test]
fn test_log_file_creation() {
    let temp_dir = tempdir().unwrap();
    let log_path = temp_dir.path().join("logs").join("test.md");

    let _logger = Logger::new(Some(&log_path), None).unwrap();
    assert!(log_path.exists());

    let content = std::fs::read_to_string(&log_path).unwrap();
    assert!(content.contains("# Lorekeeper Conversation Log"));
    assert!(content.contains("Log started:"));
}

#[test]
fn test_turn_transcript() {
    let temp_dir = tempdir().unwrap();
    let log_path = temp_dir.path().join("test.md");
    let logger = Logger::new(Some(&log_path), None).unwrap();

    logger
        .log_turn_start("conv-1", "Who is Dobby?", "graded_retry")
        .unwrap();
    logger
        .log_step("generate_query_or_respond", "requested retrieval", 0)
        .unwrap();
    logger.log_grade_decision("rewrite", "not relevant").unwrap();
    logger
        .log_port_error("grade_documents", "schema_violation", "binary_score missing")
        .unwrap();
    logger.log_turn_complete("Dobby is a house-elf.", 5).unwrap();

    let content = std::fs::read_to_string(&log_path).unwrap();
    assert!(content.contains("**Conversation:** `conv-1`"));
    assert!(content.contains("### Step `generate_query_or_respond`"));
    assert!(content.contains("**Grade:** rewrite (not relevant)"));
    assert!(content.contains("**Kind:** schema_violation"));
    assert!(content.contains("Dobby is a house-elf."));
    assert!(content.contains("**Steps:** 5"));
}

#[test]
fn test_prompts_only_logged_at_debug() {
    let temp_dir = tempdir().unwrap();

    let info_path = temp_dir.path().join("info.md");
    let info = Logger::new(Some(&info_path), Some("INFO")).unwrap();
    info.log_prompt("grade", "secret prompt body").unwrap();
    let content = std::fs::read_to_string(&info_path).unwrap();
    assert!(!content.contains("secret prompt body"));

    let debug_path = temp_dir.path().join("debug.md");
    let debug = Logger::new(Some(&debug_path), Some("DEBUG")).unwrap();
    debug.log_prompt("grade", "secret prompt body").unwrap();
    let content = std::fs::read_to_string(&debug_path).unwrap();
    assert!(content.contains("secret prompt body"));
}

#[test]
fn test_state_repair_skips_empty() {
    let temp_dir = tempdir().unwrap();
    let log_path = temp_dir.path().join("test.md");
    let logger = Logger::new(Some(&log_path), None).unwrap();

    logger.log_state_repair("conv-1", &[]).unwrap();
    let content = std::fs::read_to_string(&log_path).unwrap();
    assert!(!content.contains("State Repaired"));

    logger
        .log_state_repair("conv-1", &["retry_count 7 reset to 0".to_string()])
        .unwrap();
    let content = std::fs::read_to_string(&log_path).unwrap();
    assert!(content.contains("- retry_count 7 reset to 0"));
}
