//! Audit trail persistence tests
//!
//! Exercise the JSON Lines log on disk: reload, resume numbering, and
//! error reporting for damaged files.

use relational_agency::audit::{AuditTrail, DecisionType, JsonlAuditLog};
use relational_agency::error::AuditError;
use tempfile::tempdir;

#[tokio::test]
async fn test_reload_reproduces_trail_hash() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("logs").join("audit.jsonl");

    let mut trail = AuditTrail::open(&path).await.unwrap();
    trail
        .log_reasoning("User asked for a plan", "three phases", 0.8, None, None)
        .await
        .unwrap();
    trail
        .log_action("Plan accepted", "create tickets", "success", 0.6, None)
        .await
        .unwrap();
    let expected = trail.compute_trail_hash().unwrap();

    let reloaded = AuditTrail::load_from_jsonl(&path).await.unwrap();
    assert_eq!(reloaded.len(), 2);
    assert_eq!(reloaded.compute_trail_hash().unwrap(), expected);
    assert_eq!(reloaded.entries()[1].decision_type, DecisionType::Action);
}

#[tokio::test]
async fn test_reopened_trail_resumes_numbering() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");

    {
        let mut trail = AuditTrail::open(&path).await.unwrap();
        trail.log_reasoning("a", "b", 0.5, None, None).await.unwrap();
        trail.log_reasoning("c", "d", 0.5, None, None).await.unwrap();
    }

    let mut trail = AuditTrail::open(&path).await.unwrap();
    let entry = trail.log_reasoning("e", "f", 0.5, None, None).await.unwrap();
    assert_eq!(entry.entry_id, "AUDIT_000002");

    let log = JsonlAuditLog::open(&path).await.unwrap();
    assert_eq!(log.read_entries().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_missing_file_is_empty_trail() {
    let dir = tempdir().unwrap();
    let trail = AuditTrail::load_from_jsonl(dir.path().join("absent.jsonl"))
        .await
        .unwrap();
    assert!(trail.is_empty());
    assert!(trail.export_summary().unwrap().is_none());
}

#[tokio::test]
async fn test_blank_lines_are_skipped() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");

    let mut source = AuditTrail::new();
    source.log_reasoning("a", "b", 0.9, None, None).await.unwrap();
    source.log_reasoning("c", "d", 0.7, None, None).await.unwrap();
    let lines = source.export_jsonl().unwrap();

    let content = format!("{}\n\n   \n{}\n", lines[0], lines[1]);
    tokio::fs::write(&path, content).await.unwrap();

    let trail = AuditTrail::load_from_jsonl(&path).await.unwrap();
    assert_eq!(trail.len(), 2);
    assert_eq!(
        trail.compute_trail_hash().unwrap(),
        source.compute_trail_hash().unwrap()
    );
}

#[tokio::test]
async fn test_corrupt_line_reports_line_number() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");

    let mut source = AuditTrail::new();
    source.log_reasoning("a", "b", 0.9, None, None).await.unwrap();
    let lines = source.export_jsonl().unwrap();

    let content = format!("{}\n{{\"entry_id\": \"AUDIT_000001\"\n", lines[0]);
    tokio::fs::write(&path, content).await.unwrap();

    let err = AuditTrail::load_from_jsonl(&path).await.unwrap_err();
    assert!(matches!(err, AuditError::Corrupt { line: 2, .. }));
}

#[tokio::test]
async fn test_edited_entry_changes_trail_hash() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");

    let mut trail = AuditTrail::open(&path).await.unwrap();
    trail
        .log_action("ctx", "deploy", "success", 0.9, None)
        .await
        .unwrap();
    let expected = trail.compute_trail_hash().unwrap();

    let raw = tokio::fs::read_to_string(&path).await.unwrap();
    tokio::fs::write(&path, raw.replace("deploy", "rollback"))
        .await
        .unwrap();

    let reloaded = AuditTrail::load_from_jsonl(&path).await.unwrap();
    assert_ne!(reloaded.compute_trail_hash().unwrap(), expected);
}
