//! Integration tests for the fieldsync CLI
//!
//! These tests drive the binary end to end: offline classification,
//! configuration management, and pushes against a local HTTP backend.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const ENV_VARS: &[&str] = &[
    "FIELDSYNC_BASE_URL",
    "FIELDSYNC_TOKEN",
    "FIELDSYNC_TENANT",
    "FIELDSYNC_COLLECTION",
    "RUST_LOG",
];

/// Helper to create a fieldsync Command isolated from the caller's environment
fn fieldsync() -> Command {
    let mut cmd = cargo_bin_cmd!("fieldsync");
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd
}

/// Helper to create a temporary project directory
fn create_temp_project() -> TempDir {
    TempDir::new().unwrap()
}

/// Write a drafts file into the project and return its path
fn write_drafts(dir: &TempDir, json: &str) -> PathBuf {
    let path = dir.path().join("drafts.json");
    fs::write(&path, json).unwrap();
    path
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_fieldsync_help() {
        fieldsync()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("classify"))
            .stdout(predicate::str::contains("push"));
    }

    #[test]
    fn test_fieldsync_version() {
        fieldsync()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("fieldsync"));
    }

    #[test]
    fn test_unknown_command_fails() {
        fieldsync().arg("frobnicate").assert().failure();
    }
}

// =============================================================================
// Classify Tests
// =============================================================================

mod classify {
    use super::*;

    #[test]
    fn test_classify_reports_each_draft() {
        let dir = create_temp_project();
        let drafts = write_drafts(
            &dir,
            r#"[
                {"id": 1, "name": "Status", "field_type": "text"},
                {"id": "tmp-a", "name": "Revenue", "field_type": "number"},
                {"id": "tmp-b", "name": "New Field", "field_type": "text"},
                {"id": "tmp-c", "name": "Status", "field_type": "text"},
                {"id": "tmp-d", "name": "Stage", "field_type": "select_type"},
                {"id": "tmp-e", "name": "Priority", "field_type": "select"}
            ]"#,
        );

        fieldsync()
            .current_dir(dir.path())
            .arg("classify")
            .arg(&drafts)
            .assert()
            .success()
            .stdout(predicate::str::contains("update"))
            .stdout(predicate::str::contains("create"))
            .stdout(predicate::str::contains("reserved_name"))
            .stdout(predicate::str::contains("duplicate_name"))
            .stdout(predicate::str::contains("kind_unchosen"))
            .stdout(predicate::str::contains("incomplete"));
    }

    #[test]
    fn test_classify_accepts_drafts_without_ids() {
        let dir = create_temp_project();
        let drafts = write_drafts(&dir, r#"[{"name": "Revenue", "field_type": "number"}]"#);

        fieldsync()
            .arg("classify")
            .arg(&drafts)
            .assert()
            .success()
            .stdout(predicate::str::contains("create"))
            .stdout(predicate::str::contains("tmp-"));
    }

    #[test]
    fn test_classify_empty_file() {
        let dir = create_temp_project();
        let drafts = write_drafts(&dir, "[]");

        fieldsync()
            .arg("classify")
            .arg(&drafts)
            .assert()
            .success()
            .stdout(predicate::str::contains("No drafts"));
    }

    #[test]
    fn test_classify_missing_file_fails() {
        fieldsync()
            .arg("classify")
            .arg("/nonexistent/drafts.json")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to read drafts file"));
    }

    #[test]
    fn test_classify_malformed_json_fails() {
        let dir = create_temp_project();
        let drafts = write_drafts(&dir, "{not json");

        fieldsync()
            .arg("classify")
            .arg(&drafts)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to parse drafts file"));
    }
}

// =============================================================================
// Config Tests
// =============================================================================

mod config {
    use super::*;

    #[test]
    fn test_config_show_without_file() {
        let dir = create_temp_project();

        fieldsync()
            .arg("--project-dir")
            .arg(dir.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Fieldsync Configuration"))
            .stdout(predicate::str::contains("No fieldsync.toml found"))
            .stdout(predicate::str::contains("base_delay_ms = 800"));
    }

    #[test]
    fn test_config_init_creates_file_once() {
        let dir = create_temp_project();

        fieldsync()
            .arg("--project-dir")
            .arg(dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created fieldsync.toml"));

        let path = dir.path().join(".fieldsync/fieldsync.toml");
        assert!(path.exists());
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("base_delay_ms = 800"));
        assert!(!content.contains("token"));

        fieldsync()
            .arg("--project-dir")
            .arg(dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));
    }

    #[test]
    fn test_config_show_applies_cli_and_env_overrides() {
        let dir = create_temp_project();
        fs::create_dir_all(dir.path().join(".fieldsync")).unwrap();
        fs::write(
            dir.path().join(".fieldsync/fieldsync.toml"),
            "[gateway]\nbase_url = \"https://file.example.com/api\"\ncollection = \"from-file\"\n",
        )
        .unwrap();

        fieldsync()
            .env("FIELDSYNC_COLLECTION", "from-env")
            .env("FIELDSYNC_TOKEN", "s3cret")
            .arg("--project-dir")
            .arg(dir.path())
            .args(["--base-url", "https://cli.example.com/api"])
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("base_url = https://cli.example.com/api"))
            .stdout(predicate::str::contains("collection = from-env"))
            .stdout(predicate::str::contains("token = (set)"))
            .stdout(predicate::str::contains("s3cret").not());
    }

    #[test]
    fn test_config_validate_reports_warnings() {
        let dir = create_temp_project();
        fs::create_dir_all(dir.path().join(".fieldsync")).unwrap();
        fs::write(
            dir.path().join(".fieldsync/fieldsync.toml"),
            "[gateway]\nbase_url = \"ftp://crm.example.com\"\n\n[autosave]\nbase_delay_ms = 0\n",
        )
        .unwrap();

        fieldsync()
            .arg("--project-dir")
            .arg(dir.path())
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Invalid gateway.base_url"))
            .stdout(predicate::str::contains("base_delay_ms is 0"));
    }

    #[test]
    fn test_config_validate_clean_file() {
        let dir = create_temp_project();
        fs::create_dir_all(dir.path().join(".fieldsync")).unwrap();
        fs::write(
            dir.path().join(".fieldsync/fieldsync.toml"),
            "[gateway]\nbase_url = \"https://crm.example.com/api\"\n",
        )
        .unwrap();

        fieldsync()
            .arg("--project-dir")
            .arg(dir.path())
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration is valid."));
    }

    #[test]
    fn test_malformed_config_fails() {
        let dir = create_temp_project();
        fs::create_dir_all(dir.path().join(".fieldsync")).unwrap();
        fs::write(dir.path().join(".fieldsync/fieldsync.toml"), "[gateway\n").unwrap();

        fieldsync()
            .arg("--project-dir")
            .arg(dir.path())
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to parse fieldsync.toml"));
    }
}

// =============================================================================
// Push Tests
// =============================================================================

mod push {
    use super::*;
    use axum::{
        Json, Router,
        extract::Path,
        http::StatusCode,
        routing::{patch, post},
    };
    use serde_json::{Value, json};

    /// Start a backend on its own runtime thread and return its API root.
    fn spawn_backend(update_status: u16) -> String {
        let router = Router::new()
            .route(
                "/api/fields/",
                post(|Json(body): Json<Value>| async move {
                    (
                        StatusCode::CREATED,
                        Json(json!({
                            "id": 100,
                            "name": body["name"],
                            "field_type": body["field_type"],
                        })),
                    )
                }),
            )
            .route(
                "/api/fields/{id}/",
                patch(move |Path(id): Path<i64>, Json(body): Json<Value>| async move {
                    let status = StatusCode::from_u16(update_status).unwrap();
                    if status.is_success() {
                        (status, Json(json!({"id": id, "name": body["name"]})))
                    } else {
                        (status, Json(json!({"detail": "backend unavailable"})))
                    }
                }),
            );

        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
                tx.send(listener.local_addr().unwrap()).unwrap();
                axum::serve(listener, router).await.unwrap();
            });
        });
        format!("http://{}/api", rx.recv().unwrap())
    }

    #[test]
    fn test_push_creates_updates_and_skips() {
        let dir = create_temp_project();
        let base_url = spawn_backend(200);
        let drafts = write_drafts(
            &dir,
            r#"[
                {"id": "tmp-a", "name": "Revenue", "field_type": "number"},
                {"id": "tmp-b", "name": "New Field", "field_type": "text"},
                {"id": 42, "name": "Status", "field_type": "text"}
            ]"#,
        );

        fieldsync()
            .arg("--project-dir")
            .arg(dir.path())
            .args(["--base-url", &base_url, "--collection", "pipeline-7"])
            .arg("push")
            .arg(&drafts)
            .assert()
            .success()
            .stdout(predicate::str::contains("created"))
            .stdout(predicate::str::contains("-> 100 (Revenue)"))
            .stdout(predicate::str::contains("skipped"))
            .stdout(predicate::str::contains("reserved_name"))
            .stdout(predicate::str::contains("-> 42 (Status)"));
    }

    #[test]
    fn test_push_fails_when_a_visible_error_occurs() {
        let dir = create_temp_project();
        let base_url = spawn_backend(503);
        let drafts = write_drafts(&dir, r#"[{"id": 42, "name": "Status", "field_type": "text"}]"#);

        fieldsync()
            .arg("--project-dir")
            .arg(dir.path())
            .args(["--base-url", &base_url, "--collection", "pipeline-7"])
            .arg("push")
            .arg(&drafts)
            .assert()
            .failure()
            .stdout(predicate::str::contains("failed"))
            .stderr(predicate::str::contains("1 field(s) failed to save"));
    }

    #[test]
    fn test_push_requires_collection() {
        let dir = create_temp_project();
        let drafts = write_drafts(&dir, "[]");

        fieldsync()
            .arg("--project-dir")
            .arg(dir.path())
            .args(["--base-url", "http://127.0.0.1:1/api"])
            .arg("push")
            .arg(&drafts)
            .assert()
            .failure()
            .stderr(predicate::str::contains("No collection configured"));
    }

    #[test]
    fn test_push_requires_base_url() {
        let dir = create_temp_project();
        let drafts = write_drafts(&dir, "[]");

        fieldsync()
            .arg("--project-dir")
            .arg(dir.path())
            .args(["--collection", "pipeline-7"])
            .arg("push")
            .arg(&drafts)
            .assert()
            .failure()
            .stderr(predicate::str::contains("No API base URL configured"));
    }
}
