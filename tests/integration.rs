use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use tempfile::TempDir;

use repochat::config::load_config;
use repochat::embedding::DisabledEmbedder;
use repochat::sqlite_store::{NewFile, SqliteStore};
use repochat::{db, migrate};

fn repochat_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("repochat");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/repochat.sqlite"

[server]
bind = "127.0.0.1:7332"

[llm]
provider = "ollama"
model = "llama3"

[retrieval]
keywords = ["ScaleDPSession", "DataToImage"]
top_k_per_term = 2
"#,
        root.display()
    );

    let config_path = config_dir.join("repochat.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_repochat(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = repochat_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run repochat binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_help_lists_commands() {
    let output = Command::new(repochat_binary()).arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["init", "serve", "ask", "get"] {
        assert!(stdout.contains(command), "missing {command} in help:\n{stdout}");
    }
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_repochat(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/repochat.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, first) = run_repochat(&config_path, &["init"]);
    assert!(first, "First init failed");
    let (_, _, second) = run_repochat(&config_path, &["init"]);
    assert!(second, "Second init failed (not idempotent)");
}

#[test]
fn test_get_missing_file() {
    let (_tmp, config_path) = setup_test_env();

    run_repochat(&config_path, &["init"]);
    let (_, stderr, success) = run_repochat(&config_path, &["get", "nonexistent-id"]);
    assert!(!success, "get with missing ID should fail");
    assert!(stderr.contains("file not found"), "stderr: {stderr}");
}

#[tokio::test]
async fn test_get_prints_inserted_file() {
    let (_tmp, config_path) = setup_test_env();
    run_repochat(&config_path, &["init"]);

    let config = load_config(&config_path).unwrap();
    migrate::run_migrations(&config).await.unwrap();
    let pool = db::connect(&config).await.unwrap();
    let store = SqliteStore::new(pool.clone(), Arc::new(DisabledEmbedder));
    let id = store
        .insert_file(&NewFile {
            content: "def show_image(img):\n    ...".into(),
            filepath: "scaledp/utils/show.py".into(),
            file_type: "py".into(),
            ..NewFile::default()
        })
        .await
        .unwrap();
    pool.close().await;

    let (stdout, stderr, success) = run_repochat(&config_path, &["get", &id]);
    assert!(success, "get failed: stderr={stderr}");
    assert!(stdout.contains("scaledp/utils/show.py"));
    assert!(stdout.contains("def show_image(img):"));
}

#[test]
fn test_invalid_config_fails() {
    let (_tmp, config_path) = setup_test_env();
    fs::write(
        &config_path,
        "[db]\npath = \"x.sqlite\"\n\n[retrieval]\ntop_k_per_term = 0\n",
    )
    .unwrap();

    let (_, stderr, success) = run_repochat(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("top_k_per_term"), "stderr: {stderr}");
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, _, success) = run_repochat(&tmp.path().join("absent.toml"), &["init"]);
    assert!(!success);
}
