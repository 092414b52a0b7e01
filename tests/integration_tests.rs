//! Integration tests for the platewise CLI.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// A platewise command running in `dir` with no ambient configuration.
fn platewise(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("platewise");
    cmd.current_dir(dir.path())
        .env_remove("PLATEWISE_CONFIG")
        .env_remove("PLATEWISE_HOST")
        .env_remove("PLATEWISE_PORT")
        .env_remove("PLATEWISE_DB_PATH")
        .env_remove("PLATEWISE_LLM_ENDPOINT")
        .env_remove("PLATEWISE_DEFAULT_MODEL")
        .env_remove("GITHUB_TOKEN")
        .env_remove("SECRET_KEY")
        .env_remove("RUST_LOG");
    cmd
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_help_lists_commands() {
        let dir = TempDir::new().unwrap();
        platewise(&dir)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("serve"))
            .stdout(predicate::str::contains("analyze"));
    }

    #[test]
    fn test_version() {
        let dir = TempDir::new().unwrap();
        platewise(&dir).arg("--version").assert().success();
    }

    #[test]
    fn test_models_lists_catalogue() {
        let dir = TempDir::new().unwrap();
        platewise(&dir)
            .arg("models")
            .assert()
            .success()
            .stdout(predicate::str::contains("microsoft/Phi-4"))
            .stdout(predicate::str::contains("Fastest Ministral-3B"))
            .stdout(predicate::str::contains("coach default"));
    }
}

// =============================================================================
// Configuration
// =============================================================================

mod config {
    use super::*;

    #[test]
    fn test_config_init_then_validate() {
        let dir = TempDir::new().unwrap();

        platewise(&dir)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created platewise.toml"));
        let written = fs::read_to_string(dir.path().join("platewise.toml")).unwrap();
        assert!(written.contains("[server]"));
        assert!(written.contains("port = 5000"));

        platewise(&dir)
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration is valid."));

        platewise(&dir)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));
    }

    #[test]
    fn test_config_validate_reports_unknown_model() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("platewise.toml"),
            "[llm]\ndefault_model = \"acme/unknown\"\n",
        )
        .unwrap();

        platewise(&dir)
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("acme/unknown"));
    }

    #[test]
    fn test_config_show_masks_token_and_applies_env() {
        let dir = TempDir::new().unwrap();
        platewise(&dir)
            .args(["config", "show"])
            .env("GITHUB_TOKEN", "ghp_very_secret")
            .env("PLATEWISE_PORT", "7070")
            .assert()
            .success()
            .stdout(predicate::str::contains("port = 7070"))
            .stdout(predicate::str::contains("ghp_very_secret").not());
    }

    #[test]
    fn test_custom_config_path() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("conf")).unwrap();
        fs::write(dir.path().join("conf/pw.toml"), "[server]\nport = 6001\n").unwrap();

        platewise(&dir)
            .args(["--config", "conf/pw.toml", "config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("port = 6001"));
    }

    #[test]
    fn test_broken_config_fails() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("platewise.toml"), "[server\n").unwrap();

        platewise(&dir)
            .arg("models")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to parse platewise.toml"));
    }
}

// =============================================================================
// Database and users
// =============================================================================

mod database {
    use super::*;

    #[test]
    fn test_init_db_creates_file() {
        let dir = TempDir::new().unwrap();
        platewise(&dir)
            .args(["init-db", "--db-path", "data/tracker.db"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Database ready"));
        assert!(dir.path().join("data/tracker.db").exists());
    }

    #[test]
    fn test_user_reset_unknown_user() {
        let dir = TempDir::new().unwrap();
        platewise(&dir).arg("init-db").assert().success();

        platewise(&dir)
            .args(["user", "reset", "nobody", "--yes"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("User 'nobody' not found"));
    }

    #[test]
    fn test_user_reset_without_database() {
        let dir = TempDir::new().unwrap();
        platewise(&dir)
            .args(["user", "reset", "asha", "--yes"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No database"));
    }
}

// =============================================================================
// Analysis against a mock model endpoint
// =============================================================================

mod analyze {
    use super::*;
    use serde_json::{Value, json};
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn completion(content: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        }))
    }

    async fn run(dir: TempDir, endpoint: String, text: &'static str) -> assert_cmd::assert::Assert {
        tokio::task::spawn_blocking(move || {
            platewise(&dir)
                .args(["analyze", text, "--json", "--model", "microsoft/Phi-4"])
                .env("PLATEWISE_LLM_ENDPOINT", endpoint)
                .env("GITHUB_TOKEN", "test-token")
                .assert()
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_analyze_json_output() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("expert in food analysis"))
            .respond_with(completion(
                r#"```json
[{"food": "idli", "quantity": 3, "portion": "piece", "calories_per_item": 70, "total_calories": 210, "confidence": 0.9}]
```"#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("nutrition expert AI"))
            .respond_with(completion(
                r#"{"macro_balance": "Carb heavy", "nutrition_gaps": "Protein", "health_score": 68, "next_meal": "Dal and salad"}"#,
            ))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let output = run(dir, server.uri(), "3 idli").await.success();
        let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
        let body: Value = serde_json::from_str(&stdout).unwrap();

        assert_eq!(body["success"], true);
        assert_eq!(body["model_used"], "Fast Phi-4");
        assert_eq!(body["total_calories"], 210);
        assert_eq!(body["food_entries"][0]["food"], "idli");
        assert_eq!(body["ai_insights"]["health_score"], 68);
    }

    #[tokio::test]
    async fn test_analyze_without_foods_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(completion("I could not identify any food."))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        run(dir, server.uri(), "a walk in the park")
            .await
            .failure()
            .stdout(predicate::str::contains("No food items detected"));
    }
}
