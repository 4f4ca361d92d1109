use assert_cmd::Command;
use predicates::str::contains;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let data_dir = dir.path().join("data");
        fs::write(
            dir.path().join("config.yml"),
            format!(
                "api:\n  base_url: http://127.0.0.1:9\n  timeout_secs: 1\nstorage:\n  data_dir: {}\n",
                data_dir.display()
            ),
        )?;
        Ok(Sandbox { dir })
    }

    fn storage_file(&self) -> std::path::PathBuf {
        self.dir.path().join("data").join("storage.json")
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("taskdesk").unwrap();
        cmd.env("TASKDESK_CONFIG", self.dir.path().join("config.yml"))
            .env_remove("TASKDESK_API_URL")
            .env_remove("RUST_LOG");
        cmd
    }
}

fn write_drafts(path: &Path, drafts: &str) -> Result<(), Box<dyn std::error::Error>> {
    fs::create_dir_all(path.parent().unwrap())?;
    let outer = serde_json::json!({ "todoAutoSave": drafts });
    fs::write(path, outer.to_string())?;
    Ok(())
}

#[test]
fn help_lists_subcommands() {
    Command::cargo_bin("taskdesk")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("drafts"))
        .stdout(contains("stats"));
}

#[test]
fn drafts_show_with_nothing_saved() -> Result<(), Box<dyn std::error::Error>> {
    let sandbox = Sandbox::new()?;
    sandbox
        .cmd()
        .args(["drafts", "show"])
        .assert()
        .success()
        .stdout(contains("No saved drafts"));
    Ok(())
}

#[test]
fn drafts_show_then_clear() -> Result<(), Box<dyn std::error::Error>> {
    let sandbox = Sandbox::new()?;
    write_drafts(
        &sandbox.storage_file(),
        r#"{"addTaskForm":{"title":"Call the bank","priority":"high"}}"#,
    )?;

    sandbox
        .cmd()
        .args(["drafts", "show"])
        .assert()
        .success()
        .stdout(contains("addTaskForm"))
        .stdout(contains("\"Call the bank\""));

    sandbox
        .cmd()
        .args(["drafts", "clear"])
        .assert()
        .success()
        .stdout(contains("Cleared saved drafts"));

    let remaining = fs::read_to_string(sandbox.storage_file())?;
    assert!(!remaining.contains("todoAutoSave"));
    Ok(())
}

#[test]
fn add_rejects_blank_title_before_any_request() -> Result<(), Box<dyn std::error::Error>> {
    let sandbox = Sandbox::new()?;
    sandbox
        .cmd()
        .args(["add", "   "])
        .assert()
        .failure()
        .stderr(contains("title: This field is required"))
        .stderr(contains("task not created"));
    Ok(())
}

#[test]
fn add_reports_unreachable_server() -> Result<(), Box<dyn std::error::Error>> {
    let sandbox = Sandbox::new()?;
    sandbox
        .cmd()
        .args(["add", "Pay rent", "--priority", "urgent", "--category", "3"])
        .assert()
        .failure()
        .stderr(contains("An error occurred. Please try again."));
    Ok(())
}

#[test]
fn unknown_status_filter_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let sandbox = Sandbox::new()?;
    sandbox
        .cmd()
        .args(["list", "--status", "someday"])
        .assert()
        .failure()
        .stderr(contains("unknown status: someday"));
    Ok(())
}
