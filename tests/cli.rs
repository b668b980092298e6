use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn stylusnote_cmd(config_home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("stylusnote").expect("binary exists");
    cmd.env("XDG_CONFIG_HOME", config_home.path())
        .env("XDG_DATA_HOME", config_home.path());
    cmd
}

#[test]
fn stylusnote_help_prints_usage() {
    let temp = TempDir::new().unwrap();
    stylusnote_cmd(&temp)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Stylus-first ink capture with palm rejection",
        ))
        .stdout(predicate::str::contains("--list-devices"));
}

#[test]
fn no_flags_prints_overview() {
    let temp = TempDir::new().unwrap();
    stylusnote_cmd(&temp)
        .assert()
        .success()
        .stdout(predicate::str::contains("stylusnote --capture"));
}

#[test]
fn capture_and_inspect_conflict() {
    let temp = TempDir::new().unwrap();
    stylusnote_cmd(&temp)
        .args(["--capture", "--inspect"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn inspect_reports_missing_page() {
    let temp = TempDir::new().unwrap();
    let page = temp.path().join("page.json");
    stylusnote_cmd(&temp)
        .arg("--inspect")
        .arg("--page")
        .arg(&page)
        .assert()
        .success()
        .stdout(predicate::str::contains("not created yet"));
}

#[test]
fn inspect_summarizes_saved_page() {
    let temp = TempDir::new().unwrap();
    let page = temp.path().join("page.json");
    std::fs::write(
        &page,
        r#"{
            "format_version": 1,
            "last_modified": "2024-05-01T10:00:00Z",
            "strokes": [{
                "tool": "pen", "color": [0, 0, 0, 1], "widthBase": 3.0,
                "points": [
                    {"x": 1, "y": 2, "pressure": null, "width": 3.0, "t": 0},
                    {"x": 5, "y": 2, "pressure": null, "width": 3.0, "t": 8000}
                ],
                "timestamp": "2024-05-01T09:59:58Z"
            }]
        }"#,
    )
    .unwrap();

    stylusnote_cmd(&temp)
        .arg("--inspect")
        .arg("--page")
        .arg(&page)
        .assert()
        .success()
        .stdout(predicate::str::contains("Format version: 1"))
        .stdout(predicate::str::contains("Strokes: 1 (2 points)"));
}

#[test]
fn inspect_refuses_newer_format_version() {
    let temp = TempDir::new().unwrap();
    let page = temp.path().join("page.json");
    std::fs::write(&page, r#"{"format_version": 999, "strokes": []}"#).unwrap();

    stylusnote_cmd(&temp)
        .arg("--inspect")
        .arg("--page")
        .arg(&page)
        .assert()
        .failure()
        .stderr(predicate::str::contains("page format version 999 is not supported"));
}

#[test]
fn invalid_config_is_reported() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("broken.toml");
    std::fs::write(&config, "[stroke\nbase_width =").unwrap();

    stylusnote_cmd(&temp)
        .arg("--inspect")
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse config"));
}
