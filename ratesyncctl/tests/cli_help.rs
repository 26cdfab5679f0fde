use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

fn ratesyncctl(dir: &TempDir) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("ratesyncctl");
    cmd.current_dir(dir.path())
        .env_remove("RATESYNC_CONFIG_PATH")
        .env_remove("RATESYNC_CONFIG_JSON")
        .env("RUST_LOG", "warn");
    cmd
}

#[test]
fn help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    let output = ratesyncctl(&dir)
        .arg("--help")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8_lossy(&output);
    for command in ["defaults", "combo", "simulate"] {
        assert!(text.contains(command), "help missing {command}");
    }

    let output = ratesyncctl(&dir)
        .args(["simulate", "--help"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8_lossy(&output);
    assert!(text.contains("--actions"), "simulate help missing --actions");
    assert!(text.contains("--trace"), "simulate help missing --trace");
}

#[test]
fn defaults_prints_first_run_records() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let output = ratesyncctl(&dir)
        .arg("defaults")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value: serde_json::Value = serde_json::from_slice(&output)?;
    assert_eq!(value["state"]["currentSpeed"], 1.0);
    assert_eq!(value["state"]["lastSpeed"], 1.5);
    assert_eq!(value["settings"]["increment"], 0.1);
    assert_eq!(value["settings"]["overlayTimeout"], 2000);
    assert_eq!(value["settings"]["hotkeys"]["increase"], "Ctrl+Shift+KeyS");
    Ok(())
}

#[test]
fn defaults_follow_inline_config() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let output = ratesyncctl(&dir)
        .env(
            "RATESYNC_CONFIG_JSON",
            r#"{"settings":{"increment":0.25,"showOverlay":false}}"#,
        )
        .arg("defaults")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value: serde_json::Value = serde_json::from_slice(&output)?;
    assert_eq!(value["settings"]["increment"], 0.25);
    assert_eq!(value["settings"]["showOverlay"], false);
    Ok(())
}

#[test]
fn invalid_config_is_reported() {
    let dir = TempDir::new().unwrap();
    ratesyncctl(&dir)
        .env(
            "RATESYNC_CONFIG_JSON",
            r#"{"settings":{"hotkeys":{"increase":"Shift+KeyS"}}}"#,
        )
        .arg("defaults")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid ratesync configuration"));
}

#[test]
fn combo_is_canonicalized_and_resolved() {
    let dir = TempDir::new().unwrap();
    ratesyncctl(&dir)
        .args(["combo", "--shift", "--ctrl", "KeyS"])
        .assert()
        .success()
        .stdout(predicate::str::contains("combo:   Ctrl+Shift+KeyS"))
        .stdout(predicate::str::contains("display: ⌃⇧S"))
        .stdout(predicate::str::contains("action:  increase"));
}

#[test]
fn meta_press_resolves_ctrl_binding() {
    let dir = TempDir::new().unwrap();
    ratesyncctl(&dir)
        .args(["combo", "--meta", "--shift", "KeyD"])
        .assert()
        .success()
        .stdout(predicate::str::contains("combo:   Meta+Shift+KeyD"))
        .stdout(predicate::str::contains("action:  toggle"));
}

#[test]
fn unbound_combo_has_no_action() {
    let dir = TempDir::new().unwrap();
    ratesyncctl(&dir)
        .args(["combo", "--alt", "KeyX"])
        .assert()
        .success()
        .stdout(predicate::str::contains("action:  none"));
}

#[test]
fn simulate_converges_every_context() {
    let dir = TempDir::new().unwrap();
    let output = ratesyncctl(&dir)
        .args([
            "simulate",
            "--contexts",
            "3",
            "--videos",
            "2",
            "--actions",
            "increase,increase,toggle,toggle,set:1.75",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8_lossy(&output);

    assert!(text.contains("converged on 1.75x"), "{text}");
    let context_lines: Vec<&str> =
        text.lines().filter(|line| line.starts_with("ctx-")).collect();
    assert_eq!(context_lines.len(), 3, "{text}");
    for line in context_lines {
        assert!(line.contains("media [1.75x, 1.75x]"), "{line}");
    }
}

#[test]
fn simulate_trace_prints_wire_messages() {
    let dir = TempDir::new().unwrap();
    ratesyncctl(&dir)
        .args(["simulate", "--contexts", "2", "--actions", "set:2", "--trace"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""action":"setSpeed""#))
        .stdout(predicate::str::contains(r#""action":"speedChanged""#))
        .stdout(predicate::str::contains("converged on 2x"));
}

#[test]
fn simulate_rejects_unknown_steps() {
    let dir = TempDir::new().unwrap();
    ratesyncctl(&dir)
        .args(["simulate", "--actions", "increase,rewind"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown action 'rewind'"));
}
