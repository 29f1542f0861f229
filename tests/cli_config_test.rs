use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn dropwatch(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_dropwatch"))
        .args(args)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run dropwatch")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_init_command() {
    let temp_dir = TempDir::new().unwrap();

    let output = dropwatch(temp_dir.path(), &["init"]);
    assert!(output.status.success());

    let config_path = temp_dir.path().join(".dropwatch/settings.toml");
    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("version = 1"));
    assert!(content.contains("[events]"));
    assert!(content.contains("[logging]"));

    // Second init without --force is refused
    let output = dropwatch(temp_dir.path(), &["init"]);
    assert!(!output.status.success());
    assert!(dropwatch(temp_dir.path(), &["init", "--force"]).status.success());
}

#[test]
fn test_config_command() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("custom.toml");
    std::fs::write(&config_path, "[events]\ncapacity = 42\n").unwrap();

    let output = dropwatch(
        temp_dir.path(),
        &["config", "--config", config_path.to_str().unwrap()],
    );
    assert!(output.status.success());
    assert!(stdout(&output).contains("capacity = 42"));
}

#[test]
fn test_add_list_remove_commands() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    std::fs::create_dir(root.join("in")).unwrap();
    assert!(dropwatch(root, &["init"]).status.success());

    let output = dropwatch(root, &["add", "in", "File", "-t", "out"]);
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(stdout(&output).contains("Configuration 1 (File) watching"));
    assert!(root.join(".dropwatch/configurations.json").exists());

    let output = dropwatch(root, &["list"]);
    assert!(output.status.success());
    let listed = stdout(&output);
    assert!(listed.contains("Id Type        Folder"));
    assert!(listed.contains(" 1 File"));

    // Missing -t is rejected and names the flag
    let output = dropwatch(root, &["add", "in", "File"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("-t"));

    let output = dropwatch(root, &["remove", "1"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("stopped watching"));

    let output = dropwatch(root, &["remove", "1"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("There is no configuration with the given id"));
}

#[test]
fn test_integrations_command() {
    let temp_dir = TempDir::new().unwrap();

    let output = dropwatch(temp_dir.path(), &["integrations"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("File"));
    assert!(text.contains("-t <target>"));
}
