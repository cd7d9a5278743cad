use anyhow::Result;
use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_version_command() -> Result<()> {
    let mut cmd = Command::cargo_bin("ferry")?;
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("ferry 0.1.0"));
    Ok(())
}

#[test]
fn test_version_subcommand() -> Result<()> {
    let mut cmd = Command::cargo_bin("ferry")?;
    cmd.arg("version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("ferry 0.1.0"));
    Ok(())
}

#[test]
fn test_help_command() -> Result<()> {
    let mut cmd = Command::cargo_bin("ferry")?;
    cmd.arg("--help");
    cmd.assert().success().stdout(predicate::str::contains(
        "Build and push multi-architecture container images",
    ));
    Ok(())
}

#[test]
fn test_build_help() -> Result<()> {
    let mut cmd = Command::cargo_bin("ferry")?;
    cmd.arg("build").arg("--help");
    cmd.assert().success().stdout(predicate::str::contains(
        "Build a multi-platform image into an OCI layout archive",
    ));
    Ok(())
}

#[test]
fn test_login_help() -> Result<()> {
    let mut cmd = Command::cargo_bin("ferry")?;
    cmd.arg("login").arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("--password-stdin"))
        .stdout(predicate::str::contains("short-lived"));
    Ok(())
}

#[test]
fn test_push_requires_arguments() -> Result<()> {
    let mut cmd = Command::cargo_bin("ferry")?;
    cmd.arg("push");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("required"));
    Ok(())
}

#[test]
fn test_push_rejects_invalid_reference() -> Result<()> {
    // The reference is validated before the archive is touched
    let mut cmd = Command::cargo_bin("ferry")?;
    cmd.arg("push").arg("missing.tar").arg("example.com/app:");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid image reference"));
    Ok(())
}

#[test]
fn test_push_reports_missing_archive() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let archive = temp_dir.path().join("does-not-exist.tar");

    let mut cmd = Command::cargo_bin("ferry")?;
    cmd.arg("push")
        .arg(&archive)
        .arg("example.com/app:latest");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to open archive"));
    Ok(())
}

#[test]
fn test_push_rejects_malformed_archive() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let archive = temp_dir.path().join("bogus.tar");
    std::fs::write(&archive, b"this is not a tar archive")?;

    let mut cmd = Command::cargo_bin("ferry")?;
    cmd.arg("push")
        .arg(&archive)
        .arg("example.com/app:latest");
    cmd.assert().failure();
    Ok(())
}

#[test]
fn test_login_requires_username() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;

    let mut cmd = Command::cargo_bin("ferry")?;
    cmd.arg("login")
        .arg("registry.invalid")
        .arg("--password-stdin")
        .write_stdin("some-token\n")
        // Point config lookups away from any real user configuration
        .env("XDG_CONFIG_HOME", temp_dir.path())
        .env("DOCKER_CONFIG", temp_dir.path());
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("No username"));
    Ok(())
}

#[test]
fn test_login_requires_password_source() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;

    let mut cmd = Command::cargo_bin("ferry")?;
    cmd.arg("login")
        .arg("registry.invalid")
        .arg("--username")
        .arg("AWS")
        .env("XDG_CONFIG_HOME", temp_dir.path())
        .env("DOCKER_CONFIG", temp_dir.path());
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("No password source"));
    Ok(())
}

#[test]
fn test_platforms_rejects_invalid_reference() -> Result<()> {
    let mut cmd = Command::cargo_bin("ferry")?;
    cmd.arg("platforms").arg("example.com/app@notadigest");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid image reference"));
    Ok(())
}

#[test]
fn test_stdout_is_clean_for_version() -> Result<()> {
    // stdout carries only machine-consumable output
    let mut cmd = Command::cargo_bin("ferry")?;
    let output = cmd.arg("version").output()?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("ferry {}", env!("CARGO_PKG_VERSION")));
    Ok(())
}
