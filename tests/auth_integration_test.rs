//! Integration tests for credential resolution and persistence

use anyhow::Result;
use ferry::auth::{persist_credentials, Authenticator, DefaultKeychain, Keychain};
use std::fs;
use tempfile::TempDir;

/// Reads and writes go through a scratch DOCKER_CONFIG so the developer's
/// real credentials are never touched. Kept as a single test because the
/// variable is process-wide.
#[test]
fn test_keychain_round_trip_through_docker_config() -> Result<()> {
    let temp_dir = TempDir::new()?;

    let config_content = r#"{
        "auths": {
            "ghcr.io": {
                "auth": "dGVzdDp0ZXN0MTIz"
            },
            "example.com": {
                "username": "svc",
                "password": "hunter2"
            }
        }
    }"#;
    fs::write(temp_dir.path().join("config.json"), config_content)?;

    std::env::set_var("DOCKER_CONFIG", temp_dir.path());

    // Base64 auth entries decode to basic credentials
    let keychain = DefaultKeychain::new();
    let auth = keychain.resolve("ghcr.io/user/image:tag")?.authorization()?;
    let (user, pass) = auth.basic_credentials().unwrap();
    assert_eq!(user, "test");
    assert_eq!(pass, "test123");

    // Plain username/password entries resolve too
    let auth = keychain.resolve("example.com/app")?.authorization()?;
    assert_eq!(auth.username.as_deref(), Some("svc"));
    assert_eq!(auth.password.as_deref(), Some("hunter2"));

    // Unknown registries fall back to anonymous
    let auth = keychain
        .resolve("unknown.registry.io/image:tag")?
        .authorization()?;
    assert!(auth.is_anonymous());

    // A login writes into the same file without clobbering other entries
    let path = persist_credentials(
        "123456789012.dkr.ecr.us-east-1.amazonaws.com",
        "AWS",
        "minted-token",
    )?;
    assert_eq!(path, temp_dir.path().join("config.json"));

    let rewritten = fs::read_to_string(&path)?;
    assert!(rewritten.contains("ghcr.io"));
    assert!(rewritten.contains("123456789012.dkr.ecr.us-east-1.amazonaws.com"));

    // A fresh keychain sees the stored short-lived credentials
    let keychain = DefaultKeychain::new();
    let auth = keychain
        .resolve("123456789012.dkr.ecr.us-east-1.amazonaws.com/team/app:release")?
        .authorization()?;
    let (user, pass) = auth.basic_credentials().unwrap();
    assert_eq!(user, "AWS");
    assert_eq!(pass, "minted-token");

    std::env::remove_var("DOCKER_CONFIG");
    Ok(())
}
