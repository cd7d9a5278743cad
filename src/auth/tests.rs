//! Tests for the auth module

use super::*;

#[test]
fn test_docker_config_parsing() {
    let config_json = r#"{
        "auths": {
            "docker.io": {
                "auth": "dXNlcjpwYXNz"
            },
            "123456789012.dkr.ecr.us-east-1.amazonaws.com": {
                "username": "AWS",
                "password": "shortlived",
                "registrytoken": "bearer-token"
            }
        },
        "credHelpers": {
            "ecr.amazonaws.com": "ecr-login"
        },
        "credsStore": "osxkeychain"
    }"#;

    let config: DockerConfig = serde_json::from_str(config_json).unwrap();

    assert_eq!(config.auths.len(), 2);
    assert!(config.auths.contains_key("docker.io"));
    assert!(config
        .auths
        .contains_key("123456789012.dkr.ecr.us-east-1.amazonaws.com"));

    let docker_auth = &config.auths["docker.io"];
    assert_eq!(docker_auth.auth, Some("dXNlcjpwYXNz".to_string()));

    let ecr_auth = &config.auths["123456789012.dkr.ecr.us-east-1.amazonaws.com"];
    assert_eq!(ecr_auth.username, Some("AWS".to_string()));
    assert_eq!(ecr_auth.password, Some("shortlived".to_string()));
    assert_eq!(ecr_auth.registry_token, Some("bearer-token".to_string()));

    assert_eq!(config.cred_helpers.len(), 1);
    assert_eq!(config.cred_helpers["ecr.amazonaws.com"], "ecr-login");

    assert_eq!(config.creds_store, Some("osxkeychain".to_string()));
}

#[test]
fn test_docker_config_preserves_unknown_fields() {
    let config_json = r#"{
        "auths": {},
        "HttpHeaders": {
            "User-Agent": "Docker-Client/24.0"
        }
    }"#;

    let config: DockerConfig = serde_json::from_str(config_json).unwrap();
    assert!(config.extra.contains_key("HttpHeaders"));

    let rewritten = serde_json::to_string(&config).unwrap();
    assert!(rewritten.contains("HttpHeaders"));
}

#[test]
fn test_docker_auth_entry_to_auth_config() {
    let entry = DockerAuthEntry {
        auth: Some("dXNlcjpwYXNz".to_string()),
        ..Default::default()
    };

    let config = entry.to_auth_config();
    assert_eq!(config.auth, Some("dXNlcjpwYXNz".to_string()));
    assert!(config.username.is_none());
    assert!(config.password.is_none());

    let (user, pass) = config.basic_credentials().unwrap();
    assert_eq!(user, "user");
    assert_eq!(pass, "pass");
}
