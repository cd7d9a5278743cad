#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.default_registry.is_none());
        assert_eq!(
            config.default_platforms,
            vec!["linux/386", "linux/amd64", "linux/arm64"]
        );
        assert_eq!(config.builder, "ferry");
        assert!(config.registries.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
default_registry = "123456789012.dkr.ecr.us-east-1.amazonaws.com"
default_platforms = ["linux/amd64", "linux/arm64"]
builder = "ci"

[registries."123456789012.dkr.ecr.us-east-1.amazonaws.com"]
username = "AWS"
credential_command = "aws ecr get-login-password --region us-east-1"

[registries."localhost:5000"]
insecure = true
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(
            config.default_registry.as_deref(),
            Some("123456789012.dkr.ecr.us-east-1.amazonaws.com")
        );
        assert_eq!(config.default_platforms, vec!["linux/amd64", "linux/arm64"]);
        assert_eq!(config.builder, "ci");

        let ecr = config
            .registry("123456789012.dkr.ecr.us-east-1.amazonaws.com")
            .unwrap();
        assert_eq!(ecr.username.as_deref(), Some("AWS"));
        assert!(!ecr.insecure);

        let local = config.registry("localhost:5000").unwrap();
        assert!(local.insecure);
        assert!(local.credential_command.is_none());
    }

    #[test]
    fn test_partial_config_gets_defaults() {
        let config: Config = toml::from_str(r#"builder = "other""#).unwrap();
        assert_eq!(config.builder, "other");
        assert_eq!(
            config.default_platforms,
            vec!["linux/386", "linux/amd64", "linux/arm64"]
        );
    }

    #[test]
    fn test_credential_argv() {
        let registry = RegistryConfig {
            username: Some("AWS".to_string()),
            credential_command: Some("aws ecr get-login-password --region us-east-1".to_string()),
            insecure: false,
        };
        assert_eq!(
            registry.credential_argv().unwrap(),
            vec!["aws", "ecr", "get-login-password", "--region", "us-east-1"]
        );

        let empty = RegistryConfig {
            credential_command: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(empty.credential_argv().is_none());
        assert!(RegistryConfig::default().credential_argv().is_none());
    }
}
