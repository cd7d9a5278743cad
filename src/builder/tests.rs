#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn test_validate_platform() {
        assert!(validate_platform("linux/386").is_ok());
        assert!(validate_platform("linux/amd64").is_ok());
        assert!(validate_platform("linux/arm64").is_ok());
        assert!(validate_platform("linux/arm/v7").is_ok());
        assert!(validate_platform("linux/riscv64").is_ok());

        assert!(validate_platform("windows/amd64").is_err());
        assert!(validate_platform("linux").is_err());
        assert!(validate_platform("").is_err());
    }

    #[test]
    fn test_split_platform() {
        let (os, arch, variant) = split_platform("linux/amd64").unwrap();
        assert_eq!(os, "linux");
        assert_eq!(arch, "amd64");
        assert!(variant.is_none());

        let (os, arch, variant) = split_platform("linux/arm/v7").unwrap();
        assert_eq!(os, "linux");
        assert_eq!(arch, "arm");
        assert_eq!(variant.as_deref(), Some("v7"));

        assert!(split_platform("linux").is_err());
        assert!(split_platform("linux/arm/v7/extra").is_err());
    }

    #[test]
    fn test_parse_platforms_from_inspect_output() {
        let output = r#"Name:          ferry
Driver:        docker-container
Last Activity: 2024-01-10 12:00:00 +0000 UTC

Nodes:
Name:      ferry0
Endpoint:  unix:///var/run/docker.sock
Status:    running
Buildkit:  v0.12.4
Platforms: linux/amd64*, linux/386, linux/arm64, linux/arm/v7
"#;

        let platforms = parse_platforms(output);
        assert_eq!(
            platforms,
            vec!["linux/amd64", "linux/386", "linux/arm64", "linux/arm/v7"]
        );
    }

    #[test]
    fn test_parse_platforms_deduplicates_nodes() {
        let output = "Platforms: linux/amd64\nPlatforms: linux/amd64, linux/arm64\n";
        let platforms = parse_platforms(output);
        assert_eq!(platforms, vec!["linux/amd64", "linux/arm64"]);
    }

    #[test]
    fn test_parse_platforms_empty() {
        assert!(parse_platforms("Name: ferry\nDriver: docker\n").is_empty());
    }

    #[test]
    fn test_parse_field() {
        let output = "Name:   ferry\nDriver: docker-container\nStatus:    running\n";
        assert_eq!(parse_field(output, "Driver:").as_deref(), Some("docker-container"));
        assert_eq!(parse_field(output, "Status:").as_deref(), Some("running"));
        assert!(parse_field(output, "Endpoint:").is_none());
    }

    #[test]
    fn test_host_platform_is_known() {
        assert!(validate_platform(host_platform()).is_ok());
    }
}
