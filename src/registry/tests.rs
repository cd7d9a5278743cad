#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::config::RegistryConfig;

    fn client_with_insecure(host: &str) -> RegistryClient {
        let mut config = Config::default();
        config.registries.insert(
            host.to_string(),
            RegistryConfig {
                insecure: true,
                ..Default::default()
            },
        );
        RegistryClient::new(&config).unwrap()
    }

    #[test]
    fn test_api_host_maps_docker_hub() {
        assert_eq!(api_host("docker.io"), "registry-1.docker.io");
        assert_eq!(api_host("index.docker.io"), "registry-1.docker.io");
        assert_eq!(api_host("gcr.io"), "gcr.io");
        assert_eq!(api_host("localhost:5000"), "localhost:5000");
    }

    #[test]
    fn test_scheme_defaults_to_https() {
        let client = RegistryClient::new(&Config::default()).unwrap();
        assert_eq!(client.scheme("gcr.io"), "https");
        assert_eq!(client.scheme("localhost:5000"), "https");
    }

    #[test]
    fn test_scheme_honours_insecure_config() {
        let client = client_with_insecure("localhost:5000");
        assert_eq!(client.scheme("localhost:5000"), "http");
        assert_eq!(client.scheme("gcr.io"), "https");
    }

    #[test]
    fn test_v2_uri() {
        let client = client_with_insecure("localhost:5000");
        assert_eq!(
            client.v2_uri("localhost:5000").unwrap().to_string(),
            "http://localhost:5000/v2/"
        );
        assert_eq!(
            client.v2_uri("docker.io").unwrap().to_string(),
            "https://registry-1.docker.io/v2/"
        );
    }

    #[test]
    fn test_repo_uri() {
        let client = RegistryClient::new(&Config::default()).unwrap();
        let reference: Reference = "example.com/team/app:v1".parse().unwrap();
        assert_eq!(
            client
                .repo_uri(&reference, "blobs/uploads/")
                .unwrap()
                .to_string(),
            "https://example.com/v2/team/app/blobs/uploads/"
        );
        assert_eq!(
            client
                .repo_uri(&reference, "manifests/v1")
                .unwrap()
                .to_string(),
            "https://example.com/v2/team/app/manifests/v1"
        );
    }

    #[test]
    fn test_resolve_location() {
        let client = RegistryClient::new(&Config::default()).unwrap();

        assert_eq!(
            client
                .resolve_location("example.com", "https://cdn.example.com/upload/abc")
                .unwrap(),
            "https://cdn.example.com/upload/abc"
        );
        assert_eq!(
            client
                .resolve_location("example.com", "/v2/team/app/blobs/uploads/abc?state=x")
                .unwrap(),
            "https://example.com/v2/team/app/blobs/uploads/abc?state=x"
        );
        assert!(client
            .resolve_location("example.com", "no-scheme-no-slash")
            .is_err());
    }

    #[test]
    fn test_manifest_accept_covers_all_types() {
        for media in [
            media_type::OCI_INDEX,
            media_type::OCI_MANIFEST,
            media_type::DOCKER_MANIFEST,
            media_type::DOCKER_MANIFEST_LIST,
        ] {
            assert!(MANIFEST_ACCEPT.contains(media));
        }
    }
}
