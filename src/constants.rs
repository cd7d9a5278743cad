/// Platform constants for container images
pub mod platform {
    /// Linux 386 platform identifier
    pub const LINUX_386: &str = "linux/386";

    /// Linux AMD64 platform identifier
    pub const LINUX_AMD64: &str = "linux/amd64";

    /// Linux ARM64 platform identifier
    pub const LINUX_ARM64: &str = "linux/arm64";

    /// Linux ARMv7 platform identifier
    pub const LINUX_ARM_V7: &str = "linux/arm/v7";

    /// Linux ARMv6 platform identifier
    pub const LINUX_ARM_V6: &str = "linux/arm/v6";

    /// Linux PowerPC 64 LE platform identifier
    pub const LINUX_PPC64LE: &str = "linux/ppc64le";

    /// Linux S390X platform identifier
    pub const LINUX_S390X: &str = "linux/s390x";

    /// Linux RISC-V 64 platform identifier
    pub const LINUX_RISCV64: &str = "linux/riscv64";

    /// All platform identifiers ferry knows how to build and push
    pub const KNOWN: &[&str] = &[
        LINUX_386,
        LINUX_AMD64,
        LINUX_ARM64,
        LINUX_ARM_V7,
        LINUX_ARM_V6,
        LINUX_PPC64LE,
        LINUX_S390X,
        LINUX_RISCV64,
    ];

    /// Platforms built when none are requested
    pub const DEFAULT: &[&str] = &[LINUX_386, LINUX_AMD64, LINUX_ARM64];
}

/// Container image tag constants
pub mod tag {
    /// Default container image tag
    pub const DEFAULT: &str = "latest";
}

/// Media types for manifests, indexes, and blobs
pub mod media_type {
    /// OCI image manifest
    pub const OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";

    /// OCI image index
    pub const OCI_INDEX: &str = "application/vnd.oci.image.index.v1+json";

    /// OCI image config blob
    pub const OCI_CONFIG: &str = "application/vnd.oci.image.config.v1+json";

    /// OCI gzipped layer blob
    pub const OCI_LAYER_GZIP: &str = "application/vnd.oci.image.layer.v1.tar+gzip";

    /// Docker schema2 manifest
    pub const DOCKER_MANIFEST: &str = "application/vnd.docker.distribution.manifest.v2+json";

    /// Docker schema2 manifest list
    pub const DOCKER_MANIFEST_LIST: &str =
        "application/vnd.docker.distribution.manifest.list.v2+json";

    /// Docker image config blob
    pub const DOCKER_CONFIG: &str = "application/vnd.docker.container.image.v1+json";

    /// Docker gzipped layer blob
    pub const DOCKER_LAYER_GZIP: &str = "application/vnd.docker.image.rootfs.diff.tar.gzip";
}
