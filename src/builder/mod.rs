use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

use crate::constants::platform;

#[cfg(test)]
mod tests;

/// Handle to the buildx toolchain managing cross-platform builder instances
pub struct Buildx {
    docker: PathBuf,
}

/// Parsed state of a builder instance
#[derive(Debug, Clone)]
pub struct BuilderInfo {
    pub name: String,
    pub driver: Option<String>,
    pub status: Option<String>,
    pub platforms: Vec<String>,
}

/// Options for a multi-platform image build
pub struct BuildOptions {
    pub context: PathBuf,
    pub image: String,
    pub platforms: Vec<String>,
    pub builder: String,
    /// Destination for the OCI layout archive the build produces
    pub output: PathBuf,
}

impl Buildx {
    /// Locate the docker binary and verify buildx is available
    pub fn new() -> Result<Self> {
        let docker = which::which("docker")
            .context("docker not found on PATH; the build toolchain requires it")?;

        let output = Command::new(&docker)
            .args(["buildx", "version"])
            .output()
            .context("Failed to execute docker buildx version")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("docker buildx is not available: {}", stderr);
        }

        debug!(
            "Using buildx: {}",
            String::from_utf8_lossy(&output.stdout).trim()
        );

        Ok(Self { docker })
    }

    /// Create a named builder instance
    pub fn create_builder(
        &self,
        name: &str,
        driver: Option<&str>,
        platforms: &[String],
        use_builder: bool,
    ) -> Result<()> {
        info!("Creating builder instance: {}", name);

        let mut cmd = Command::new(&self.docker);
        cmd.args(["buildx", "create", "--name", name]);

        if let Some(driver) = driver {
            cmd.args(["--driver", driver]);
        }

        if !platforms.is_empty() {
            cmd.args(["--platform", &platforms.join(",")]);
        }

        if use_builder {
            cmd.arg("--use");
        }

        let output = run(&mut cmd)?;
        debug!(
            "Created builder: {}",
            String::from_utf8_lossy(&output.stdout).trim()
        );
        Ok(())
    }

    /// Bootstrap a builder so it can accept cross-platform builds
    ///
    /// Returns the platform identifiers the bootstrapped builder reports.
    pub fn bootstrap(&self, name: &str) -> Result<Vec<String>> {
        info!("Bootstrapping builder: {}", name);

        let mut cmd = Command::new(&self.docker);
        cmd.args(["buildx", "inspect", "--bootstrap", "--builder", name]);

        let output = run(&mut cmd)?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let platforms = parse_platforms(&stdout);

        if platforms.is_empty() {
            warn!("Builder {} reported no platforms", name);
        } else {
            info!("Builder {} supports: {}", name, platforms.join(", "));
        }

        Ok(platforms)
    }

    /// Inspect a builder instance without bootstrapping it
    pub fn inspect(&self, name: &str) -> Result<BuilderInfo> {
        let mut cmd = Command::new(&self.docker);
        cmd.args(["buildx", "inspect", "--builder", name]);

        let output = run(&mut cmd)?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        Ok(BuilderInfo {
            name: name.to_string(),
            driver: parse_field(&stdout, "Driver:"),
            status: parse_field(&stdout, "Status:"),
            platforms: parse_platforms(&stdout),
        })
    }

    /// Whether a builder instance with this name exists
    pub fn builder_exists(&self, name: &str) -> bool {
        Command::new(&self.docker)
            .args(["buildx", "inspect", "--builder", name])
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    /// Remove a builder instance
    pub fn remove_builder(&self, name: &str) -> Result<()> {
        info!("Removing builder instance: {}", name);

        let mut cmd = Command::new(&self.docker);
        cmd.args(["buildx", "rm", name]);

        run(&mut cmd)?;
        Ok(())
    }

    /// Build an image for the requested platforms into an OCI layout archive
    pub fn build(&self, options: &BuildOptions) -> Result<()> {
        for platform_str in &options.platforms {
            validate_platform(platform_str)?;
        }

        info!(
            "Building {} for {} platform(s)",
            options.image,
            options.platforms.len()
        );

        let dest = options
            .output
            .to_str()
            .context("Output path is not valid UTF-8")?;

        let mut cmd = Command::new(&self.docker);
        cmd.args(["buildx", "build"])
            .args(["--builder", &options.builder])
            .args(["--platform", &options.platforms.join(",")])
            .args(["--tag", &options.image])
            .args(["--output", &format!("type=oci,dest={}", dest)])
            .arg(&options.context);

        debug!("Running command: {:?}", cmd);
        run(&mut cmd)?;

        if !options.output.exists() {
            anyhow::bail!("Build completed but {} was not written", dest);
        }

        info!("Wrote OCI layout archive to {}", dest);
        Ok(())
    }
}

fn run(cmd: &mut Command) -> Result<std::process::Output> {
    let output = cmd
        .output()
        .with_context(|| format!("Failed to execute {:?}", cmd))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("{:?} failed: {}", cmd, stderr.trim());
    }

    Ok(output)
}

/// Check a platform identifier against the known set
pub fn validate_platform(platform_str: &str) -> Result<()> {
    if platform::KNOWN.contains(&platform_str) {
        Ok(())
    } else {
        anyhow::bail!(
            "Unsupported platform: {} (known: {})",
            platform_str,
            platform::KNOWN.join(", ")
        )
    }
}

/// Split a platform identifier into os, architecture, and optional variant
pub fn split_platform(platform_str: &str) -> Result<(String, String, Option<String>)> {
    let parts: Vec<&str> = platform_str.split('/').collect();
    match parts.as_slice() {
        [os, arch] => Ok((os.to_string(), arch.to_string(), None)),
        [os, arch, variant] => Ok((os.to_string(), arch.to_string(), Some(variant.to_string()))),
        _ => anyhow::bail!("Invalid platform format: {}", platform_str),
    }
}

/// The platform of the host ferry runs on
pub fn host_platform() -> &'static str {
    if cfg!(target_arch = "aarch64") {
        platform::LINUX_ARM64
    } else if cfg!(target_arch = "x86") {
        platform::LINUX_386
    } else {
        platform::LINUX_AMD64
    }
}

/// Platforms the host kernel can emulate through registered binfmt handlers
///
/// Reads /proc/sys/fs/binfmt_misc; empty anywhere that directory is absent.
pub fn emulated_platforms() -> Vec<String> {
    let binfmt_dir = Path::new("/proc/sys/fs/binfmt_misc");
    let entries = match std::fs::read_dir(binfmt_dir) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let mut platforms = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name();
        let emulated = match name.to_string_lossy().as_ref() {
            "qemu-i386" => vec![platform::LINUX_386],
            "qemu-aarch64" => vec![platform::LINUX_ARM64],
            "qemu-arm" => vec![platform::LINUX_ARM_V7, platform::LINUX_ARM_V6],
            "qemu-ppc64le" => vec![platform::LINUX_PPC64LE],
            "qemu-s390x" => vec![platform::LINUX_S390X],
            "qemu-riscv64" => vec![platform::LINUX_RISCV64],
            _ => continue,
        };
        platforms.extend(emulated.into_iter().map(String::from));
    }

    platforms.sort();
    platforms.dedup();
    platforms
}

/// Warn about requested platforms neither the builder nor the host covers
pub fn warn_unsupported(requested: &[String], builder_platforms: &[String]) {
    let emulated = emulated_platforms();
    let native = host_platform();

    for platform_str in requested {
        let by_builder = builder_platforms.iter().any(|p| p == platform_str);
        let by_host = platform_str == native || emulated.iter().any(|p| p == platform_str);
        if !by_builder && !by_host {
            warn!(
                "Platform {} is not reported by the builder and no emulator is registered; \
                 the build may fail",
                platform_str
            );
        }
    }
}

fn parse_field(output: &str, field: &str) -> Option<String> {
    output.lines().find_map(|line| {
        line.trim()
            .strip_prefix(field)
            .map(|value| value.trim().to_string())
    })
}

fn parse_platforms(output: &str) -> Vec<String> {
    let mut platforms = Vec::new();

    for line in output.lines() {
        if let Some(list) = line.trim().strip_prefix("Platforms:") {
            for entry in list.split(',') {
                // buildx marks preferred platforms with a trailing '*'
                let entry = entry.trim().trim_end_matches(['*', '+']);
                if !entry.is_empty() && !platforms.iter().any(|p| p == entry) {
                    platforms.push(entry.to_string());
                }
            }
        }
    }

    platforms
}
