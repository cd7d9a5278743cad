use anyhow::{Context, Result};
use clap::Parser;
use ferry::{
    builder::{BuildOptions, Buildx},
    cli::{BuilderCommands, Cli, Commands},
    config::Config,
    reference::Reference,
    service::{LoginService, PlatformDetector, PushService, ReleaseConfig, ReleaseService},
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging to stderr; RUST_LOG wins over --verbose
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load()?;

    match cli.command {
        Commands::Builder { command } => {
            let buildx = Buildx::new()?;
            match command {
                BuilderCommands::Create {
                    name,
                    driver,
                    platform,
                    set_default,
                } => {
                    for platform_str in &platform {
                        ferry::builder::validate_platform(platform_str)?;
                    }
                    let name = name.unwrap_or_else(|| config.builder.clone());
                    buildx.create_builder(&name, Some(&driver), &platform, set_default)?;
                }
                BuilderCommands::Bootstrap { name } => {
                    let name = name.unwrap_or_else(|| config.builder.clone());
                    let platforms = buildx.bootstrap(&name)?;
                    for platform_str in platforms {
                        println!("{}", platform_str);
                    }
                }
                BuilderCommands::Inspect { name } => {
                    let name = name.unwrap_or_else(|| config.builder.clone());
                    let info = buildx.inspect(&name)?;
                    println!("Name:      {}", info.name);
                    println!("Driver:    {}", info.driver.unwrap_or_default());
                    println!("Status:    {}", info.status.unwrap_or_default());
                    println!("Platforms: {}", info.platforms.join(", "));
                }
                BuilderCommands::Rm { name } => {
                    let name = name.unwrap_or_else(|| config.builder.clone());
                    buildx.remove_builder(&name)?;
                }
            }
        }
        Commands::Build {
            context,
            image,
            platform,
            builder,
            output,
        } => {
            let builder = builder.unwrap_or_else(|| config.builder.clone());
            let platforms = platform.unwrap_or_else(|| config.default_platforms.clone());
            let output = match output {
                Some(output) => output,
                None => default_output_path(&image)?,
            };

            let buildx = Buildx::new()?;
            let supported = ReleaseService::ensure_builder(&buildx, &builder)?;
            ferry::builder::warn_unsupported(&platforms, &supported);

            buildx.build(&BuildOptions {
                context,
                image,
                platforms,
                builder,
                output,
            })?;
        }
        Commands::Login {
            registry,
            username,
            password_stdin,
        } => {
            LoginService::login(&config, &registry, username, password_stdin).await?;
        }
        Commands::Push { archive, image } => {
            let digest_ref = PushService::push(&config, &archive, &image).await?;

            // Print only the digest reference to stdout
            println!("{}", digest_ref);
        }
        Commands::Platforms { image } => {
            let platforms = PlatformDetector::detect(&config, &image).await?;
            for platform_str in platforms {
                println!("{}", platform_str);
            }
        }
        Commands::Release {
            context,
            image,
            platform,
            builder,
        } => {
            let digest_ref = ReleaseService::release(
                &config,
                ReleaseConfig {
                    context,
                    image,
                    platforms: platform.unwrap_or_else(|| config.default_platforms.clone()),
                    builder: builder.unwrap_or_else(|| config.builder.clone()),
                },
            )
            .await?;

            println!("{}", digest_ref);
        }
        Commands::Version => {
            println!("ferry {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

/// Derive an archive path next to the working directory from the image name
fn default_output_path(image: &str) -> Result<PathBuf> {
    let reference: Reference = image
        .parse()
        .with_context(|| format!("Invalid image reference: {}", image))?;

    let name = reference
        .repository()
        .rsplit('/')
        .next()
        .unwrap_or("image");

    let tag = reference.tag();
    if tag.is_empty() {
        Ok(PathBuf::from(format!("{}.oci.tar", name)))
    } else {
        Ok(PathBuf::from(format!("{}-{}.oci.tar", name, tag)))
    }
}
