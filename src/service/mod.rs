//! Service layer for business logic orchestration
//!
//! This module contains the service layer that orchestrates business logic,
//! separating concerns from the CLI layer in main.rs.

pub mod login;
pub mod platform;
pub mod push;
pub mod release;

pub use login::LoginService;
pub use platform::PlatformDetector;
pub use push::PushService;
pub use release::{ReleaseConfig, ReleaseService};
