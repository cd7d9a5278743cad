pub mod auth;
pub mod builder;
pub mod cli;
pub mod config;
pub mod constants;
pub mod image;
pub mod manifest;
pub mod reference;
pub mod registry;
pub mod service;

pub use anyhow::Result;
