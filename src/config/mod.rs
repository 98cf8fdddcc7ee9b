// src/config/mod.rs

//! Configuration loading and validation.
//!
//! - [`model`] defines the TOML-backed data model.
//! - [`loader`] reads a config file from disk.
//! - [`validate`] checks ranges and turns a `RawConfigFile` into a `ConfigFile`.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_or_default};
pub use model::{
    ConfigFile, EventLogSection, OrchestratorSection, RawConfigFile, SamplerSection, WorkerSection,
};
