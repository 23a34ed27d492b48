//! Empties a GCP project of its resources and optionally deletes the project.

pub mod config;
pub mod error;
pub mod gcp;
pub mod orchestrator;
pub mod resource;
