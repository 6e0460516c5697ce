//! Audit reports for models in an MLflow model registry.
//!
//! The pipeline fetches a registered model and everything linked to it
//! through a [`Client`], normalizes the entities into records
//! ([`enrich`]), and lays them out as a section tree ([`report`]) that a
//! renderer turns into a document.

pub mod aggregate;
pub mod api;
pub mod artifacts;
pub mod backend;
pub mod enrich;
pub mod flavor;
pub mod mlmodel;
pub mod report;
pub mod tags;

#[cfg(test)]
mod fixtures;

pub use api::client::Client;
pub use api::id::{ExperimentId, RunId, VersionNumber};
