/// ArcSleuth Core: protocol, tree model, ingestion and divergence analysis.
///
/// This crate contains all business logic with zero UI dependencies.
/// The coordination engine, the scanner process and the tests all build
/// on it.
///
/// # Modules
///
/// - [`protocol`]: Typed line-oriented wire messages shared by every process.
/// - [`model`]: Arena-allocated per-archive tree with upward aggregation.
/// - [`registry`]: Archive registry, event ingestion and the hash index.
/// - [`analysis`]: Cross-replica discrepancy detection.
/// - [`scanner`]: The filesystem scanner/hasher collaborator.
/// - [`config`]: JSON + environment configuration.
pub mod analysis;
pub mod config;
pub mod model;
pub mod protocol;
pub mod registry;
pub mod scanner;
