//! saleevent-ingest library
//!
//! This crate provides the core functionality for the `saleevent-ingest` binary.
//! Keep the crate root minimal; implementation and tests live in their modules.
//!
//! ## Overview
//!
//! A batch of retail sale events arrives as one XML document. Each `SaleEvent`
//! element becomes a summary row in a table store plus an archived copy of its
//! XML in a blob store:
//!
//! - [`loader`] - Reads the source document from a blob container
//! - [`extractor`] - Parses the XML and maps every `SaleEvent` to a record and raw fragment
//! - [`publisher`] - Writes the table row and archive blob for each event
//! - [`pipeline`] - Wires the three stages together from a [`config::PipelineConfig`]
//! - [`storage`] - Blob and table store traits with local, HTTP and in-memory backends
//! - [`cli`] - Command-line interface
//! - [`models`] - Summary records, table rows and keys
//! - [`errors`] - Error types used throughout the application
//!
//! ## Example Usage
//!
//! ```no_run
//! use saleevent_ingest::{config::PipelineConfig, errors::AppResult, pipeline::Pipeline};
//!
//! # async fn example() -> AppResult<()> {
//! let config = PipelineConfig::from_env()?;
//! let report = Pipeline::from_config(&config)?.run().await?;
//! println!("published {} sale events", report.published);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod extractor;
pub mod loader;
pub mod models;
pub mod pipeline;
pub mod publisher;
pub mod storage;
pub mod utils;
