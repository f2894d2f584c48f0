//! # `vecdex` Core
//!
//! Lifecycle, capacity and identity management for a persistent approximate
//! nearest-neighbour index over embedding vectors.
//!
//! The graph search itself is delegated to an [`Engine`]. This crate owns what
//! sits around it: validating batches before they reach the engine, growing
//! capacity ahead of inserts, mapping labels onto engine slots, tombstoning
//! deletes, marshalling buffers across the engine boundary and keeping a
//! configuration record next to the persisted artifacts.
//!
//! ## Features
//!
//! - **Three spaces**: squared L2, inner product, cosine
//! - **Automatic growth**: capacity scales by a configurable factor on overflow
//! - **Soft deletes**: tombstones, with optional slot reuse
//! - **Per-call filters**: predicates are never shared between queries
//! - **Persistence**: `config.json` plus engine artifacts in one directory
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use vecdex_core::{Index, IndexConfig, OpenOptions, QueryOptions};
//!
//! let index: Index = Index::create(
//!     IndexConfig::builder()
//!         .max_elements(2)
//!         .persist_location("./data/idx")
//!         .build()?,
//! )?;
//!
//! index.add(&[vec![1.0, 2.0, 3.3, 4.4, 5.0]], &[5])?;
//! index.add(&[vec![5.1, 4.2, 3.3, 2.4, 1.5]], &[10])?;
//!
//! let even = |label: u64| label % 2 == 0;
//! let hits = index.query(
//!     &[vec![5.0, 4.0, 3.0, 2.0, 1.0]],
//!     1,
//!     &QueryOptions::default().with_filter(&even),
//! )?;
//! assert_eq!(hits[0][0].label, 10);
//!
//! index.close();
//! let reopened: Index = Index::open("./data/idx", &OpenOptions::new())?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::redundant_pub_crate)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::missing_const_for_fn)]

pub mod boundary;
pub mod capacity;
pub mod config;
pub mod distance;
pub mod engine;
pub mod error;
pub mod guard;
pub mod index;

#[cfg(test)]
mod error_tests;

/// External identifier of a stored vector.
pub type Label = u64;

pub use boundary::{LabelFilter, Neighbor};
pub use config::{IndexConfig, IndexConfigBuilder, IndexSettings, OpenOptions};
pub use distance::Space;
pub use engine::{Engine, EngineConfig, EngineCounts, EngineError, EngineParams, NativeEngine};
pub use error::{Error, Result};
pub use index::{Index, QueryOptions};
