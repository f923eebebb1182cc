//! Dependency batching for checks.
//!
//! This module turns a flat list of checks into an execution plan: an ordered
//! sequence of batches in which every check appears strictly after all checks
//! it depends on.
//!
//! ## Architecture
//!
//! 1. **Batcher** - Validates ids and dependencies, builds the graph, rejects cycles
//! 2. **CheckGraph** - Forward/reverse edges; groups checks into batches
//! 3. **ExecutionPlan** - The immutable batch order a scan job walks per target
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use vigil::check::CheckDefinition;
//! use vigil::dag::Batcher;
//!
//! let checks = vec![
//!     Arc::new(CheckDefinition::builder("crawl").build()),
//!     Arc::new(CheckDefinition::builder("sqli").depends_on(["crawl"]).build()),
//!     Arc::new(CheckDefinition::builder("xss").depends_on(["crawl"]).build()),
//! ];
//!
//! let plan = Batcher::plan(checks).unwrap();
//! // Batch 0: [crawl]
//! // Batch 1: [sqli, xss]
//! assert_eq!(plan.len(), 2);
//! ```

mod builder;
mod plan;

pub use builder::{Batcher, CheckGraph, CheckIndex};
pub use plan::{Batch, ExecutionPlan};
