//! forestmark forests
//!
//! Hybrid hexahedron/prism/tetrahedron forests refined by 1:8 subdivision
//! and partitioned along a depth-first space-filling order.
//!
//! # Core Concepts
//!
//! - [`CoarseMesh`]: the level-0 trees and their corner coordinates
//! - [`Element`]: a tree index plus a refinement path, geometry on demand
//! - [`Forest`]: the local shard of a partitioned forest; adaptation consumes it
//! - [`Adapt`]: per-element keep/refine decision
//!
//! # Example
//!
//! ```rust,ignore
//! use forestmark_comm::SelfComm;
//! use forestmark_forest::{Adapt, CoarseMesh, Forest};
//! use std::sync::Arc;
//!
//! let comm = SelfComm::new();
//! let uniform = Forest::new_uniform(Arc::new(CoarseMesh::hybrid_hypercube()), 1, &comm)?;
//! let adapted = uniform.adapt(&comm, false, |_, _| Adapt::Refine)?;
//! assert_eq!(adapted.global_num_elements(), 16 * 64);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod cmesh;
mod element;
mod error;
mod forest;
mod shape;

pub use cmesh::{CoarseMesh, CoarseTree};
pub use element::{Element, ENCODED_LEN, MAX_LEVEL};
pub use error::ForestError;
pub use forest::{Adapt, Forest};
pub use shape::{ElementShape, Vertices, MAX_VERTICES};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
