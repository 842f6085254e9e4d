//! forestmark collective communication
//!
//! SPMD process groups for the benchmark pipeline.
//!
//! # Core Concepts
//!
//! - [`Communicator`]: rank/size queries plus the collective primitives every
//!   rank must call in the same order (barrier, exchange, reductions, votes)
//! - [`ReduceOp`]: element operation applied by reductions
//! - [`LocalWorld`]: runs a group of ranks as threads of one process
//! - [`SelfComm`]: the trivial single-rank group
//!
//! # Example
//!
//! ```rust,ignore
//! use forestmark_comm::{Communicator, LocalWorld, ReduceOp};
//!
//! let world = LocalWorld::new(4)?;
//! let sums = world.run(|comm| comm.all_reduce_u64(comm.rank() as u64, ReduceOp::Sum))?;
//! assert!(sums.into_iter().all(|s| matches!(s, Ok(6))));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod communicator;
mod error;
mod local;
mod solo;

pub use communicator::{Communicator, ReduceOp};
pub use error::CommError;
pub use local::{LocalComm, LocalWorld};
pub use solo::SelfComm;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
