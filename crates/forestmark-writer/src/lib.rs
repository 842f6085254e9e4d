//! forestmark dataset writer
//!
//! Writes a partitioned forest and its element-wise variables to a
//! self-describing array file laid out after the UGRID 3D volume
//! conventions, from every rank of a group at once.
//!
//! # Core Concepts
//!
//! - [`WriteOptions`]: storage layout, access mode, fill mode and format
//!   generation of one write
//! - [`Header`]: dimensions, variables and their byte placement, stored as
//!   JSON in front of the data section
//! - [`write_forest`]: the collective write; every rank calls it
//! - [`DatasetReader`]: reads a written file back
//!
//! # File Layout
//!
//! ```text
//! [Magic: 4 bytes, "FMC5" or "FMH4"]
//! [Header Length: u64 LE]
//! [Header: JSON]
//! [Padding to 8 bytes]
//! [Data section: variable regions or interleaved chunks, little-endian]
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use forestmark_writer::{write_forest, DatasetReader, WriteOptions};
//!
//! let summary = write_forest(Path::new("out/test"), &forest, &variables, &WriteOptions::default(), &comm)?;
//! let mut reader = DatasetReader::open(&summary.files[0])?;
//! let types = reader.read_i32("Mesh3D_vol_types")?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod format;
mod options;
mod reader;
mod shard;
mod writer;

pub use error::WriteError;
pub use format::{
    DataType, Dimension, Group, Header, VariableSpec, CLASSIC64_MAGIC, HIERARCHICAL_MAGIC,
};
pub use options::{AccessMode, FormatGeneration, ParseOptionError, StorageLayout, WriteOptions};
pub use reader::DatasetReader;
pub use shard::{ElementWiseVariable, ELEMENT_DIM, MAX_NODES_DIM, NODE_DIM};
pub use writer::{output_files, write_forest, WriteSummary, FILE_EXTENSION};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
