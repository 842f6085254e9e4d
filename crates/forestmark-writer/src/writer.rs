//! The collective write
//!
//! Every rank calls [`write_forest`] with its local shard. The call returns
//! on all ranks with the same verdict: either every rank reports success or
//! every rank reports an error.

use crate::error::WriteError;
use crate::format::Header;
use crate::options::{AccessMode, WriteOptions};
use crate::shard::{check_variables, schema, ElementWiseVariable, Shard};
use forestmark_comm::{Communicator, ReduceOp};
use forestmark_forest::Forest;
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Extension of every dataset file
pub const FILE_EXTENSION: &str = "fmd";

/// Rank that defines shared files and receives gathered rows
const WRITER_RANK: usize = 0;

const FILL_BUFFER: usize = 1 << 16;

/// What one rank did during a write
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Files this rank created
    pub files: Vec<PathBuf>,
    /// Data bytes this rank wrote, fill excluded
    pub bytes_written: u64,
}

/// Files produced by a group of `size` ranks writing to `stem`
#[must_use]
pub fn output_files(stem: &Path, access: AccessMode, size: usize) -> Vec<PathBuf> {
    match access {
        AccessMode::FilePerProcess => (0..size)
            .map(|rank| with_suffix(stem, &format!(".{rank}.{FILE_EXTENSION}")))
            .collect(),
        AccessMode::Collective | AccessMode::Independent => {
            vec![with_suffix(stem, &format!(".{FILE_EXTENSION}"))]
        }
    }
}

fn with_suffix(stem: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(stem.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Write `forest` and `variables` to the dataset at `stem` (collective)
///
/// Shared files are named `<stem>.fmd`; with
/// [`AccessMode::FilePerProcess`] every rank writes `<stem>.<rank>.fmd`
/// holding only its shard.
pub fn write_forest(
    stem: &Path,
    forest: &Forest,
    variables: &[ElementWiseVariable],
    options: &WriteOptions,
    comm: &dyn Communicator,
) -> Result<WriteSummary, WriteError> {
    let checked = check_variables(variables, forest.local_num_elements());
    if !comm.vote(checked.is_ok())? {
        return Err(checked.err().unwrap_or(WriteError::PeerFailed));
    }

    let local_nodes = forest.local_num_vertices();
    let outcome = match options.access {
        AccessMode::FilePerProcess => {
            let path = output_files(stem, options.access, comm.size()).swap_remove(comm.rank());
            let shard = Shard::build(forest, variables, 0, 0);
            let header = plan_header(options, shard.num_elements, shard.num_nodes, variables);
            write_file_per_process(&path, &header, &shard, comm.rank())
        }
        AccessMode::Collective | AccessMode::Independent => {
            let node_offset = comm.exclusive_scan_u64(local_nodes)?;
            let global_nodes = comm.all_reduce_u64(local_nodes, ReduceOp::Sum)?;
            let header = plan_header(options, forest.global_num_elements(), global_nodes, variables);
            let shard = Shard::build(forest, variables, forest.global_offset(), node_offset);
            let path = with_suffix(stem, &format!(".{FILE_EXTENSION}"));
            if options.access == AccessMode::Collective {
                write_collective(&path, &header, &shard, comm)?
            } else {
                write_independent(&path, &header, &shard, comm)?
            }
        }
    };

    if !comm.vote(outcome.is_ok())? {
        return Err(outcome.err().unwrap_or(WriteError::PeerFailed));
    }
    outcome
}

fn plan_header(options: &WriteOptions, num_elements: u64, num_nodes: u64, variables: &[ElementWiseVariable]) -> Header {
    let (dimensions, defs, attributes) = schema(num_elements, num_nodes, variables);
    Header::plan(
        options.format,
        options.layout,
        options.fill,
        options.chunk_len,
        dimensions,
        defs,
        attributes,
    )
}

fn write_file_per_process(path: &Path, header: &Header, shard: &Shard, rank: usize) -> Result<WriteSummary, WriteError> {
    let data_start = define(path, header)?;
    let bytes_written = write_shard(path, header, data_start, shard, rank)?;
    Ok(WriteSummary {
        files: vec![path.to_path_buf()],
        bytes_written,
    })
}

/// Gather every shard to the writer rank, which writes the whole file
///
/// The outer error is a collective failure; the inner result is this rank's
/// local outcome, still to be voted on.
fn write_collective(
    path: &Path,
    header: &Header,
    shard: &Shard,
    comm: &dyn Communicator,
) -> Result<Result<WriteSummary, WriteError>, WriteError> {
    match comm.gather_bytes(shard.encode(), WRITER_RANK)? {
        Some(parts) => Ok(write_gathered(path, header, &parts)),
        None => Ok(Ok(WriteSummary::default())),
    }
}

fn write_gathered(path: &Path, header: &Header, parts: &[Vec<u8>]) -> Result<WriteSummary, WriteError> {
    let data_start = define(path, header)?;
    let mut bytes_written = 0;
    for (source_rank, part) in parts.iter().enumerate() {
        let shard = Shard::decode(part, source_rank)?;
        bytes_written += write_shard(path, header, data_start, &shard, source_rank)?;
    }
    debug!(ranks = parts.len(), bytes_written, "gathered rows written");
    Ok(WriteSummary {
        files: vec![path.to_path_buf()],
        bytes_written,
    })
}

/// The writer rank defines the file, then every rank writes its own rows
fn write_independent(
    path: &Path,
    header: &Header,
    shard: &Shard,
    comm: &dyn Communicator,
) -> Result<Result<WriteSummary, WriteError>, WriteError> {
    let rank = comm.rank();
    let defined = if rank == WRITER_RANK {
        define(path, header).map(|_| ())
    } else {
        Ok(())
    };
    if !comm.vote(defined.is_ok())? {
        return Ok(Err(defined.err().unwrap_or(WriteError::PeerFailed)));
    }

    // every rank derives the data offset from the header it planned itself
    let local = header
        .encode()
        .and_then(|encoded| write_shard(path, header, encoded.len() as u64, shard, rank))
        .map(|bytes_written| WriteSummary {
            files: if rank == WRITER_RANK {
                vec![path.to_path_buf()]
            } else {
                Vec::new()
            },
            bytes_written,
        });
    Ok(local)
}

/// Create the file, write the header and allocate (or fill) the data section
///
/// Returns the file offset of the data section.
fn define(path: &Path, header: &Header) -> Result<u64, WriteError> {
    let encoded = header.encode()?;
    let data_start = encoded.len() as u64;
    let file = File::create(path).map_err(WriteError::io(path))?;
    let mut out = BufWriter::new(file);
    out.write_all(&encoded).map_err(WriteError::io(path))?;

    if header.fill {
        for var in &header.variables {
            let pattern = var.dtype.fill_bytes();
            let buffer: Vec<u8> = pattern.iter().copied().cycle().take(FILL_BUFFER).collect();
            for (position, len) in var.regions() {
                out.seek(SeekFrom::Start(data_start + position))
                    .map_err(WriteError::io(path))?;
                let mut remaining = len as usize;
                while remaining > 0 {
                    let take = remaining.min(buffer.len());
                    out.write_all(&buffer[..take]).map_err(WriteError::io(path))?;
                    remaining -= take;
                }
            }
        }
    }

    let file = out
        .into_inner()
        .map_err(|e| WriteError::io(path)(e.into_error()))?;
    file.set_len(data_start + header.data_len)
        .map_err(WriteError::io(path))?;

    debug!(path = %path.display(), data_len = header.data_len, fill = header.fill, "dataset defined");
    Ok(data_start)
}

/// Write every column of the shard from `source_rank` at its rows; returns
/// the bytes written
fn write_shard(
    path: &Path,
    header: &Header,
    data_start: u64,
    shard: &Shard,
    source_rank: usize,
) -> Result<u64, WriteError> {
    let file = OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(WriteError::io(path))?;
    let mut out = BufWriter::new(file);
    let mut bytes_written = 0;

    for (index, (var, column)) in header.variables.iter().zip(&shard.columns).enumerate() {
        let (first, count) = shard.rows_of(index);
        let row_bytes = var.row_bytes();
        for (position, skip, rows) in var.runs(first, count) {
            let start = (skip * row_bytes) as usize;
            let end = start + (rows * row_bytes) as usize;
            let Some(bytes) = column.get(start..end) else {
                return Err(WriteError::CorruptShard {
                    source_rank,
                    detail: format!("column {} shorter than its rows", var.name),
                });
            };
            out.seek(SeekFrom::Start(data_start + position))
                .map_err(WriteError::io(path))?;
            out.write_all(bytes).map_err(WriteError::io(path))?;
            bytes_written += bytes.len() as u64;
        }
    }
    out.flush().map_err(WriteError::io(path))?;

    info!(
        path = %path.display(),
        first_element = shard.element_offset,
        elements = shard.num_elements,
        bytes_written,
        "rows written"
    );
    Ok(bytes_written)
}
