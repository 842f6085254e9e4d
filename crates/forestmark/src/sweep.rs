//! Benchmark matrices
//!
//! A [`SweepPlan`] expands into points, one directory each:
//!
//! ```text
//! <base>/ranks<R>/<format>-<layout>-<access>-<vars>-<bytes>/<repetition>/
//!     results.json
//!     success
//!     apparent_storage
//! ```
//!
//! Points whose directory already holds `success` are skipped, so an
//! interrupted sweep resumes where it stopped.

use crate::config::BenchConfig;
use crate::error::BenchError;
use crate::pipeline;
use crate::report::{ResultRecord, RESULTS_FILE};
use crate::rng::DEFAULT_SEED;
use crate::scenario::{PseudoRandom, ScenarioRegistry};
use forestmark_writer::{output_files, AccessMode, FormatGeneration, StorageLayout, WriteOptions};
use indexmap::IndexSet;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Marker written after a successful run
pub const SUCCESS_MARKER: &str = "success";

/// Total size of the removed output files
pub const APPARENT_STORAGE: &str = "apparent_storage";

/// Header of the [`extract`] table
pub const CSV_HEADER: &str = "ranks,storage_mode,format,access_mode,num_element_wise_variables,repetition,actual_information_bytes,seconds,throughput_B/s";

const BYTES_KEY: &str = "pseudo_random:bytes";

/// The matrix to run
#[derive(Debug, Clone, PartialEq)]
pub struct SweepPlan {
    /// Runs per configuration
    pub repetitions: usize,
    /// Group sizes
    pub ranks: Vec<usize>,
    /// Access modes
    pub access_modes: Vec<AccessMode>,
    /// Storage layouts
    pub storage_modes: Vec<StorageLayout>,
    /// Format generations; the classic format only runs file-per-process
    pub formats: Vec<FormatGeneration>,
    /// Synthetic variables per run
    pub num_element_wise_variables: usize,
    /// Byte budget of the pseudo-random scenario
    pub bytes: u64,
    /// Pre-write fill values
    pub fill: bool,
    /// Run seed
    pub seed: u64,
    /// Rows per chunk in the chunked layout
    pub chunk_len: u64,
}

impl Default for SweepPlan {
    fn default() -> Self {
        Self {
            repetitions: 3,
            ranks: vec![1],
            access_modes: vec![
                AccessMode::Independent,
                AccessMode::Collective,
                AccessMode::FilePerProcess,
            ],
            storage_modes: vec![StorageLayout::Contiguous, StorageLayout::Chunked],
            formats: vec![FormatGeneration::Hierarchical, FormatGeneration::Classic64],
            num_element_wise_variables: 0,
            bytes: PseudoRandom::default().bytes,
            fill: false,
            seed: DEFAULT_SEED,
            chunk_len: WriteOptions::default().chunk_len,
        }
    }
}

/// One configuration of a sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SweepPoint {
    /// Repetition index
    pub repetition: usize,
    /// Group size
    pub ranks: usize,
    /// Storage layout
    pub storage_mode: StorageLayout,
    /// Format generation
    pub format: FormatGeneration,
    /// Access mode
    pub access: AccessMode,
    /// Synthetic variables
    pub num_element_wise_variables: usize,
    /// Byte budget
    pub bytes: u64,
}

impl SweepPoint {
    /// Directory of this point under `base`
    #[must_use]
    pub fn workdir(&self, base: &Path) -> PathBuf {
        base.join(format!("ranks{}", self.ranks))
            .join(format!(
                "{}-{}-{}-{}-{}",
                self.format, self.storage_mode, self.access, self.num_element_wise_variables, self.bytes
            ))
            .join(self.repetition.to_string())
    }

    /// Check if this point already completed under `base`
    #[must_use]
    pub fn is_done(&self, base: &Path) -> bool {
        self.workdir(base).join(SUCCESS_MARKER).is_file()
    }
}

impl SweepPlan {
    /// Points in run order, duplicates removed
    #[must_use]
    pub fn points(&self) -> Vec<SweepPoint> {
        let mut points = IndexSet::new();
        for repetition in 0..self.repetitions {
            for &ranks in &self.ranks {
                for &storage_mode in &self.storage_modes {
                    for &format in &self.formats {
                        for &access in &self.access_modes {
                            if format == FormatGeneration::Classic64 && access != AccessMode::FilePerProcess {
                                continue;
                            }
                            points.insert(SweepPoint {
                                repetition,
                                ranks,
                                storage_mode,
                                format,
                                access,
                                num_element_wise_variables: self.num_element_wise_variables,
                                bytes: self.bytes,
                            });
                        }
                    }
                }
            }
        }
        points.into_iter().collect()
    }

    /// Run configuration of `point` writing into `workdir`
    #[must_use]
    pub fn config_for(&self, point: &SweepPoint, workdir: PathBuf) -> BenchConfig {
        BenchConfig {
            scenario: PseudoRandom::ID.to_string(),
            scenario_options: BTreeMap::from([(BYTES_KEY.to_string(), point.bytes.to_string())]),
            fill: self.fill,
            storage_mode: point.storage_mode,
            mpi_access: point.access,
            netcdf_version: point.format,
            num_element_wise_variables: point.num_element_wise_variables,
            ranks: point.ranks,
            seed: self.seed,
            output_dir: workdir,
            chunk_len: self.chunk_len,
        }
    }
}

/// What a sweep did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    /// Points run to completion
    pub completed: usize,
    /// Points already done before the sweep
    pub skipped: usize,
    /// Points whose run failed
    pub failed: usize,
}

/// Run every pending point of `plan` under `base`
///
/// A failing point is logged and counted; the sweep moves on. Errors writing
/// the sweep's own bookkeeping files abort it.
pub fn run_sweep(plan: &SweepPlan, base: &Path, registry: &ScenarioRegistry) -> Result<SweepSummary, BenchError> {
    let mut summary = SweepSummary::default();
    for point in plan.points() {
        let workdir = point.workdir(base);
        if point.is_done(base) {
            summary.skipped += 1;
            continue;
        }

        info!(workdir = %workdir.display(), "running sweep point");
        let config = plan.config_for(&point, workdir.clone());
        let files = output_files(&config.output_stem(), point.access, point.ranks);
        match pipeline::run(&config, registry) {
            Ok(_) => {
                finish_point(&workdir, &files)?;
                summary.completed += 1;
            }
            Err(e) => {
                warn!(workdir = %workdir.display(), "sweep point failed: {e}");
                remove_outputs(&files)?;
                summary.failed += 1;
            }
        }
    }
    info!(
        completed = summary.completed,
        skipped = summary.skipped,
        failed = summary.failed,
        "sweep finished"
    );
    Ok(summary)
}

/// Mark the point done, record the output size and remove the outputs
fn finish_point(workdir: &Path, files: &[PathBuf]) -> Result<(), BenchError> {
    let marker = workdir.join(SUCCESS_MARKER);
    fs::write(&marker, "1\n").map_err(BenchError::artifact(&marker))?;

    let mut listing = String::new();
    let mut total = 0u64;
    for file in files {
        let len = fs::metadata(file).map_err(BenchError::artifact(file))?.len();
        total += len;
        listing.push_str(&format!("{len}\t{}\n", file.display()));
    }
    listing.push_str(&format!("{total}\ttotal\n"));
    let storage = workdir.join(APPARENT_STORAGE);
    fs::write(&storage, listing).map_err(BenchError::artifact(&storage))?;

    for file in files {
        fs::remove_file(file).map_err(BenchError::artifact(file))?;
    }
    Ok(())
}

/// Remove whatever outputs a failed point left behind
fn remove_outputs(files: &[PathBuf]) -> Result<(), BenchError> {
    for file in files {
        match fs::remove_file(file) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(BenchError::artifact(file)(e)),
            _ => {}
        }
    }
    Ok(())
}

/// Print one CSV row per completed point of `plan` under `base`
///
/// Points without a success marker are named on `err`. Returns the number of
/// rows written.
pub fn extract(plan: &SweepPlan, base: &Path, out: &mut dyn Write, err: &mut dyn Write) -> Result<usize, BenchError> {
    let stdout = PathBuf::from("<stdout>");
    let stderr = PathBuf::from("<stderr>");
    writeln!(out, "{CSV_HEADER}").map_err(BenchError::artifact(&stdout))?;

    let mut rows = 0;
    for point in plan.points() {
        let workdir = point.workdir(base);
        if !point.is_done(base) {
            writeln!(err, "{} failed", workdir.display()).map_err(BenchError::artifact(&stderr))?;
            continue;
        }
        let record = ResultRecord::load(&workdir.join(RESULTS_FILE))?;
        writeln!(
            out,
            "{},{},{},{},{},{},{},{},{}",
            point.ranks,
            point.storage_mode,
            point.format,
            point.access,
            point.num_element_wise_variables,
            point.repetition,
            record.actual_information_bytes,
            record.seconds,
            record.throughput
        )
        .map_err(BenchError::artifact(&stdout))?;
        rows += 1;
    }
    Ok(rows)
}
