//! End-to-end benchmark runs on in-process rank groups

use forestmark::{
    information_bytes, run, run_rank, BenchConfig, BenchError, ConfigError, ResultRecord,
    ScenarioRegistry, TimingHarness, TimingState, RESULTS_FILE,
};
use forestmark_test_utils::{assert_all_equal, on_ranks, scratch_dir, small_config, uniform_forest};
use forestmark_writer::{output_files, AccessMode, DatasetReader, WriteOptions};
use pretty_assertions::assert_eq;
use std::fs;

#[test]
fn test_single_rank_run_reports_level_zero_forest() {
    let dir = scratch_dir();
    let config = small_config(dir.path(), 1, 16);

    let outcome = run(&config, &ScenarioRegistry::with_defaults()).unwrap();

    assert_eq!(outcome.num_elements, 16);
    assert_eq!(outcome.record.actual_information_bytes, 3424);
    assert_eq!(outcome.results_path, dir.path().join(RESULTS_FILE));
    assert_eq!(ResultRecord::load(&outcome.results_path).unwrap(), outcome.record);
    assert!(dir.path().join("forestmark_write_test.fmd").is_file());
}

#[test]
fn test_file_per_process_run_on_four_ranks() {
    let dir = scratch_dir();
    let config = BenchConfig {
        mpi_access: AccessMode::FilePerProcess,
        num_element_wise_variables: 2,
        ..small_config(dir.path(), 4, 128)
    };

    let outcome = run(&config, &ScenarioRegistry::with_defaults()).unwrap();

    assert_eq!(outcome.num_elements, 128);
    assert_eq!(outcome.record.actual_information_bytes, information_bytes(128, 8 * 92, 2));

    let files = output_files(&config.output_stem(), AccessMode::FilePerProcess, 4);
    let mut rows = 0;
    for file in &files {
        let mut reader = DatasetReader::open(file).unwrap();
        let types = reader.read_i32("Mesh3D_vol_types").unwrap();
        let variable = reader.read_i64("element_wise_variable_1").unwrap();
        assert_eq!(types.len(), variable.len());
        rows += types.len();
    }
    assert_eq!(rows, 128);
}

#[test]
fn test_zero_variables_still_times_the_write() {
    let dir = scratch_dir();
    let config = small_config(dir.path(), 2, 16);

    let outcome = run(&config, &ScenarioRegistry::with_defaults()).unwrap();

    assert!(outcome.record.seconds >= 0.0);
    assert!(outcome.record.throughput >= 0.0);
    let reader = DatasetReader::open(dir.path().join("forestmark_write_test.fmd")).unwrap();
    assert!(reader.header().variable("element_wise_variable_0").is_none());
}

#[test]
fn test_collective_and_independent_files_match() {
    let collective_dir = scratch_dir();
    let independent_dir = scratch_dir();
    let registry = ScenarioRegistry::with_defaults();

    let collective = BenchConfig {
        num_element_wise_variables: 1,
        ..small_config(collective_dir.path(), 3, 40)
    };
    let independent = BenchConfig {
        mpi_access: AccessMode::Independent,
        output_dir: independent_dir.path().to_path_buf(),
        ..collective.clone()
    };
    run(&collective, &registry).unwrap();
    run(&independent, &registry).unwrap();

    let read = |dir: &std::path::Path| fs::read(dir.join("forestmark_write_test.fmd")).unwrap();
    assert_eq!(read(collective_dir.path()), read(independent_dir.path()));
}

#[test]
fn test_same_seed_same_forest() {
    let registry = ScenarioRegistry::with_defaults();
    let first = scratch_dir();
    let second = scratch_dir();

    let a = run(&small_config(first.path(), 2, 100), &registry).unwrap();
    let b = run(&small_config(second.path(), 2, 100), &registry).unwrap();

    assert_eq!(a.num_elements, b.num_elements);
    assert_eq!(a.record.actual_information_bytes, b.record.actual_information_bytes);
}

#[test]
fn test_only_reporting_rank_gets_an_outcome() {
    let dir = scratch_dir();
    let config = small_config(dir.path(), 3, 16);
    let scenario = config.scenario(&ScenarioRegistry::with_defaults()).unwrap();

    let outcomes = on_ranks(3, |comm| run_rank(&config, &scenario, comm).unwrap());

    assert!(outcomes[0].is_some());
    assert!(outcomes[1..].iter().all(Option::is_none));
}

#[test]
fn test_timing_result_is_identical_on_every_rank() {
    let dir = scratch_dir();
    let stem = dir.path().join("timed");

    let seconds = on_ranks(4, |comm| {
        let forest = uniform_forest(1, comm);
        let mut harness = TimingHarness::new();
        let (timing, _) = harness
            .time_write(&stem, &forest, &[], &WriteOptions::default(), comm)
            .unwrap();
        assert_eq!(harness.state(), TimingState::Done);
        timing.seconds.to_bits()
    });

    assert_all_equal(&seconds);
}

#[test]
fn test_unknown_scenario_fails_before_any_collective() {
    let dir = scratch_dir();
    let config = BenchConfig {
        scenario: "uniform".to_string(),
        ..small_config(dir.path(), 2, 16)
    };

    let err = run(&config, &ScenarioRegistry::with_defaults()).unwrap_err();

    assert!(err.is_config_error());
    assert!(matches!(
        err,
        BenchError::Config(ConfigError::UnknownScenario { ref name, .. }) if name == "uniform"
    ));
    assert!(fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[test]
fn test_unusable_output_dir_is_reported() {
    let dir = scratch_dir();
    let blocker = dir.path().join("not_a_dir");
    fs::write(&blocker, b"x").unwrap();
    let config = small_config(&blocker, 2, 16);

    let err = run(&config, &ScenarioRegistry::with_defaults()).unwrap_err();

    assert!(matches!(err, BenchError::Artifact { ref path, .. } if path.starts_with(&blocker)));
    assert!(!err.is_config_error());
    assert!(!err.is_remote());
}
