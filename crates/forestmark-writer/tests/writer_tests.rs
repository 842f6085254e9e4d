//! Collective writes from multi-rank groups, read back from disk

use forestmark_comm::{Communicator, LocalComm, LocalWorld};
use forestmark_forest::{Adapt, CoarseMesh, Forest};
use forestmark_writer::{
    output_files, write_forest, AccessMode, DataType, DatasetReader, ElementWiseVariable,
    FormatGeneration, StorageLayout, WriteError, WriteOptions, ELEMENT_DIM, NODE_DIM,
};
use pretty_assertions::assert_eq;
use std::path::Path;
use std::sync::Arc;

/// Level-1 hypercube with the elements of every third tree refined once
fn forest(comm: &LocalComm) -> Forest {
    let forest = Forest::new_uniform(Arc::new(CoarseMesh::hybrid_hypercube()), 1, comm).unwrap();
    forest
        .adapt(comm, false, |e, _| {
            if e.tree() % 3 == 0 {
                Adapt::Refine
            } else {
                Adapt::Keep
            }
        })
        .unwrap()
        .partition(comm)
        .unwrap()
}

/// One variable whose values are the global element indices
fn index_variable(forest: &Forest) -> ElementWiseVariable {
    let values = (0..forest.local_num_elements() as i64)
        .map(|i| forest.global_offset() as i64 + i)
        .collect();
    ElementWiseVariable::new("element_wise_variable_0", values)
}

fn write_with(stem: &Path, ranks: usize, options: WriteOptions) -> u64 {
    let world = LocalWorld::new(ranks).unwrap();
    let totals = world
        .run(|comm| {
            let forest = forest(comm);
            let variables = vec![index_variable(&forest)];
            write_forest(stem, &forest, &variables, &options, comm).unwrap();
            forest.global_num_elements()
        })
        .unwrap();
    totals[0]
}

fn options(layout: StorageLayout, access: AccessMode) -> WriteOptions {
    WriteOptions {
        layout,
        access,
        chunk_len: 7,
        ..WriteOptions::default()
    }
}

#[test]
fn test_collective_write_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    let stem = dir.path().join("bench");
    let elements = write_with(&stem, 3, options(StorageLayout::Chunked, AccessMode::Collective));

    let mut reader = DatasetReader::open(dir.path().join("bench.fmd")).unwrap();
    assert_eq!(reader.header().dimension(ELEMENT_DIM), Some(elements));

    let types = reader.read_i32("Mesh3D_vol_types").unwrap();
    assert_eq!(types.len() as u64, elements);
    assert!(types.iter().all(|t| [10, 12, 13].contains(t)));

    let trees = reader.read_i64("Mesh3D_vol_tree_id").unwrap();
    assert!(trees.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(trees.last(), Some(&15));

    let values = reader.read_i64("element_wise_variable_0").unwrap();
    assert_eq!(values, (0..elements as i64).collect::<Vec<_>>());
}

#[test]
fn test_node_indices_are_global_and_padded() {
    let dir = tempfile::tempdir().unwrap();
    let stem = dir.path().join("nodes");
    write_with(&stem, 2, options(StorageLayout::Contiguous, AccessMode::Collective));

    let mut reader = DatasetReader::open(dir.path().join("nodes.fmd")).unwrap();
    let num_nodes = reader.header().dimension(NODE_DIM).unwrap();
    let types = reader.read_i32("Mesh3D_vol_types").unwrap();
    let nodes = reader.read_i64("Mesh3D_vol_nodes").unwrap();

    let mut next = 0;
    for (element, slots) in nodes.chunks(8).enumerate() {
        let used = match types[element] {
            10 => 4,
            13 => 6,
            _ => 8,
        };
        for (slot, index) in slots.iter().enumerate() {
            if slot < used {
                assert_eq!(*index, next);
                next += 1;
            } else {
                assert_eq!(*index, -1);
            }
        }
    }
    assert_eq!(next as u64, num_nodes);

    let x = reader.read_f64("Mesh3D_node_x").unwrap();
    assert_eq!(x.len() as u64, num_nodes);
    assert!(x.iter().all(|c| (0.0..=1.0).contains(c)));
}

#[test]
fn test_independent_and_collective_files_match() {
    let dir = tempfile::tempdir().unwrap();
    for layout in [StorageLayout::Contiguous, StorageLayout::Chunked] {
        let collective = dir.path().join(format!("collective-{layout}"));
        let independent = dir.path().join(format!("independent-{layout}"));
        write_with(&collective, 3, options(layout, AccessMode::Collective));
        write_with(&independent, 3, options(layout, AccessMode::Independent));

        let read = |stem: &Path| std::fs::read(output_files(stem, AccessMode::Collective, 3)[0].clone()).unwrap();
        assert!(read(&collective) == read(&independent), "{layout} files differ");
    }
}

#[test]
fn test_file_per_process_writes_local_shards() {
    let dir = tempfile::tempdir().unwrap();
    let stem = dir.path().join("shard");
    let elements = write_with(&stem, 3, options(StorageLayout::Contiguous, AccessMode::FilePerProcess));

    let files = output_files(&stem, AccessMode::FilePerProcess, 3);
    assert_eq!(files[1], dir.path().join("shard.1.fmd"));

    let mut total = 0;
    let mut values = Vec::new();
    for file in &files {
        let mut reader = DatasetReader::open(file).unwrap();
        total += reader.header().dimension(ELEMENT_DIM).unwrap();
        values.extend(reader.read_i64("element_wise_variable_0").unwrap());
        // node indices restart in every file
        assert_eq!(reader.read_i64("Mesh3D_vol_nodes").unwrap()[0], 0);
    }
    assert_eq!(total, elements);
    assert_eq!(values, (0..elements as i64).collect::<Vec<_>>());
}

#[test]
fn test_fill_mode_fills_chunk_padding() {
    let dir = tempfile::tempdir().unwrap();
    for fill in [false, true] {
        let stem = dir.path().join(format!("fill-{fill}"));
        let options = WriteOptions {
            fill,
            ..options(StorageLayout::Chunked, AccessMode::Collective)
        };
        write_with(&stem, 2, options);

        let path = output_files(&stem, AccessMode::Collective, 2).remove(0);
        let reader = DatasetReader::open(&path).unwrap();
        let header = reader.header().clone();
        let types = header.variable("Mesh3D_vol_types").unwrap();
        assert!(types.rows % types.chunk_rows != 0, "needs a partial last chunk");

        let bytes = std::fs::read(&path).unwrap();
        let json_len = u64::from_le_bytes(bytes[4..12].try_into().unwrap());
        let data_start = (12 + json_len).div_ceil(8) * 8;
        let padding = (data_start + types.row_position(types.rows)) as usize;
        let expected = if fill {
            DataType::I32.fill_bytes()
        } else {
            vec![0; 4]
        };
        assert_eq!(bytes[padding..padding + 4].to_vec(), expected);
        assert_eq!(header.fill, fill);
    }
}

#[test]
fn test_format_generations() {
    let dir = tempfile::tempdir().unwrap();
    for format in [FormatGeneration::Classic64, FormatGeneration::Hierarchical] {
        let stem = dir.path().join(format.to_string());
        let options = WriteOptions {
            format,
            ..options(StorageLayout::Contiguous, AccessMode::Collective)
        };
        write_with(&stem, 1, options);

        let path = output_files(&stem, AccessMode::Collective, 1).remove(0);
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes[..4].to_vec(), format.magic().to_vec());

        let reader = DatasetReader::open(&path).unwrap();
        let groups: Vec<_> = reader.header().groups.iter().map(|g| g.name.clone()).collect();
        match format {
            FormatGeneration::Classic64 => assert!(groups.is_empty()),
            FormatGeneration::Hierarchical => assert_eq!(groups, vec!["mesh", "element_data"]),
        }
    }
}

#[test]
fn test_bad_variable_on_one_rank_fails_everywhere() {
    let dir = tempfile::tempdir().unwrap();
    let stem = dir.path().join("bad");
    let world = LocalWorld::new(3).unwrap();
    let results = world
        .run(|comm| {
            let forest = forest(comm);
            let mut variable = index_variable(&forest);
            if comm.rank() == 2 {
                variable.values.push(0);
            }
            write_forest(&stem, &forest, &[variable], &WriteOptions::default(), comm).err()
        })
        .unwrap();

    assert!(matches!(results[0], Some(WriteError::PeerFailed)));
    assert!(matches!(results[1], Some(WriteError::PeerFailed)));
    assert!(matches!(results[2], Some(WriteError::VariableLength { .. })));
    assert!(!dir.path().join("bad.fmd").exists());
}

#[test]
fn test_unwritable_target_fails_everywhere() {
    let dir = tempfile::tempdir().unwrap();
    let stem = dir.path().join("missing-dir").join("out");
    let world = LocalWorld::new(2).unwrap();
    let results = world
        .run(|comm| {
            let forest = forest(comm);
            write_forest(&stem, &forest, &[], &WriteOptions::default(), comm).err()
        })
        .unwrap();

    assert!(matches!(results[0], Some(WriteError::Io { .. })));
    assert!(matches!(results[1], Some(WriteError::PeerFailed)));
    assert!(results[1].as_ref().is_some_and(WriteError::is_remote));
}

#[test]
fn test_reader_rejects_wrong_type_and_name() {
    let dir = tempfile::tempdir().unwrap();
    let stem = dir.path().join("typed");
    write_with(&stem, 1, WriteOptions::default());

    let mut reader = DatasetReader::open(dir.path().join("typed.fmd")).unwrap();
    assert!(matches!(
        reader.read_f64("Mesh3D_vol_types"),
        Err(WriteError::TypeMismatch { expected: DataType::F64, actual: DataType::I32, .. })
    ));
    assert!(matches!(reader.read_i64("nope"), Err(WriteError::UnknownVariable { .. })));
}

#[test]
fn test_every_rank_sees_the_same_element_count() {
    let world = LocalWorld::new(4).unwrap();
    let counts = world
        .run(|comm| {
            let forest = forest(comm);
            comm.all_gather_u64(forest.local_num_elements() as u64).unwrap()
        })
        .unwrap();
    assert!(counts.windows(2).all(|w| w[0] == w[1]));
}
