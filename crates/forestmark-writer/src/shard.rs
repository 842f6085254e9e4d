//! Per-rank mesh rows and their schema

use crate::error::WriteError;
use crate::format::{DataType, Dimension, VariableDef};
use byteorder::{LittleEndian, ReadBytesExt};
use forestmark_forest::{Forest, MAX_VERTICES};
use std::collections::BTreeMap;
use std::collections::HashSet;
use std::io::Cursor;

/// Element dimension
pub const ELEMENT_DIM: &str = "nMesh3D_vol";

/// Node dimension
pub const NODE_DIM: &str = "nMesh3D_node";

/// Node slots per element
pub const MAX_NODES_DIM: &str = "nMaxMesh3D_vol_nodes";

const MESH_GROUP: &str = "mesh";
const DATA_GROUP: &str = "element_data";

/// One `i64` value per local element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementWiseVariable {
    /// Variable name
    pub name: String,
    /// Values in local element order
    pub values: Vec<i64>,
}

impl ElementWiseVariable {
    /// Create a variable
    #[must_use]
    pub fn new(name: impl Into<String>, values: Vec<i64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// Reject variables that cannot be written next to `num_elements` local elements
pub(crate) fn check_variables(variables: &[ElementWiseVariable], num_elements: usize) -> Result<(), WriteError> {
    let mut seen = HashSet::new();
    for var in variables {
        if var.values.len() != num_elements {
            return Err(WriteError::VariableLength {
                name: var.name.clone(),
                expected: num_elements,
                actual: var.values.len(),
            });
        }
        if var.name.starts_with("Mesh3D") {
            return Err(WriteError::ReservedName {
                name: var.name.clone(),
            });
        }
        if !seen.insert(var.name.as_str()) {
            return Err(WriteError::DuplicateVariable {
                name: var.name.clone(),
            });
        }
    }
    Ok(())
}

/// Dimensions, variable definitions and global attributes of a dataset
pub(crate) fn schema(
    num_elements: u64,
    num_nodes: u64,
    variables: &[ElementWiseVariable],
) -> (Vec<Dimension>, Vec<VariableDef>, BTreeMap<String, String>) {
    let dimensions = vec![
        Dimension {
            name: ELEMENT_DIM.to_string(),
            len: num_elements,
        },
        Dimension {
            name: NODE_DIM.to_string(),
            len: num_nodes,
        },
        Dimension {
            name: MAX_NODES_DIM.to_string(),
            len: MAX_VERTICES as u64,
        },
    ];

    let mut defs = vec![
        VariableDef::new("Mesh3D_vol_types", DataType::I32, &[ELEMENT_DIM], MESH_GROUP)
            .attribute("long_name", "VTK element type"),
        VariableDef::new("Mesh3D_vol_tree_id", DataType::I64, &[ELEMENT_DIM], MESH_GROUP)
            .attribute("long_name", "coarse tree of each element"),
        VariableDef::new("Mesh3D_vol_nodes", DataType::I64, &[ELEMENT_DIM, MAX_NODES_DIM], MESH_GROUP)
            .attribute("cf_role", "volume_node_connectivity")
            .attribute("start_index", "0")
            .attribute("_FillValue", "-1"),
    ];
    for axis in ["x", "y", "z"] {
        defs.push(
            VariableDef::new(format!("Mesh3D_node_{axis}"), DataType::F64, &[NODE_DIM], MESH_GROUP)
                .attribute("standard_name", format!("{axis}-coordinate")),
        );
    }
    for var in variables {
        defs.push(VariableDef::new(var.name.clone(), DataType::I64, &[ELEMENT_DIM], DATA_GROUP).attribute("mesh", "Mesh3D"));
    }

    let attributes = BTreeMap::from([
        ("Conventions".to_string(), "UGRID-1.0".to_string()),
        ("cf_role".to_string(), "mesh_topology".to_string()),
        ("topology_dimension".to_string(), "3".to_string()),
        (
            "node_coordinates".to_string(),
            "Mesh3D_node_x Mesh3D_node_y Mesh3D_node_z".to_string(),
        ),
        ("volume_node_connectivity".to_string(), "Mesh3D_vol_nodes".to_string()),
        ("volume_shape_type".to_string(), "Mesh3D_vol_types".to_string()),
    ]);

    (dimensions, defs, attributes)
}

/// Encoded rows of one rank, columns in schema order
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Shard {
    pub(crate) element_offset: u64,
    pub(crate) num_elements: u64,
    pub(crate) node_offset: u64,
    pub(crate) num_nodes: u64,
    pub(crate) columns: Vec<Vec<u8>>,
}

impl Shard {
    /// Encode the local part of `forest`; node indices start at `node_offset`
    pub(crate) fn build(
        forest: &Forest,
        variables: &[ElementWiseVariable],
        element_offset: u64,
        node_offset: u64,
    ) -> Self {
        let n = forest.local_num_elements();
        let mut types = Vec::with_capacity(n * 4);
        let mut trees = Vec::with_capacity(n * 8);
        let mut nodes = Vec::with_capacity(n * 8 * MAX_VERTICES);
        let mut coords = [Vec::new(), Vec::new(), Vec::new()];

        let mut next_node = node_offset;
        for element in forest.elements() {
            let shape = forest.shape_of(element);
            let vertices = forest.vertices_of(element);
            types.extend_from_slice(&shape.vtk_type().to_le_bytes());
            trees.extend_from_slice(&i64::from(element.tree()).to_le_bytes());
            for slot in 0..MAX_VERTICES {
                let index = if slot < vertices.len() {
                    (next_node + slot as u64) as i64
                } else {
                    -1
                };
                nodes.extend_from_slice(&index.to_le_bytes());
            }
            for vertex in &vertices {
                for (axis, column) in coords.iter_mut().enumerate() {
                    column.extend_from_slice(&vertex[axis].to_le_bytes());
                }
            }
            next_node += vertices.len() as u64;
        }

        let [x, y, z] = coords;
        let mut columns = vec![types, trees, nodes, x, y, z];
        for var in variables {
            let mut column = Vec::with_capacity(var.values.len() * 8);
            for value in &var.values {
                column.extend_from_slice(&value.to_le_bytes());
            }
            columns.push(column);
        }

        Self {
            element_offset,
            num_elements: n as u64,
            node_offset,
            num_nodes: next_node - node_offset,
            columns,
        }
    }

    /// First row and row count of column `index`
    pub(crate) fn rows_of(&self, index: usize) -> (u64, u64) {
        // columns 3..6 are the node coordinates
        if (3..6).contains(&index) {
            (self.node_offset, self.num_nodes)
        } else {
            (self.element_offset, self.num_elements)
        }
    }

    /// Wire form for gathering to the writing rank
    pub(crate) fn encode(&self) -> Vec<u8> {
        let body: usize = self.columns.iter().map(|c| c.len() + 8).sum();
        let mut out = Vec::with_capacity(40 + body);
        for value in [
            self.element_offset,
            self.num_elements,
            self.node_offset,
            self.num_nodes,
            self.columns.len() as u64,
        ] {
            out.extend_from_slice(&value.to_le_bytes());
        }
        for column in &self.columns {
            out.extend_from_slice(&(column.len() as u64).to_le_bytes());
            out.extend_from_slice(column);
        }
        out
    }

    /// Parse the wire form written by [`Shard::encode`]
    pub(crate) fn decode(bytes: &[u8], source_rank: usize) -> Result<Self, WriteError> {
        let corrupt = |detail: &str| WriteError::CorruptShard {
            source_rank,
            detail: detail.to_string(),
        };
        let mut cursor = Cursor::new(bytes);
        let mut next = || cursor_u64(&mut cursor).ok_or_else(|| corrupt("truncated preamble"));
        let element_offset = next()?;
        let num_elements = next()?;
        let node_offset = next()?;
        let num_nodes = next()?;
        let num_columns = next()?;

        let mut columns = Vec::new();
        for _ in 0..num_columns {
            let len = cursor_u64(&mut cursor).ok_or_else(|| corrupt("truncated column length"))?;
            let start = cursor.position() as usize;
            let end = start
                .checked_add(len as usize)
                .filter(|end| *end <= bytes.len())
                .ok_or_else(|| corrupt("truncated column"))?;
            columns.push(bytes[start..end].to_vec());
            cursor.set_position(end as u64);
        }
        if cursor.position() as usize != bytes.len() {
            return Err(corrupt("trailing bytes"));
        }

        Ok(Self {
            element_offset,
            num_elements,
            node_offset,
            num_nodes,
            columns,
        })
    }
}

fn cursor_u64(cursor: &mut Cursor<&[u8]>) -> Option<u64> {
    cursor.read_u64::<LittleEndian>().ok()
}
