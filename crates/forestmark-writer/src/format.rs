//! On-disk header and byte placement
//!
//! Offsets stored in the header are relative to the start of the data
//! section, which begins at the first 8-byte boundary after the header.

use crate::error::WriteError;
use crate::options::{FormatGeneration, StorageLayout};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Magic number of the classic-64-bit format
pub const CLASSIC64_MAGIC: [u8; 4] = *b"FMC5";

/// Magic number of the hierarchical format
pub const HIERARCHICAL_MAGIC: [u8; 4] = *b"FMH4";

/// Magic plus header length
pub(crate) const PREAMBLE_LEN: u64 = 12;

const ALIGN: u64 = 8;

pub(crate) fn align(n: u64) -> u64 {
    n.div_ceil(ALIGN) * ALIGN
}

/// Element type of a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// 32-bit signed integer
    I32,
    /// 64-bit signed integer
    I64,
    /// 64-bit float
    F64,
}

impl DataType {
    /// Bytes per value
    #[inline]
    #[must_use]
    pub const fn size(self) -> u64 {
        match self {
            Self::I32 => 4,
            Self::I64 | Self::F64 => 8,
        }
    }

    /// Encoded default fill value, matching netCDF's `NC_FILL_*`
    #[must_use]
    pub fn fill_bytes(self) -> Vec<u8> {
        match self {
            Self::I32 => (-2_147_483_647_i32).to_le_bytes().to_vec(),
            Self::I64 => (-9_223_372_036_854_775_806_i64).to_le_bytes().to_vec(),
            Self::F64 => 9.969_209_968_386_869e36_f64.to_le_bytes().to_vec(),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I32 => write!(f, "i32"),
            Self::I64 => write!(f, "i64"),
            Self::F64 => write!(f, "f64"),
        }
    }
}

/// A named dimension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    /// Dimension name
    pub name: String,
    /// Length
    pub len: u64,
}

/// A variable and where its bytes live
///
/// Row `r` starts at `offset + (r / chunk_rows) * chunk_stride +
/// (r % chunk_rows) * row_bytes`. A contiguous variable is a single chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSpec {
    /// Variable name
    pub name: String,
    /// Element type
    pub dtype: DataType,
    /// Dimension names, rows first
    pub dimensions: Vec<String>,
    /// Number of rows
    pub rows: u64,
    /// Values per row
    pub row_width: u64,
    /// Free-form attributes
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    /// Start of the first chunk
    pub offset: u64,
    /// Rows per chunk
    pub chunk_rows: u64,
    /// Distance between consecutive chunks of this variable
    pub chunk_stride: u64,
}

impl VariableSpec {
    /// Bytes per row
    #[inline]
    #[must_use]
    pub fn row_bytes(&self) -> u64 {
        self.row_width * self.dtype.size()
    }

    /// Position of row `row` in the data section
    #[inline]
    #[must_use]
    pub fn row_position(&self, row: u64) -> u64 {
        self.offset + (row / self.chunk_rows) * self.chunk_stride + (row % self.chunk_rows) * self.row_bytes()
    }

    /// Number of allocated chunks
    #[inline]
    #[must_use]
    pub fn num_chunks(&self) -> u64 {
        self.rows.div_ceil(self.chunk_rows)
    }

    /// Allocated `(position, len)` regions, full chunks included
    pub fn regions(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        let len = self.chunk_rows * self.row_bytes();
        (0..self.num_chunks()).map(move |c| (self.offset + c * self.chunk_stride, len))
    }

    /// Byte length and value count of the whole variable, or why they
    /// do not fit in `data_len`
    pub(crate) fn check_placement(&self, data_len: u64) -> Result<(usize, usize), String> {
        let overflow = || format!("variable {} overflows its size", self.name);
        if self.chunk_rows == 0 {
            return Err(format!("variable {} has zero rows per chunk", self.name));
        }
        let row_bytes = self.row_width.checked_mul(self.dtype.size()).ok_or_else(overflow)?;
        let len = self
            .rows
            .checked_mul(row_bytes)
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(overflow)?;
        let count = self
            .rows
            .checked_mul(self.row_width)
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(overflow)?;
        if self.rows == 0 {
            return Ok((len, count));
        }

        // furthest any row can reach: last chunk, deepest slot
        let last_chunk = (self.rows - 1) / self.chunk_rows;
        let slots = self.chunk_rows.min(self.rows);
        let end = last_chunk
            .checked_mul(self.chunk_stride)
            .zip(slots.checked_mul(row_bytes))
            .and_then(|(chunks, slot)| self.offset.checked_add(chunks)?.checked_add(slot))
            .ok_or_else(overflow)?;
        if end > data_len {
            return Err(format!(
                "variable {} ends at {end}, past the {data_len} byte data section",
                self.name
            ));
        }
        Ok((len, count))
    }

    /// Split rows `[first, first + count)` into runs that do not cross a
    /// chunk boundary: `(position, first row of run relative to first, rows)`
    pub(crate) fn runs(&self, first: u64, count: u64) -> Vec<(u64, u64, u64)> {
        let mut runs = Vec::new();
        let mut done = 0;
        while done < count {
            let row = first + done;
            let room = self.chunk_rows - row % self.chunk_rows;
            let take = room.min(count - done);
            runs.push((self.row_position(row), done, take));
            done += take;
        }
        runs
    }
}

/// Variables listed under one group name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Group name
    pub name: String,
    /// Member variable names
    pub variables: Vec<String>,
}

/// Variable to place, before offsets are known
#[derive(Debug, Clone)]
pub(crate) struct VariableDef {
    pub(crate) name: String,
    pub(crate) dtype: DataType,
    pub(crate) dimensions: Vec<&'static str>,
    pub(crate) group: &'static str,
    pub(crate) attributes: BTreeMap<String, String>,
}

impl VariableDef {
    pub(crate) fn new(name: impl Into<String>, dtype: DataType, dimensions: &[&'static str], group: &'static str) -> Self {
        Self {
            name: name.into(),
            dtype,
            dimensions: dimensions.to_vec(),
            group,
            attributes: BTreeMap::new(),
        }
    }

    pub(crate) fn attribute(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }
}

/// Dataset description stored in front of the data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Format generation
    pub format: FormatGeneration,
    /// Storage layout
    pub layout: StorageLayout,
    /// Whether regions were pre-filled
    pub fill: bool,
    /// Dimensions in definition order
    pub dimensions: Vec<Dimension>,
    /// Variables in definition order
    pub variables: Vec<VariableSpec>,
    /// Variable groups, hierarchical format only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<Group>,
    /// Global attributes
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Size of the data section
    pub data_len: u64,
}

impl Header {
    /// Lay out `defs` over `dimensions`
    pub(crate) fn plan(
        format: FormatGeneration,
        layout: StorageLayout,
        fill: bool,
        chunk_len: u64,
        dimensions: Vec<Dimension>,
        defs: Vec<VariableDef>,
        attributes: BTreeMap<String, String>,
    ) -> Self {
        let dim_len = |name: &str| {
            dimensions
                .iter()
                .find(|d| d.name == name)
                .map_or(0, |d| d.len)
        };

        let mut groups: IndexMap<&'static str, Vec<String>> = IndexMap::new();
        let mut variables: Vec<VariableSpec> = defs
            .into_iter()
            .map(|def| {
                groups.entry(def.group).or_default().push(def.name.clone());
                let rows = def.dimensions.first().map_or(1, |d| dim_len(*d));
                let row_width = def.dimensions.iter().skip(1).map(|d| dim_len(*d)).product();
                VariableSpec {
                    name: def.name,
                    dtype: def.dtype,
                    dimensions: def.dimensions.iter().map(ToString::to_string).collect(),
                    rows,
                    row_width,
                    attributes: def.attributes,
                    offset: 0,
                    chunk_rows: 1,
                    chunk_stride: 0,
                }
            })
            .collect();

        let mut cursor = 0;
        match layout {
            StorageLayout::Contiguous => {
                for var in &mut variables {
                    let len = align(var.rows * var.row_bytes());
                    var.offset = cursor;
                    var.chunk_rows = var.rows.max(1);
                    var.chunk_stride = len;
                    cursor += len;
                }
            }
            StorageLayout::Chunked => {
                let chunk_rows = chunk_len.max(1);
                let mut by_rows: IndexMap<String, Vec<usize>> = IndexMap::new();
                for (i, var) in variables.iter().enumerate() {
                    let key = var.dimensions.first().cloned().unwrap_or_default();
                    by_rows.entry(key).or_default().push(i);
                }
                for members in by_rows.values() {
                    let stride: u64 = members
                        .iter()
                        .map(|&i| align(chunk_rows * variables[i].row_bytes()))
                        .sum();
                    let num_chunks = variables[members[0]].rows.div_ceil(chunk_rows);
                    let mut within = 0;
                    for &i in members {
                        let var = &mut variables[i];
                        var.offset = cursor + within;
                        var.chunk_rows = chunk_rows;
                        var.chunk_stride = stride;
                        within += align(chunk_rows * var.row_bytes());
                    }
                    cursor += num_chunks * stride;
                }
            }
        }

        let groups = match format {
            FormatGeneration::Hierarchical => groups
                .into_iter()
                .map(|(name, variables)| Group {
                    name: name.to_string(),
                    variables,
                })
                .collect(),
            FormatGeneration::Classic64 => Vec::new(),
        };

        Self {
            format,
            layout,
            fill,
            dimensions,
            variables,
            groups,
            attributes,
            data_len: cursor,
        }
    }

    /// Length of a dimension
    #[must_use]
    pub fn dimension(&self, name: &str) -> Option<u64> {
        self.dimensions.iter().find(|d| d.name == name).map(|d| d.len)
    }

    /// Variable by name
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<&VariableSpec> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Magic, length and JSON, padded to the data section
    pub(crate) fn encode(&self) -> Result<Vec<u8>, WriteError> {
        let json = serde_json::to_vec(self)?;
        let mut out = Vec::with_capacity(json.len() + 16);
        out.extend_from_slice(&self.format.magic());
        out.extend_from_slice(&(json.len() as u64).to_le_bytes());
        out.extend_from_slice(&json);
        out.resize(align(out.len() as u64) as usize, 0);
        Ok(out)
    }

    /// Check every variable against a data section of `available` bytes
    pub(crate) fn check_placement(&self, available: u64) -> Result<(), String> {
        if self.data_len > available {
            return Err(format!(
                "data section of {} bytes, file holds {available}",
                self.data_len
            ));
        }
        for var in &self.variables {
            var.check_placement(self.data_len)?;
        }
        Ok(())
    }

    /// File offset of the data section for a header of `json_len` bytes
    #[inline]
    pub(crate) fn data_start(json_len: u64) -> u64 {
        align(PREAMBLE_LEN + json_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn plan(layout: StorageLayout, chunk_len: u64) -> Header {
        let dimensions = vec![
            Dimension { name: "cells".into(), len: 5 },
            Dimension { name: "corners".into(), len: 8 },
            Dimension { name: "points".into(), len: 3 },
        ];
        let defs = vec![
            VariableDef::new("kind", DataType::I32, &["cells"], "mesh"),
            VariableDef::new("corners", DataType::I64, &["cells", "corners"], "mesh"),
            VariableDef::new("x", DataType::F64, &["points"], "mesh"),
            VariableDef::new("payload", DataType::I64, &["cells"], "data"),
        ];
        Header::plan(
            FormatGeneration::Hierarchical,
            layout,
            false,
            chunk_len,
            dimensions,
            defs,
            BTreeMap::new(),
        )
    }

    #[test]
    fn contiguous_regions_follow_each_other() {
        let header = plan(StorageLayout::Contiguous, 2);
        let offsets: Vec<_> = header.variables.iter().map(|v| v.offset).collect();
        // kind: 5*4=20 -> 24, corners: 5*64=320, x: 3*8=24
        assert_eq!(offsets, vec![0, 24, 344, 368]);
        assert_eq!(header.data_len, 408);
        assert_eq!(header.variable("corners").unwrap().row_width, 8);
    }

    #[test]
    fn chunked_interleaves_variables_of_one_dimension() {
        let header = plan(StorageLayout::Chunked, 2);
        let kind = header.variable("kind").unwrap();
        let corners = header.variable("corners").unwrap();
        let payload = header.variable("payload").unwrap();
        let x = header.variable("x").unwrap();

        // per chunk: kind 8, corners 128, payload 16
        assert_eq!(kind.chunk_stride, 152);
        assert_eq!((kind.offset, corners.offset, payload.offset), (0, 8, 136));
        assert_eq!(kind.num_chunks(), 3);
        // the last chunk is allocated in full
        assert_eq!(x.offset, 3 * 152);
        assert_eq!(header.data_len, 3 * 152 + 2 * 16);

        assert_eq!(kind.row_position(3), 152 + 4);
        assert_eq!(corners.row_position(4), 8 + 2 * 152);
    }

    #[test]
    fn runs_split_at_chunk_edges() {
        let header = plan(StorageLayout::Chunked, 2);
        let kind = header.variable("kind").unwrap();
        assert_eq!(kind.runs(1, 4), vec![(4, 0, 1), (152, 1, 2), (304, 3, 1)]);
        assert!(kind.runs(3, 0).is_empty());
    }

    #[test]
    fn groups_only_in_hierarchical_format() {
        let header = plan(StorageLayout::Contiguous, 2);
        let names: Vec<_> = header.groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["mesh", "data"]);

        let flat = Header::plan(
            FormatGeneration::Classic64,
            StorageLayout::Contiguous,
            false,
            2,
            Vec::new(),
            vec![VariableDef::new("v", DataType::I64, &[], "data")],
            BTreeMap::new(),
        );
        assert!(flat.groups.is_empty());
        assert_eq!(flat.variables[0].rows, 1);
    }

    #[test]
    fn encoded_header_is_aligned() {
        let header = plan(StorageLayout::Chunked, 2);
        let bytes = header.encode().unwrap();
        assert_eq!(&bytes[..4], b"FMH4");
        assert_eq!(bytes.len() % 8, 0);
        let json_len = u64::from_le_bytes(bytes[4..12].try_into().unwrap());
        assert_eq!(Header::data_start(json_len), bytes.len() as u64);
    }

    #[test]
    fn fill_values() {
        assert_eq!(DataType::I32.fill_bytes(), (-2_147_483_647i32).to_le_bytes());
        assert_eq!(DataType::F64.fill_bytes(), 9.969_209_968_386_869e36f64.to_le_bytes());
    }
}
