//! Reading datasets back

use crate::error::WriteError;
use crate::format::{DataType, Header, VariableSpec, CLASSIC64_MAGIC, HIERARCHICAL_MAGIC, PREAMBLE_LEN};
use crate::options::FormatGeneration;
use byteorder::{LittleEndian, ReadBytesExt};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Reader for a single dataset file
#[derive(Debug)]
pub struct DatasetReader {
    path: PathBuf,
    file: BufReader<File>,
    header: Header,
    data_start: u64,
}

impl DatasetReader {
    /// Open a dataset and parse its header
    pub fn open(path: impl AsRef<Path>) -> Result<Self, WriteError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(WriteError::io(&path))?;
        let mut file = BufReader::new(file);

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic).map_err(WriteError::io(&path))?;
        let format = match magic {
            CLASSIC64_MAGIC => FormatGeneration::Classic64,
            HIERARCHICAL_MAGIC => FormatGeneration::Hierarchical,
            found => return Err(WriteError::BadMagic { found }),
        };

        let file_len = file
            .get_ref()
            .metadata()
            .map_err(WriteError::io(&path))?
            .len();
        let json_len = file
            .read_u64::<LittleEndian>()
            .map_err(WriteError::io(&path))?;
        if json_len > file_len.saturating_sub(PREAMBLE_LEN) {
            return Err(WriteError::CorruptHeader {
                path,
                detail: format!("header claims {json_len} bytes, file holds {file_len}"),
            });
        }
        let mut json = vec![0u8; json_len as usize];
        file.read_exact(&mut json).map_err(WriteError::io(&path))?;
        let header: Header = serde_json::from_slice(&json)?;
        if header.format != format {
            return Err(WriteError::BadMagic { found: magic });
        }

        let data_start = Header::data_start(json_len);
        if let Err(detail) = header.check_placement(file_len.saturating_sub(data_start)) {
            return Err(WriteError::CorruptHeader { path, detail });
        }

        Ok(Self {
            path,
            file,
            header,
            data_start,
        })
    }

    /// The parsed header
    #[must_use]
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// All values of an `i32` variable, row-major
    pub fn read_i32(&mut self, name: &str) -> Result<Vec<i32>, WriteError> {
        let (bytes, count) = self.read_raw(name, DataType::I32)?;
        let mut values = vec![0; count];
        bytes
            .as_slice()
            .read_i32_into::<LittleEndian>(&mut values)
            .map_err(WriteError::io(&self.path))?;
        Ok(values)
    }

    /// All values of an `i64` variable, row-major
    pub fn read_i64(&mut self, name: &str) -> Result<Vec<i64>, WriteError> {
        let (bytes, count) = self.read_raw(name, DataType::I64)?;
        let mut values = vec![0; count];
        bytes
            .as_slice()
            .read_i64_into::<LittleEndian>(&mut values)
            .map_err(WriteError::io(&self.path))?;
        Ok(values)
    }

    /// All values of an `f64` variable, row-major
    pub fn read_f64(&mut self, name: &str) -> Result<Vec<f64>, WriteError> {
        let (bytes, count) = self.read_raw(name, DataType::F64)?;
        let mut values = vec![0.0; count];
        bytes
            .as_slice()
            .read_f64_into::<LittleEndian>(&mut values)
            .map_err(WriteError::io(&self.path))?;
        Ok(values)
    }

    fn read_raw(&mut self, name: &str, dtype: DataType) -> Result<(Vec<u8>, usize), WriteError> {
        let var: VariableSpec = self
            .header
            .variable(name)
            .cloned()
            .ok_or_else(|| WriteError::UnknownVariable {
                name: name.to_string(),
            })?;
        if var.dtype != dtype {
            return Err(WriteError::TypeMismatch {
                name: name.to_string(),
                expected: dtype,
                actual: var.dtype,
            });
        }

        let (len, count) = var
            .check_placement(self.header.data_len)
            .map_err(|detail| WriteError::CorruptHeader {
                path: self.path.clone(),
                detail,
            })?;
        let row_bytes = var.row_bytes() as usize;
        let mut bytes = vec![0u8; len];
        for (position, first, rows) in var.runs(0, var.rows) {
            let start = first as usize * row_bytes;
            let end = start + rows as usize * row_bytes;
            self.file
                .seek(SeekFrom::Start(self.data_start + position))
                .map_err(WriteError::io(&self.path))?;
            self.file
                .read_exact(&mut bytes[start..end])
                .map_err(WriteError::io(&self.path))?;
        }
        Ok((bytes, count))
    }
}
