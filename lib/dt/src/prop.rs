use alloc::{boxed::Box, vec::Vec};
use core::{fmt, str};
use utils::endian::BigEndian32;

pub struct Property {
    pub name: Box<str>,
    pub data: Box<[u8]>,
}

impl Property {
    pub fn new(name: impl AsRef<str>, data: &[u8]) -> Property {
        Property {
            name: Box::from(name.as_ref()),
            data: Box::from(data),
        }
    }
}

impl Property {
    pub fn value_as_u32(&self) -> Result<u32, PropertyError> {
        BigEndian32::read_from(&self.data).ok_or(PropertyError::InvalidPropFormat)
    }
    pub fn value_as_str(&self) -> Result<&str, PropertyError> {
        str::from_utf8(&self.data)
            .map(|s| s.trim_end_matches('\0'))
            .map_err(|_| PropertyError::InvalidPropFormat)
    }
    pub fn value_as_strlist(&self) -> Result<Vec<&str>, PropertyError> {
        let data = self.data.strip_suffix(&[0]).unwrap_or(&self.data[..]);
        if data.is_empty() {
            return Ok(Vec::new());
        }
        data.split(|b| *b == 0)
            .map(|s| str::from_utf8(s).map_err(|_| PropertyError::InvalidPropFormat))
            .collect()
    }
    /// Decode the value as a list of big-endian 32-bit cells.
    pub fn value_as_cells(&self) -> Result<Vec<u32>, PropertyError> {
        if self.data.len() % 4 != 0 {
            return Err(PropertyError::InvalidPropFormat);
        }
        Ok(self
            .data
            .chunks_exact(4)
            .filter_map(BigEndian32::read_from)
            .collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyError {
    InvalidPropFormat,
    PropNotFound,
    DanglingHandle,
}

impl fmt::Display for PropertyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyError::InvalidPropFormat => f.write_str("invalid property format"),
            PropertyError::PropNotFound => f.write_str("property not found"),
            PropertyError::DanglingHandle => f.write_str("dangling phandle"),
        }
    }
}

impl core::error::Error for PropertyError {}
