//! This module provides functionalities to resolve a flattened device tree

use bitflags::bitflags;
use core::fmt;
use utils::endian::BigEndian32;

pub mod builder;
pub mod reader;

/// Raw Flattened Device Tree header (big-endian fields).
///
/// This maps directly to the FDT header structure; fields are stored as
/// big-endian 32-bit values and should be interpreted as `EndianData`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FdtHeader {
    pub magic: BigEndian32,
    pub totalsize: BigEndian32,
    pub off_dt_struct: BigEndian32,
    pub off_dt_strings: BigEndian32,
    pub off_mem_rsvmap: BigEndian32,
    pub version: BigEndian32,
    pub last_comp_version: BigEndian32,
    pub boot_cpuid_phys: BigEndian32,
    pub size_dt_strings: BigEndian32,
    pub size_dt_struct: BigEndian32,
}

/// Size of [FdtHeader] in the blob.
pub const FDT_HEADER_SIZE: usize = size_of::<FdtHeader>();

bitflags! {
    /// Type tags found in the FDT structure block.
    pub struct FdtNodeType : u32{
        /// Begin a node (followed by its name string)
        const FDT_BEGIN_NODE  = 0x01;
        /// End a node
        const FDT_END_NODE    = 0x02;
        /// A property entry (length, nameoff, data)
        const FDT_PROP        = 0x03;
        /// No-op padding word
        const FDT_NOP         = 0x04;
        /// End of the structure block
        const FDT_END         = 0x09;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FdtError {
    InvalidNodeType { node_type: usize, cursor: usize },
    InvalidMagic { magic: usize },
    IncompatibleVersion { version: usize },
    /// A read ran past the end of the blob (or of `totalsize`).
    Truncated { offset: usize },
    /// A name in the structure or strings block is not valid UTF-8.
    InvalidString { offset: usize },
    /// [builder::FdtBuilder] finished with unclosed nodes, or closed one too many.
    UnbalancedNodes { depth: usize },
}

impl fmt::Display for FdtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FdtError::InvalidNodeType { node_type, cursor } => {
                write!(f, "unexpected token {node_type:#x} at offset {cursor:#x}")
            }
            FdtError::InvalidMagic { magic } => write!(f, "bad magic {magic:#x}"),
            FdtError::IncompatibleVersion { version } => {
                write!(f, "incompatible version {version}")
            }
            FdtError::Truncated { offset } => write!(f, "blob truncated at offset {offset:#x}"),
            FdtError::InvalidString { offset } => {
                write!(f, "invalid string at offset {offset:#x}")
            }
            FdtError::UnbalancedNodes { depth } => {
                write!(f, "unbalanced node nesting (depth {depth})")
            }
        }
    }
}

impl core::error::Error for FdtError {}
