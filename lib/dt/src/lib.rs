//! Device tree support: flattened blob parsing and an in-memory node tree.
#![cfg_attr(not(test), no_std)]
extern crate alloc;

pub mod fdt;
pub mod node;
pub mod prop;

pub use node::{DeviceTree, Node, NodeType};
pub use prop::{Property, PropertyError};
