//! Recovers the paths of files opened by Linux processes from a memory
//! snapshot.
//!
//! A `Resolver` binds a snapshot and the symbol table describing the kernel
//! it was taken from. Given a task it lists the open descriptors and turns
//! each `struct file` into the path the task would see, climbing dentries
//! and crossing mounts the way the kernel does, and naming sockets, pipes
//! and anonymous inodes the way `/proc/<pid>/fd` shows them.

mod error;
mod fds;
pub mod io;
mod layout;
mod limits;
mod object;
mod resolver;
pub mod symbols;
mod synthetic;
mod walker;

#[cfg(test)]
mod fixture;

pub use crate::error::{Error, Result};
pub use crate::fds::{FileDescriptors, OpenDescriptor};
pub use crate::io::{Address, AddressSpace, MemoryImage, MemoryImageBuilder};
pub use crate::layout::{KernelLayout, LegacyMounts, MountTree, PathRef, SplitMounts};
pub use crate::limits::{Limits, MAX_FDS, MAX_NAME_LEN, MAX_PATH_HOPS};
pub use crate::object::{Context, Object, PointerArray};
pub use crate::resolver::Resolver;
pub use crate::symbols::{FieldKind, StructType, SymbolSpace, SymbolTable};
pub use crate::synthetic::DnameHandler;
pub use crate::walker::walk;
