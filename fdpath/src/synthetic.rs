//! Names for dentries whose display name comes from a `d_dname` callback.
//!
//! Sockets, pipes and anonymous inodes have no real path. The kernel
//! formats their name on demand through `dentry_operations.d_dname`, so the
//! callback's address tells which kind of object the dentry stands for.

use crate::error::Result;
use crate::object::Object;
use crate::resolver::Resolver;
use crate::symbols::split_qualified;
use log::{debug, warn};

/// The `d_dname` implementations with a known naming scheme.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DnameHandler {
    Socket,
    AnonInode,
    Pipe,
    /// Regular-looking dentries using the generic routine.
    Simple,
}

impl DnameHandler {
    pub fn from_symbol(name: &str) -> Option<Self> {
        match name {
            "sockfs_dname" => Some(DnameHandler::Socket),
            "anon_inodefs_dname" => Some(DnameHandler::AnonInode),
            "pipefs_dname" => Some(DnameHandler::Pipe),
            "simple_dname" => Some(DnameHandler::Simple),
            _ => None,
        }
    }

    /// The name prefix, `None` when the real path applies.
    pub fn prefix(self) -> Option<&'static str> {
        match self {
            DnameHandler::Socket => Some("socket"),
            DnameHandler::AnonInode => Some("anon_inode"),
            DnameHandler::Pipe => Some("pipe"),
            DnameHandler::Simple => None,
        }
    }
}

/// Resolves the synthetic name of `dentry`, opened as `file` by `task`.
///
/// A pointer matching no symbol, or several, yields a placeholder with the
/// raw address.
pub(crate) fn resolve(
    resolver: &Resolver<'_>,
    task: &Object<'_>,
    file: &Object<'_>,
    dentry: &Object<'_>,
) -> Result<String> {
    let ops = dentry.deref("d_op")?;
    let d_dname = ops.read_pointer("d_dname")?;

    let qualified = ops.qualified_type_name();
    let (table, _) = split_qualified(&qualified);
    let symbols = resolver.symbols().symbols_at(d_dname, table);

    let symbol = match symbols.as_slice() {
        [only] => split_qualified(only).1.to_string(),
        _ => {
            warn!(
                "d_dname pointer {:#x} of {:?} matches {} symbols",
                d_dname,
                dentry,
                symbols.len()
            );
            return Ok(format!("<invalid d_dname pointer> {:x}", d_dname));
        }
    };

    let prefix = match DnameHandler::from_symbol(&symbol) {
        Some(handler) => match handler.prefix() {
            Some(prefix) => prefix.to_string(),
            None => return resolver.real_path(task, file),
        },
        None => format!("<unsupported d_op symbol: {}>", symbol),
    };

    let ino = resolver
        .layout()
        .inode_number(dentry)
        .unwrap_or_else(|err| {
            debug!("inode of {:?} unreadable: {}", dentry, err);
            0
        });
    Ok(format!("{}:[{}]", prefix, ino))
}
