//! Rebuilds an absolute path by climbing the dentry and mount trees.
//!
//! This follows the kernel's own `__d_path`: a dentry's parent chain stops
//! at the root of its filesystem, so at every mount root the walk jumps to
//! the mountpoint in the parent mount and keeps climbing from there.

use crate::error::{Error, Result};
use crate::layout::{KernelLayout, PathRef};
use crate::limits::Limits;
use crate::object::Object;
use log::{debug, trace, warn};
use std::collections::VecDeque;

/// Names of pseudo filesystems whose dentries are single synthetic tokens.
const SYNTHETIC_PREFIXES: [&str; 2] = ["socket:", "pipe:"];

/// Anonymous inotify instances are reported without a leading slash.
const INOTIFY: &str = "inotify";

/// Walks from `start` up to `root` and returns the path between them.
///
/// An empty string means nothing could be resolved; it is never confused
/// with `/`. Any failed read aborts the whole walk.
///
/// # Errors
///
/// Returns `Error::InvalidReference` when a link cannot be read and
/// `Error::StructuralAnomaly` when the walk exceeds `limits.max_path_hops`.
pub fn walk<'a>(
    layout: &KernelLayout,
    limits: &Limits,
    root: &PathRef<'a>,
    start: PathRef<'a>,
) -> Result<String> {
    let mounts = layout.mounts();
    let mut segments: VecDeque<String> = VecDeque::new();
    let mut dentry = start.dentry;
    let mut mnt = start.mnt;
    let mut hops = 0;

    while dentry != root.dentry || mnt != root.mnt {
        hops += 1;
        if hops > limits.max_path_hops {
            warn!(
                "path walk from {:?} gave up after {} hops",
                start.dentry, limits.max_path_hops
            );
            return Err(Error::StructuralAnomaly(format!(
                "path walk exceeded {} hops",
                limits.max_path_hops
            )));
        }

        let name = layout.dentry_name(&dentry, limits.max_name_len)?;
        if name.is_empty() {
            // Smeared or freed dentry, the rest of the prefix is unknown.
            debug!("empty dentry name at {:?}", dentry);
            break;
        }
        trace!("{:?} -> {}", dentry, name);
        segments.push_front(name.trim_matches('/').to_string());

        if dentry == mounts.root(&mnt)? || dentry == dentry.deref("d_parent")? {
            let parent_mnt = mounts.parent(&mnt)?;
            if parent_mnt == mnt {
                break;
            }
            dentry = mounts.mountpoint(&mnt)?;
            mnt = parent_mnt;
            continue;
        }

        dentry = dentry.deref("d_parent")?;
    }

    if segments.is_empty() {
        return Ok(String::new());
    }

    let joined = segments
        .iter()
        .filter(|segment| !segment.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("/");
    Ok(finish(layout, &dentry, joined))
}

/// Applies the naming rules for pseudo filesystems to a joined path.
fn finish(layout: &KernelLayout, dentry: &Object<'_>, joined: String) -> String {
    let prefix = SYNTHETIC_PREFIXES
        .iter()
        .find(|prefix| joined.starts_with(*prefix));

    match prefix {
        Some(_) if joined.contains(']') => joined.replace('/', ""),
        Some(prefix) => {
            let ino = layout.inode_number(dentry).unwrap_or_else(|err| {
                debug!("inode of {:?} unreadable: {}", dentry, err);
                0
            });
            format!("{}:[{}]", prefix.trim_end_matches(':'), ino)
        }
        None if joined == INOTIFY => joined,
        None => format!("/{}", joined),
    }
}
