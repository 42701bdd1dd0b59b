//! Enumeration of a task's open file descriptors.

use crate::error::Result;
use crate::object::{Object, PointerArray};
use crate::resolver::Resolver;
use log::{debug, warn};

/// An open descriptor: its number, the `struct file` behind it and the path
/// the owning task sees for it.
#[derive(Debug, Clone)]
pub struct OpenDescriptor<'a> {
    pub fd: u64,
    pub file: Object<'a>,
    pub path: String,
}

/// Walks a descriptor table slot by slot, yielding the occupied ones in
/// ascending order. Paths are resolved as each item is produced.
///
/// A table that cannot be read, or that claims more slots than
/// `Limits::max_fds`, yields nothing. Slots that cannot be read are skipped.
pub struct FileDescriptors<'r, 'a> {
    resolver: &'r Resolver<'a>,
    task: Object<'a>,
    slots: Option<PointerArray<'a>>,
    next: u64,
}

impl<'r, 'a> FileDescriptors<'r, 'a> {
    pub(crate) fn new(resolver: &'r Resolver<'a>, task: Object<'a>) -> Self {
        Self {
            resolver,
            task,
            slots: Self::table(resolver, &task),
            next: 0,
        }
    }

    fn table(resolver: &Resolver<'a>, task: &Object<'a>) -> Option<PointerArray<'a>> {
        Self::locate(resolver, task).unwrap_or_else(|err| {
            debug!("descriptor table of {:?} unreadable: {}", task, err);
            None
        })
    }

    fn locate(resolver: &Resolver<'a>, task: &Object<'a>) -> Result<Option<PointerArray<'a>>> {
        let layout = resolver.layout();
        let base = layout.fd_array(task)?;
        let max_fds = layout.max_fds(task)?;
        if base == 0 {
            return Ok(None);
        }

        let limit = resolver.limits().max_fds;
        if max_fds > limit {
            warn!(
                "{:?} claims {} descriptors, more than the {} allowed",
                task, max_fds, limit
            );
            return Ok(None);
        }
        PointerArray::new(task.space(), resolver.table(), "file", base, max_fds).map(Some)
    }
}

impl<'r, 'a> Iterator for FileDescriptors<'r, 'a> {
    type Item = OpenDescriptor<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let slots = self.slots?;
        while self.next < slots.len() {
            let fd = self.next;
            self.next += 1;
            match slots.get(fd) {
                Ok(Some(file)) => {
                    let path = self.resolver.path_for_file(&self.task, &file);
                    return Some(OpenDescriptor { fd, file, path });
                }
                Ok(None) => (),
                Err(err) => debug!("fd {} of {:?} unreadable: {}", fd, self.task, err),
            }
        }
        None
    }
}
