use crate::error::Result;
use crate::fds::FileDescriptors;
use crate::io::{Address, AddressSpace};
use crate::layout::KernelLayout;
use crate::limits::Limits;
use crate::object::{Context, Object};
use crate::symbols::{SymbolSpace, SymbolTable};
use crate::{synthetic, walker};
use log::{debug, trace};

/// Resolves paths of open files for tasks described by one symbol table.
///
/// The structure layout is detected when the resolver is built. Resolution
/// itself never fails: unreadable or corrupt structures degrade to an empty
/// string or a placeholder so one bad file cannot hide the others.
pub struct Resolver<'a> {
    space: &'a dyn AddressSpace,
    symbols: &'a SymbolSpace,
    table: &'a SymbolTable,
    layout: KernelLayout,
    limits: Limits,
}

impl<'a> Resolver<'a> {
    /// Binds a resolver to `table` in `ctx`.
    ///
    /// # Errors
    ///
    /// Fails when the table is unknown or its structures match no supported
    /// kernel layout.
    pub fn new<S: AddressSpace>(ctx: &'a Context<S>, table: &str) -> Result<Self> {
        let table = ctx.symbols().get(table)?;
        let layout = KernelLayout::detect(table)?;
        debug!(
            "table {} uses the {} mount layout",
            table.name(),
            layout.mounts().name()
        );
        Ok(Self {
            space: ctx.space(),
            symbols: ctx.symbols(),
            table,
            layout,
            limits: Limits::default(),
        })
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn layout(&self) -> &KernelLayout {
        &self.layout
    }

    pub fn symbols(&self) -> &'a SymbolSpace {
        self.symbols
    }

    pub fn table(&self) -> &'a SymbolTable {
        self.table
    }

    pub fn object(&self, type_name: &str, addr: Address) -> Result<Object<'a>> {
        Object::new(self.space, self.table, type_name, addr)
    }

    /// A `task_struct` handle. Nothing is read until it is used.
    pub fn task(&self, addr: Address) -> Result<Object<'a>> {
        self.object("task_struct", addr)
    }

    pub fn file(&self, addr: Address) -> Result<Object<'a>> {
        self.object("file", addr)
    }

    /// The path `task` sees for `file`.
    ///
    /// Returns an empty string when the path cannot be resolved; a
    /// placeholder such as `<invalid d_dname pointer> ...` when a synthetic
    /// name callback is unknown.
    pub fn path_for_file(&self, task: &Object<'_>, file: &Object<'_>) -> String {
        let dentry = match self.layout.file_dentry(file) {
            Ok(dentry) => dentry,
            Err(err) => {
                debug!("dentry of {:?} unreadable: {}", file, err);
                return String::new();
            }
        };
        if dentry.is_null() {
            return String::new();
        }

        let resolved = if self.has_dname(&dentry) {
            synthetic::resolve(self, task, file, &dentry)
        } else {
            self.real_path(task, file)
        };
        resolved.unwrap_or_else(|err| {
            debug!("path of {:?} unresolved: {}", file, err);
            String::new()
        })
    }

    /// Walks from the file's dentry up to the task's root.
    pub(crate) fn real_path(&self, task: &Object<'_>, file: &Object<'_>) -> Result<String> {
        let root = self.layout.fs_root(task)?;
        let start = self.layout.file_path(file)?;
        walker::walk(&self.layout, &self.limits, &root, start)
    }

    /// Whether the dentry names itself through `d_op->d_dname`. Any failure
    /// while checking means no.
    fn has_dname(&self, dentry: &Object<'_>) -> bool {
        let probe = || -> Result<bool> {
            let ops = dentry.deref("d_op")?;
            if ops.is_null() || !ops.has_member("d_dname") {
                return Ok(false);
            }
            Ok(ops.read_pointer("d_dname")? != 0)
        };
        probe().unwrap_or_else(|err| {
            trace!("no d_dname for {:?}: {}", dentry, err);
            false
        })
    }

    /// The open files of `task` in descriptor order.
    pub fn file_descriptors(&self, task: Object<'a>) -> FileDescriptors<'_, 'a> {
        FileDescriptors::new(self, task)
    }
}
