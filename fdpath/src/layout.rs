//! Per-kernel-version access to the structures a path walk touches.
//!
//! Field names and nesting changed across kernel releases: `struct mount`
//! was split out of `struct vfsmount`, `struct file` gained `f_path`,
//! `fs_struct` started embedding `struct path` and the descriptor array moved
//! behind `fdtable`. The variant that applies is detected once from the
//! symbol table; callers only see the accessors.

use crate::error::{Error, Result};
use crate::io::Address;
use crate::object::Object;
use crate::symbols::{FieldKind, SymbolTable};
use std::cmp;

/// A dentry and the mount it was reached through, the kernel's `struct path`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathRef<'a> {
    pub dentry: Object<'a>,
    pub mnt: Object<'a>,
}

/// Navigation of the mount tree. Mount handles are always `vfsmount`
/// objects, whatever structure actually holds the tree links.
pub trait MountTree {
    fn name(&self) -> &'static str;

    /// The root dentry of the filesystem mounted at `mnt`.
    fn root<'a>(&self, mnt: &Object<'a>) -> Result<Object<'a>>;

    /// The mount `mnt` is attached to. Equal to `mnt` for the global root.
    fn parent<'a>(&self, mnt: &Object<'a>) -> Result<Object<'a>>;

    /// The dentry in the parent mount that `mnt` covers.
    fn mountpoint<'a>(&self, mnt: &Object<'a>) -> Result<Object<'a>>;
}

/// Kernels where `struct mount` wraps an embedded `struct vfsmount mnt`.
pub struct SplitMounts;

impl SplitMounts {
    fn real_mount<'a>(mnt: &Object<'a>) -> Result<Object<'a>> {
        mnt.container_of("mount", "mnt")
    }
}

impl MountTree for SplitMounts {
    fn name(&self) -> &'static str {
        "mount"
    }

    fn root<'a>(&self, mnt: &Object<'a>) -> Result<Object<'a>> {
        mnt.deref("mnt_root")
    }

    fn parent<'a>(&self, mnt: &Object<'a>) -> Result<Object<'a>> {
        Self::real_mount(mnt)?.deref("mnt_parent")?.member("mnt")
    }

    fn mountpoint<'a>(&self, mnt: &Object<'a>) -> Result<Object<'a>> {
        Self::real_mount(mnt)?.deref("mnt_mountpoint")
    }
}

/// Older kernels keeping every tree link in `struct vfsmount`.
pub struct LegacyMounts;

impl MountTree for LegacyMounts {
    fn name(&self) -> &'static str {
        "vfsmount"
    }

    fn root<'a>(&self, mnt: &Object<'a>) -> Result<Object<'a>> {
        mnt.deref("mnt_root")
    }

    fn parent<'a>(&self, mnt: &Object<'a>) -> Result<Object<'a>> {
        mnt.deref("mnt_parent")
    }

    fn mountpoint<'a>(&self, mnt: &Object<'a>) -> Result<Object<'a>> {
        mnt.deref("mnt_mountpoint")
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FileFields {
    /// `file.f_path.{dentry,mnt}`
    Path,
    /// `file.f_dentry` and `file.f_vfsmnt`
    Direct,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum RootFields {
    /// `fs_struct.root` is a `struct path`.
    Path,
    /// `fs_struct.root` and `fs_struct.rootmnt` pointers.
    Split,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FdFields {
    /// `files_struct.fdt->{fd,max_fds}`
    Indirect,
    /// `files_struct.{fd,max_fds}`
    Inline,
}

/// The structure variants of one kernel build.
pub struct KernelLayout {
    file: FileFields,
    root: RootFields,
    fds: FdFields,
    mounts: Box<dyn MountTree>,
}

fn missing(ty: &str, member: &str) -> Error {
    Error::UnknownMember {
        ty: ty.to_string(),
        member: member.to_string(),
    }
}

impl KernelLayout {
    /// Picks the accessors matching the structures declared in `table`.
    ///
    /// # Errors
    ///
    /// Fails when a needed structure is absent or none of the known
    /// variants of it matches.
    pub fn detect(table: &SymbolTable) -> Result<Self> {
        let file_type = table.get_type("file")?;
        let file = if file_type.has_member("f_path") {
            FileFields::Path
        } else if file_type.has_member("f_dentry") && file_type.has_member("f_vfsmnt") {
            FileFields::Direct
        } else {
            return Err(missing("file", "f_path"));
        };

        let fs_type = table.get_type("fs_struct")?;
        let root = match fs_type.get("root").map(|f| &f.kind) {
            Some(FieldKind::Struct(_)) => RootFields::Path,
            Some(FieldKind::Pointer(_)) if fs_type.has_member("rootmnt") => RootFields::Split,
            Some(_) => return Err(missing("fs_struct", "rootmnt")),
            None => return Err(missing("fs_struct", "root")),
        };

        let files_type = table.get_type("files_struct")?;
        let fds = if files_type.has_member("fdt") {
            FdFields::Indirect
        } else if files_type.has_member("fd") && files_type.has_member("max_fds") {
            FdFields::Inline
        } else {
            return Err(missing("files_struct", "fdt"));
        };

        let split = table
            .get_type("mount")
            .map(|mount| mount.has_member("mnt"))
            .unwrap_or(false);
        let mounts: Box<dyn MountTree> = if split {
            Box::new(SplitMounts)
        } else if table.get_type("vfsmount")?.has_member("mnt_parent") {
            Box::new(LegacyMounts)
        } else {
            return Err(missing("vfsmount", "mnt_parent"));
        };

        Ok(Self {
            file,
            root,
            fds,
            mounts,
        })
    }

    pub fn mounts(&self) -> &dyn MountTree {
        self.mounts.as_ref()
    }

    pub fn file_dentry<'a>(&self, file: &Object<'a>) -> Result<Object<'a>> {
        match self.file {
            FileFields::Path => file.member("f_path")?.deref("dentry"),
            FileFields::Direct => file.deref("f_dentry"),
        }
    }

    /// The dentry and mount a file was opened through.
    pub fn file_path<'a>(&self, file: &Object<'a>) -> Result<PathRef<'a>> {
        match self.file {
            FileFields::Path => path_of(&file.member("f_path")?),
            FileFields::Direct => Ok(PathRef {
                dentry: file.deref("f_dentry")?,
                mnt: file.deref("f_vfsmnt")?,
            }),
        }
    }

    /// The filesystem root of a task (what `chroot` changes).
    pub fn fs_root<'a>(&self, task: &Object<'a>) -> Result<PathRef<'a>> {
        let fs = task.deref("fs")?;
        match self.root {
            RootFields::Path => path_of(&fs.member("root")?),
            RootFields::Split => Ok(PathRef {
                dentry: fs.deref("root")?,
                mnt: fs.deref("rootmnt")?,
            }),
        }
    }

    /// Address of a task's array of `struct file` pointers.
    pub fn fd_array(&self, task: &Object<'_>) -> Result<Address> {
        let files = task.deref("files")?;
        match self.fds {
            FdFields::Indirect => files.deref("fdt")?.read_pointer("fd"),
            FdFields::Inline => files.read_pointer("fd"),
        }
    }

    /// The number of slots a task's descriptor array claims to have.
    pub fn max_fds(&self, task: &Object<'_>) -> Result<u64> {
        let files = task.deref("files")?;
        match self.fds {
            FdFields::Indirect => files.deref("fdt")?.read_unsigned("max_fds"),
            FdFields::Inline => files.read_unsigned("max_fds"),
        }
    }

    /// The final path component stored in a dentry, at most `max_len`
    /// bytes. Invalid UTF-8 is replaced rather than rejected.
    pub fn dentry_name(&self, dentry: &Object<'_>, max_len: usize) -> Result<String> {
        let qstr = dentry.member("d_name")?;
        let len = if qstr.has_member("len") {
            cmp::min(qstr.read_unsigned("len")? as usize, max_len)
        } else {
            max_len
        };
        if len == 0 {
            return Ok(String::new());
        }

        let mut name = vec![0; len];
        dentry.space().read(qstr.read_pointer("name")?, &mut name)?;
        if let Some(end) = name.iter().position(|&b| b == 0) {
            name.truncate(end);
        }
        Ok(String::from_utf8_lossy(&name).into_owned())
    }

    pub fn inode_number(&self, dentry: &Object<'_>) -> Result<u64> {
        dentry.deref("d_inode")?.read_unsigned("i_ino")
    }
}

fn path_of<'a>(path: &Object<'a>) -> Result<PathRef<'a>> {
    Ok(PathRef {
        dentry: path.deref("dentry")?,
        mnt: path.deref("mnt")?,
    })
}
