//! Fabricates kernel structures inside a `MemoryImage` for unit tests.

use crate::io::{Address, MemoryImage};
use crate::object::Context;
use crate::symbols::{FieldKind, StructType, SymbolSpace, SymbolTable};

pub(crate) const TABLE: &str = "linux";

pub(crate) const SOCKFS_DNAME: Address = 0xffff_ffff_8130_0000;
pub(crate) const ANON_INODEFS_DNAME: Address = 0xffff_ffff_8130_0100;
pub(crate) const PIPEFS_DNAME: Address = 0xffff_ffff_8130_0200;
pub(crate) const SIMPLE_DNAME: Address = 0xffff_ffff_8130_0300;
pub(crate) const NS_DNAME: Address = 0xffff_ffff_8130_0400;
/// Two symbols share this address.
pub(crate) const ALIASED_DNAME: Address = 0xffff_ffff_8130_0500;

/// An address no allocation ever lands on.
pub(crate) const UNMAPPED: Address = 0xdead_0000_0000;

const HEAP: Address = 0xffff_8880_0010_0000;

const DENTRY_SIZE: usize = 0xc0;
const D_PARENT: u64 = 0x18;
const D_NAME: u64 = 0x20;
const QSTR_LEN: u64 = 0x4;
const QSTR_NAME: u64 = 0x8;
const D_INODE: u64 = 0x30;
const D_OP: u64 = 0x60;

const INODE_SIZE: usize = 0x80;
const I_INO: u64 = 0x40;

const DENTRY_OPS_SIZE: usize = 0x80;
const D_DNAME: u64 = 0x38;

const MOUNT_SIZE: usize = 0x80;
const MNT_PARENT: u64 = 0x10;
const MNT_MOUNTPOINT: u64 = 0x18;
const MOUNT_MNT: u64 = 0x20;

const VFSMOUNT_SIZE: usize = 0x40;
const MNT_ROOT: u64 = 0x0;
const LEGACY_MNT_PARENT: u64 = 0x10;
const LEGACY_MNT_MOUNTPOINT: u64 = 0x18;

const FILE_SIZE: usize = 0x100;
const F_PATH: u64 = 0x10;
const F_DENTRY: u64 = 0x10;
const F_VFSMNT: u64 = 0x18;

const FS_STRUCT_SIZE: usize = 0x38;
const FS_ROOT: u64 = 0x18;
const LEGACY_FS_ROOT: u64 = 0x10;
const LEGACY_FS_ROOTMNT: u64 = 0x18;

const FILES_STRUCT_SIZE: usize = 0x40;
const FILES_FDT: u64 = 0x20;
const LEGACY_FILES_MAX_FDS: u64 = 0x4;
const LEGACY_FILES_FD: u64 = 0x10;

const FDTABLE_SIZE: usize = 0x30;
const FDT_MAX_FDS: u64 = 0x0;
const FDT_FD: u64 = 0x8;

const TASK_SIZE: usize = 0x100;
const TASK_FS: u64 = 0x80;
const TASK_FILES: u64 = 0x88;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Flavor {
    /// `struct mount`, `f_path`, `fs_struct.root` path, `fdtable`.
    Modern,
    /// Everything on `vfsmount`, `f_dentry`, `rootmnt`, inline fd array.
    Legacy,
}

fn kernel_table(flavor: Flavor) -> SymbolTable {
    let ptr = |target: &str| FieldKind::pointer_to(target);
    let mut table = SymbolTable::new(TABLE, 8);

    table.add_type(
        StructType::new("dentry", DENTRY_SIZE)
            .field("d_parent", D_PARENT, ptr("dentry"))
            .field("d_name", D_NAME, FieldKind::embedded("qstr"))
            .field("d_inode", D_INODE, ptr("inode"))
            .field("d_op", D_OP, ptr("dentry_operations")),
    );
    table.add_type(
        StructType::new("qstr", 0x10)
            .field("len", QSTR_LEN, FieldKind::Base { size: 4 })
            .field("name", QSTR_NAME, FieldKind::Pointer(None)),
    );
    table.add_type(StructType::new("inode", INODE_SIZE).field(
        "i_ino",
        I_INO,
        FieldKind::Base { size: 8 },
    ));
    table.add_type(StructType::new("dentry_operations", DENTRY_OPS_SIZE).field(
        "d_dname",
        D_DNAME,
        FieldKind::Pointer(None),
    ));
    table.add_type(
        StructType::new("path", 0x10)
            .field("mnt", 0, ptr("vfsmount"))
            .field("dentry", 8, ptr("dentry")),
    );
    table.add_type(
        StructType::new("task_struct", TASK_SIZE)
            .field("fs", TASK_FS, ptr("fs_struct"))
            .field("files", TASK_FILES, ptr("files_struct")),
    );

    match flavor {
        Flavor::Modern => {
            table.add_type(
                StructType::new("mount", MOUNT_SIZE)
                    .field("mnt_parent", MNT_PARENT, ptr("mount"))
                    .field("mnt_mountpoint", MNT_MOUNTPOINT, ptr("dentry"))
                    .field("mnt", MOUNT_MNT, FieldKind::embedded("vfsmount")),
            );
            table.add_type(
                StructType::new("vfsmount", 0x18)
                    .field("mnt_root", MNT_ROOT, ptr("dentry"))
                    .field("mnt_sb", 0x8, ptr("super_block")),
            );
            table.add_type(StructType::new("file", FILE_SIZE).field(
                "f_path",
                F_PATH,
                FieldKind::embedded("path"),
            ));
            table.add_type(StructType::new("fs_struct", FS_STRUCT_SIZE).field(
                "root",
                FS_ROOT,
                FieldKind::embedded("path"),
            ));
            table.add_type(StructType::new("files_struct", FILES_STRUCT_SIZE).field(
                "fdt",
                FILES_FDT,
                ptr("fdtable"),
            ));
            table.add_type(
                StructType::new("fdtable", FDTABLE_SIZE)
                    .field("max_fds", FDT_MAX_FDS, FieldKind::Base { size: 4 })
                    .field("fd", FDT_FD, FieldKind::Pointer(None)),
            );
        }
        Flavor::Legacy => {
            table.add_type(
                StructType::new("vfsmount", VFSMOUNT_SIZE)
                    .field("mnt_root", MNT_ROOT, ptr("dentry"))
                    .field("mnt_parent", LEGACY_MNT_PARENT, ptr("vfsmount"))
                    .field("mnt_mountpoint", LEGACY_MNT_MOUNTPOINT, ptr("dentry")),
            );
            table.add_type(
                StructType::new("file", FILE_SIZE)
                    .field("f_dentry", F_DENTRY, ptr("dentry"))
                    .field("f_vfsmnt", F_VFSMNT, ptr("vfsmount")),
            );
            table.add_type(
                StructType::new("fs_struct", FS_STRUCT_SIZE)
                    .field("root", LEGACY_FS_ROOT, ptr("dentry"))
                    .field("rootmnt", LEGACY_FS_ROOTMNT, ptr("vfsmount")),
            );
            table.add_type(
                StructType::new("files_struct", FILES_STRUCT_SIZE)
                    .field(
                        "max_fds",
                        LEGACY_FILES_MAX_FDS,
                        FieldKind::Base { size: 4 },
                    )
                    .field("fd", LEGACY_FILES_FD, FieldKind::Pointer(None)),
            );
        }
    }

    table.add_symbol("sockfs_dname", SOCKFS_DNAME);
    table.add_symbol("anon_inodefs_dname", ANON_INODEFS_DNAME);
    table.add_symbol("pipefs_dname", PIPEFS_DNAME);
    table.add_symbol("simple_dname", SIMPLE_DNAME);
    table.add_symbol("ns_dname", NS_DNAME);
    table.add_symbol("dmabuffs_dname", ALIASED_DNAME);
    table.add_symbol("dmabuffs_dname_alias", ALIASED_DNAME);
    table
}

/// Builds a kernel snapshot one structure at a time. Every allocation is a
/// separate segment with an unmapped gap after it.
pub(crate) struct Fixture {
    flavor: Flavor,
    image: MemoryImage,
    table: SymbolTable,
    next: Address,
}

impl Fixture {
    pub(crate) fn new(flavor: Flavor) -> Self {
        Self {
            flavor,
            image: MemoryImage::new(),
            table: kernel_table(flavor),
            next: HEAP,
        }
    }

    pub(crate) fn table(&self) -> &SymbolTable {
        &self.table
    }

    pub(crate) fn context(self) -> Context<MemoryImage> {
        let mut symbols = SymbolSpace::new();
        symbols.insert(self.table);
        Context::new(self.image, symbols)
    }

    fn alloc(&mut self, size: usize) -> Address {
        let addr = self.next;
        self.image.map(addr, vec![0; size.max(1)]);
        self.next += ((size as u64 / 0x1000) + 2) * 0x1000;
        addr
    }

    pub(crate) fn poke(&mut self, addr: Address, bytes: &[u8]) {
        self.image.write(addr, bytes).unwrap();
    }

    fn put_ptr(&mut self, addr: Address, value: Address) {
        self.poke(addr, &value.to_le_bytes());
    }

    pub(crate) fn dentry(&mut self, name: &str, parent: Option<Address>, ino: u64) -> Address {
        self.dentry_raw(name.as_bytes(), parent, ino)
    }

    /// A dentry named `name`, child of `parent` or its own parent when `None`.
    pub(crate) fn dentry_raw(&mut self, name: &[u8], parent: Option<Address>, ino: u64) -> Address {
        let dentry = self.alloc(DENTRY_SIZE);
        let buf = self.alloc(name.len() + 1);
        self.poke(buf, name);
        self.poke(dentry + D_NAME + QSTR_LEN, &(name.len() as u32).to_le_bytes());
        self.put_ptr(dentry + D_NAME + QSTR_NAME, buf);
        self.put_ptr(dentry + D_PARENT, parent.unwrap_or(dentry));

        let inode = self.alloc(INODE_SIZE);
        self.poke(inode + I_INO, &ino.to_le_bytes());
        self.put_ptr(dentry + D_INODE, inode);
        dentry
    }

    pub(crate) fn set_parent(&mut self, dentry: Address, parent: Address) {
        self.put_ptr(dentry + D_PARENT, parent);
    }

    pub(crate) fn set_name_pointer(&mut self, dentry: Address, name: Address) {
        self.put_ptr(dentry + D_NAME + QSTR_NAME, name);
    }

    pub(crate) fn set_inode(&mut self, dentry: Address, inode: Address) {
        self.put_ptr(dentry + D_INODE, inode);
    }

    /// Installs a `dentry_operations` whose `d_dname` is `d_dname`.
    pub(crate) fn set_d_dname(&mut self, dentry: Address, d_dname: Address) -> Address {
        let ops = self.alloc(DENTRY_OPS_SIZE);
        self.put_ptr(ops + D_DNAME, d_dname);
        self.put_ptr(dentry + D_OP, ops);
        ops
    }

    pub(crate) fn set_d_op(&mut self, dentry: Address, ops: Address) {
        self.put_ptr(dentry + D_OP, ops);
    }

    /// A mount of `root` attached at `mountpoint` under `parent`, or the
    /// global root when `parent` is `None`. Returns the `vfsmount` address.
    pub(crate) fn mount(
        &mut self,
        root: Address,
        parent: Option<Address>,
        mountpoint: Address,
    ) -> Address {
        match self.flavor {
            Flavor::Modern => {
                let mount = self.alloc(MOUNT_SIZE);
                let vfsmnt = mount + MOUNT_MNT;
                self.put_ptr(vfsmnt + MNT_ROOT, root);
                let parent = parent.map(|p| p - MOUNT_MNT).unwrap_or(mount);
                self.put_ptr(mount + MNT_PARENT, parent);
                self.put_ptr(mount + MNT_MOUNTPOINT, mountpoint);
                vfsmnt
            }
            Flavor::Legacy => {
                let vfsmnt = self.alloc(VFSMOUNT_SIZE);
                self.put_ptr(vfsmnt + MNT_ROOT, root);
                self.put_ptr(vfsmnt + LEGACY_MNT_PARENT, parent.unwrap_or(vfsmnt));
                self.put_ptr(vfsmnt + LEGACY_MNT_MOUNTPOINT, mountpoint);
                vfsmnt
            }
        }
    }

    /// Points an existing mount at a different parent `vfsmount`.
    pub(crate) fn set_mount_parent(&mut self, vfsmnt: Address, parent: Address) {
        match self.flavor {
            Flavor::Modern => self.put_ptr(vfsmnt - MOUNT_MNT + MNT_PARENT, parent - MOUNT_MNT),
            Flavor::Legacy => self.put_ptr(vfsmnt + LEGACY_MNT_PARENT, parent),
        }
    }

    pub(crate) fn file(&mut self, dentry: Address, mnt: Address) -> Address {
        let file = self.alloc(FILE_SIZE);
        match self.flavor {
            Flavor::Modern => {
                self.put_ptr(file + F_PATH, mnt);
                self.put_ptr(file + F_PATH + 8, dentry);
            }
            Flavor::Legacy => {
                self.put_ptr(file + F_DENTRY, dentry);
                self.put_ptr(file + F_VFSMNT, mnt);
            }
        }
        file
    }

    /// A task rooted at `root`/`root_mnt` whose descriptor array holds
    /// `slots` and declares exactly that many.
    pub(crate) fn task(&mut self, root: Address, root_mnt: Address, slots: &[Address]) -> Address {
        self.task_with_max_fds(root, root_mnt, slots, slots.len() as u64)
    }

    pub(crate) fn task_with_max_fds(
        &mut self,
        root: Address,
        root_mnt: Address,
        slots: &[Address],
        max_fds: u64,
    ) -> Address {
        let fd_array = self.alloc(slots.len() * 8);
        for (i, &file) in slots.iter().enumerate() {
            self.put_ptr(fd_array + (i as u64) * 8, file);
        }
        let files = self.fd_table(fd_array, max_fds);

        let fs = self.alloc(FS_STRUCT_SIZE);
        match self.flavor {
            Flavor::Modern => {
                self.put_ptr(fs + FS_ROOT, root_mnt);
                self.put_ptr(fs + FS_ROOT + 8, root);
            }
            Flavor::Legacy => {
                self.put_ptr(fs + LEGACY_FS_ROOT, root);
                self.put_ptr(fs + LEGACY_FS_ROOTMNT, root_mnt);
            }
        }

        let task = self.alloc(TASK_SIZE);
        self.put_ptr(task + TASK_FS, fs);
        self.put_ptr(task + TASK_FILES, files);
        task
    }

    /// A `files_struct` for `fd_array`; returns its address.
    pub(crate) fn fd_table(&mut self, fd_array: Address, max_fds: u64) -> Address {
        let files = self.alloc(FILES_STRUCT_SIZE);
        match self.flavor {
            Flavor::Modern => {
                let fdt = self.alloc(FDTABLE_SIZE);
                self.poke(fdt + FDT_MAX_FDS, &(max_fds as u32).to_le_bytes());
                self.put_ptr(fdt + FDT_FD, fd_array);
                self.put_ptr(files + FILES_FDT, fdt);
            }
            Flavor::Legacy => {
                self.poke(
                    files + LEGACY_FILES_MAX_FDS,
                    &(max_fds as u32).to_le_bytes(),
                );
                self.put_ptr(files + LEGACY_FILES_FD, fd_array);
            }
        }
        files
    }

    /// Replaces a task's `files` pointer.
    pub(crate) fn set_files(&mut self, task: Address, files: Address) {
        self.put_ptr(task + TASK_FILES, files);
    }
}
