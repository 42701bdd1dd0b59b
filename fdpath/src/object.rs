//! Typed views over structures that live in a memory snapshot.

use crate::error::{Error, Result};
use crate::io::{Address, AddressSpace};
use crate::symbols::{Field, FieldKind, StructType, SymbolSpace, SymbolTable, BANG};
use std::fmt;

/// A snapshot together with the symbol tables describing it.
pub struct Context<S: AddressSpace> {
    space: S,
    symbols: SymbolSpace,
}

impl<S: AddressSpace> Context<S> {
    pub fn new(space: S, symbols: SymbolSpace) -> Self {
        Self { space, symbols }
    }

    pub fn space(&self) -> &S {
        &self.space
    }

    pub fn symbols(&self) -> &SymbolSpace {
        &self.symbols
    }

    /// A view of `table!type_name` at `addr`. Nothing is read yet.
    pub fn object(&self, table: &str, type_name: &str, addr: Address) -> Result<Object<'_>> {
        let table = self.symbols.get(table)?;
        Object::new(&self.space, table, type_name, addr)
    }
}

/// A structure of a known type at an address.
///
/// Objects never own or cache memory: every accessor reads the snapshot
/// again and any read may fail. Two objects are equal when their addresses
/// are, whatever their types.
#[derive(Clone, Copy)]
pub struct Object<'a> {
    space: &'a dyn AddressSpace,
    table: &'a SymbolTable,
    ty: &'a StructType,
    addr: Address,
}

impl<'a> Object<'a> {
    pub fn new(
        space: &'a dyn AddressSpace,
        table: &'a SymbolTable,
        type_name: &str,
        addr: Address,
    ) -> Result<Self> {
        let ty = table.get_type(type_name)?;
        Ok(Self {
            space,
            table,
            ty,
            addr,
        })
    }

    pub fn address(&self) -> Address {
        self.addr
    }

    pub fn is_null(&self) -> bool {
        self.addr == 0
    }

    pub fn type_name(&self) -> &'a str {
        &self.ty.name
    }

    pub fn table(&self) -> &'a SymbolTable {
        self.table
    }

    /// The type name qualified with its table, e.g. `linux!dentry`.
    pub fn qualified_type_name(&self) -> String {
        format!("{}{}{}", self.table.name(), BANG, self.ty.name)
    }

    pub fn has_member(&self, name: &str) -> bool {
        self.ty.has_member(name)
    }

    /// Another object of the same table at an arbitrary address.
    pub fn at(&self, type_name: &str, addr: Address) -> Result<Object<'a>> {
        Object::new(self.space, self.table, type_name, addr)
    }

    /// The structure embedded by value at member `name`.
    pub fn member(&self, name: &str) -> Result<Object<'a>> {
        let field = self.field(name)?;
        match &field.kind {
            FieldKind::Struct(inner) => self.at(inner, self.addr.wrapping_add(field.offset)),
            _ => Err(self.kind_error(name, "an embedded structure")),
        }
    }

    /// The raw value of pointer member `name`.
    pub fn read_pointer(&self, name: &str) -> Result<Address> {
        let field = self.field(name)?;
        match field.kind {
            FieldKind::Pointer(_) => self.space.read_pointer(
                self.addr.wrapping_add(field.offset),
                self.table.pointer_size(),
            ),
            _ => Err(self.kind_error(name, "a pointer")),
        }
    }

    /// Follows pointer member `name` to the structure it points at.
    ///
    /// Only the pointer itself is read; the target may be null or unmapped.
    pub fn deref(&self, name: &str) -> Result<Object<'a>> {
        let field = self.field(name)?;
        match &field.kind {
            FieldKind::Pointer(Some(target)) => {
                let addr = self.read_pointer(name)?;
                self.at(target, addr)
            }
            _ => Err(self.kind_error(name, "a pointer to a structure")),
        }
    }

    pub fn read_unsigned(&self, name: &str) -> Result<u64> {
        let field = self.field(name)?;
        match field.kind {
            FieldKind::Base { size } => self
                .space
                .read_unsigned(self.addr.wrapping_add(field.offset), size),
            _ => Err(self.kind_error(name, "an integer")),
        }
    }

    /// The enclosing `type_name` structure whose member `member` is this
    /// object.
    pub fn container_of(&self, type_name: &str, member: &str) -> Result<Object<'a>> {
        let outer = self.table.get_type(type_name)?;
        let field = outer.get(member).ok_or_else(|| Error::UnknownMember {
            ty: type_name.to_string(),
            member: member.to_string(),
        })?;
        self.at(type_name, self.addr.wrapping_sub(field.offset))
    }

    /// The address space objects derived from this one read from.
    pub fn space(&self) -> &'a dyn AddressSpace {
        self.space
    }

    fn field(&self, name: &str) -> Result<&'a Field> {
        self.ty.get(name).ok_or_else(|| Error::UnknownMember {
            ty: self.ty.name.clone(),
            member: name.to_string(),
        })
    }

    fn kind_error(&self, member: &str, expected: &'static str) -> Error {
        Error::MemberKind {
            ty: self.ty.name.clone(),
            member: member.to_string(),
            expected,
        }
    }
}

/// A run of `count` pointers to `subtype` structures starting at `base`,
/// such as a descriptor table. Slots are read one at a time on demand.
#[derive(Clone, Copy)]
pub struct PointerArray<'a> {
    space: &'a dyn AddressSpace,
    table: &'a SymbolTable,
    subtype: &'a StructType,
    base: Address,
    count: u64,
}

impl<'a> PointerArray<'a> {
    pub fn new(
        space: &'a dyn AddressSpace,
        table: &'a SymbolTable,
        subtype: &str,
        base: Address,
        count: u64,
    ) -> Result<Self> {
        Ok(Self {
            space,
            table,
            subtype: table.get_type(subtype)?,
            base,
            count,
        })
    }

    pub fn len(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The object slot `index` points at, `None` for a null slot or an
    /// index past the end.
    pub fn get(&self, index: u64) -> Result<Option<Object<'a>>> {
        if index >= self.count {
            return Ok(None);
        }
        let width = self.table.pointer_size();
        let slot = self.base.wrapping_add(index.wrapping_mul(width as u64));
        let addr = self.space.read_pointer(slot, width)?;
        if addr == 0 {
            return Ok(None);
        }
        Ok(Some(Object {
            space: self.space,
            table: self.table,
            ty: self.subtype,
            addr,
        }))
    }
}

impl PartialEq for Object<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.addr == other.addr
    }
}

impl Eq for Object<'_> {}

impl fmt::Debug for Object<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {:#x}", self.qualified_type_name(), self.addr)
    }
}
