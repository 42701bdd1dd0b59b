//! Symbol tables describing kernel structure layouts and symbol addresses.

mod isf;

use crate::error::{Error, Result};
use crate::io::Address;
use std::collections::{BTreeMap, HashMap};

/// Separates a table name from a symbol or type name, as in `linux!dentry`.
pub const BANG: char = '!';

/// Splits a `table!name` composite identifier. Names without a table part
/// return `None` for the table.
pub fn split_qualified(name: &str) -> (Option<&str>, &str) {
    let mut parts = name.splitn(2, BANG);
    match (parts.next(), parts.next()) {
        (Some(table), Some(rest)) => (Some(table), rest),
        _ => (None, name),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// A pointer. Holds the target structure name when the pointee is a
    /// structure or union.
    Pointer(Option<String>),
    /// A structure or union embedded by value.
    Struct(String),
    /// An integer of the given width in bytes.
    Base { size: usize },
    /// Anything this crate never decodes (arrays, bitfields, functions).
    Opaque,
}

impl FieldKind {
    pub fn pointer_to(target: &str) -> Self {
        FieldKind::Pointer(Some(target.to_string()))
    }

    pub fn embedded(name: &str) -> Self {
        FieldKind::Struct(name.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub offset: u64,
    pub kind: FieldKind,
}

#[derive(Debug, Clone)]
pub struct StructType {
    pub name: String,
    pub size: usize,
    fields: HashMap<String, Field>,
}

impl StructType {
    pub fn new(name: &str, size: usize) -> Self {
        Self {
            name: name.to_string(),
            size,
            fields: HashMap::new(),
        }
    }

    /// Adds a member, replacing one with the same name.
    pub fn field(mut self, name: &str, offset: u64, kind: FieldKind) -> Self {
        self.fields.insert(name.to_string(), Field { offset, kind });
        self
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn has_member(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }
}

/// Structure layouts and symbol locations for one kernel build.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    name: String,
    pointer_size: usize,
    /// Slide applied to every symbol address (KASLR).
    shift: u64,
    types: HashMap<String, StructType>,
    symbols: HashMap<String, Address>,
}

impl SymbolTable {
    pub fn new(name: &str, pointer_size: usize) -> Self {
        Self {
            name: name.to_string(),
            pointer_size,
            shift: 0,
            types: HashMap::new(),
            symbols: HashMap::new(),
        }
    }

    pub fn with_shift(mut self, shift: u64) -> Self {
        self.shift = shift;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pointer_size(&self) -> usize {
        self.pointer_size
    }

    pub fn add_type(&mut self, ty: StructType) {
        self.types.insert(ty.name.clone(), ty);
    }

    /// Records a symbol at its unshifted address.
    pub fn add_symbol(&mut self, name: &str, addr: Address) {
        self.symbols.insert(name.to_string(), addr);
    }

    pub fn has_type(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn get_type(&self, name: &str) -> Result<&StructType> {
        self.types
            .get(name)
            .ok_or_else(|| Error::UnknownType(format!("{}{}{}", self.name, BANG, name)))
    }

    /// The runtime address of a symbol, shift included.
    pub fn symbol_address(&self, name: &str) -> Option<Address> {
        self.symbols
            .get(name)
            .map(|addr| addr.wrapping_add(self.shift))
    }

    /// Names of all symbols whose runtime address is `addr`, sorted.
    pub fn symbols_at(&self, addr: Address) -> Vec<&str> {
        let mut found: Vec<&str> = self
            .symbols
            .iter()
            .filter(|(_, sym)| sym.wrapping_add(self.shift) == addr)
            .map(|(name, _)| name.as_str())
            .collect();
        found.sort_unstable();
        found
    }
}

/// Every symbol table known to a context.
#[derive(Debug, Default)]
pub struct SymbolSpace {
    tables: BTreeMap<String, SymbolTable>,
}

impl SymbolSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: SymbolTable) {
        self.tables.insert(table.name.clone(), table);
    }

    pub fn get(&self, name: &str) -> Result<&SymbolTable> {
        self.tables
            .get(name)
            .ok_or_else(|| Error::UnknownTable(name.to_string()))
    }

    /// Qualified names (`table!symbol`) of the symbols located at `addr`.
    ///
    /// With a table name only that table is searched; an unknown table
    /// matches nothing.
    pub fn symbols_at(&self, addr: Address, table: Option<&str>) -> Vec<String> {
        let qualify = |t: &SymbolTable| -> Vec<String> {
            t.symbols_at(addr)
                .into_iter()
                .map(|sym| format!("{}{}{}", t.name, BANG, sym))
                .collect()
        };

        match table {
            Some(name) => self.tables.get(name).map(qualify).unwrap_or_default(),
            None => self.tables.values().flat_map(qualify).collect(),
        }
    }
}
