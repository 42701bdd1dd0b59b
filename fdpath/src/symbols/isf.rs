//! Loader for the JSON Intermediate Symbol Format.
//!
//! Only the parts needed to decode structure members are read: base type
//! sizes, user type layouts and symbol addresses. Enumerations, arrays and
//! bitfields are kept as opaque members.

use super::{FieldKind, StructType, SymbolTable};
use crate::error::Result;
use log::debug;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;

const DEFAULT_POINTER_SIZE: usize = 8;

#[derive(Deserialize)]
struct IsfDocument {
    #[serde(default)]
    base_types: HashMap<String, IsfBaseType>,
    #[serde(default)]
    user_types: HashMap<String, IsfUserType>,
    #[serde(default)]
    symbols: HashMap<String, IsfSymbol>,
}

#[derive(Deserialize)]
struct IsfBaseType {
    size: usize,
}

#[derive(Deserialize)]
struct IsfUserType {
    size: usize,
    #[serde(default)]
    fields: HashMap<String, IsfField>,
}

#[derive(Deserialize)]
struct IsfField {
    offset: u64,
    #[serde(rename = "type")]
    ty: IsfType,
}

#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum IsfType {
    Base { name: String },
    Pointer { subtype: Box<IsfType> },
    Struct { name: String },
    Union { name: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct IsfSymbol {
    address: Option<u64>,
}

impl IsfType {
    fn field_kind(&self, base_types: &HashMap<String, IsfBaseType>) -> FieldKind {
        match self {
            IsfType::Base { name } => match base_types.get(name) {
                Some(base) => FieldKind::Base { size: base.size },
                None => FieldKind::Opaque,
            },
            IsfType::Pointer { subtype } => match subtype.as_ref() {
                IsfType::Struct { name } | IsfType::Union { name } => {
                    FieldKind::pointer_to(name)
                }
                _ => FieldKind::Pointer(None),
            },
            IsfType::Struct { name } | IsfType::Union { name } => FieldKind::embedded(name),
            IsfType::Other => FieldKind::Opaque,
        }
    }
}

impl SymbolTable {
    /// Builds a table named `name` from an ISF document.
    ///
    /// # Errors
    ///
    /// Fails when the reader cannot be read or the JSON does not match the
    /// format.
    pub fn from_isf<R: Read>(name: &str, reader: R) -> Result<Self> {
        let doc: IsfDocument = serde_json::from_reader(reader)?;
        Ok(Self::from_document(name, doc))
    }

    pub fn from_isf_str(name: &str, json: &str) -> Result<Self> {
        let doc: IsfDocument = serde_json::from_str(json)?;
        Ok(Self::from_document(name, doc))
    }

    fn from_document(name: &str, doc: IsfDocument) -> Self {
        let pointer_size = doc
            .base_types
            .get("pointer")
            .map(|p| p.size)
            .unwrap_or(DEFAULT_POINTER_SIZE);
        let mut table = SymbolTable::new(name, pointer_size);

        for (type_name, user_type) in doc.user_types.iter() {
            let ty = user_type.fields.iter().fold(
                StructType::new(type_name, user_type.size),
                |ty, (field_name, field)| {
                    ty.field(field_name, field.offset, field.ty.field_kind(&doc.base_types))
                },
            );
            table.add_type(ty);
        }

        for (symbol, location) in doc.symbols.iter() {
            // Symbols without an address describe types only.
            if let Some(addr) = location.address {
                table.add_symbol(symbol, addr);
            }
        }

        debug!(
            "loaded symbol table {} with {} types and {} symbols",
            name,
            table.types.len(),
            table.symbols.len()
        );
        table
    }
}
