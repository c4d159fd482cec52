//! C Abstract Surface — the platform-neutral intermediate describing the C
//! API of one header set.
//!
//! These types are clang-independent, making the extractor and the target
//! mapper easier to test in isolation. All cross-references are by name; the
//! surface is closed (every referenced type name resolves in `types`) and
//! immutable once Mapper-C hands it over.

use serde::{Deserialize, Serialize};

use crate::diag::SourceLocation;

/// The kind of a [`CType`] entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CTypeKind {
    Builtin,
    Pointer,
    Record,
    Enum,
    Typedef,
    FunctionPointer,
    ConstArray,
}

/// One resolved type in the surface's type table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CType {
    /// Canonical name, e.g. `i32`, `Color*`, `Color[16]`, `CString`.
    pub name: String,
    /// The textual spelling as written in the source.
    pub original_name: String,
    pub size_bytes: u64,
    pub align_bytes: u64,
    /// Element count for `ConstArray` entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_size: Option<u64>,
    /// Element size for `ConstArray` entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_size: Option<u64>,
    pub kind: CTypeKind,
    /// Declared in a header outside the user's input set.
    pub is_system: bool,
}

/// Calling convention — only the C convention is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallingConvention {
    C,
}

/// A C function declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CFunction {
    pub name: String,
    pub return_type_name: String,
    pub calling_convention: CallingConvention,
    pub parameters: Vec<CFunctionParameter>,
    pub location: SourceLocation,
}

/// A function parameter. Names are always non-empty: anonymous parameters
/// are renamed `param`, `param2`, … during mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CFunctionParameter {
    pub name: String,
    pub type_name: String,
    pub is_const: bool,
}

/// A function-pointer type, either a typedef or synthesized from a record
/// field (`FnPtr_<field>`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CFunctionPointer {
    pub name: String,
    pub is_synthetic: bool,
    pub return_type_name: String,
    pub parameters: Vec<CFunctionPointerParameter>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CFunctionPointerParameter {
    pub name: String,
    pub type_name: String,
}

/// A struct or union definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRecord {
    pub name: String,
    pub is_union: bool,
    pub fields: Vec<CRecordField>,
    /// Anonymous aggregates declared inside this record, in declaration
    /// order, under their synthesized names.
    pub nested_records: Vec<CRecord>,
    /// Function-pointer fields without a typedef, under `FnPtr_<field>`.
    pub nested_function_pointers: Vec<CFunctionPointer>,
    /// Name of this record's entry in the type table.
    pub type_ref: String,
    pub location: SourceLocation,
}

/// A single record field. Fields are stored in declared order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRecordField {
    pub name: String,
    pub type_name: String,
    pub offset_bits: u64,
    /// Bits between the end of this field and the start of the next (or the
    /// end of the struct). Always 0 for union fields.
    pub padding_bits: u64,
    /// Width for bitfield fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit_width: Option<u32>,
}

/// A record declared but never defined in the user's includes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct COpaqueType {
    pub name: String,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CTypedef {
    pub name: String,
    pub underlying_type_name: String,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CEnum {
    pub name: String,
    pub integer_type_name: String,
    pub values: Vec<CEnumValue>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CEnumValue {
    pub name: String,
    pub value: i64,
}

/// A global variable with external linkage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CVariable {
    pub name: String,
    pub type_name: String,
    pub location: SourceLocation,
}

/// An object-like macro whose body is a single literal token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CMacroObject {
    pub name: String,
    pub tokens: Vec<String>,
    pub location: SourceLocation,
}

/// Kind tag for a root declaration reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CNodeKind {
    Function,
    FunctionPointer,
    Record,
    OpaqueType,
    Typedef,
    Enum,
    Variable,
    MacroObject,
}

/// A (kind, name) reference to a top-level node, in discovery order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRoot {
    pub kind: CNodeKind,
    pub name: String,
}

/// The complete C Abstract Surface. Iteration order is insertion order,
/// which follows Explorer discovery order, which follows parser cursor
/// order — this is what makes two runs byte-identical.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CSurface {
    pub types: Vec<CType>,
    pub functions: Vec<CFunction>,
    pub function_pointers: Vec<CFunctionPointer>,
    pub records: Vec<CRecord>,
    pub opaque_types: Vec<COpaqueType>,
    pub typedefs: Vec<CTypedef>,
    pub enums: Vec<CEnum>,
    pub variables: Vec<CVariable>,
    pub macros: Vec<CMacroObject>,
    pub roots: Vec<CRoot>,
}

impl CSurface {
    /// Look up a type-table entry by canonical name.
    pub fn type_named(&self, name: &str) -> Option<&CType> {
        self.types.iter().find(|t| t.name == name)
    }

    /// Every type name referenced anywhere in the surface, with the name of
    /// the referring declaration. Used to check the closure invariant.
    pub fn referenced_type_names(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for f in &self.functions {
            out.push((f.return_type_name.clone(), f.name.clone()));
            for p in &f.parameters {
                out.push((p.type_name.clone(), f.name.clone()));
            }
        }
        for fp in &self.function_pointers {
            out.push((fp.return_type_name.clone(), fp.name.clone()));
            for p in &fp.parameters {
                out.push((p.type_name.clone(), fp.name.clone()));
            }
        }
        for r in &self.records {
            collect_record_refs(r, &mut out);
        }
        for td in &self.typedefs {
            out.push((td.underlying_type_name.clone(), td.name.clone()));
        }
        for en in &self.enums {
            out.push((en.integer_type_name.clone(), en.name.clone()));
        }
        for v in &self.variables {
            out.push((v.type_name.clone(), v.name.clone()));
        }
        out
    }

    /// Returns the `(type_name, referring_declaration)` pairs that do not
    /// resolve in the type table. An empty result means the surface is
    /// closed.
    pub fn unresolved_references(&self) -> Vec<(String, String)> {
        self.referenced_type_names()
            .into_iter()
            .filter(|(ty, _)| self.type_named(ty).is_none())
            .collect()
    }
}

fn collect_record_refs(record: &CRecord, out: &mut Vec<(String, String)>) {
    for field in &record.fields {
        out.push((field.type_name.clone(), record.name.clone()));
    }
    for fp in &record.nested_function_pointers {
        out.push((fp.return_type_name.clone(), fp.name.clone()));
        for p in &fp.parameters {
            out.push((p.type_name.clone(), fp.name.clone()));
        }
    }
    for nested in &record.nested_records {
        collect_record_refs(nested, out);
    }
}
