//! Target Abstract Surface — the host-language-ready intermediate the
//! Emitter consumes.
//!
//! Mirrors the C surface but carries final target names and layout: aliases
//! applied, built-ins canonicalised to fixed-width types, parameter names
//! deduplicated and sanitised, nested anonymous aggregates hoisted to
//! synthetic top-level declarations, and array fields classified as inline
//! buffers or wrapped byte buffers.

use serde::{Deserialize, Serialize};

use crate::cas::{CTypeKind, CallingConvention};
use crate::diag::SourceLocation;

/// The fixed-width target primitives an inline buffer may hold directly.
pub const TARGET_PRIMITIVES: &[&str] = &[
    "u8", "i8", "u16", "i16", "u32", "i32", "u64", "i64", "f32", "f64", "CBool",
];

/// Built-in target type names. Aliasing a C name to one of these suppresses
/// the aliased declaration from the surface.
pub fn is_builtin_target_type(name: &str) -> bool {
    name == "void" || name == "CString" || TARGET_PRIMITIVES.contains(&name)
}

/// True when `name` is a fixed-width primitive an array field can inline.
pub fn is_target_primitive(name: &str) -> bool {
    TARGET_PRIMITIVES.contains(&name)
}

/// One entry in the target type table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TType {
    /// Final target type name.
    pub name: String,
    /// The CAS name this entry was derived from.
    pub c_name: String,
    pub size_bytes: u64,
    pub align_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_size: Option<u64>,
    pub kind: CTypeKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TFunction {
    pub name: String,
    pub return_type_name: String,
    pub calling_convention: CallingConvention,
    pub parameters: Vec<TFunctionParameter>,
    pub location: SourceLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TFunctionParameter {
    pub name: String,
    pub type_name: String,
    pub is_const: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TFunctionPointer {
    pub name: String,
    pub is_synthetic: bool,
    pub return_type_name: String,
    pub parameters: Vec<TFunctionPointerParameter>,
    pub location: SourceLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TFunctionPointerParameter {
    pub name: String,
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TStruct {
    pub name: String,
    pub is_union: bool,
    /// Hoisted from a nested anonymous aggregate.
    pub is_synthetic: bool,
    pub size_bytes: u64,
    pub align_bytes: u64,
    pub fields: Vec<TStructField>,
    pub location: SourceLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TStructField {
    pub name: String,
    pub type_name: String,
    pub offset_bits: u64,
    pub padding_bits: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit_width: Option<u32>,
    /// The field is an array whose element type is not a target primitive;
    /// it is represented as an inline byte buffer plus an accessor.
    pub is_wrapped_array: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrapped_elem: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrapped_len: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrapped_size_bytes: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TOpaqueType {
    pub name: String,
    pub size_bytes: u64,
    pub align_bytes: u64,
    pub location: SourceLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TTypedef {
    pub name: String,
    pub underlying_type_name: String,
    pub location: SourceLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TEnum {
    pub name: String,
    /// Normalised to `i32` or `u32`.
    pub integer_type_name: String,
    pub values: Vec<TEnumValue>,
    pub location: SourceLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TEnumValue {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TVariable {
    pub name: String,
    pub type_name: String,
    pub location: SourceLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
}

/// Lowered value of an object-like macro.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TMacroValue {
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TMacroObject {
    pub name: String,
    pub value: TMacroValue,
    pub location: SourceLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
}

/// The complete Target Abstract Surface, in emission order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TSurface {
    pub types: Vec<TType>,
    pub functions: Vec<TFunction>,
    pub function_pointers: Vec<TFunctionPointer>,
    pub structs: Vec<TStruct>,
    pub opaque_types: Vec<TOpaqueType>,
    pub typedefs: Vec<TTypedef>,
    pub enums: Vec<TEnum>,
    pub variables: Vec<TVariable>,
    pub macros: Vec<TMacroObject>,
}

impl TSurface {
    pub fn type_named(&self, name: &str) -> Option<&TType> {
        self.types.iter().find(|t| t.name == name)
    }

    /// Every type name referenced by the surface's declarations.
    pub fn referenced_type_names(&self) -> Vec<String> {
        let mut out = Vec::new();
        for f in &self.functions {
            out.push(f.return_type_name.clone());
            out.extend(f.parameters.iter().map(|p| p.type_name.clone()));
        }
        for fp in &self.function_pointers {
            out.push(fp.return_type_name.clone());
            out.extend(fp.parameters.iter().map(|p| p.type_name.clone()));
        }
        for s in &self.structs {
            for field in &s.fields {
                if field.is_wrapped_array {
                    if let Some(elem) = &field.wrapped_elem {
                        out.push(elem.clone());
                    }
                } else {
                    out.push(field.type_name.clone());
                }
            }
        }
        for td in &self.typedefs {
            out.push(td.underlying_type_name.clone());
        }
        for en in &self.enums {
            out.push(en.integer_type_name.clone());
        }
        for v in &self.variables {
            out.push(v.type_name.clone());
        }
        out
    }

    /// Type names that resolve neither to a surface entity nor a built-in
    /// target primitive. Empty for a well-formed surface.
    pub fn unresolved_references(&self) -> Vec<String> {
        self.referenced_type_names()
            .into_iter()
            .filter(|name| {
                let base = name.trim_end_matches('*');
                !is_builtin_target_type(base)
                    && self.type_named(name).is_none()
                    && self.type_named(base).is_none()
            })
            .collect()
    }
}
