//! Mapper-C — Exploration snapshot → immutable C Abstract Surface.
//!
//! Resolves every reachable type to a canonical name, interns a `CType`
//! entry per name, computes field padding from the oracle-reported offsets,
//! renames anonymous parameters, and lowers object-like macros. The
//! resulting surface is closed: every referenced type name resolves in the
//! type table, or the mapper aborts with a fatal diagnostic naming the
//! referring declaration.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::cas::*;
use crate::diag::{DiagKind, Diagnostics, SourceLocation};
use crate::explore::{
    CharSign, Exploration, RawEnum, RawFnPtr, RawFunction, RawMacro, RawRecord, RawType,
    RawTypeKind, RawTypedef,
};

/// Options influencing the lowering.
#[derive(Debug, Clone, Default)]
pub struct MapCOptions {
    /// When false, system typedefs are resolved through and never emitted.
    pub emit_system_types: bool,
}

/// Why a type could not be given a canonical name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeIssue {
    /// `va_list` — drops the enclosing function.
    VaList,
    /// No target mapping exists (e.g. `long double`).
    Unsupported,
}

/// Lower an exploration into a CAS. Warnings and infos accumulate in
/// `diags`; on the first `Error` the mapper stops and returns the partial
/// surface for inspection.
pub fn lower(expl: Exploration, opts: &MapCOptions, diags: &mut Diagnostics) -> CSurface {
    let mut m = Mapper {
        opts: opts.clone(),
        types: Vec::new(),
        index: HashMap::new(),
        surface: CSurface::default(),
    };

    // Records first so embedded aggregates resolve before their users; the
    // per-kind order below is the emission order.
    for record in &expl.records {
        if diags.has_errors() {
            break;
        }
        if let Some(lowered) = m.lower_record(record, diags) {
            m.surface.roots.push(CRoot {
                kind: CNodeKind::Record,
                name: lowered.name.clone(),
            });
            m.surface.records.push(lowered);
        }
    }
    for opaque in &expl.opaques {
        if diags.has_errors() {
            break;
        }
        m.intern(CType {
            name: opaque.name.clone(),
            original_name: opaque.name.clone(),
            size_bytes: opaque.size_bytes,
            align_bytes: opaque.align_bytes,
            array_size: None,
            element_size: None,
            kind: CTypeKind::Record,
            is_system: opaque.is_system,
        });
        m.surface.roots.push(CRoot {
            kind: CNodeKind::OpaqueType,
            name: opaque.name.clone(),
        });
        m.surface.opaque_types.push(COpaqueType {
            name: opaque.name.clone(),
            location: opaque.location.clone(),
        });
    }
    for en in &expl.enums {
        if diags.has_errors() {
            break;
        }
        if let Some(lowered) = m.lower_enum(en, diags) {
            m.surface.roots.push(CRoot {
                kind: CNodeKind::Enum,
                name: lowered.name.clone(),
            });
            m.surface.enums.push(lowered);
        }
    }
    for fnptr in &expl.fn_pointers {
        if diags.has_errors() {
            break;
        }
        if let Some(lowered) = m.lower_fn_ptr(fnptr, diags) {
            m.surface.roots.push(CRoot {
                kind: CNodeKind::FunctionPointer,
                name: lowered.name.clone(),
            });
            m.surface.function_pointers.push(lowered);
        }
    }
    for td in &expl.typedefs {
        if diags.has_errors() {
            break;
        }
        if let Some(lowered) = m.lower_typedef(td, diags) {
            m.surface.roots.push(CRoot {
                kind: CNodeKind::Typedef,
                name: lowered.name.clone(),
            });
            m.surface.typedefs.push(lowered);
        }
    }
    for f in &expl.functions {
        if diags.has_errors() {
            break;
        }
        if let Some(lowered) = m.lower_function(f, diags) {
            m.surface.roots.push(CRoot {
                kind: CNodeKind::Function,
                name: lowered.name.clone(),
            });
            m.surface.functions.push(lowered);
        }
    }
    for v in &expl.variables {
        if diags.has_errors() {
            break;
        }
        match m.type_name(&v.ty, &v.name, &v.location, diags) {
            Ok(type_name) => {
                m.surface.roots.push(CRoot {
                    kind: CNodeKind::Variable,
                    name: v.name.clone(),
                });
                m.surface.variables.push(CVariable {
                    name: v.name.clone(),
                    type_name,
                    location: v.location.clone(),
                });
            }
            Err(_) => continue,
        }
    }
    for mac in &expl.macros {
        if diags.has_errors() {
            break;
        }
        if let Some(lowered) = lower_macro(mac, diags) {
            m.surface.roots.push(CRoot {
                kind: CNodeKind::MacroObject,
                name: lowered.name.clone(),
            });
            m.surface.macros.push(lowered);
        }
    }

    m.surface.types = m.types;

    if !diags.has_errors() {
        for (ty, referrer) in m.surface.unresolved_references() {
            diags.push(
                DiagKind::UnresolvedTypeReference,
                referrer.clone(),
                SourceLocation::default(),
                format!("type `{ty}` referenced by `{referrer}` does not resolve"),
            );
        }
    }

    debug!(
        functions = m.surface.functions.len(),
        records = m.surface.records.len(),
        enums = m.surface.enums.len(),
        typedefs = m.surface.typedefs.len(),
        types = m.surface.types.len(),
        "mapper-c complete"
    );
    m.surface
}

struct Mapper {
    opts: MapCOptions,
    types: Vec<CType>,
    index: HashMap<String, usize>,
    surface: CSurface,
}

impl Mapper {
    /// Insert a type-table entry unless the name is already interned.
    fn intern(&mut self, ty: CType) {
        if self.index.contains_key(&ty.name) {
            return;
        }
        self.index.insert(ty.name.clone(), self.types.len());
        self.types.push(ty);
    }

    // -----------------------------------------------------------------------
    // Type-name canonicalisation
    // -----------------------------------------------------------------------

    /// Canonicalise a snapshotted type: returns the canonical name and makes
    /// sure the type table covers it. `referrer` names the declaration being
    /// lowered, for diagnostics.
    fn type_name(
        &mut self,
        raw: &RawType,
        referrer: &str,
        location: &SourceLocation,
        diags: &mut Diagnostics,
    ) -> Result<String, TypeIssue> {
        let name = match &raw.kind {
            RawTypeKind::Void => self.intern_builtin("void", raw, 0, 1),
            RawTypeKind::Bool => self.intern_builtin("CBool", raw, 1, 1),
            RawTypeKind::Char { sign } => match sign {
                CharSign::Signed => self.intern_builtin("i8", raw, 1, 1),
                CharSign::Plain | CharSign::Unsigned => self.intern_builtin("u8", raw, 1, 1),
            },
            RawTypeKind::Int { signed, size_bytes } => {
                let name = match (signed, size_bytes) {
                    (true, 1) => "i8",
                    (false, 1) => "u8",
                    (true, 2) => "i16",
                    (false, 2) => "u16",
                    (true, 4) => "i32",
                    (false, 4) => "u32",
                    (true, 8) => "i64",
                    (false, 8) => "u64",
                    _ => {
                        diags.push(
                            DiagKind::UnsupportedType,
                            referrer,
                            location.clone(),
                            format!("integer type `{}` has no target mapping", raw.spelling),
                        );
                        return Err(TypeIssue::Unsupported);
                    }
                };
                self.intern_builtin(name, raw, *size_bytes, *size_bytes)
            }
            RawTypeKind::Float { size_bytes } => match size_bytes {
                4 => self.intern_builtin("f32", raw, 4, 4),
                8 => self.intern_builtin("f64", raw, 8, 8),
                _ => {
                    diags.push(
                        DiagKind::UnsupportedType,
                        referrer,
                        location.clone(),
                        format!("floating type `{}` has no target mapping", raw.spelling),
                    );
                    return Err(TypeIssue::Unsupported);
                }
            },

            RawTypeKind::Pointer { pointee } => {
                // `char*` carries string semantics.
                if matches!(
                    pointee.kind,
                    RawTypeKind::Char {
                        sign: CharSign::Plain
                    }
                ) {
                    let name = "CString".to_string();
                    self.intern(CType {
                        name: name.clone(),
                        original_name: raw.spelling.clone(),
                        size_bytes: raw.size_bytes.unwrap_or(8),
                        align_bytes: raw.align_bytes.unwrap_or(8),
                        array_size: None,
                        element_size: None,
                        kind: CTypeKind::Pointer,
                        is_system: false,
                    });
                    name
                } else {
                    // Arrays decay in pointer context: `T(*)[N]` → `T*`.
                    let inner = match &pointee.kind {
                        RawTypeKind::ConstArray { element, .. } => element.as_ref(),
                        RawTypeKind::FunctionProto { .. } => {
                            // A bare function pointer with no typedef and no
                            // field to name it after.
                            diags.push(
                                DiagKind::NotImplemented,
                                referrer,
                                location.clone(),
                                "unnamed function pointer lowered to `void*`",
                            );
                            let name = "void*".to_string();
                            self.intern_builtin("void", pointee, 0, 1);
                            self.intern(CType {
                                name: name.clone(),
                                original_name: raw.spelling.clone(),
                                size_bytes: raw.size_bytes.unwrap_or(8),
                                align_bytes: raw.align_bytes.unwrap_or(8),
                                array_size: None,
                                element_size: None,
                                kind: CTypeKind::Pointer,
                                is_system: false,
                            });
                            return Ok(name);
                        }
                        _ => pointee.as_ref(),
                    };
                    let inner_name = self.type_name(inner, referrer, location, diags)?;
                    let name = format!("{inner_name}*");
                    self.intern(CType {
                        name: name.clone(),
                        original_name: raw.spelling.clone(),
                        size_bytes: raw.size_bytes.unwrap_or(8),
                        align_bytes: raw.align_bytes.unwrap_or(8),
                        array_size: None,
                        element_size: None,
                        kind: CTypeKind::Pointer,
                        is_system: false,
                    });
                    name
                }
            }

            RawTypeKind::ConstArray { element, len } => {
                let element_name = self.type_name(element, referrer, location, diags)?;
                let element_size = element.size_bytes.unwrap_or(0);
                let name = format!("{element_name}[{len}]");
                self.intern(CType {
                    name: name.clone(),
                    original_name: raw.spelling.clone(),
                    size_bytes: raw.size_bytes.unwrap_or(element_size * len),
                    align_bytes: raw.align_bytes.unwrap_or(element.align_bytes.unwrap_or(1)),
                    array_size: Some(*len),
                    element_size: Some(element_size),
                    kind: CTypeKind::ConstArray,
                    is_system: false,
                });
                name
            }

            RawTypeKind::Record { name, .. } => {
                self.intern(CType {
                    name: name.clone(),
                    original_name: raw.spelling.clone(),
                    size_bytes: raw.size_bytes.unwrap_or(0),
                    align_bytes: raw.align_bytes.unwrap_or(0),
                    array_size: None,
                    element_size: None,
                    kind: CTypeKind::Record,
                    is_system: raw.is_system,
                });
                name.clone()
            }

            RawTypeKind::Enum { name } => {
                self.intern(CType {
                    name: name.clone(),
                    original_name: raw.spelling.clone(),
                    size_bytes: raw.size_bytes.unwrap_or(4),
                    align_bytes: raw.align_bytes.unwrap_or(4),
                    array_size: None,
                    element_size: None,
                    kind: CTypeKind::Enum,
                    is_system: raw.is_system,
                });
                name.clone()
            }

            RawTypeKind::Typedef { name, underlying } => {
                // Function-pointer typedefs resolve to their own node kind.
                if fn_ptr_underlying(underlying) {
                    self.intern(CType {
                        name: name.clone(),
                        original_name: raw.spelling.clone(),
                        size_bytes: raw.size_bytes.unwrap_or(8),
                        align_bytes: raw.align_bytes.unwrap_or(8),
                        array_size: None,
                        element_size: None,
                        kind: CTypeKind::FunctionPointer,
                        is_system: raw.is_system,
                    });
                    name.clone()
                } else if raw.is_system
                    && (!self.opts.emit_system_types || builtin_underlying(underlying))
                {
                    // System typedefs resolve through to the canonical type;
                    // a system typedef of a system builtin always does.
                    return self.type_name(underlying, referrer, location, diags);
                } else {
                    self.intern(CType {
                        name: name.clone(),
                        original_name: raw.spelling.clone(),
                        size_bytes: raw.size_bytes.unwrap_or(underlying.size_bytes.unwrap_or(0)),
                        align_bytes: raw
                            .align_bytes
                            .unwrap_or(underlying.align_bytes.unwrap_or(0)),
                        array_size: None,
                        element_size: None,
                        kind: CTypeKind::Typedef,
                        is_system: raw.is_system,
                    });
                    name.clone()
                }
            }

            RawTypeKind::FnPtrRef { name } => {
                self.intern(CType {
                    name: name.clone(),
                    original_name: raw.spelling.clone(),
                    size_bytes: raw.size_bytes.unwrap_or(8),
                    align_bytes: raw.align_bytes.unwrap_or(8),
                    array_size: None,
                    element_size: None,
                    kind: CTypeKind::FunctionPointer,
                    is_system: false,
                });
                name.clone()
            }

            RawTypeKind::FunctionProto { .. } => {
                // Bare prototypes only occur behind pointers; reaching one
                // directly means the declaration cannot be expressed.
                diags.push(
                    DiagKind::UnsupportedType,
                    referrer,
                    location.clone(),
                    format!("bare function type `{}` has no target mapping", raw.spelling),
                );
                return Err(TypeIssue::Unsupported);
            }

            RawTypeKind::VaList => return Err(TypeIssue::VaList),

            RawTypeKind::Unsupported => {
                diags.push(
                    DiagKind::UnsupportedType,
                    referrer,
                    location.clone(),
                    format!("type `{}` has no target mapping", raw.spelling),
                );
                return Err(TypeIssue::Unsupported);
            }
        };
        Ok(name)
    }

    fn intern_builtin(&mut self, name: &str, raw: &RawType, size: u64, align: u64) -> String {
        self.intern(CType {
            name: name.to_string(),
            original_name: raw.spelling.clone(),
            size_bytes: raw.size_bytes.unwrap_or(size),
            align_bytes: raw.align_bytes.unwrap_or(align),
            array_size: None,
            element_size: None,
            kind: CTypeKind::Builtin,
            is_system: false,
        });
        name.to_string()
    }

    // -----------------------------------------------------------------------
    // Declarations
    // -----------------------------------------------------------------------

    fn lower_record(&mut self, record: &RawRecord, diags: &mut Diagnostics) -> Option<CRecord> {
        self.intern(CType {
            name: record.name.clone(),
            original_name: record.spelling.clone(),
            size_bytes: record.size_bytes,
            align_bytes: record.align_bytes,
            array_size: None,
            element_size: None,
            kind: CTypeKind::Record,
            is_system: record.is_system,
        });

        let mut nested_records = Vec::new();
        for nested in &record.nested_records {
            nested_records.push(self.lower_record(nested, diags)?);
        }
        let mut nested_function_pointers = Vec::new();
        for fnptr in &record.nested_fn_pointers {
            nested_function_pointers.push(self.lower_fn_ptr(fnptr, diags)?);
        }

        let mut fields = Vec::new();
        for field in &record.fields {
            let type_name = match self.type_name(&field.ty, &record.name, &record.location, diags)
            {
                Ok(n) => n,
                Err(TypeIssue::VaList) => {
                    diags.push(
                        DiagKind::UnsupportedType,
                        record.name.clone(),
                        record.location.clone(),
                        format!("field `{}` has va_list type", field.name),
                    );
                    return None;
                }
                Err(TypeIssue::Unsupported) => return None,
            };
            let size_bits = match field.bit_width {
                Some(w) => w as u64,
                None => field.ty.size_bytes.unwrap_or(0) * 8,
            };
            fields.push((field, type_name, size_bits));
        }

        // Padding: distance to the next field's offset, or to the end of the
        // record. Union members all start at 0 and carry no padding.
        let total_bits = record.size_bytes * 8;
        let mut lowered_fields = Vec::new();
        for (i, (field, type_name, size_bits)) in fields.iter().enumerate() {
            let padding_bits = if record.is_union {
                0
            } else {
                let end = field.offset_bits + size_bits;
                let next = fields
                    .get(i + 1)
                    .map(|(f, _, _)| f.offset_bits)
                    .unwrap_or(total_bits);
                next.saturating_sub(end)
            };
            lowered_fields.push(CRecordField {
                name: field.name.clone(),
                type_name: type_name.clone(),
                offset_bits: field.offset_bits,
                padding_bits,
                bit_width: field.bit_width,
            });
        }

        Some(CRecord {
            name: record.name.clone(),
            is_union: record.is_union,
            fields: lowered_fields,
            nested_records,
            nested_function_pointers,
            type_ref: record.name.clone(),
            location: record.location.clone(),
        })
    }

    fn lower_enum(&mut self, en: &RawEnum, diags: &mut Diagnostics) -> Option<CEnum> {
        let integer_type_name = match self.type_name(&en.underlying, &en.name, &en.location, diags)
        {
            Ok(n) => n,
            Err(_) => return None,
        };
        self.intern(CType {
            name: en.name.clone(),
            original_name: en.name.clone(),
            size_bytes: en.underlying.size_bytes.unwrap_or(4),
            align_bytes: en.underlying.align_bytes.unwrap_or(4),
            array_size: None,
            element_size: None,
            kind: CTypeKind::Enum,
            is_system: en.is_system,
        });
        Some(CEnum {
            name: en.name.clone(),
            integer_type_name,
            values: en
                .values
                .iter()
                .map(|v| CEnumValue {
                    name: v.name.clone(),
                    value: v.value,
                })
                .collect(),
            location: en.location.clone(),
        })
    }

    fn lower_fn_ptr(&mut self, fnptr: &RawFnPtr, diags: &mut Diagnostics) -> Option<CFunctionPointer> {
        let return_type_name =
            match self.type_name(&fnptr.ret, &fnptr.name, &fnptr.location, diags) {
                Ok(n) => n,
                Err(TypeIssue::VaList) => {
                    diags.push(
                        DiagKind::VariadicFunctionDropped,
                        fnptr.name.clone(),
                        fnptr.location.clone(),
                        "function pointer involves va_list",
                    );
                    return None;
                }
                Err(TypeIssue::Unsupported) => return None,
            };
        let mut parameters = Vec::new();
        let mut namer = ParamNamer::new();
        for p in &fnptr.params {
            let type_name = match self.type_name(&p.ty, &fnptr.name, &fnptr.location, diags) {
                Ok(n) => n,
                Err(TypeIssue::VaList) => {
                    diags.push(
                        DiagKind::VariadicFunctionDropped,
                        fnptr.name.clone(),
                        fnptr.location.clone(),
                        "function pointer involves va_list",
                    );
                    return None;
                }
                Err(TypeIssue::Unsupported) => return None,
            };
            parameters.push(CFunctionPointerParameter {
                name: namer.next(&p.name),
                type_name,
            });
        }
        self.intern(CType {
            name: fnptr.name.clone(),
            original_name: fnptr.name.clone(),
            size_bytes: fnptr.size_bytes,
            align_bytes: fnptr.align_bytes,
            array_size: None,
            element_size: None,
            kind: CTypeKind::FunctionPointer,
            is_system: false,
        });
        Some(CFunctionPointer {
            name: fnptr.name.clone(),
            is_synthetic: fnptr.is_synthetic,
            return_type_name,
            parameters,
            location: fnptr.location.clone(),
        })
    }

    fn lower_typedef(&mut self, td: &RawTypedef, diags: &mut Diagnostics) -> Option<CTypedef> {
        // System typedefs are resolved through at reference sites and never
        // surface as nodes unless configured otherwise.
        if td.is_system && !self.opts.emit_system_types {
            return None;
        }
        if td.is_system && builtin_underlying(&td.underlying) {
            return None;
        }
        let underlying_type_name =
            match self.type_name(&td.underlying, &td.name, &td.location, diags) {
                Ok(n) => n,
                Err(_) => return None,
            };
        self.intern(CType {
            name: td.name.clone(),
            original_name: td.name.clone(),
            size_bytes: td.underlying.size_bytes.unwrap_or(0),
            align_bytes: td.underlying.align_bytes.unwrap_or(0),
            array_size: None,
            element_size: None,
            kind: CTypeKind::Typedef,
            is_system: td.is_system,
        });
        Some(CTypedef {
            name: td.name.clone(),
            underlying_type_name,
            location: td.location.clone(),
        })
    }

    fn lower_function(&mut self, f: &RawFunction, diags: &mut Diagnostics) -> Option<CFunction> {
        if f.variadic {
            warn!(name = %f.name, "dropping variadic function");
            diags.push(
                DiagKind::VariadicFunctionDropped,
                f.name.clone(),
                f.location.clone(),
                "variadic functions are not supported",
            );
            return None;
        }
        let return_type_name = match self.type_name(&f.ret, &f.name, &f.location, diags) {
            Ok(n) => n,
            Err(TypeIssue::VaList) => {
                diags.push(
                    DiagKind::VariadicFunctionDropped,
                    f.name.clone(),
                    f.location.clone(),
                    "return type involves va_list",
                );
                return None;
            }
            Err(TypeIssue::Unsupported) => return None,
        };

        let mut parameters = Vec::new();
        let mut namer = ParamNamer::new();
        for p in &f.params {
            // C array parameters decay to pointers.
            let decayed;
            let ty = match &p.ty.kind {
                RawTypeKind::ConstArray { element, .. } => {
                    decayed = RawType {
                        kind: RawTypeKind::Pointer {
                            pointee: element.clone(),
                        },
                        spelling: p.ty.spelling.clone(),
                        size_bytes: Some(8),
                        align_bytes: Some(8),
                        is_system: p.ty.is_system,
                    };
                    &decayed
                }
                _ => &p.ty,
            };
            let type_name = match self.type_name(ty, &f.name, &f.location, diags) {
                Ok(n) => n,
                Err(TypeIssue::VaList) => {
                    diags.push(
                        DiagKind::VariadicFunctionDropped,
                        f.name.clone(),
                        f.location.clone(),
                        format!("parameter `{}` has va_list type", p.name),
                    );
                    return None;
                }
                Err(TypeIssue::Unsupported) => return None,
            };
            parameters.push(CFunctionParameter {
                name: namer.next(&p.name),
                type_name,
                is_const: p.is_const,
            });
        }

        Some(CFunction {
            name: f.name.clone(),
            return_type_name,
            calling_convention: CallingConvention::C,
            parameters,
            location: f.location.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Parameter naming
// ---------------------------------------------------------------------------

/// Renames empty parameter names: first empty → `param`, then `param2`,
/// `param3`, … Already-named parameters pass through untouched.
pub struct ParamNamer {
    empties: u32,
}

impl ParamNamer {
    pub fn new() -> Self {
        Self { empties: 0 }
    }

    pub fn next(&mut self, name: &str) -> String {
        if !name.is_empty() {
            return name.to_string();
        }
        self.empties += 1;
        if self.empties == 1 {
            "param".to_string()
        } else {
            format!("param{}", self.empties)
        }
    }
}

impl Default for ParamNamer {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Macro lowering
// ---------------------------------------------------------------------------

/// Lower an object-like macro whose body is a single literal token
/// (optionally negated). Everything else is diagnosed and dropped.
fn lower_macro(mac: &RawMacro, diags: &mut Diagnostics) -> Option<CMacroObject> {
    let literal_ok = match mac.tokens.as_slice() {
        [single] => is_literal_token(single),
        [minus, lit] if minus == "-" => is_numeric_literal(lit),
        _ => false,
    };
    if !literal_ok {
        diags.push(
            DiagKind::MacroObjectNotTranspiled,
            mac.name.clone(),
            mac.location.clone(),
            "macro body is not a single literal",
        );
        return None;
    }
    Some(CMacroObject {
        name: mac.name.clone(),
        tokens: mac.tokens.clone(),
        location: mac.location.clone(),
    })
}

/// A single integer, float, or string literal token.
pub fn is_literal_token(token: &str) -> bool {
    is_numeric_literal(token) || (token.len() >= 2 && token.starts_with('"') && token.ends_with('"'))
}

fn is_numeric_literal(token: &str) -> bool {
    parse_int_literal(token).is_some() || parse_float_literal(token).is_some()
}

/// Parse a C integer literal: decimal, hex (`0x1F`), octal (`0755`), with
/// optional `U`/`L` suffixes.
pub fn parse_int_literal(token: &str) -> Option<u64> {
    let s = token.trim_end_matches(['u', 'U', 'l', 'L']);
    if s.is_empty() {
        return None;
    }
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else if s.len() > 1 && s.starts_with('0') && s.chars().all(|c| c.is_ascii_digit()) {
        u64::from_str_radix(&s[1..], 8).ok()
    } else {
        s.parse::<u64>().ok()
    }
}

/// Parse a C floating literal, tolerating `f`/`F` suffixes. Plain integers
/// are not accepted here; they parse as integers first.
pub fn parse_float_literal(token: &str) -> Option<f64> {
    let s = token.trim_end_matches(['f', 'F']);
    if !s.contains('.') && !s.contains('e') && !s.contains('E') {
        return None;
    }
    s.parse::<f64>().ok()
}

fn builtin_underlying(raw: &RawType) -> bool {
    matches!(
        raw.kind,
        RawTypeKind::Void
            | RawTypeKind::Bool
            | RawTypeKind::Char { .. }
            | RawTypeKind::Int { .. }
            | RawTypeKind::Float { .. }
    )
}

fn fn_ptr_underlying(raw: &RawType) -> bool {
    match &raw.kind {
        RawTypeKind::FunctionProto { .. } => true,
        RawTypeKind::Pointer { pointee } => {
            matches!(pointee.kind, RawTypeKind::FunctionProto { .. })
        }
        _ => false,
    }
}
