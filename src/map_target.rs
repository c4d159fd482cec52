//! Mapper-Target — C Abstract Surface → Target Abstract Surface.
//!
//! A deterministic rewrite: applies user aliases, canonicalises built-ins,
//! classifies array fields as inline buffers or wrapped byte buffers,
//! deduplicates and sanitises identifiers, maps common function-pointer
//! shapes to canonical names, hoists nested anonymous aggregates, and
//! filters ignored names. Given identical inputs the output is bit-identical
//! across runs: iteration follows CAS insertion order throughout.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::cas::*;
use crate::diag::{DiagKind, Diagnostics, SourceLocation};
use crate::map_c::{parse_float_literal, parse_int_literal};
use crate::tas::*;

/// Inputs beyond the surface itself.
#[derive(Debug, Clone, Default)]
pub struct MapTargetOptions {
    /// C-name → target-name pairs, applied in order.
    pub aliases: Vec<(String, String)>,
    /// Names omitted from the target surface at every level.
    pub ignored: HashSet<String>,
}

/// Canonical names for common function-pointer shapes appearing as record
/// fields. `(name, return type, parameter types)`.
const FN_PTR_BUILTINS: &[(&str, &str, &[&str])] = &[
    ("FnPtrVoid", "void", &[]),
    ("FnPtrPointer", "void", &["void*"]),
    ("FnPtrPointerPointer", "void*", &["void*"]),
    ("FnPtrInt", "i32", &[]),
];

/// Rewrite a C surface into a target surface. Warnings accumulate in
/// `diags`; the caller aborts on errors.
pub fn lower(cas: CSurface, opts: &MapTargetOptions, diags: &mut Diagnostics) -> TSurface {
    let mut names = NameMap::new(opts, &cas, diags);
    let mut out = TSurface::default();

    // Type table first: every entry under its final target name. Entries
    // whose name was aliased to a built-in vanish (the built-in already
    // exists on the target side).
    for ty in &cas.types {
        if names.is_suppressed(&ty.name)
            || names.is_displaced(&ty.name)
            || opts.ignored.contains(&ty.name)
        {
            continue;
        }
        let final_name = names.resolve(&ty.name);
        if out.type_named(&final_name).is_some() {
            continue;
        }
        out.types.push(TType {
            name: final_name,
            c_name: ty.name.clone(),
            size_bytes: ty.size_bytes,
            align_bytes: ty.align_bytes,
            array_size: ty.array_size,
            element_size: ty.element_size,
            kind: ty.kind,
        });
    }

    for record in &cas.records {
        lower_record(record, false, &cas, &mut names, opts, diags, &mut out);
    }

    for opaque in &cas.opaque_types {
        if opts.ignored.contains(&opaque.name)
            || names.is_suppressed(&opaque.name)
            || names.is_displaced(&opaque.name)
        {
            continue;
        }
        let (size, align) = cas
            .type_named(&opaque.name)
            .map(|t| (t.size_bytes, t.align_bytes))
            .unwrap_or((0, 1));
        out.opaque_types.push(TOpaqueType {
            name: names.resolve(&opaque.name),
            size_bytes: size,
            align_bytes: align,
            location: opaque.location.clone(),
            platform: None,
        });
    }

    for fnptr in &cas.function_pointers {
        lower_fn_ptr(fnptr, &mut names, opts, &mut out);
    }

    for td in &cas.typedefs {
        if opts.ignored.contains(&td.name)
            || names.is_suppressed(&td.name)
            || names.is_displaced(&td.name)
        {
            continue;
        }
        let name = names.resolve(&td.name);
        let underlying = names.resolve(&td.underlying_type_name);
        // Identity aliases (`typedef` renamed onto its own underlying type)
        // would emit `type X = X;`.
        if name == underlying {
            continue;
        }
        out.typedefs.push(TTypedef {
            name,
            underlying_type_name: underlying,
            location: td.location.clone(),
            platform: None,
        });
    }

    for en in &cas.enums {
        if opts.ignored.contains(&en.name)
            || names.is_suppressed(&en.name)
            || names.is_displaced(&en.name)
        {
            continue;
        }
        let integer_type_name = normalise_enum_storage(en, diags);
        out.enums.push(TEnum {
            name: names.resolve(&en.name),
            integer_type_name,
            values: en
                .values
                .iter()
                .map(|v| TEnumValue {
                    name: v.name.clone(),
                    value: v.value,
                })
                .collect(),
            location: en.location.clone(),
            platform: None,
        });
    }

    for f in &cas.functions {
        if opts.ignored.contains(&f.name) {
            continue;
        }
        let mut used = HashSet::new();
        let parameters = f
            .parameters
            .iter()
            .map(|p| TFunctionParameter {
                name: unique_identifier(&p.name, &mut used),
                type_name: names.resolve(&p.type_name),
                is_const: p.is_const,
            })
            .collect();
        out.functions.push(TFunction {
            name: f.name.clone(),
            return_type_name: names.resolve(&f.return_type_name),
            calling_convention: f.calling_convention,
            parameters,
            location: f.location.clone(),
            platform: None,
        });
    }

    for v in &cas.variables {
        if opts.ignored.contains(&v.name) {
            continue;
        }
        out.variables.push(TVariable {
            name: v.name.clone(),
            type_name: names.resolve(&v.type_name),
            location: v.location.clone(),
            platform: None,
        });
    }

    for mac in &cas.macros {
        if opts.ignored.contains(&mac.name) {
            continue;
        }
        if let Some(value) = macro_value(&mac.tokens) {
            out.macros.push(TMacroObject {
                name: mac.name.clone(),
                value,
                location: mac.location.clone(),
                platform: None,
            });
        } else {
            diags.push(
                DiagKind::MacroObjectNotTranspiled,
                mac.name.clone(),
                mac.location.clone(),
                "macro body is not a single literal",
            );
        }
    }

    debug!(
        functions = out.functions.len(),
        structs = out.structs.len(),
        enums = out.enums.len(),
        "mapper-target complete"
    );
    out
}

// ---------------------------------------------------------------------------
// Records (with nested hoisting and array wrapping)
// ---------------------------------------------------------------------------

#[allow(clippy::too_many_arguments)]
fn lower_record(
    record: &CRecord,
    is_synthetic: bool,
    cas: &CSurface,
    names: &mut NameMap,
    opts: &MapTargetOptions,
    diags: &mut Diagnostics,
    out: &mut TSurface,
) {
    if opts.ignored.contains(&record.name)
        || names.is_suppressed(&record.name)
        || names.is_displaced(&record.name)
    {
        return;
    }

    // Nested anonymous aggregates are fabricated as synthetic top-level
    // declarations so the Emitter sees one flat list.
    for nested in &record.nested_records {
        lower_record(nested, true, cas, names, opts, diags, out);
    }
    for fnptr in &record.nested_function_pointers {
        lower_fn_ptr(fnptr, names, opts, out);
    }

    let (size, align) = cas
        .type_named(&record.type_ref)
        .map(|t| (t.size_bytes, t.align_bytes))
        .unwrap_or((0, 1));

    let mut fields = Vec::new();
    for field in &record.fields {
        if opts.ignored.contains(&field.name) {
            continue;
        }
        fields.push(lower_field(field, cas, names, out));
    }

    out.structs.push(TStruct {
        name: names.resolve(&record.name),
        is_union: record.is_union,
        is_synthetic,
        size_bytes: size,
        align_bytes: align,
        fields,
        location: record.location.clone(),
        platform: None,
    });
}

fn lower_field(field: &CRecordField, cas: &CSurface, names: &mut NameMap, out: &mut TSurface) -> TStructField {
    let name = sanitise_identifier(&field.name);
    let entry = cas.type_named(&field.type_name);

    // Fixed-size array fields: inline buffer when the element is a target
    // primitive, otherwise a byte buffer plus an accessor.
    if let Some(entry) = entry {
        if entry.kind == CTypeKind::ConstArray {
            let len = entry.array_size.unwrap_or(0);
            let elem_size = entry.element_size.unwrap_or(0);
            let elem_c = element_name(&field.type_name);
            let elem = names.resolve(&elem_c);
            if !is_target_primitive(&elem) {
                let buffer_bytes = len * elem_size;
                let buffer_name = format!("u8[{buffer_bytes}]");
                ensure_byte_buffer_type(&buffer_name, buffer_bytes, out);
                return TStructField {
                    name,
                    type_name: buffer_name,
                    offset_bits: field.offset_bits,
                    padding_bits: field.padding_bits,
                    bit_width: field.bit_width,
                    is_wrapped_array: true,
                    wrapped_elem: Some(elem),
                    wrapped_len: Some(len),
                    wrapped_size_bytes: Some(buffer_bytes),
                };
            }
        }
    }

    TStructField {
        name,
        type_name: names.resolve(&field.type_name),
        offset_bits: field.offset_bits,
        padding_bits: field.padding_bits,
        bit_width: field.bit_width,
        is_wrapped_array: false,
        wrapped_elem: None,
        wrapped_len: None,
        wrapped_size_bytes: None,
    }
}

fn ensure_byte_buffer_type(name: &str, bytes: u64, out: &mut TSurface) {
    if out.type_named(name).is_some() {
        return;
    }
    out.types.push(TType {
        name: name.to_string(),
        c_name: name.to_string(),
        size_bytes: bytes,
        align_bytes: 1,
        array_size: Some(bytes),
        element_size: Some(1),
        kind: CTypeKind::ConstArray,
    });
}

// ---------------------------------------------------------------------------
// Function pointers
// ---------------------------------------------------------------------------

fn lower_fn_ptr(fnptr: &CFunctionPointer, names: &mut NameMap, opts: &MapTargetOptions, out: &mut TSurface) {
    if opts.ignored.contains(&fnptr.name) {
        return;
    }
    // Synthetic field pointers matching a canonical shape use the canonical
    // name and emit no declaration of their own.
    if fnptr.is_synthetic && names.fn_ptr_canon.contains_key(&fnptr.name) {
        return;
    }
    if out.function_pointers.iter().any(|fp| fp.name == fnptr.name) {
        return;
    }
    let mut used = HashSet::new();
    out.function_pointers.push(TFunctionPointer {
        name: names.resolve(&fnptr.name),
        is_synthetic: fnptr.is_synthetic,
        return_type_name: names.resolve(&fnptr.return_type_name),
        parameters: fnptr
            .parameters
            .iter()
            .map(|p| TFunctionPointerParameter {
                name: unique_identifier(&p.name, &mut used),
                type_name: names.resolve(&p.type_name),
            })
            .collect(),
        location: fnptr.location.clone(),
        platform: None,
    });
}

fn fn_ptr_builtin_name(fnptr: &CFunctionPointer) -> Option<&'static str> {
    for &(name, ret, params) in FN_PTR_BUILTINS {
        if fnptr.return_type_name == ret
            && fnptr.parameters.len() == params.len()
            && fnptr
                .parameters
                .iter()
                .zip(params.iter())
                .all(|(p, want)| p.type_name == *want)
        {
            return Some(name);
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Enum storage normalisation
// ---------------------------------------------------------------------------

fn normalise_enum_storage(en: &CEnum, diags: &mut Diagnostics) -> String {
    match en.integer_type_name.as_str() {
        "i32" => "i32".to_string(),
        "u32" => "u32".to_string(),
        other => {
            diags.push(
                DiagKind::NotImplemented,
                en.name.clone(),
                en.location.clone(),
                format!("enum storage `{other}` is not supported; using 32-bit storage"),
            );
            if other.starts_with('u') {
                "u32".to_string()
            } else {
                "i32".to_string()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Name resolution (aliases, suppression, fn-ptr canonicalisation)
// ---------------------------------------------------------------------------

struct NameMap {
    alias: HashMap<String, String>,
    suppressed: HashSet<String>,
    /// Non-builtin alias targets: an existing declaration under such a name
    /// is displaced by the renamed one.
    alias_targets: HashSet<String>,
    fn_ptr_canon: HashMap<String, String>,
}

impl NameMap {
    fn new(opts: &MapTargetOptions, cas: &CSurface, diags: &mut Diagnostics) -> Self {
        let mut alias = HashMap::new();
        let mut suppressed = HashSet::new();
        let mut alias_targets = HashSet::new();
        for (from, to) in &opts.aliases {
            if is_builtin_target_type(to) {
                // Aliasing onto a built-in suppresses the declaration; the
                // references rewrite to the built-in directly.
                diags.push(
                    DiagKind::AliasShadowsBuiltin,
                    from.clone(),
                    SourceLocation::default(),
                    format!("alias target `{to}` is a built-in target type; `{from}` is not emitted"),
                );
                suppressed.insert(from.clone());
            } else {
                alias_targets.insert(to.clone());
            }
            alias.insert(from.clone(), to.clone());
        }

        // Synthetic field function-pointers matching a canonical shape.
        let mut fn_ptr_canon = HashMap::new();
        let mut visit_fnptrs = |fnptrs: &[CFunctionPointer]| {
            for fp in fnptrs {
                if fp.is_synthetic {
                    if let Some(canon) = fn_ptr_builtin_name(fp) {
                        fn_ptr_canon.insert(fp.name.clone(), canon.to_string());
                    }
                }
            }
        };
        visit_fnptrs(&cas.function_pointers);
        for record in &cas.records {
            visit_record_fnptrs(record, &mut visit_fnptrs);
        }

        Self {
            alias,
            suppressed,
            alias_targets,
            fn_ptr_canon,
        }
    }

    fn is_suppressed(&self, name: &str) -> bool {
        self.suppressed.contains(name)
    }

    /// An alias claims this name, so the declaration that originally carried
    /// it is dropped in favour of the renamed one.
    fn is_displaced(&self, name: &str) -> bool {
        self.alias_targets.contains(name) && !self.alias.contains_key(name)
    }

    /// Rewrite a (possibly pointer- or array-shaped) type name to its final
    /// target form.
    fn resolve(&self, name: &str) -> String {
        // `Base[N]` — rewrite the element.
        if let Some(open) = name.rfind('[') {
            if name.ends_with(']') {
                let base = &name[..open];
                let suffix = &name[open..];
                return format!("{}{}", self.resolve(base), suffix);
            }
        }
        // `Base*` chains — rewrite the pointee.
        if let Some(stripped) = name.strip_suffix('*') {
            return format!("{}*", self.resolve(stripped));
        }
        if let Some(canon) = self.fn_ptr_canon.get(name) {
            return canon.clone();
        }
        if let Some(to) = self.alias.get(name) {
            return to.clone();
        }
        name.to_string()
    }
}

fn visit_record_fnptrs(record: &CRecord, f: &mut impl FnMut(&[CFunctionPointer])) {
    f(&record.nested_function_pointers);
    for nested in &record.nested_records {
        visit_record_fnptrs(nested, f);
    }
}

/// `Color[16]` → `Color`.
fn element_name(array_name: &str) -> String {
    match array_name.rfind('[') {
        Some(open) => array_name[..open].to_string(),
        None => array_name.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Identifier sanitisation and deduplication
// ---------------------------------------------------------------------------

/// Reserved words of the target host language.
const RESERVED_WORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "dyn", "else", "enum", "extern", "fn",
    "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub", "ref",
    "return", "static", "struct", "trait", "type", "unsafe", "use", "where", "while",
];

/// Reserved words that cannot take the raw-identifier marker.
const UNRAWABLE_WORDS: &[&str] = &["self", "Self", "super", "crate"];

/// Escape an identifier that collides with a reserved word. Clean
/// identifiers pass through, so the rewrite is idempotent.
pub fn sanitise_identifier(name: &str) -> String {
    if RESERVED_WORDS.contains(&name) {
        format!("r#{name}")
    } else if UNRAWABLE_WORDS.contains(&name) {
        format!("{name}_")
    } else {
        name.to_string()
    }
}

/// Deduplicate a parameter name within one function: empty names become
/// `param`, `param2`, …; duplicates get a trailing decimal suffix
/// incremented until unique. The result is also reserved-word sanitised.
fn unique_identifier(name: &str, used: &mut HashSet<String>) -> String {
    let mut candidate = if name.is_empty() {
        if used.contains("param") {
            next_suffixed("param", used)
        } else {
            "param".to_string()
        }
    } else {
        sanitise_identifier(name)
    };
    if used.contains(&candidate) {
        candidate = next_suffixed(&candidate, used);
    }
    used.insert(candidate.clone());
    candidate
}

/// Append or increment a trailing decimal suffix until the name is unused.
fn next_suffixed(base: &str, used: &HashSet<String>) -> String {
    let digits = base.chars().rev().take_while(|c| c.is_ascii_digit()).count();
    let (stem, num) = base.split_at(base.len() - digits);
    let mut n: u64 = num.parse().unwrap_or(1);
    loop {
        n += 1;
        let candidate = format!("{stem}{n}");
        if !used.contains(&candidate) {
            return candidate;
        }
    }
}

// ---------------------------------------------------------------------------
// Macro values
// ---------------------------------------------------------------------------

fn macro_value(tokens: &[String]) -> Option<TMacroValue> {
    match tokens {
        [single] => parse_single_literal(single, false),
        [minus, lit] if minus == "-" => parse_single_literal(lit, true),
        _ => None,
    }
}

fn parse_single_literal(token: &str, negated: bool) -> Option<TMacroValue> {
    if token.len() >= 2 && token.starts_with('"') && token.ends_with('"') {
        return Some(TMacroValue::Str(token[1..token.len() - 1].to_string()));
    }
    if let Some(v) = parse_int_literal(token) {
        return Some(if negated {
            TMacroValue::Int(-(v as i64))
        } else if v <= i64::MAX as u64 {
            TMacroValue::Int(v as i64)
        } else {
            TMacroValue::UInt(v)
        });
    }
    if let Some(v) = parse_float_literal(token) {
        return Some(TMacroValue::Float(if negated { -v } else { v }));
    }
    None
}

// ---------------------------------------------------------------------------
// Multi-platform merge
// ---------------------------------------------------------------------------

/// Merge per-triple target surfaces by (kind, name). Nodes that agree
/// bit-exactly across every platform are emitted once; divergent nodes are
/// emitted per-platform tagged with their triple. When
/// `per_platform_divergence` is false, divergence raises a
/// [`DiagKind::MergePlatformNodes`] error.
pub fn merge_platforms(
    surfaces: Vec<(String, TSurface)>,
    per_platform_divergence: bool,
    diags: &mut Diagnostics,
) -> TSurface {
    if surfaces.len() == 1 {
        return surfaces.into_iter().next().unwrap().1;
    }
    let mut out = TSurface::default();

    // Type table: union by name, first platform wins; layout divergence is
    // surfaced through the declarations that use the type.
    for (_, surface) in &surfaces {
        for ty in &surface.types {
            if out.type_named(&ty.name).is_none() {
                out.types.push(ty.clone());
            }
        }
    }

    macro_rules! merge_field {
        ($field:ident) => {
            out.$field = merge_entities(
                surfaces
                    .iter()
                    .map(|(triple, s)| (triple.clone(), s.$field.clone()))
                    .collect(),
                |e| e.name.clone(),
                |e, p| e.platform = Some(p),
                per_platform_divergence,
                diags,
            );
        };
    }

    merge_field!(functions);
    merge_field!(function_pointers);
    merge_field!(structs);
    merge_field!(opaque_types);
    merge_field!(typedefs);
    merge_field!(enums);
    merge_field!(variables);
    merge_field!(macros);

    out
}

fn merge_entities<T: Clone + PartialEq>(
    platforms: Vec<(String, Vec<T>)>,
    name_of: impl Fn(&T) -> String,
    tag: impl Fn(&mut T, String),
    per_platform_divergence: bool,
    diags: &mut Diagnostics,
) -> Vec<T> {
    let mut out = Vec::new();
    let mut emitted: HashSet<String> = HashSet::new();
    for (_, entities) in platforms.iter() {
        for entity in entities {
            let name = name_of(entity);
            if !emitted.insert(name.clone()) {
                continue;
            }
            // Collect this entity from every platform that has it.
            let versions: Vec<(&String, Option<&T>)> = platforms
                .iter()
                .map(|(triple, es)| (triple, es.iter().find(|e| name_of(e) == name)))
                .collect();
            let agree = versions.iter().all(|(_, v)| v.is_some_and(|v| v == entity));
            if agree {
                out.push(entity.clone());
                continue;
            }
            if !per_platform_divergence {
                diags.push(
                    DiagKind::MergePlatformNodes,
                    name.clone(),
                    SourceLocation::default(),
                    "node diverges across target platforms",
                );
            }
            for (triple, version) in versions {
                if let Some(version) = version {
                    let mut tagged = version.clone();
                    tag(&mut tagged, triple.clone());
                    out.push(tagged);
                }
            }
        }
    }
    out
}
