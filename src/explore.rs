//! Explorer — walks clang cursors and snapshots every reachable declaration
//! into plain, clang-free data.
//!
//! Discovery is a breadth-first closure: top-level declarations located in
//! the root header set are visited in cursor order, and every type they
//! reference that lives outside the set is promoted onto a pending queue and
//! drained afterwards. The translation-unit handle is released when
//! [`explore`] returns; Mapper-C works on the snapshot alone.
//!
//! Deduplication is by structural identity (kind-qualified name), never by
//! clang cursor handles — those are not required to be stable across
//! queries.

use std::collections::HashSet;
use std::path::PathBuf;

use clang::{Entity, EntityKind, TranslationUnit, Type as ClangType, TypeKind};
use tracing::{debug, trace, warn};

use crate::diag::{DiagKind, Diagnostics, SourceLocation};

// ---------------------------------------------------------------------------
// Snapshot data model
// ---------------------------------------------------------------------------

/// Signedness of a C `char`. Plain `char` is lowered to an unsigned byte
/// downstream regardless of the platform's default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharSign {
    Plain,
    Signed,
    Unsigned,
}

/// A snapshotted type tree. Sizes and alignments come from the parser's
/// layout oracle at snapshot time, bit-exact to the target triple.
#[derive(Debug, Clone, PartialEq)]
pub struct RawType {
    pub kind: RawTypeKind,
    /// The display spelling as written (e.g. `unsigned long`, `Color [16]`).
    pub spelling: String,
    pub size_bytes: Option<u64>,
    pub align_bytes: Option<u64>,
    pub is_system: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawTypeKind {
    Void,
    Bool,
    Char { sign: CharSign },
    Int { signed: bool, size_bytes: u64 },
    Float { size_bytes: u64 },
    Pointer { pointee: Box<RawType> },
    ConstArray { element: Box<RawType>, len: u64 },
    Record { name: String, is_union: bool, complete: bool },
    Enum { name: String },
    Typedef { name: String, underlying: Box<RawType> },
    FunctionProto { ret: Box<RawType>, params: Vec<RawType>, variadic: bool },
    /// A named function-pointer reference (synthetic or typedef'd).
    FnPtrRef { name: String },
    VaList,
    /// Recognised but unmappable (e.g. `long double`, vector types).
    Unsupported,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawParam {
    pub name: String,
    pub ty: RawType,
    pub is_const: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawFunction {
    pub name: String,
    pub ret: RawType,
    pub params: Vec<RawParam>,
    pub variadic: bool,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawField {
    pub name: String,
    pub ty: RawType,
    pub offset_bits: u64,
    pub bit_width: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub name: String,
    pub is_union: bool,
    pub size_bytes: u64,
    pub align_bytes: u64,
    pub spelling: String,
    pub is_system: bool,
    pub fields: Vec<RawField>,
    pub nested_records: Vec<RawRecord>,
    pub nested_fn_pointers: Vec<RawFnPtr>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawFnPtrParam {
    pub name: String,
    pub ty: RawType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawFnPtr {
    pub name: String,
    pub is_synthetic: bool,
    pub ret: RawType,
    pub params: Vec<RawFnPtrParam>,
    /// Layout of the pointer itself, from the layout oracle.
    pub size_bytes: u64,
    pub align_bytes: u64,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawEnumValue {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawEnum {
    pub name: String,
    pub underlying: RawType,
    pub values: Vec<RawEnumValue>,
    pub is_system: bool,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawTypedef {
    pub name: String,
    pub underlying: RawType,
    pub is_system: bool,
    pub location: SourceLocation,
}

/// A record with no visible definition, or a system record that participates
/// in naming but is never emitted as a record.
#[derive(Debug, Clone, PartialEq)]
pub struct RawOpaque {
    pub name: String,
    pub size_bytes: u64,
    pub align_bytes: u64,
    pub is_system: bool,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawVariable {
    pub name: String,
    pub ty: RawType,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawMacro {
    pub name: String,
    /// Body tokens, macro name excluded.
    pub tokens: Vec<String>,
    pub location: SourceLocation,
}

/// Everything the Explorer discovered, in discovery order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Exploration {
    pub functions: Vec<RawFunction>,
    pub records: Vec<RawRecord>,
    pub fn_pointers: Vec<RawFnPtr>,
    pub opaques: Vec<RawOpaque>,
    pub enums: Vec<RawEnum>,
    pub typedefs: Vec<RawTypedef>,
    pub variables: Vec<RawVariable>,
    pub macros: Vec<RawMacro>,
}

// ---------------------------------------------------------------------------
// Scope — which files count as roots
// ---------------------------------------------------------------------------

/// Inclusion predicate: declarations located in one of `root_files` are
/// roots; everything else is reachable only by promotion.
#[derive(Debug, Clone)]
pub struct Scope {
    pub root_files: Vec<PathBuf>,
}

impl Scope {
    pub fn new(root_files: Vec<PathBuf>) -> Self {
        Self { root_files }
    }

    fn is_root(&self, entity: &Entity) -> bool {
        let Some(location) = entity.get_location() else {
            return false;
        };
        let Some(file) = location.get_file_location().file else {
            return false;
        };
        let path = file.get_path();
        self.root_files.iter().any(|rf| path == *rf || path.ends_with(rf))
    }

    fn is_system(entity: &Entity) -> bool {
        entity
            .get_location()
            .map(|l| l.is_in_system_header())
            .unwrap_or(false)
    }
}

/// Synthesize the name of an anonymous aggregate from its enclosing field.
pub fn anonymous_record_name(is_union: bool, field_name: &str) -> String {
    if is_union {
        format!("Anonymous_Union_{field_name}")
    } else {
        format!("Anonymous_Struct_{field_name}")
    }
}

/// Synthesize the name of an untypedef'd function-pointer field.
pub fn synthetic_fn_ptr_name(field_name: &str) -> String {
    format!("FnPtr_{field_name}")
}

// ---------------------------------------------------------------------------
// Walk state
// ---------------------------------------------------------------------------

struct Walker<'tu, 'a> {
    scope: &'a Scope,
    diags: &'a mut Diagnostics,
    out: Exploration,
    /// Kind-qualified names already discovered (`record:Foo`, `enum:Color`).
    seen: HashSet<String>,
    /// Declarations referenced from in-set code but located elsewhere.
    pending: Vec<Entity<'tu>>,
    /// Forward-declared record names awaiting a definition.
    forward: Vec<(String, u64, u64, bool, SourceLocation)>,
}

/// Walk the translation unit and snapshot every reachable declaration.
pub fn explore(tu: &TranslationUnit, scope: &Scope, diags: &mut Diagnostics) -> Exploration {
    let mut walker = Walker {
        scope,
        diags,
        out: Exploration::default(),
        seen: HashSet::new(),
        pending: Vec::new(),
        forward: Vec::new(),
    };

    for entity in tu.get_entity().get_children() {
        if !scope.is_root(&entity) {
            continue;
        }
        walker.visit_top_level(&entity, false);
    }

    // Drain the promotion queue. Entries may enqueue further declarations,
    // so this is a worklist, not a single pass.
    let mut i = 0;
    while i < walker.pending.len() {
        let entity = walker.pending[i];
        walker.visit_top_level(&entity, true);
        i += 1;
    }

    // Forward-declared records with no definition anywhere become opaque.
    let forward = std::mem::take(&mut walker.forward);
    for (name, size, align, is_system, location) in forward {
        if walker.seen.contains(&format!("record-def:{name}"))
            || walker.seen.contains(&format!("opaque:{name}"))
        {
            continue;
        }
        walker.seen.insert(format!("opaque:{name}"));
        debug!(name = %name, "forward-declared record resolved as opaque");
        walker.out.opaques.push(RawOpaque {
            name,
            size_bytes: size,
            align_bytes: align,
            is_system,
            location,
        });
    }

    walker.out
}

impl<'tu> Walker<'tu, '_> {
    fn visit_top_level(&mut self, entity: &Entity<'tu>, promoted: bool) {
        match entity.get_kind() {
            EntityKind::FunctionDecl => self.visit_function(entity),
            EntityKind::StructDecl => self.visit_record(entity, false, promoted),
            EntityKind::UnionDecl => self.visit_record(entity, true, promoted),
            EntityKind::EnumDecl => self.visit_enum(entity),
            EntityKind::TypedefDecl => self.visit_typedef(entity),
            EntityKind::VarDecl => self.visit_variable(entity),
            EntityKind::MacroDefinition => self.visit_macro(entity),
            // Preprocessor plumbing carries no API surface.
            EntityKind::MacroExpansion | EntityKind::InclusionDirective => {}
            other => {
                warn!(kind = ?other, name = %entity.get_name().unwrap_or_default(), "skipping cursor");
                self.diags.push(
                    DiagKind::UnknownCursorKind,
                    entity.get_name().unwrap_or_default(),
                    location_of(entity),
                    format!("skipping unsupported cursor kind {other:?}"),
                );
            }
        }
    }

    // -----------------------------------------------------------------------
    // Functions
    // -----------------------------------------------------------------------

    fn visit_function(&mut self, entity: &Entity<'tu>) {
        let Some(name) = entity.get_name().filter(|n| !n.is_empty()) else {
            return;
        };
        // glibc __REDIRECT macros can produce multiple declarations of the
        // same function; first declaration wins.
        if !self.seen.insert(format!("function:{name}")) {
            trace!(name = %name, "skipping duplicate function declaration");
            return;
        }
        let Some(fn_type) = entity.get_type() else {
            return;
        };
        let ret = match fn_type.get_result_type() {
            Some(rt) => self.snapshot_type(&rt),
            None => RawType {
                kind: RawTypeKind::Void,
                spelling: "void".into(),
                size_bytes: Some(0),
                align_bytes: Some(0),
                is_system: false,
            },
        };

        let args = entity.get_arguments().unwrap_or_default();
        let arg_types = fn_type.get_argument_types().unwrap_or_default();
        let mut params = Vec::new();
        for (i, arg) in args.iter().enumerate() {
            let Some(at) = arg_types.get(i) else {
                continue;
            };
            let ty = self.snapshot_type(at);
            // `const T*` marks the pointee; a by-value `const T` marks the
            // type itself.
            let is_const = at.is_const_qualified()
                || at
                    .get_pointee_type()
                    .map(|p| p.is_const_qualified())
                    .unwrap_or(false);
            params.push(RawParam {
                name: arg.get_name().unwrap_or_default(),
                ty,
                is_const,
            });
        }

        debug!(name = %name, params = params.len(), "discovered function");
        self.out.functions.push(RawFunction {
            name,
            ret,
            params,
            variadic: entity.is_variadic(),
            location: location_of(entity),
        });
    }

    // -----------------------------------------------------------------------
    // Records
    // -----------------------------------------------------------------------

    fn visit_record(&mut self, entity: &Entity<'tu>, is_union: bool, promoted: bool) {
        let Some(name) = entity.get_name().filter(|n| !n.is_empty()) else {
            // Anonymous records surface through their enclosing field or a
            // promoting typedef, never at the top level.
            return;
        };
        if !entity.is_definition() {
            let (size, align) = type_layout(entity);
            self.forward
                .push((name, size, align, Scope::is_system(entity), location_of(entity)));
            return;
        }
        let is_system = Scope::is_system(entity);
        if promoted && is_system {
            // System records participate in naming but are never emitted as
            // records; surface them as opaque handles with the oracle's size.
            if self.seen.insert(format!("opaque:{name}")) {
                let (size, align) = type_layout(entity);
                debug!(name = %name, size, "system record surfaced as opaque");
                self.out.opaques.push(RawOpaque {
                    name,
                    size_bytes: size,
                    align_bytes: align,
                    is_system: true,
                    location: location_of(entity),
                });
            }
            return;
        }
        if !self.seen.insert(format!("record-def:{name}")) {
            return;
        }
        let record = self.snapshot_record(entity, &name, is_union, is_system);
        debug!(name = %record.name, fields = record.fields.len(), size = record.size_bytes, "discovered record");
        self.out.records.push(record);
    }

    fn snapshot_record(
        &mut self,
        entity: &Entity<'tu>,
        name: &str,
        is_union: bool,
        is_system: bool,
    ) -> RawRecord {
        let (size_bytes, align_bytes) = type_layout(entity);
        let spelling = entity
            .get_type()
            .map(|t| t.get_display_name())
            .unwrap_or_else(|| name.to_string());

        let mut fields = Vec::new();
        let mut nested_records = Vec::new();
        let mut nested_fn_pointers = Vec::new();

        for child in entity.get_children() {
            if child.get_kind() != EntityKind::FieldDecl {
                continue;
            }
            let field_name = child.get_name().unwrap_or_default();
            let Some(field_type) = child.get_type() else {
                continue;
            };
            let offset_bits = child.get_offset_of_field().unwrap_or(0) as u64;
            let bit_width = if child.is_bit_field() {
                child.get_bit_field_width().map(|w| w as u32)
            } else {
                None
            };

            let ty = self.snapshot_field_type(
                &field_type,
                &field_name,
                &mut nested_records,
                &mut nested_fn_pointers,
            );

            trace!(field = %field_name, offset_bits, "  field");
            fields.push(RawField {
                name: field_name,
                ty,
                offset_bits,
                bit_width,
            });
        }

        RawRecord {
            name: name.to_string(),
            is_union,
            size_bytes,
            align_bytes,
            spelling,
            is_system,
            fields,
            nested_records,
            nested_fn_pointers,
            location: location_of(entity),
        }
    }

    /// Snapshot a field's type, synthesizing names for anonymous aggregates
    /// and untypedef'd function pointers.
    fn snapshot_field_type(
        &mut self,
        field_type: &ClangType<'tu>,
        field_name: &str,
        nested_records: &mut Vec<RawRecord>,
        nested_fn_pointers: &mut Vec<RawFnPtr>,
    ) -> RawType {
        let canonical = field_type.get_canonical_type();

        // Anonymous aggregate used as a field type: extract it under a
        // synthesized name and reference it by that name.
        if canonical.get_kind() == TypeKind::Record {
            if let Some(decl) = canonical.get_declaration() {
                if decl.is_anonymous() {
                    let is_union = decl.get_kind() == EntityKind::UnionDecl;
                    let synthetic = anonymous_record_name(is_union, field_name);
                    self.diags.push(
                        DiagKind::AnonymousNamed,
                        synthetic.clone(),
                        location_of(&decl),
                        format!("synthesized name for anonymous aggregate in field `{field_name}`"),
                    );
                    let nested =
                        self.snapshot_record(&decl, &synthetic, is_union, Scope::is_system(&decl));
                    let (size, align) = (nested.size_bytes, nested.align_bytes);
                    nested_records.push(nested);
                    return RawType {
                        kind: RawTypeKind::Record {
                            name: synthetic.clone(),
                            is_union,
                            complete: true,
                        },
                        spelling: synthetic,
                        size_bytes: Some(size),
                        align_bytes: Some(align),
                        is_system: false,
                    };
                }
            }
        }

        // Function-pointer field without a typedef name: synthesize one.
        if field_type.get_kind() != TypeKind::Typedef
            && canonical.get_kind() == TypeKind::Pointer
        {
            let pointee = canonical.get_pointee_type();
            if let Some(pointee) = pointee {
                if matches!(
                    pointee.get_kind(),
                    TypeKind::FunctionPrototype | TypeKind::FunctionNoPrototype
                ) {
                    let synthetic = synthetic_fn_ptr_name(field_name);
                    self.diags.push(
                        DiagKind::AnonymousNamed,
                        synthetic.clone(),
                        SourceLocation::default(),
                        format!("synthesized name for function-pointer field `{field_name}`"),
                    );
                    let size = canonical.get_sizeof().unwrap_or(8) as u64;
                    let align = canonical.get_alignof().unwrap_or(8) as u64;
                    let mut fnptr = self.snapshot_fn_ptr(&pointee, &synthetic, true, &[]);
                    fnptr.size_bytes = size;
                    fnptr.align_bytes = align;
                    nested_fn_pointers.push(fnptr);
                    return RawType {
                        kind: RawTypeKind::FnPtrRef {
                            name: synthetic.clone(),
                        },
                        spelling: synthetic,
                        size_bytes: Some(size),
                        align_bytes: Some(align),
                        is_system: false,
                    };
                }
            }
        }

        self.snapshot_type(field_type)
    }

    fn snapshot_fn_ptr(
        &mut self,
        proto: &ClangType<'tu>,
        name: &str,
        is_synthetic: bool,
        param_names: &[String],
    ) -> RawFnPtr {
        let ret = proto
            .get_result_type()
            .map(|rt| self.snapshot_type(&rt))
            .unwrap_or(RawType {
                kind: RawTypeKind::Void,
                spelling: "void".into(),
                size_bytes: Some(0),
                align_bytes: Some(0),
                is_system: false,
            });
        let params = proto
            .get_argument_types()
            .unwrap_or_default()
            .iter()
            .enumerate()
            .map(|(i, at)| RawFnPtrParam {
                name: param_names.get(i).cloned().unwrap_or_default(),
                ty: self.snapshot_type(at),
            })
            .collect();
        RawFnPtr {
            name: name.to_string(),
            is_synthetic,
            ret,
            params,
            size_bytes: 8,
            align_bytes: 8,
            location: SourceLocation::default(),
        }
    }

    // -----------------------------------------------------------------------
    // Enums
    // -----------------------------------------------------------------------

    fn visit_enum(&mut self, entity: &Entity<'tu>) {
        if !entity.is_definition() {
            return;
        }
        let name = match entity.get_name().filter(|n| !n.is_empty()) {
            Some(n) => n,
            None => {
                // Anonymous top-level enums are constant bags in C; give
                // them a stable synthesized name from their first value.
                let first = entity
                    .get_children()
                    .into_iter()
                    .find(|c| c.get_kind() == EntityKind::EnumConstantDecl)
                    .and_then(|c| c.get_name())
                    .unwrap_or_else(|| "Values".to_string());
                let synthetic = format!("Anonymous_Enum_{first}");
                self.diags.push(
                    DiagKind::AnonymousNamed,
                    synthetic.clone(),
                    location_of(entity),
                    "synthesized name for anonymous enum",
                );
                synthetic
            }
        };
        if !self.seen.insert(format!("enum:{name}")) {
            return;
        }
        let underlying = entity
            .get_enum_underlying_type()
            .map(|ut| self.snapshot_type(&ut))
            .unwrap_or(RawType {
                kind: RawTypeKind::Int {
                    signed: true,
                    size_bytes: 4,
                },
                spelling: "int".into(),
                size_bytes: Some(4),
                align_bytes: Some(4),
                is_system: false,
            });

        let mut values = Vec::new();
        for child in entity.get_children() {
            if child.get_kind() != EntityKind::EnumConstantDecl {
                continue;
            }
            let value_name = child.get_name().unwrap_or_default();
            let (signed, _unsigned) = child.get_enum_constant_value().unwrap_or((0, 0));
            values.push(RawEnumValue {
                name: value_name,
                value: signed,
            });
        }

        debug!(name = %name, values = values.len(), "discovered enum");
        self.out.enums.push(RawEnum {
            name,
            underlying,
            values,
            is_system: Scope::is_system(entity),
            location: location_of(entity),
        });
    }

    // -----------------------------------------------------------------------
    // Typedefs
    // -----------------------------------------------------------------------

    fn visit_typedef(&mut self, entity: &Entity<'tu>) {
        let Some(name) = entity.get_name().filter(|n| !n.is_empty()) else {
            return;
        };
        // va_list is a compiler built-in; references to it drop the
        // enclosing function, the typedef itself carries nothing.
        if matches!(
            name.as_str(),
            "va_list" | "__builtin_va_list" | "__gnuc_va_list"
        ) {
            return;
        }
        if !self.seen.insert(format!("typedef:{name}")) {
            return;
        }
        let Some(underlying) = entity.get_typedef_underlying_type() else {
            return;
        };

        // Typedef to an anonymous record promotes the typedef name to the
        // record's name; the typedef itself vanishes.
        let canonical = underlying.get_canonical_type();
        if canonical.get_kind() == TypeKind::Record {
            if let Some(decl) = canonical.get_declaration() {
                if decl.is_anonymous() {
                    let is_union = decl.get_kind() == EntityKind::UnionDecl;
                    if self.seen.insert(format!("record-def:{name}")) {
                        debug!(name = %name, "typedef name promoted to anonymous record");
                        let record =
                            self.snapshot_record(&decl, &name, is_union, Scope::is_system(entity));
                        self.out.records.push(record);
                    }
                    return;
                }
            }
        }

        // `typedef struct foo foo;` pass-throughs are covered by the record
        // itself.
        if is_record_passthrough(&underlying, &name) {
            trace!(name = %name, "skipping record pass-through typedef");
            // Still promote the referenced record.
            let _ = self.snapshot_type(&underlying);
            return;
        }

        // Function-pointer typedefs keep their own node kind.
        if let Some(proto) = fn_ptr_prototype(&underlying) {
            if self.seen.insert(format!("fnptr:{name}")) {
                let param_names: Vec<String> = entity
                    .get_children()
                    .into_iter()
                    .filter(|c| c.get_kind() == EntityKind::ParmDecl)
                    .map(|c| c.get_name().unwrap_or_default())
                    .collect();
                let mut fnptr = self.snapshot_fn_ptr(&proto, &name, false, &param_names);
                fnptr.size_bytes = underlying.get_sizeof().unwrap_or(8) as u64;
                fnptr.align_bytes = underlying.get_alignof().unwrap_or(8) as u64;
                fnptr.location = location_of(entity);
                debug!(name = %name, params = fnptr.params.len(), "discovered function-pointer typedef");
                self.out.fn_pointers.push(fnptr);
            }
            return;
        }

        let snapshot = self.snapshot_type(&underlying);
        debug!(name = %name, underlying = %snapshot.spelling, "discovered typedef");
        self.out.typedefs.push(RawTypedef {
            name,
            underlying: snapshot,
            is_system: Scope::is_system(entity),
            location: location_of(entity),
        });
    }

    // -----------------------------------------------------------------------
    // Variables
    // -----------------------------------------------------------------------

    fn visit_variable(&mut self, entity: &Entity<'tu>) {
        let Some(name) = entity.get_name().filter(|n| !n.is_empty()) else {
            return;
        };
        if !self.seen.insert(format!("variable:{name}")) {
            return;
        }
        let Some(ty) = entity.get_type() else {
            return;
        };
        let snapshot = self.snapshot_type(&ty);
        debug!(name = %name, ty = %snapshot.spelling, "discovered variable");
        self.out.variables.push(RawVariable {
            name,
            ty: snapshot,
            location: location_of(entity),
        });
    }

    // -----------------------------------------------------------------------
    // Macros
    // -----------------------------------------------------------------------

    fn visit_macro(&mut self, entity: &Entity<'tu>) {
        let Some(name) = entity.get_name().filter(|n| !n.is_empty()) else {
            return;
        };
        if entity.is_function_like_macro() {
            // Function-like macros are diagnosed at mapping time alongside
            // non-literal bodies; snapshot an empty body marker instead of
            // the parameter list.
            self.out.macros.push(RawMacro {
                name,
                tokens: vec!["(".into()],
                location: location_of(entity),
            });
            return;
        }
        if !self.seen.insert(format!("macro:{name}")) {
            return;
        }
        let mut tokens: Vec<String> = entity
            .get_range()
            .map(|r| r.tokenize().iter().map(|t| t.get_spelling()).collect())
            .unwrap_or_default();
        // First token is the macro's own name; clang sometimes appends a
        // stray "#" at the end of the range.
        if !tokens.is_empty() {
            tokens.remove(0);
        }
        if tokens.last().is_some_and(|t| t == "#") {
            tokens.pop();
        }
        trace!(name = %name, tokens = tokens.len(), "discovered macro");
        self.out.macros.push(RawMacro {
            name,
            tokens,
            location: location_of(entity),
        });
    }

    // -----------------------------------------------------------------------
    // Type snapshots
    // -----------------------------------------------------------------------

    fn snapshot_type(&mut self, ty: &ClangType<'tu>) -> RawType {
        let spelling = ty.get_display_name();
        let size_bytes = ty.get_sizeof().ok().map(|s| s as u64);
        let align_bytes = ty.get_alignof().ok().map(|a| a as u64);
        let is_system = ty
            .get_declaration()
            .map(|d| Scope::is_system(&d))
            .unwrap_or(false);

        let kind = match ty.get_kind() {
            TypeKind::Void => RawTypeKind::Void,
            TypeKind::Bool => RawTypeKind::Bool,
            TypeKind::CharS | TypeKind::CharU => RawTypeKind::Char {
                sign: CharSign::Plain,
            },
            TypeKind::SChar => RawTypeKind::Char {
                sign: CharSign::Signed,
            },
            TypeKind::UChar => RawTypeKind::Char {
                sign: CharSign::Unsigned,
            },
            TypeKind::Short | TypeKind::Int | TypeKind::Long | TypeKind::LongLong => {
                RawTypeKind::Int {
                    signed: true,
                    size_bytes: size_bytes.unwrap_or(4),
                }
            }
            TypeKind::UShort | TypeKind::UInt | TypeKind::ULong | TypeKind::ULongLong => {
                RawTypeKind::Int {
                    signed: false,
                    size_bytes: size_bytes.unwrap_or(4),
                }
            }
            TypeKind::Float => RawTypeKind::Float { size_bytes: 4 },
            TypeKind::Double => RawTypeKind::Float { size_bytes: 8 },

            TypeKind::Pointer => match ty.get_pointee_type() {
                Some(pointee) => RawTypeKind::Pointer {
                    pointee: Box::new(self.snapshot_type(&pointee)),
                },
                None => RawTypeKind::Unsupported,
            },

            TypeKind::ConstantArray => match ty.get_element_type() {
                Some(elem) => RawTypeKind::ConstArray {
                    element: Box::new(self.snapshot_type(&elem)),
                    len: ty.get_size().unwrap_or(0) as u64,
                },
                None => RawTypeKind::Unsupported,
            },

            // Incomplete arrays decay to pointers.
            TypeKind::IncompleteArray => match ty.get_element_type() {
                Some(elem) => RawTypeKind::Pointer {
                    pointee: Box::new(self.snapshot_type(&elem)),
                },
                None => RawTypeKind::Unsupported,
            },

            TypeKind::Elaborated => {
                return match ty.get_elaborated_type() {
                    Some(inner) => self.snapshot_type(&inner),
                    None => RawType {
                        kind: RawTypeKind::Unsupported,
                        spelling,
                        size_bytes,
                        align_bytes,
                        is_system,
                    },
                };
            }

            TypeKind::Typedef => return self.snapshot_typedef_ref(ty, spelling),

            TypeKind::Record => return self.snapshot_record_ref(ty, spelling),

            TypeKind::Enum => return self.snapshot_enum_ref(ty, spelling),

            TypeKind::FunctionPrototype => {
                let ret = ty
                    .get_result_type()
                    .map(|rt| Box::new(self.snapshot_type(&rt)))
                    .unwrap_or_else(|| {
                        Box::new(RawType {
                            kind: RawTypeKind::Void,
                            spelling: "void".into(),
                            size_bytes: Some(0),
                            align_bytes: Some(0),
                            is_system: false,
                        })
                    });
                let params = ty
                    .get_argument_types()
                    .unwrap_or_default()
                    .iter()
                    .map(|at| self.snapshot_type(at))
                    .collect();
                RawTypeKind::FunctionProto {
                    ret,
                    params,
                    variadic: ty.is_variadic(),
                }
            }

            // K&R-style prototypes are treated as `void()`.
            TypeKind::FunctionNoPrototype => RawTypeKind::FunctionProto {
                ret: Box::new(RawType {
                    kind: RawTypeKind::Void,
                    spelling: "void".into(),
                    size_bytes: Some(0),
                    align_bytes: Some(0),
                    is_system: false,
                }),
                params: vec![],
                variadic: false,
            },

            other => {
                trace!(kind = ?other, spelling = %spelling, "unmappable type kind");
                RawTypeKind::Unsupported
            }
        };

        RawType {
            kind,
            spelling,
            size_bytes,
            align_bytes,
            is_system,
        }
    }

    fn snapshot_typedef_ref(&mut self, ty: &ClangType<'tu>, spelling: String) -> RawType {
        let size_bytes = ty.get_sizeof().ok().map(|s| s as u64);
        let align_bytes = ty.get_alignof().ok().map(|a| a as u64);
        let decl = ty.get_declaration();
        let name = decl
            .and_then(|d| d.get_name())
            .unwrap_or_default();

        // va_list is a compiler built-in with no portable canonical type;
        // Mapper-C drops the enclosing function.
        if matches!(
            name.as_str(),
            "va_list" | "__builtin_va_list" | "__gnuc_va_list"
        ) {
            return RawType {
                kind: RawTypeKind::VaList,
                spelling,
                size_bytes,
                align_bytes,
                is_system: true,
            };
        }

        let is_system = decl.map(|d| Scope::is_system(&d)).unwrap_or(false);

        if name.is_empty() {
            let canonical = ty.get_canonical_type();
            return self.snapshot_type(&canonical);
        }

        // Promote the typedef declaration itself so the surface stays closed.
        if let Some(decl) = decl {
            if !self.seen.contains(&format!("typedef:{name}"))
                && !self.seen.contains(&format!("fnptr:{name}"))
                && !self.scope.is_root(&decl)
            {
                self.pending.push(decl);
            }
        }

        let canonical = ty.get_canonical_type();
        // A typedef of an anonymous record resolves to the typedef's own
        // name (the promotion renames the record), so snapshot the
        // underlying type only for non-record canonicals to avoid the
        // unnamed-record path.
        let underlying = if canonical.get_kind() == TypeKind::Record
            && canonical
                .get_declaration()
                .map(|d| d.is_anonymous())
                .unwrap_or(false)
        {
            Box::new(RawType {
                kind: RawTypeKind::Record {
                    name: name.clone(),
                    is_union: canonical
                        .get_declaration()
                        .map(|d| d.get_kind() == EntityKind::UnionDecl)
                        .unwrap_or(false),
                    complete: true,
                },
                spelling: name.clone(),
                size_bytes,
                align_bytes,
                is_system,
            })
        } else {
            Box::new(self.snapshot_type(&canonical))
        };

        RawType {
            kind: RawTypeKind::Typedef { name, underlying },
            spelling,
            size_bytes,
            align_bytes,
            is_system,
        }
    }

    fn snapshot_record_ref(&mut self, ty: &ClangType<'tu>, spelling: String) -> RawType {
        let size_bytes = ty.get_sizeof().ok().map(|s| s as u64);
        let align_bytes = ty.get_alignof().ok().map(|a| a as u64);
        let decl = ty.get_declaration();
        let complete = ty.get_sizeof().is_ok();
        let (name, is_union, is_system) = match decl {
            Some(d) => (
                d.get_name().unwrap_or_default(),
                d.get_kind() == EntityKind::UnionDecl,
                Scope::is_system(&d),
            ),
            None => (String::new(), false, false),
        };
        // The compiler-built-in record backing va_list on x86-64; it has no
        // header location and must not leak into the surface.
        if name == "__va_list_tag" {
            return RawType {
                kind: RawTypeKind::VaList,
                spelling,
                size_bytes,
                align_bytes,
                is_system: true,
            };
        }
        if name.is_empty() {
            // Anonymous records only reach here outside field context (e.g.
            // pointer to anonymous record) — nothing portable to name.
            return RawType {
                kind: RawTypeKind::Unsupported,
                spelling,
                size_bytes,
                align_bytes,
                is_system,
            };
        }
        // Promote the definition (or surface an opaque) when out of set.
        if let Some(d) = decl {
            if !self.seen.contains(&format!("record-def:{name}"))
                && !self.seen.contains(&format!("opaque:{name}"))
                && !self.scope.is_root(&d)
            {
                self.pending.push(d.get_definition().unwrap_or(d));
            }
        }
        RawType {
            kind: RawTypeKind::Record {
                name: strip_record_prefix(&spelling, &name),
                is_union,
                complete,
            },
            spelling,
            size_bytes,
            align_bytes,
            is_system,
        }
    }

    fn snapshot_enum_ref(&mut self, ty: &ClangType<'tu>, spelling: String) -> RawType {
        let size_bytes = ty.get_sizeof().ok().map(|s| s as u64);
        let align_bytes = ty.get_alignof().ok().map(|a| a as u64);
        let decl = ty.get_declaration();
        let name = decl.and_then(|d| d.get_name()).unwrap_or_default();
        let is_system = decl.map(|d| Scope::is_system(&d)).unwrap_or(false);
        if name.is_empty() {
            return RawType {
                kind: RawTypeKind::Unsupported,
                spelling,
                size_bytes,
                align_bytes,
                is_system,
            };
        }
        if let Some(d) = decl {
            if !self.seen.contains(&format!("enum:{name}")) && !self.scope.is_root(&d) {
                self.pending.push(d.get_definition().unwrap_or(d));
            }
        }
        RawType {
            kind: RawTypeKind::Enum { name },
            spelling,
            size_bytes,
            align_bytes,
            is_system,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn location_of(entity: &Entity) -> SourceLocation {
    let Some(location) = entity.get_location() else {
        return SourceLocation::default();
    };
    let fl = location.get_file_location();
    SourceLocation {
        file: fl
            .file
            .map(|f| f.get_path().display().to_string())
            .unwrap_or_default(),
        line: fl.line,
        column: fl.column,
    }
}

fn type_layout(entity: &Entity) -> (u64, u64) {
    match entity.get_type() {
        Some(ty) => (
            ty.get_sizeof().unwrap_or(0) as u64,
            ty.get_alignof().unwrap_or(0) as u64,
        ),
        None => (0, 0),
    }
}

/// `typedef struct foo foo;` — covered by the record itself.
fn is_record_passthrough(underlying: &ClangType, typedef_name: &str) -> bool {
    let display = underlying.get_display_name();
    for prefix in &["struct ", "enum ", "union "] {
        if display.starts_with(prefix) && &display[prefix.len()..] == typedef_name {
            return true;
        }
    }
    false
}

/// `struct Foo` / `union Foo` / `enum Foo` spellings reduce to the bare tag.
fn strip_record_prefix(spelling: &str, fallback: &str) -> String {
    for prefix in &["struct ", "union ", "enum "] {
        if let Some(rest) = spelling.strip_prefix(prefix) {
            if !rest.is_empty() && !rest.contains(' ') {
                return rest.to_string();
            }
        }
    }
    fallback.to_string()
}

/// The function prototype behind a `typedef ret (*Name)(args)` (or the rare
/// direct function typedef), if any.
fn fn_ptr_prototype<'tu>(underlying: &ClangType<'tu>) -> Option<ClangType<'tu>> {
    let canonical = underlying.get_canonical_type();
    match canonical.get_kind() {
        TypeKind::FunctionPrototype | TypeKind::FunctionNoPrototype => Some(canonical),
        TypeKind::Pointer => {
            let pointee = canonical.get_pointee_type()?;
            match pointee.get_kind() {
                TypeKind::FunctionPrototype | TypeKind::FunctionNoPrototype => Some(pointee),
                _ => None,
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_names_follow_enclosing_field() {
        assert_eq!(anonymous_record_name(true, "u"), "Anonymous_Union_u");
        assert_eq!(anonymous_record_name(false, "hdr"), "Anonymous_Struct_hdr");
        assert_eq!(synthetic_fn_ptr_name("on_event"), "FnPtr_on_event");
    }

    #[test]
    fn record_prefix_stripping() {
        assert_eq!(strip_record_prefix("struct Foo", "Foo"), "Foo");
        assert_eq!(strip_record_prefix("union Value", "Value"), "Value");
        assert_eq!(strip_record_prefix("Foo", "Foo"), "Foo");
        // Unnamed spellings fall back to the declaration name.
        assert_eq!(
            strip_record_prefix("struct (unnamed at f.h:3:1)", "Fallback"),
            "Fallback"
        );
    }
}
