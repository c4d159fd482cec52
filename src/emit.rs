//! Emitter — target surface → Rust source text.
//!
//! One artifact per input header. Functions are emitted as indirect calls
//! through a virtual table of function pointers (plus untyped pointers for
//! globals) that `load_api`/`unload_api` populate and zero from a dynamic
//! library handle. Records reproduce the extracted layout bit-for-bit via
//! explicit padding and compile-time size assertions.

use std::fmt::Write as _;

use crate::tas::*;

/// Emitter inputs beyond the surface.
#[derive(Debug, Clone)]
pub struct EmitOptions {
    /// Name of the virtual-table record.
    pub class_name: String,
    /// Dynamic library the loader opens (without platform prefix/suffix).
    pub library_name: String,
    /// Header the surface was extracted from, for the banner.
    pub header_name: String,
}

/// Render the complete artifact for one surface.
pub fn emit_unit(tas: &TSurface, opts: &EmitOptions) -> String {
    let mut s = String::new();
    let _ = writeln!(s, "// Bindings for `{}` — generated by bindcast; do not edit.", opts.header_name);
    let _ = writeln!(s, "#![allow(non_camel_case_types, non_snake_case, non_upper_case_globals, dead_code)]");
    s.push('\n');

    emit_prelude(&mut s);
    emit_macros(&mut s, tas);
    emit_enums(&mut s, tas);
    emit_opaque_types(&mut s, tas);
    emit_typedefs(&mut s, tas);
    emit_fn_pointers(&mut s, tas);
    emit_structs(&mut s, tas);
    emit_vtable(&mut s, tas, opts);

    s
}

// ---------------------------------------------------------------------------
// Prelude — target-side built-ins
// ---------------------------------------------------------------------------

fn emit_prelude(s: &mut String) {
    s.push_str(concat!(
        "/// One-byte C boolean. Zero is false, anything else is true; never\n",
        "/// silently widened.\n",
        "#[repr(transparent)]\n",
        "#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]\n",
        "pub struct CBool(pub u8);\n",
        "\n",
        "impl From<bool> for CBool {\n",
        "    fn from(b: bool) -> Self {\n",
        "        CBool(b as u8)\n",
        "    }\n",
        "}\n",
        "\n",
        "impl From<CBool> for bool {\n",
        "    fn from(b: CBool) -> Self {\n",
        "        b.0 != 0\n",
        "    }\n",
        "}\n",
        "\n",
        "/// Nul-terminated C string pointer.\n",
        "pub type CString = *const u8;\n",
        "\n",
        "pub type FnPtrVoid = Option<unsafe extern \"C\" fn()>;\n",
        "pub type FnPtrPointer = Option<unsafe extern \"C\" fn(*mut core::ffi::c_void)>;\n",
        "pub type FnPtrPointerPointer =\n",
        "    Option<unsafe extern \"C\" fn(*mut core::ffi::c_void) -> *mut core::ffi::c_void>;\n",
        "pub type FnPtrInt = Option<unsafe extern \"C\" fn() -> i32>;\n",
        "\n",
    ));
}

// ---------------------------------------------------------------------------
// Type rendering
// ---------------------------------------------------------------------------

/// Render a surface type name in value position.
pub fn render_type(name: &str) -> String {
    if let Some(base) = name.strip_suffix('*') {
        if base == "void" {
            return "*mut core::ffi::c_void".to_string();
        }
        return format!("*mut {}", render_type(base));
    }
    if let Some(open) = name.rfind('[') {
        if name.ends_with(']') {
            let base = &name[..open];
            let len = &name[open + 1..name.len() - 1];
            return format!("[{}; {}]", render_type(base), len);
        }
    }
    match name {
        "void" => "()".to_string(),
        other => other.to_string(),
    }
}

/// Render ` -> T` for non-void returns.
fn render_return(name: &str) -> String {
    if name == "void" {
        String::new()
    } else {
        format!(" -> {}", render_type(name))
    }
}

/// `x86_64-unknown-linux-gnu` → `#[cfg(all(target_arch = "x86_64", target_os = "linux"))]`.
fn platform_cfg(platform: &Option<String>) -> String {
    let Some(triple) = platform else {
        return String::new();
    };
    let parts: Vec<&str> = triple.split('-').collect();
    let arch = parts.first().copied().unwrap_or_default();
    let os = match parts.get(2).copied() {
        Some("darwin") => "macos",
        Some(os) => os,
        None => "",
    };
    if os.is_empty() {
        format!("#[cfg(target_arch = \"{arch}\")]\n")
    } else {
        format!("#[cfg(all(target_arch = \"{arch}\", target_os = \"{os}\"))]\n")
    }
}

// ---------------------------------------------------------------------------
// Macros
// ---------------------------------------------------------------------------

fn emit_macros(s: &mut String, tas: &TSurface) {
    for mac in &tas.macros {
        s.push_str(&platform_cfg(&mac.platform));
        match &mac.value {
            TMacroValue::Int(v) => {
                let _ = writeln!(s, "pub const {}: i64 = {};", mac.name, v);
            }
            TMacroValue::UInt(v) => {
                let _ = writeln!(s, "pub const {}: u64 = {};", mac.name, v);
            }
            TMacroValue::Float(v) => {
                let _ = writeln!(s, "pub const {}: f64 = {:?};", mac.name, v);
            }
            TMacroValue::Str(v) => {
                let _ = writeln!(s, "pub const {}: &str = {:?};", mac.name, v);
            }
        }
    }
    if !tas.macros.is_empty() {
        s.push('\n');
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

fn emit_enums(s: &mut String, tas: &TSurface) {
    for en in &tas.enums {
        let storage = &en.integer_type_name;
        s.push_str(&platform_cfg(&en.platform));
        let _ = writeln!(s, "/// C enum with explicit `{storage}` storage.");
        let _ = writeln!(s, "#[repr(transparent)]");
        let _ = writeln!(s, "#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]");
        let _ = writeln!(s, "pub struct {}(pub {});", en.name, storage);
        s.push_str(&platform_cfg(&en.platform));
        let _ = writeln!(s, "impl {} {{", en.name);
        for value in &en.values {
            let _ = writeln!(
                s,
                "    pub const {}: {} = {}({});",
                value.name, en.name, en.name, value.value
            );
        }
        let _ = writeln!(s, "}}");
        s.push('\n');
    }
}

// ---------------------------------------------------------------------------
// Opaque types
// ---------------------------------------------------------------------------

fn emit_opaque_types(s: &mut String, tas: &TSurface) {
    for opaque in &tas.opaque_types {
        s.push_str(&platform_cfg(&opaque.platform));
        if opaque.size_bytes == 0 {
            let _ = writeln!(s, "#[repr(C)]");
            let _ = writeln!(s, "pub struct {} {{", opaque.name);
            let _ = writeln!(s, "    _unused: [u8; 0],");
            let _ = writeln!(s, "}}");
        } else {
            // Sized but not visible: a byte blob with the oracle's layout so
            // by-value embedding keeps working.
            let _ = writeln!(s, "#[repr(C, align({}))]", opaque.align_bytes.max(1));
            let _ = writeln!(s, "#[derive(Clone, Copy)]");
            let _ = writeln!(s, "pub struct {} {{", opaque.name);
            let _ = writeln!(s, "    _opaque: [u8; {}],", opaque.size_bytes);
            let _ = writeln!(s, "}}");
        }
        s.push('\n');
    }
}

// ---------------------------------------------------------------------------
// Typedefs and function pointers
// ---------------------------------------------------------------------------

fn emit_typedefs(s: &mut String, tas: &TSurface) {
    for td in &tas.typedefs {
        s.push_str(&platform_cfg(&td.platform));
        let _ = writeln!(
            s,
            "pub type {} = {};",
            td.name,
            render_type(&td.underlying_type_name)
        );
    }
    if !tas.typedefs.is_empty() {
        s.push('\n');
    }
}

fn emit_fn_pointers(s: &mut String, tas: &TSurface) {
    for fp in &tas.function_pointers {
        let params: Vec<String> = fp
            .parameters
            .iter()
            .map(|p| format!("{}: {}", p.name, render_type(&p.type_name)))
            .collect();
        s.push_str(&platform_cfg(&fp.platform));
        let _ = writeln!(
            s,
            "pub type {} = Option<unsafe extern \"C\" fn({}){}>;",
            fp.name,
            params.join(", "),
            render_return(&fp.return_type_name)
        );
    }
    if !tas.function_pointers.is_empty() {
        s.push('\n');
    }
}

// ---------------------------------------------------------------------------
// Structs
// ---------------------------------------------------------------------------

fn emit_structs(s: &mut String, tas: &TSurface) {
    for st in &tas.structs {
        emit_struct(s, st, tas);
    }
}

fn emit_struct(s: &mut String, st: &TStruct, tas: &TSurface) {
    let keyword = if st.is_union { "union" } else { "struct" };
    s.push_str(&platform_cfg(&st.platform));
    let _ = writeln!(s, "#[repr(C)]");
    let _ = writeln!(s, "#[derive(Clone, Copy)]");
    let _ = writeln!(s, "pub {keyword} {} {{", st.name);

    if st.is_union {
        let mut max_field_bytes = 0u64;
        for field in &st.fields {
            if field.bit_width.is_some() {
                let _ = writeln!(s, "    // bitfield `{}` folded into storage", field.name);
                continue;
            }
            let _ = writeln!(s, "    pub {}: {},", field.name, render_type(&field.type_name));
            max_field_bytes = max_field_bytes.max(field_bytes(field, tas));
        }
        if st.size_bytes > max_field_bytes {
            let _ = writeln!(s, "    _storage: [u8; {}],", st.size_bytes);
        }
    } else {
        // Each field carries its own gap to the next field's true start, so
        // padding is emitted straight from `padding_bits`. Bitfields have no
        // addressable representation; their width joins the pending padding
        // and is flushed as bytes before the next named field.
        let mut pending_bits = 0u64;
        let mut pad_index = 0u32;
        for field in &st.fields {
            if let Some(width) = field.bit_width {
                let _ = writeln!(s, "    // bitfield `{}` folded into padding", field.name);
                pending_bits += width as u64 + field.padding_bits;
                continue;
            }
            if pending_bits > 0 {
                let _ = writeln!(s, "    _pad{}: [u8; {}],", pad_index, pending_bits / 8);
                pad_index += 1;
                pending_bits = 0;
            }
            let _ = writeln!(s, "    pub {}: {},", field.name, render_type(&field.type_name));
            pending_bits = field.padding_bits;
        }
        if pending_bits > 0 {
            let _ = writeln!(s, "    _pad{}: [u8; {}],", pad_index, pending_bits / 8);
        }
    }
    let _ = writeln!(s, "}}");

    if st.size_bytes > 0 {
        s.push_str(&platform_cfg(&st.platform));
        let _ = writeln!(
            s,
            "const _: () = assert!(core::mem::size_of::<{}>() == {});",
            st.name, st.size_bytes
        );
    }
    s.push('\n');

    emit_struct_accessors(s, st);
}

/// Size of a field in bytes: the type table when it knows the name, a
/// shape-derived fallback otherwise.
fn field_bytes(field: &TStructField, tas: &TSurface) -> u64 {
    if let Some(bytes) = field.wrapped_size_bytes {
        return bytes;
    }
    if let Some(entry) = tas.type_named(&field.type_name) {
        return entry.size_bytes;
    }
    // `u8[16]`-style inline buffers carry their byte length in the name.
    if let Some(open) = field.type_name.rfind('[') {
        if field.type_name.ends_with(']') {
            let len: u64 = field.type_name[open + 1..field.type_name.len() - 1]
                .parse()
                .unwrap_or(0);
            let elem = &field.type_name[..open];
            return len * primitive_bytes(elem).unwrap_or(1);
        }
    }
    if field.type_name.ends_with('*') {
        return core::mem::size_of::<usize>() as u64;
    }
    primitive_bytes(&field.type_name).unwrap_or(0)
}

fn primitive_bytes(name: &str) -> Option<u64> {
    match name {
        "u8" | "i8" | "CBool" => Some(1),
        "u16" | "i16" => Some(2),
        "u32" | "i32" | "f32" => Some(4),
        "u64" | "i64" | "f64" => Some(8),
        "CString" => Some(core::mem::size_of::<usize>() as u64),
        _ => None,
    }
}

/// Accessors for wrapped-array fields (a typed view over the byte buffer)
/// and byte buffers (a nul-terminated string view).
fn emit_struct_accessors(s: &mut String, st: &TStruct) {
    let mut body = String::new();
    for field in &st.fields {
        if field.is_wrapped_array {
            let (Some(elem), Some(len)) = (&field.wrapped_elem, field.wrapped_len) else {
                continue;
            };
            let name = &field.name;
            let elem_ty = render_type(elem);
            let _ = writeln!(body, "    /// Typed view over the `{name}` buffer.");
            let _ = writeln!(body, "    pub fn {name}(&self) -> &[{elem_ty}; {len}] {{");
            let _ = writeln!(
                body,
                "        unsafe {{ &*(self.{name}.as_ptr() as *const [{elem_ty}; {len}]) }}"
            );
            let _ = writeln!(body, "    }}");
        } else if !st.is_union && field.type_name.starts_with("u8[") {
            let name = &field.name;
            let _ = writeln!(body, "    /// `{name}` up to the first nul byte.");
            let _ = writeln!(body, "    pub fn {name}_str(&self) -> &[u8] {{");
            let _ = writeln!(
                body,
                "        let end = self.{name}.iter().position(|&b| b == 0).unwrap_or(self.{name}.len());"
            );
            let _ = writeln!(body, "        &self.{name}[..end]");
            let _ = writeln!(body, "    }}");
        }
    }
    if !body.is_empty() {
        s.push_str(&platform_cfg(&st.platform));
        let _ = writeln!(s, "impl {} {{", st.name);
        s.push_str(&body);
        let _ = writeln!(s, "}}");
        s.push('\n');
    }
}

// ---------------------------------------------------------------------------
// Virtual table, loader, and call shims
// ---------------------------------------------------------------------------

fn fn_signature(f: &TFunction) -> (String, String) {
    let params: Vec<String> = f
        .parameters
        .iter()
        .map(|p| format!("{}: {}", p.name, render_type(&p.type_name)))
        .collect();
    let args: Vec<String> = f.parameters.iter().map(|p| p.name.clone()).collect();
    (params.join(", "), args.join(", "))
}

fn emit_vtable(s: &mut String, tas: &TSurface, opts: &EmitOptions) {
    let class = &opts.class_name;

    let _ = writeln!(s, "/// Late-bound entry points resolved from `{}`.", opts.library_name);
    let _ = writeln!(s, "pub struct {class} {{");
    for f in &tas.functions {
        let (params, _) = fn_signature(f);
        s.push_str(&indent_cfg(&f.platform));
        let _ = writeln!(
            s,
            "    pub {}: Option<unsafe extern \"C\" fn({}){}>,",
            f.name,
            params,
            render_return(&f.return_type_name)
        );
    }
    for v in &tas.variables {
        s.push_str(&indent_cfg(&v.platform));
        let _ = writeln!(s, "    pub {}: *mut core::ffi::c_void,", v.name);
    }
    let _ = writeln!(s, "}}");
    s.push('\n');
    let _ = writeln!(s, "unsafe impl Send for {class} {{}}");
    s.push('\n');

    let _ = writeln!(s, "impl {class} {{");
    let _ = writeln!(s, "    pub const fn zeroed() -> Self {{");
    let _ = writeln!(s, "        Self {{");
    for f in &tas.functions {
        s.push_str("    ");
        s.push_str(&indent_cfg(&f.platform));
        let _ = writeln!(s, "            {}: None,", f.name);
    }
    for v in &tas.variables {
        s.push_str("    ");
        s.push_str(&indent_cfg(&v.platform));
        let _ = writeln!(s, "            {}: core::ptr::null_mut(),", v.name);
    }
    let _ = writeln!(s, "        }}");
    let _ = writeln!(s, "    }}");
    let _ = writeln!(s, "}}");
    s.push('\n');

    let _ = writeln!(s, "pub static API: std::sync::Mutex<{class}> = std::sync::Mutex::new({class}::zeroed());");
    let _ = writeln!(s, "static LIBRARY: std::sync::Mutex<Option<libloading::Library>> = std::sync::Mutex::new(None);");
    s.push('\n');

    // load_api
    let _ = writeln!(s, "/// Open the dynamic library and populate the table.");
    let _ = writeln!(s, "///");
    let _ = writeln!(s, "/// # Safety");
    let _ = writeln!(s, "/// The library must export symbols matching the declared signatures.");
    let _ = writeln!(
        s,
        "pub unsafe fn load_api(path: Option<&std::path::Path>) -> Result<(), libloading::Error> {{"
    );
    let _ = writeln!(s, "    let default = libloading::library_filename(\"{}\");", opts.library_name);
    let _ = writeln!(s, "    let path = path.map(std::path::Path::as_os_str).unwrap_or(&default);");
    let _ = writeln!(s, "    let lib = libloading::Library::new(path)?;");
    let _ = writeln!(s, "    let mut api = API.lock().unwrap();");
    for f in &tas.functions {
        let (params, _) = fn_signature(f);
        s.push_str(&indent_cfg(&f.platform));
        let _ = writeln!(
            s,
            "    api.{} = lib.get::<unsafe extern \"C\" fn({}){}>(b\"{}\\0\").ok().map(|sym| *sym);",
            f.name,
            params,
            render_return(&f.return_type_name),
            f.name
        );
    }
    for v in &tas.variables {
        s.push_str(&indent_cfg(&v.platform));
        let _ = writeln!(
            s,
            "    api.{} = lib.get::<*mut core::ffi::c_void>(b\"{}\\0\").map(|sym| *sym).unwrap_or(core::ptr::null_mut());",
            v.name, v.name
        );
    }
    let _ = writeln!(s, "    *LIBRARY.lock().unwrap() = Some(lib);");
    let _ = writeln!(s, "    Ok(())");
    let _ = writeln!(s, "}}");
    s.push('\n');

    // unload_api
    let _ = writeln!(s, "/// Zero the table and drop the library handle.");
    let _ = writeln!(s, "pub fn unload_api() {{");
    let _ = writeln!(s, "    *API.lock().unwrap() = {class}::zeroed();");
    let _ = writeln!(s, "    *LIBRARY.lock().unwrap() = None;");
    let _ = writeln!(s, "}}");
    s.push('\n');

    // Call shims — statically-known indirect calls through the table.
    for f in &tas.functions {
        let (params, args) = fn_signature(f);
        s.push_str(&platform_cfg(&f.platform));
        let _ = writeln!(s, "/// # Safety");
        let _ = writeln!(s, "/// `load_api` must have succeeded.");
        let _ = writeln!(
            s,
            "pub unsafe fn {}({}){} {{",
            f.name,
            params,
            render_return(&f.return_type_name)
        );
        let _ = writeln!(
            s,
            "    (API.lock().unwrap().{}.expect(\"{}: api not loaded\"))({})",
            f.name, f.name, args
        );
        let _ = writeln!(s, "}}");
        s.push('\n');
    }
}

/// Platform cfg indented for struct-field position.
fn indent_cfg(platform: &Option<String>) -> String {
    let cfg = platform_cfg(platform);
    if cfg.is_empty() {
        cfg
    } else {
        format!("    {cfg}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cas::{CTypeKind, CallingConvention};
    use crate::diag::SourceLocation;

    fn opts() -> EmitOptions {
        EmitOptions {
            class_name: "SimpleApi".into(),
            library_name: "simple".into(),
            header_name: "simple.h".into(),
        }
    }

    fn add_fn() -> TFunction {
        TFunction {
            name: "add".into(),
            return_type_name: "i32".into(),
            calling_convention: CallingConvention::C,
            parameters: vec![
                TFunctionParameter {
                    name: "a".into(),
                    type_name: "i32".into(),
                    is_const: false,
                },
                TFunctionParameter {
                    name: "b".into(),
                    type_name: "i32".into(),
                    is_const: false,
                },
            ],
            location: SourceLocation::default(),
            platform: None,
        }
    }

    #[test]
    fn type_rendering() {
        assert_eq!(render_type("i32"), "i32");
        assert_eq!(render_type("void*"), "*mut core::ffi::c_void");
        assert_eq!(render_type("Color*"), "*mut Color");
        assert_eq!(render_type("Color**"), "*mut *mut Color");
        assert_eq!(render_type("u8[16]"), "[u8; 16]");
        assert_eq!(render_type("CString"), "CString");
        assert_eq!(render_return("void"), "");
        assert_eq!(render_return("i32"), " -> i32");
    }

    #[test]
    fn vtable_and_shims_are_emitted() {
        let tas = TSurface {
            functions: vec![add_fn()],
            variables: vec![TVariable {
                name: "version".into(),
                type_name: "i32*".into(),
                location: SourceLocation::default(),
                platform: None,
            }],
            ..TSurface::default()
        };
        let text = emit_unit(&tas, &opts());
        assert!(text.contains("pub struct SimpleApi {"));
        assert!(text.contains("pub add: Option<unsafe extern \"C\" fn(a: i32, b: i32) -> i32>,"));
        assert!(text.contains("pub version: *mut core::ffi::c_void,"));
        assert!(text.contains("pub unsafe fn load_api(path: Option<&std::path::Path>)"));
        assert!(text.contains("pub fn unload_api()"));
        assert!(text.contains("pub unsafe fn add(a: i32, b: i32) -> i32 {"));
        assert!(text.contains("(API.lock().unwrap().add.expect(\"add: api not loaded\"))(a, b)"));
        assert!(text.contains("library_filename(\"simple\")"));
    }

    #[test]
    fn struct_layout_padding_and_assertion() {
        let tas = TSurface {
            types: vec![TType {
                name: "Padded".into(),
                c_name: "Padded".into(),
                size_bytes: 8,
                align_bytes: 4,
                array_size: None,
                element_size: None,
                kind: CTypeKind::Record,
            }],
            structs: vec![TStruct {
                name: "Padded".into(),
                is_union: false,
                is_synthetic: false,
                size_bytes: 8,
                align_bytes: 4,
                fields: vec![
                    TStructField {
                        name: "a".into(),
                        type_name: "u8".into(),
                        offset_bits: 0,
                        padding_bits: 24,
                        bit_width: None,
                        is_wrapped_array: false,
                        wrapped_elem: None,
                        wrapped_len: None,
                        wrapped_size_bytes: None,
                    },
                    TStructField {
                        name: "b".into(),
                        type_name: "i32".into(),
                        offset_bits: 32,
                        padding_bits: 0,
                        bit_width: None,
                        is_wrapped_array: false,
                        wrapped_elem: None,
                        wrapped_len: None,
                        wrapped_size_bytes: None,
                    },
                ],
                location: SourceLocation::default(),
                platform: None,
            }],
            ..TSurface::default()
        };
        let text = emit_unit(&tas, &opts());
        assert!(text.contains("pub struct Padded {"));
        assert!(text.contains("pub a: u8,"));
        assert!(text.contains("_pad0: [u8; 3],"));
        assert!(text.contains("pub b: i32,"));
        assert!(text.contains("const _: () = assert!(core::mem::size_of::<Padded>() == 8);"));
    }

    #[test]
    fn bitfield_storage_folds_into_padding() {
        // struct { unsigned a:4; unsigned b:4; int c; } — a and b share one
        // byte, then 3 bytes of padding before c.
        let bitfield = |name: &str, offset: u64, padding: u64| TStructField {
            name: name.into(),
            type_name: "u32".into(),
            offset_bits: offset,
            padding_bits: padding,
            bit_width: Some(4),
            is_wrapped_array: false,
            wrapped_elem: None,
            wrapped_len: None,
            wrapped_size_bytes: None,
        };
        let tas = TSurface {
            structs: vec![TStruct {
                name: "PackedFlags".into(),
                is_union: false,
                is_synthetic: false,
                size_bytes: 8,
                align_bytes: 4,
                fields: vec![
                    bitfield("a", 0, 0),
                    bitfield("b", 4, 24),
                    TStructField {
                        name: "c".into(),
                        type_name: "i32".into(),
                        offset_bits: 32,
                        padding_bits: 0,
                        bit_width: None,
                        is_wrapped_array: false,
                        wrapped_elem: None,
                        wrapped_len: None,
                        wrapped_size_bytes: None,
                    },
                ],
                location: SourceLocation::default(),
                platform: None,
            }],
            ..TSurface::default()
        };
        let text = emit_unit(&tas, &opts());
        assert!(text.contains("// bitfield `a` folded into padding"));
        assert!(text.contains("// bitfield `b` folded into padding"));
        // 4 + 4 + 24 pending bits flush as 4 bytes before `c`.
        assert!(text.contains("_pad0: [u8; 4],"));
        assert!(text.contains("pub c: i32,"));
        assert!(text.contains("const _: () = assert!(core::mem::size_of::<PackedFlags>() == 8);"));
    }

    #[test]
    fn wrapped_array_gets_typed_accessor() {
        let tas = TSurface {
            structs: vec![TStruct {
                name: "Image".into(),
                is_union: false,
                is_synthetic: false,
                size_bytes: 64,
                align_bytes: 1,
                fields: vec![TStructField {
                    name: "pixels".into(),
                    type_name: "u8[64]".into(),
                    offset_bits: 0,
                    padding_bits: 0,
                    bit_width: None,
                    is_wrapped_array: true,
                    wrapped_elem: Some("Color".into()),
                    wrapped_len: Some(16),
                    wrapped_size_bytes: Some(64),
                }],
                location: SourceLocation::default(),
                platform: None,
            }],
            ..TSurface::default()
        };
        let text = emit_unit(&tas, &opts());
        assert!(text.contains("pub pixels: [u8; 64],"));
        assert!(text.contains("pub fn pixels(&self) -> &[Color; 16] {"));
        assert!(text.contains("as *const [Color; 16]"));
    }

    #[test]
    fn char_buffer_gets_string_accessor() {
        let tas = TSurface {
            structs: vec![TStruct {
                name: "Named".into(),
                is_union: false,
                is_synthetic: false,
                size_bytes: 16,
                align_bytes: 1,
                fields: vec![TStructField {
                    name: "name".into(),
                    type_name: "u8[16]".into(),
                    offset_bits: 0,
                    padding_bits: 0,
                    bit_width: None,
                    is_wrapped_array: false,
                    wrapped_elem: None,
                    wrapped_len: None,
                    wrapped_size_bytes: None,
                }],
                location: SourceLocation::default(),
                platform: None,
            }],
            ..TSurface::default()
        };
        let text = emit_unit(&tas, &opts());
        assert!(text.contains("pub fn name_str(&self) -> &[u8] {"));
    }

    #[test]
    fn enums_and_opaques_and_macros() {
        let tas = TSurface {
            enums: vec![TEnum {
                name: "Color".into(),
                integer_type_name: "i32".into(),
                values: vec![
                    TEnumValue {
                        name: "COLOR_RED".into(),
                        value: 0,
                    },
                    TEnumValue {
                        name: "COLOR_BLUE".into(),
                        value: 2,
                    },
                ],
                location: SourceLocation::default(),
                platform: None,
            }],
            opaque_types: vec![TOpaqueType {
                name: "internal_state".into(),
                size_bytes: 0,
                align_bytes: 1,
                location: SourceLocation::default(),
                platform: None,
            }],
            macros: vec![TMacroObject {
                name: "MAX_N".into(),
                value: TMacroValue::Int(42),
                location: SourceLocation::default(),
                platform: None,
            }],
            ..TSurface::default()
        };
        let text = emit_unit(&tas, &opts());
        assert!(text.contains("pub struct Color(pub i32);"));
        assert!(text.contains("pub const COLOR_RED: Color = Color(0);"));
        assert!(text.contains("pub struct internal_state {"));
        assert!(text.contains("_unused: [u8; 0],"));
        assert!(text.contains("pub const MAX_N: i64 = 42;"));
    }

    #[test]
    fn union_emission_keeps_explicit_size() {
        let tas = TSurface {
            structs: vec![TStruct {
                name: "Value".into(),
                is_union: true,
                is_synthetic: false,
                size_bytes: 8,
                align_bytes: 4,
                fields: vec![TStructField {
                    name: "i".into(),
                    type_name: "i32".into(),
                    offset_bits: 0,
                    padding_bits: 0,
                    bit_width: None,
                    is_wrapped_array: false,
                    wrapped_elem: None,
                    wrapped_len: None,
                    wrapped_size_bytes: None,
                }],
                location: SourceLocation::default(),
                platform: None,
            }],
            ..TSurface::default()
        };
        let text = emit_unit(&tas, &opts());
        assert!(text.contains("pub union Value {"));
        assert!(text.contains("_storage: [u8; 8],"));
        assert!(text.contains("const _: () = assert!(core::mem::size_of::<Value>() == 8);"));
    }

    #[test]
    fn divergent_nodes_carry_platform_cfgs() {
        let mut f = add_fn();
        f.platform = Some("x86_64-unknown-linux-gnu".into());
        let tas = TSurface {
            functions: vec![f],
            ..TSurface::default()
        };
        let text = emit_unit(&tas, &opts());
        assert!(text.contains("#[cfg(all(target_arch = \"x86_64\", target_os = \"linux\"))]"));
    }
}
