//! End-to-end tests for the drop/rename/diagnostic paths and the
//! multi-target merge.

use std::path::Path;
use std::sync::LazyLock;

use bindcast::diag::DiagKind;
use bindcast::tas::TMacroValue;

struct Outputs {
    edge: bindcast::Generated,
    multi: bindcast::Generated,
    strict: bindcast::Generated,
}

// One initializer so the libclang singleton is only ever created
// sequentially within this process.
static OUTPUTS: LazyLock<Outputs> = LazyLock::new(|| {
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
    Outputs {
        edge: bindcast::generate(&fixtures.join("edge.toml")).expect("generate edge"),
        multi: bindcast::generate(&fixtures.join("multi.toml")).expect("generate multi"),
        strict: bindcast::generate(&fixtures.join("multi_strict.toml")).expect("generate strict"),
    }
});

#[test]
fn variadic_functions_are_dropped_with_diagnostics() {
    let edge = &OUTPUTS.edge;
    assert!(!edge.fatal, "diagnostics: {:?}", edge.diagnostics);
    let names: Vec<&str> = edge.tas.functions.iter().map(|f| f.name.as_str()).collect();
    assert!(!names.contains(&"printf_like"), "variadic must be dropped");
    assert!(!names.contains(&"vlog"), "va_list must drop the function");
    let dropped: Vec<&str> = edge
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagKind::VariadicFunctionDropped)
        .map(|d| d.name.as_str())
        .collect();
    assert!(dropped.contains(&"printf_like"), "dropped: {dropped:?}");
    assert!(dropped.contains(&"vlog"), "dropped: {dropped:?}");
}

#[test]
fn function_set_matches_cas_minus_dropped_minus_ignored() {
    let edge = &OUTPUTS.edge;
    let cas_names: std::collections::HashSet<&str> = edge
        .cas
        .functions
        .iter()
        .map(|f| f.name.as_str())
        .collect();
    let tas_names: std::collections::HashSet<&str> = edge
        .tas
        .functions
        .iter()
        .map(|f| f.name.as_str())
        .collect();
    // Variadic functions never reached the CAS; nothing else may go missing.
    assert_eq!(cas_names, tas_names);
    assert_eq!(
        tas_names,
        ["set_mode", "anon_params", "wait_for"].into_iter().collect()
    );
}

#[test]
fn reserved_word_parameters_are_sanitised() {
    let edge = &OUTPUTS.edge;
    let set_mode = edge
        .tas
        .functions
        .iter()
        .find(|f| f.name == "set_mode")
        .expect("set_mode missing");
    let names: Vec<&str> = set_mode.parameters.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["r#type", "r#match"]);
    // Emission must not collide.
    assert!(OUTPUTS.edge.source.contains("r#type: i32"));
}

#[test]
fn anonymous_parameters_are_renamed() {
    let edge = &OUTPUTS.edge;
    let f = edge
        .tas
        .functions
        .iter()
        .find(|f| f.name == "anon_params")
        .expect("anon_params missing");
    let names: Vec<&str> = f.parameters.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["param", "param2", "named"]);
}

#[test]
fn alias_to_builtin_suppresses_typedef() {
    let edge = &OUTPUTS.edge;
    assert!(
        !edge.tas.typedefs.iter().any(|t| t.name == "duration_t"),
        "aliased typedef must not be emitted"
    );
    let wait_for = edge
        .tas
        .functions
        .iter()
        .find(|f| f.name == "wait_for")
        .unwrap();
    assert_eq!(wait_for.parameters[0].type_name, "u64");
    assert_eq!(wait_for.return_type_name, "u64");
    assert!(
        edge.diagnostics
            .iter()
            .any(|d| d.kind == DiagKind::AliasShadowsBuiltin && d.name == "duration_t"),
        "missing AliasShadowsBuiltin warning"
    );
}

#[test]
fn ignored_names_are_omitted() {
    let edge = &OUTPUTS.edge;
    assert!(
        !edge.tas.structs.iter().any(|s| s.name == "internal_detail"),
        "ignored record must be omitted"
    );
}

#[test]
fn macro_lowering_and_diagnostics() {
    let edge = &OUTPUTS.edge;
    let value = |name: &str| {
        edge.tas
            .macros
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.value.clone())
    };
    assert_eq!(value("NEG_ONE"), Some(TMacroValue::Int(-1)));
    assert_eq!(value("MASK"), Some(TMacroValue::Int(31)));
    assert_eq!(value("PI_ISH"), Some(TMacroValue::Float(3.14)));
    assert_eq!(value("FOO"), None, "function-like macro must be dropped");
    assert_eq!(value("BAR"), None, "non-literal macro must be dropped");
    let not_transpiled: Vec<&str> = edge
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagKind::MacroObjectNotTranspiled)
        .map(|d| d.name.as_str())
        .collect();
    assert!(not_transpiled.contains(&"FOO"), "got: {not_transpiled:?}");
    assert!(not_transpiled.contains(&"BAR"), "got: {not_transpiled:?}");
}

#[test]
fn adjacent_bitfields_keep_layout_and_fold_into_padding() {
    let edge = &OUTPUTS.edge;
    let flags = edge
        .tas
        .structs
        .iter()
        .find(|s| s.name == "PackedFlags")
        .expect("PackedFlags missing");
    assert_eq!(flags.size_bytes, 8);
    assert_eq!(flags.fields.len(), 3);
    assert_eq!(flags.fields[0].bit_width, Some(4));
    assert_eq!(flags.fields[0].offset_bits, 0);
    assert_eq!(flags.fields[1].bit_width, Some(4));
    assert_eq!(flags.fields[1].offset_bits, 4);
    assert_eq!(flags.fields[2].name, "c");
    assert_eq!(flags.fields[2].offset_bits, 32);

    // Bit widths plus padding must account for every bit of the record.
    let occupied: u64 = flags
        .fields
        .iter()
        .map(|f| {
            let size = match f.bit_width {
                Some(w) => w as u64,
                None => 32,
            };
            size + f.padding_bits
        })
        .sum();
    assert_eq!(occupied, flags.size_bytes * 8);

    // The emitted record replaces the bitfields with explicit padding so
    // the size assertion it carries holds.
    assert!(edge.source.contains("// bitfield `a` folded into padding"));
    assert!(edge.source.contains("// bitfield `b` folded into padding"));
    assert!(edge.source.contains("_pad0: [u8; 4],"));
    assert!(
        edge.source
            .contains("const _: () = assert!(core::mem::size_of::<PackedFlags>() == 8);")
    );
}

#[test]
fn diagnostics_carry_locations() {
    let edge = &OUTPUTS.edge;
    let d = edge
        .diagnostics
        .iter()
        .find(|d| d.kind == DiagKind::VariadicFunctionDropped && d.name == "printf_like")
        .unwrap();
    assert!(d.location.file.ends_with("edge.h"), "location: {}", d.location);
    assert!(d.location.line > 0);
}

#[test]
fn merge_tags_divergent_nodes_per_platform() {
    let multi = &OUTPUTS.multi;
    assert!(!multi.fatal, "diagnostics: {:?}", multi.diagnostics);

    // `long` differs between the two triples, so Counter and get_count
    // diverge while get_step agrees.
    let counters: Vec<_> = multi
        .tas
        .structs
        .iter()
        .filter(|s| s.name == "Counter")
        .collect();
    assert_eq!(counters.len(), 2, "divergent struct must be emitted per platform");
    assert!(counters.iter().all(|c| c.platform.is_some()));

    let get_counts: Vec<_> = multi
        .tas
        .functions
        .iter()
        .filter(|f| f.name == "get_count")
        .collect();
    assert_eq!(get_counts.len(), 2);
    let returns: std::collections::HashSet<&str> = get_counts
        .iter()
        .map(|f| f.return_type_name.as_str())
        .collect();
    assert_eq!(returns, ["i64", "i32"].into_iter().collect());

    let get_steps: Vec<_> = multi
        .tas
        .functions
        .iter()
        .filter(|f| f.name == "get_step")
        .collect();
    assert_eq!(get_steps.len(), 1, "agreeing nodes merge to one");
    assert!(get_steps[0].platform.is_none());

    // Divergent nodes are emitted behind target cfgs.
    assert!(multi.source.contains("#[cfg(all(target_arch = \"x86_64\", target_os = \"linux\"))]"));
    assert!(multi.source.contains("#[cfg(all(target_arch = \"i686\", target_os = \"linux\"))]"));
}

#[test]
fn strict_merge_raises_error_on_divergence() {
    let strict = &OUTPUTS.strict;
    assert!(strict.fatal, "divergence without the flag must be fatal");
    assert!(
        strict
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagKind::MergePlatformNodes),
        "missing MergePlatformNodes diagnostic"
    );
    assert!(strict.source.is_empty(), "no output on fatal diagnostics");
}
