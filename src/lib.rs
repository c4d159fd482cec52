//! bindcast — C header → foreign-language binding generator.
//!
//! Parses C headers via libclang, extracts the externally visible API
//! surface into a platform-neutral C Abstract Surface, rewrites it into a
//! host-language-ready Target Abstract Surface, and emits Rust source that
//! calls the underlying library through a late-bound virtual table.
//!
//! # Quick start
//!
//! Generate bindings from a config (suitable for `build.rs`):
//!
//! ```no_run
//! use std::path::Path;
//!
//! // Reads bindcast.toml, parses the header, writes the bindings file.
//! bindcast::run(Path::new("bindcast.toml"), None).unwrap();
//! ```
//!
//! Or drive the pipeline in memory:
//!
//! ```no_run
//! use std::path::Path;
//!
//! let cfg = bindcast::config::load_config(Path::new("bindcast.toml")).unwrap();
//! let generated = bindcast::generate_from_config(&cfg, Path::new(".")).unwrap();
//! println!("{}", generated.source);
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

pub mod cas;
pub mod config;
pub mod diag;
pub mod emit;
pub mod explore;
pub mod map_c;
pub mod map_target;
pub mod tas;

use config::Config;
use diag::Diagnostic;

/// Everything one pipeline run produced.
#[derive(Debug)]
pub struct Generated {
    /// The C surface of the first target triple (partial when `fatal`).
    pub cas: cas::CSurface,
    /// The merged target surface.
    pub tas: tas::TSurface,
    /// Emitted source text.
    pub source: String,
    /// Diagnostics in production order.
    pub diagnostics: Vec<Diagnostic>,
    /// At least one diagnostic is an error; outputs must not be written.
    pub fatal: bool,
}

/// Run the full pipeline: load config, parse the C header, generate, and
/// write the output artifact (plus the surface JSON when configured).
///
/// `config_path` is the path to a `bindcast.toml` file.
/// `output` optionally overrides the output file path from the config.
///
/// Diagnostics are printed to stderr in production order. Returns the path
/// the bindings were written to; fatal diagnostics become an error.
pub fn run(config_path: &Path, output: Option<&Path>) -> Result<PathBuf> {
    let cfg = config::load_config(config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    let generated = generate_from_config(&cfg, base_dir)?;

    for d in &generated.diagnostics {
        eprintln!("{d}");
    }
    if generated.fatal {
        anyhow::bail!(
            "{} fatal diagnostic(s); no output written",
            generated
                .diagnostics
                .iter()
                .filter(|d| d.severity == diag::Severity::Error)
                .count()
        );
    }

    let output_path = match output {
        Some(p) => p.to_path_buf(),
        None => base_dir.join(cfg.output_file()),
    };
    std::fs::write(&output_path, &generated.source)
        .with_context(|| format!("writing output to {}", output_path.display()))?;

    if let Some(json_file) = &cfg.json_file {
        let json_path = base_dir.join(json_file);
        let json = serde_json::to_string_pretty(&generated.tas)?;
        std::fs::write(&json_path, json)
            .with_context(|| format!("writing surface JSON to {}", json_path.display()))?;
    }

    info!(
        path = %output_path.display(),
        bytes = generated.source.len(),
        "wrote bindings"
    );

    Ok(output_path)
}

/// Parse a `bindcast.toml` config file and run the pipeline without writing
/// anything to disk.
pub fn generate(config_path: &Path) -> Result<Generated> {
    let cfg = config::load_config(config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    generate_from_config(&cfg, base_dir)
}

/// Run the pipeline from an already-loaded [`Config`].
///
/// `base_dir` is the directory relative to which paths in the config are
/// resolved (typically the parent directory of the TOML file). For multiple
/// target triples the whole pipeline runs once per triple and the surfaces
/// are merged at the TAS level.
pub fn generate_from_config(cfg: &Config, base_dir: &Path) -> Result<Generated> {
    let header = cfg.locate_header(&cfg.input_header_path, base_dir);
    if !header.exists() {
        return Err(config::ConfigError::HeaderNotFound(header).into());
    }

    let mut roots = vec![header.clone()];
    for t in &cfg.traverse_headers {
        roots.push(cfg.locate_header(t, base_dir));
    }
    let scope = explore::Scope::new(roots);

    let clang =
        clang::Clang::new().map_err(|e| anyhow::anyhow!("failed to initialize libclang: {e}"))?;
    let index = clang::Index::new(&clang, false, false);

    let map_c_opts = map_c::MapCOptions {
        emit_system_types: cfg.emit_system_types,
    };
    let map_target_opts = map_target::MapTargetOptions {
        aliases: cfg
            .aliases
            .iter()
            .map(|a| (a.from.clone(), a.to.clone()))
            .collect(),
        ignored: cfg.ignored_names.iter().cloned().collect(),
    };

    let mut diags = diag::Diagnostics::new();
    let mut first_cas = None;
    let mut per_platform = Vec::new();

    for triple in cfg.triples() {
        // Build clang arguments: user args + -I flags + target triple.
        let mut args: Vec<String> = cfg.clang_args.clone();
        for inc in &cfg.include_directories {
            let dir = if inc.is_absolute() {
                inc.clone()
            } else {
                base_dir.join(inc)
            };
            let flag = format!("-I{}", dir.display());
            if !args.contains(&flag) {
                args.push(flag);
            }
        }
        if let Some(t) = &triple {
            args.push("-target".to_string());
            args.push(t.clone());
        }

        let tu = index
            .parser(header.to_str().context("header path is not valid UTF-8")?)
            .arguments(&args.iter().map(|s| s.as_str()).collect::<Vec<_>>())
            .detailed_preprocessing_record(true)
            .parse()
            .map_err(|e| anyhow::anyhow!("failed to parse {}: {:?}", header.display(), e))?;

        let exploration = explore::explore(&tu, &scope, &mut diags);
        drop(tu);

        let c_surface = map_c::lower(exploration, &map_c_opts, &mut diags);
        if first_cas.is_none() {
            first_cas = Some(c_surface.clone());
        }
        if diags.has_errors() {
            break;
        }

        let t_surface = map_target::lower(c_surface, &map_target_opts, &mut diags);
        if diags.has_errors() {
            break;
        }

        info!(
            triple = triple.as_deref().unwrap_or("host"),
            functions = t_surface.functions.len(),
            structs = t_surface.structs.len(),
            "pipeline pass complete"
        );
        per_platform.push((triple.unwrap_or_else(|| "host".to_string()), t_surface));
    }

    let t_surface = if diags.has_errors() {
        tas::TSurface::default()
    } else if per_platform.len() > 1 {
        map_target::merge_platforms(per_platform, cfg.per_platform_divergence, &mut diags)
    } else {
        per_platform
            .into_iter()
            .next()
            .map(|(_, s)| s)
            .unwrap_or_default()
    };

    let fatal = diags.has_errors();
    let source = if fatal {
        String::new()
    } else {
        let emit_opts = emit::EmitOptions {
            class_name: cfg.class_name(),
            library_name: cfg.library_name(),
            header_name: header
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        emit::emit_unit(&t_surface, &emit_opts)
    };

    Ok(Generated {
        cas: first_cas.unwrap_or_default(),
        tas: t_surface,
        source,
        diagnostics: diags.into_vec(),
        fatal,
    })
}
