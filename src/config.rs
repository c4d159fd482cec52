//! Configuration types for `bindcast.toml`.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Root configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Path to the root C header to generate bindings for.
    pub input_header_path: PathBuf,
    /// Additional include search paths. Each entry is tried in order after
    /// `base_dir` (the TOML file's parent directory). Also injected as `-I`
    /// flags for clang.
    #[serde(default)]
    pub include_directories: Vec<PathBuf>,
    /// Files beyond the input header whose declarations count as roots.
    #[serde(default)]
    pub traverse_headers: Vec<PathBuf>,
    /// Extra clang arguments (e.g. `-DFOO`, `-std=c11`).
    #[serde(default)]
    pub clang_args: Vec<String>,
    /// Target platform triple influencing layout (e.g.
    /// `x86_64-unknown-linux-gnu`). Host target when absent.
    #[serde(default)]
    pub target_triple: Option<String>,
    /// Multiple target triples — the pipeline runs once per triple and the
    /// resulting surfaces are merged.
    #[serde(default)]
    pub target_triples: Vec<String>,
    /// C-name → target-name alias pairs.
    #[serde(default)]
    pub aliases: Vec<Alias>,
    /// Names omitted from the target surface at every level.
    #[serde(default)]
    pub ignored_names: Vec<String>,
    /// Name of the emitted virtual-table record.
    #[serde(default)]
    pub class_name: Option<String>,
    /// Dynamic library name the emitted loader opens.
    #[serde(default)]
    pub library_name: Option<String>,
    /// When false, system typedefs are resolved through but never emitted.
    #[serde(default)]
    pub emit_system_types: bool,
    /// When platforms diverge after a multi-target merge, emit per-platform
    /// nodes instead of raising an error.
    #[serde(default)]
    pub per_platform_divergence: bool,
    /// Emitted source artifact path. Defaults to `<header stem>.rs`.
    #[serde(default)]
    pub output_file: Option<PathBuf>,
    /// Optional path for the serialized target surface JSON.
    #[serde(default)]
    pub json_file: Option<PathBuf>,
}

/// A single `{ from, to }` name alias.
#[derive(Debug, Clone, Deserialize)]
pub struct Alias {
    pub from: String,
    pub to: String,
}

/// Configuration failures — distinguished from pipeline diagnostics so the
/// CLI can exit with code 2.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("input header not found: {0}")]
    HeaderNotFound(PathBuf),
}

impl Config {
    /// The list of triples to run the pipeline for. `target_triples` wins
    /// over the singular `target_triple`; empty means host target.
    pub fn triples(&self) -> Vec<Option<String>> {
        if !self.target_triples.is_empty() {
            self.target_triples.iter().cloned().map(Some).collect()
        } else {
            vec![self.target_triple.clone()]
        }
    }

    /// Virtual-table record name, derived from the header stem when unset.
    pub fn class_name(&self) -> String {
        match &self.class_name {
            Some(n) => n.clone(),
            None => {
                let stem = header_stem(&self.input_header_path);
                let mut name = String::new();
                let mut upper = true;
                for ch in stem.chars() {
                    if ch == '_' || ch == '-' {
                        upper = true;
                    } else if upper {
                        name.extend(ch.to_uppercase());
                        upper = false;
                    } else {
                        name.push(ch);
                    }
                }
                name.push_str("Api");
                name
            }
        }
    }

    /// Dynamic library name, derived from the header stem when unset.
    pub fn library_name(&self) -> String {
        self.library_name
            .clone()
            .unwrap_or_else(|| header_stem(&self.input_header_path))
    }

    /// Output artifact path, derived from the header stem when unset.
    pub fn output_file(&self) -> PathBuf {
        self.output_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}.rs", header_stem(&self.input_header_path))))
    }

    /// Locate a header on disk: `base_dir` first, then each configured
    /// include directory (itself taken relative to `base_dir`). Absolute
    /// paths pass through. A path found nowhere resolves to the `base_dir`
    /// candidate, leaving the parser to report the missing file with
    /// context.
    pub fn locate_header(&self, path: &Path, base_dir: &Path) -> PathBuf {
        if path.is_absolute() {
            return path.to_path_buf();
        }
        std::iter::once(base_dir.to_path_buf())
            .chain(self.include_directories.iter().map(|inc| {
                if inc.is_absolute() {
                    inc.clone()
                } else {
                    base_dir.join(inc)
                }
            }))
            .map(|dir| dir.join(path))
            .find(|candidate| candidate.exists())
            .unwrap_or_else(|| base_dir.join(path))
    }
}

fn header_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "bindings".to_string())
}

/// Load and parse a `bindcast.toml` configuration file.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_parses() {
        let cfg: Config = toml::from_str(r#"input_header_path = "simple.h""#).unwrap();
        assert_eq!(cfg.input_header_path, PathBuf::from("simple.h"));
        assert!(cfg.aliases.is_empty());
        assert!(!cfg.emit_system_types);
        assert_eq!(cfg.class_name(), "SimpleApi");
        assert_eq!(cfg.library_name(), "simple");
        assert_eq!(cfg.output_file(), PathBuf::from("simple.rs"));
    }

    #[test]
    fn full_config_parses() {
        let cfg: Config = toml::from_str(
            r#"
            input_header_path = "gfx/color.h"
            include_directories = ["gfx", "common"]
            target_triple = "x86_64-unknown-linux-gnu"
            ignored_names = ["internal_state"]
            class_name = "ColorApi"
            library_name = "color"
            emit_system_types = true

            [[aliases]]
            from = "size_t"
            to = "u64"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.include_directories.len(), 2);
        assert_eq!(cfg.aliases[0].from, "size_t");
        assert_eq!(cfg.aliases[0].to, "u64");
        assert_eq!(cfg.class_name(), "ColorApi");
        assert_eq!(
            cfg.triples(),
            vec![Some("x86_64-unknown-linux-gnu".to_string())]
        );
    }

    #[test]
    fn triples_prefers_plural_list() {
        let cfg: Config = toml::from_str(
            r#"
            input_header_path = "a.h"
            target_triple = "x86_64-unknown-linux-gnu"
            target_triples = ["aarch64-apple-darwin", "x86_64-pc-windows-msvc"]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.triples().len(), 2);
        assert_eq!(cfg.triples()[0].as_deref(), Some("aarch64-apple-darwin"));
    }

    #[test]
    fn derived_class_name_camel_cases_stems() {
        let cfg: Config = toml::from_str(r#"input_header_path = "my_lib-core.h""#).unwrap();
        assert_eq!(cfg.class_name(), "MyLibCoreApi");
    }

    #[test]
    fn locate_header_searches_include_directories() {
        let cfg: Config = toml::from_str(
            r#"
            input_header_path = "simple.h"
            include_directories = ["fixtures"]
            "#,
        )
        .unwrap();
        let base_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests");

        // Found under an include directory relative to base_dir.
        let found = cfg.locate_header(Path::new("simple.h"), &base_dir);
        assert!(found.exists(), "expected fixture hit, got {}", found.display());
        assert!(found.ends_with("tests/fixtures/simple.h"));

        // Absolute paths pass through untouched.
        let absolute = base_dir.join("fixtures/simple.h");
        assert_eq!(cfg.locate_header(&absolute, &base_dir), absolute);

        // Missing files fall back to the base_dir candidate.
        let missing = cfg.locate_header(Path::new("no_such.h"), &base_dir);
        assert_eq!(missing, base_dir.join("no_such.h"));
    }
}
