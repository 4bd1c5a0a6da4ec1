//! Compiler configuration.
//!
//! Everything the driver decides up front: how far down the pipeline to
//! run and which IR optimizations to enable. Optimization defaults can
//! also come from an optional `nanocc.toml` next to the invocation;
//! command-line flags are OR-ed on top, so a flag can enable a pass the
//! file left off but never disable one it turned on.
//!
//! ```toml
//! # nanocc.toml
//! [optimizations]
//! fold-constants = true
//! eliminate-unreachable-code = true
//! ```

use crate::optimizer::OptimizationSet;
use serde::Deserialize;
use std::path::Path;

/// Default name of the optional configuration file.
pub const CONFIG_FILE_NAME: &str = "nanocc.toml";

/// How far the pipeline runs before stopping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    /// Stop after lexing.
    Lex,
    /// Stop after parsing.
    Parse,
    /// Stop after semantic analysis.
    Validate,
    /// Stop after IR generation and optimization.
    Ir,
    /// Stop after assembly generation, before emission.
    Codegen,
    /// Write the `.s` file and stop.
    Assembly,
    /// Assemble to a `.o` file and stop.
    Object,
    /// Link an executable.
    #[default]
    Executable,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompilerConfig {
    pub stage: Stage,
    pub optimizations: OptimizationSet,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    optimizations: OptimizationsFile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct OptimizationsFile {
    #[serde(default)]
    fold_constants: bool,
    #[serde(default)]
    propagate_copies: bool,
    #[serde(default)]
    eliminate_unreachable_code: bool,
    #[serde(default)]
    eliminate_dead_stores: bool,
    /// Shorthand for all four.
    #[serde(default)]
    optimize: bool,
}

impl CompilerConfig {
    pub fn new() -> Self {
        CompilerConfig::default()
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, String> {
        let parsed: ConfigFile =
            toml::from_str(content).map_err(|e| format!("invalid configuration: {}", e))?;
        let o = parsed.optimizations;
        let mut optimizations = OptimizationSet {
            fold_constants: o.fold_constants,
            propagate_copies: o.propagate_copies,
            eliminate_unreachable_code: o.eliminate_unreachable_code,
            eliminate_dead_stores: o.eliminate_dead_stores,
        };
        if o.optimize {
            optimizations = OptimizationSet::all();
        }
        Ok(CompilerConfig {
            optimizations,
            ..CompilerConfig::default()
        })
    }

    /// Load `nanocc.toml` from `dir` if present; defaults otherwise.
    pub fn load_defaults(dir: &Path) -> Result<Self, String> {
        let path = dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(CompilerConfig::default());
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
        CompilerConfig::from_toml(&content)
    }

    /// OR another set of optimization flags into this configuration.
    pub fn enable_optimizations(&mut self, extra: OptimizationSet) {
        self.optimizations.fold_constants |= extra.fold_constants;
        self.optimizations.propagate_copies |= extra.propagate_copies;
        self.optimizations.eliminate_unreachable_code |= extra.eliminate_unreachable_code;
        self.optimizations.eliminate_dead_stores |= extra.eliminate_dead_stores;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_runs_everything_unoptimized() {
        let config = CompilerConfig::new();
        assert_eq!(config.stage, Stage::Executable);
        assert!(!config.optimizations.any());
    }

    #[test]
    fn test_from_toml_individual_flags() {
        let config = CompilerConfig::from_toml(
            "[optimizations]\nfold-constants = true\npropagate-copies = true\n",
        )
        .unwrap();
        assert!(config.optimizations.fold_constants);
        assert!(config.optimizations.propagate_copies);
        assert!(!config.optimizations.eliminate_dead_stores);
    }

    #[test]
    fn test_from_toml_optimize_shorthand() {
        let config =
            CompilerConfig::from_toml("[optimizations]\noptimize = true\n").unwrap();
        assert_eq!(config.optimizations, OptimizationSet::all());
    }

    #[test]
    fn test_from_toml_rejects_unknown_keys() {
        assert!(CompilerConfig::from_toml("[optimizations]\nspeed = 11\n").is_err());
        assert!(CompilerConfig::from_toml("[linker]\nflags = []\n").is_err());
    }

    #[test]
    fn test_empty_toml_is_defaults() {
        let config = CompilerConfig::from_toml("").unwrap();
        assert_eq!(config, CompilerConfig::default());
    }

    #[test]
    fn test_cli_flags_or_into_file_settings() {
        let mut config =
            CompilerConfig::from_toml("[optimizations]\nfold-constants = true\n").unwrap();
        config.enable_optimizations(OptimizationSet {
            eliminate_dead_stores: true,
            ..OptimizationSet::default()
        });
        assert!(config.optimizations.fold_constants);
        assert!(config.optimizations.eliminate_dead_stores);
        assert!(!config.optimizations.propagate_copies);
    }

    #[test]
    fn test_load_defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = CompilerConfig::load_defaults(dir.path()).unwrap();
        assert_eq!(config, CompilerConfig::default());
    }

    #[test]
    fn test_load_defaults_with_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[optimizations]\noptimize = true\n",
        )
        .unwrap();
        let config = CompilerConfig::load_defaults(dir.path()).unwrap();
        assert_eq!(config.optimizations, OptimizationSet::all());
    }
}
