//! Configuration (ambient stack, SPEC_FULL.md §0.3). `NeurolintConfig` is the
//! project-level config loaded from `.neurolint/config.{yaml,toml,json}`; `CliArgs` is
//! the `clap`-derived command surface of SPEC_FULL.md §6. CLI flags override file
//! config, which overrides the built-in defaults below; unknown config keys fail fast
//! as a `ConfigError` rather than being silently ignored.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{LayerId, Severity};

fn default_layers() -> Vec<LayerId> {
    (1..=8).collect()
}

fn default_fail_on() -> Severity {
    Severity::High
}

fn default_max_backups() -> u32 {
    10
}

fn default_max_log_bytes() -> u64 {
    16 * 1024 * 1024
}

fn default_max_age_days() -> u32 {
    30
}

fn default_min_confidence() -> f32 {
    0.70
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScannerConfig {
    #[serde(default = "default_scanner_mode")]
    pub mode: ScannerMode,
    #[serde(default = "default_fail_on")]
    pub fail_on: Severity,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_scanner_mode() -> ScannerMode {
    ScannerMode::Regex
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            mode: default_scanner_mode(),
            fail_on: default_fail_on(),
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScannerMode {
    Regex,
    Ast,
    Both,
}

/// Project-level configuration, loaded once per invocation and merged with CLI flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NeurolintConfig {
    #[serde(default = "default_layers")]
    pub layers: Vec<LayerId>,
    #[serde(default = "default_fail_on")]
    pub fail_on: Severity,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default = "default_max_log_bytes")]
    pub max_log_bytes: u64,
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u32,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default)]
    pub encrypt_backups: bool,
    #[serde(default)]
    pub scanner: ScannerConfig,
}

impl Default for NeurolintConfig {
    fn default() -> Self {
        Self {
            layers: default_layers(),
            fail_on: default_fail_on(),
            max_backups: default_max_backups(),
            max_log_bytes: default_max_log_bytes(),
            max_age_days: default_max_age_days(),
            min_confidence: default_min_confidence(),
            max_file_size: default_max_file_size(),
            encrypt_backups: false,
            scanner: ScannerConfig::default(),
        }
    }
}

impl NeurolintConfig {
    /// Loads the first of `.neurolint/config.yaml`, `.neurolint/config.toml`,
    /// `.neurolint/config.json` found under `project_root`. Returns the default
    /// configuration if none exists.
    pub fn load(project_root: &Path) -> Result<Self> {
        let dir = project_root.join(".neurolint");
        for (file_name, parse) in [
            ("config.yaml", parse_yaml as fn(&str) -> Result<Self>),
            ("config.yml", parse_yaml),
            ("config.toml", parse_toml),
            ("config.json", parse_json),
        ] {
            let path = dir.join(file_name);
            if path.exists() {
                let text = std::fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
                return parse(&text);
            }
        }
        Ok(Self::default())
    }

    /// Applies CLI overrides on top of the file-or-default configuration.
    pub fn merge_cli(mut self, cli: &CliArgs) -> Result<Self> {
        if let Some(layers) = &cli.layers {
            self.layers = parse_layer_selection(layers)?;
        }
        if let Some(fail_on) = cli.fail_on {
            self.fail_on = fail_on;
        }
        if cli.encrypt_backups {
            self.encrypt_backups = true;
        }
        Ok(self)
    }
}

fn parse_yaml(text: &str) -> Result<NeurolintConfig> {
    Ok(serde_yaml::from_str(text)?)
}

fn parse_toml(text: &str) -> Result<NeurolintConfig> {
    toml::from_str(text).map_err(|e| Error::serialization(e.to_string()))
}

fn parse_json(text: &str) -> Result<NeurolintConfig> {
    Ok(serde_json::from_str(text)?)
}

/// Parses `"all"` or a comma-separated list of layer ids (`"1,2,7"`).
pub fn parse_layer_selection(raw: &str) -> Result<Vec<LayerId>> {
    if raw.trim().eq_ignore_ascii_case("all") {
        return Ok(default_layers());
    }
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<LayerId>().map_err(|_| Error::config_field(format!("'{s}' is not a valid layer id"), "layers")))
        .collect()
}

#[derive(Parser, Debug)]
#[command(name = "neurolint", about = "Deterministic, rule-based source transformation for React/Next.js/TypeScript")]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Comma-separated layer ids or "all"; overrides the config file's `layers`.
    #[arg(long, global = true)]
    pub layers: Option<String>,

    /// Minimum severity that causes a non-zero exit code; overrides config's `fail_on`.
    #[arg(long, global = true, value_enum)]
    pub fail_on: Option<Severity>,

    /// Encrypt any backup created during this run.
    #[arg(long, global = true)]
    pub encrypt_backups: bool,

    /// Emit debug-level diagnostics in addition to info-level run output.
    #[arg(long, global = true)]
    pub verbose: bool,
}

impl clap::ValueEnum for Severity {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Info, Self::Low, Self::Medium, Self::High, Self::Critical]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(clap::builder::PossibleValue::new(self.to_string()))
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read-only: runs mutating layers in dry-run plus the signature scanner.
    Analyze {
        path: PathBuf,
        #[arg(long)]
        baseline: bool,
    },
    /// Runs selected layers, writing changes unless `--dry-run` is set.
    Fix {
        path: PathBuf,
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        no_backup: bool,
    },
    /// Restores a prior backup.
    Restore {
        backup_id: String,
        #[arg(long)]
        interactive: bool,
    },
    /// Backup store administration.
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },
    /// Rule Store administration.
    Rules {
        #[command(subcommand)]
        action: RulesAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum BackupAction {
    List,
    Verify { backup_id: String },
    Delete { backup_id: String },
}

#[derive(Subcommand, Debug)]
pub enum RulesAction {
    List,
    Export {
        path: PathBuf,
    },
    Import {
        path: PathBuf,
    },
    Edit {
        id: String,
        #[arg(long)]
        confidence: f32,
    },
    Reset,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_all_layers_in_order() {
        let config = NeurolintConfig::default();
        assert_eq!(config.layers, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(config.fail_on, Severity::High);
    }

    #[test]
    fn parse_layer_selection_accepts_all_and_csv() {
        assert_eq!(parse_layer_selection("all").unwrap(), vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(parse_layer_selection("1, 3,7").unwrap(), vec![1, 3, 7]);
        assert!(parse_layer_selection("1,x").is_err());
    }

    #[test]
    fn unknown_config_key_is_rejected() {
        let bad = "layers: [1,2]\nbogus_field: true\n";
        assert!(parse_yaml(bad).is_err());
    }
}
