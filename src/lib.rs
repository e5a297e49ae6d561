//! # NeuroLint Core
//!
//! A deterministic, rule-based source-code transformation engine for React/Next.js/
//! TypeScript codebases. Source files move through an ordered pipeline of
//! transformation layers (configuration normalization, pattern fixes, component
//! hygiene, SSR hydration guards, framework migration, test scaffolding, adaptive
//! rule application, security scanning); every layer's output is validated before
//! acceptance, and a rejected transformation reverts the file to its prior state.
//!
//! The core is four cooperating engines:
//! - The [`orchestrator`]: a 5-stage per-file fail-safe pipeline (AST transform →
//!   validate → regex fallback → validate → accept/revert).
//! - The [`validator`]: a two-pass structural acceptance check.
//! - The [`adaptive`] layer: a cross-session, confidence-weighted rule store
//!   ([`rule_store`]) that learns from accepted diffs ([`diff`]) and applies
//!   high-confidence rules to new code.
//! - The [`backup`] manager: a content-addressed, optionally encrypted snapshot
//!   store guaranteeing recoverability from any failed run.
//!
//! [`driver`] ties these together into `run(files, selected_layers, opts)`;
//! [`report`] renders the result as JSON, SARIF, or a CLI summary.

pub mod adaptive;
pub mod backup;
pub mod config;
pub mod diff;
pub mod driver;
pub mod error;
pub mod layers;
pub mod logger;
pub mod orchestrator;
pub mod parser;
pub mod registry;
pub mod report;
pub mod rule_store;
pub mod scanner;
pub mod types;
pub mod validator;

pub use driver::{PipelineDriver, RunOptions, RunReport};
pub use error::{Error, Result};
pub use registry::{Layer, LayerContext, LayerRegistry};
pub use types::{Language, LayerId, LayerResult, Severity};
