//! Pipeline Driver (component I): selects layers, iterates files, aggregates
//! results, and invokes the Backup Manager and Transformation Logger. Parallel
//! across files, single-threaded cooperative within a file — each file's state is
//! owned by exactly one rayon worker at a time.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

use crate::adaptive::AdaptiveLayer;
use crate::backup::{BackupManager, Mode};
use crate::error::{Error, Result};
use crate::logger::TransformationLogger;
use crate::orchestrator;
use crate::registry::{LayerContext, LayerRegistry, PriorResultsView};
use crate::rule_store::{self, RuleStore};
use crate::scanner::{self, SignatureScanner};
use crate::types::{Language, LayerId, LayerResult, Severity, TransformationLogEntry};

pub struct RunOptions {
    pub dry_run: bool,
    pub no_backup: bool,
    pub verbose: bool,
    pub encrypt_backups: bool,
    pub backup_passphrase: Option<String>,
    pub fail_on: Severity,
    pub max_file_size: u64,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            no_backup: false,
            verbose: false,
            encrypt_backups: false,
            backup_passphrase: None,
            fail_on: Severity::High,
            max_file_size: 10 * 1024 * 1024,
        }
    }
}

pub struct FileReport {
    pub path: PathBuf,
    pub results: Vec<LayerResult>,
    pub failed: bool,
    pub failure_reason: Option<String>,
}

pub struct RunReport {
    pub files: Vec<FileReport>,
    pub backup_id: Option<String>,
    pub cancelled: bool,
}

impl RunReport {
    pub fn exit_code(&self, fail_on: Severity) -> i32 {
        if self.files.iter().any(|f| f.failed) {
            return 1;
        }
        let worst = self
            .files
            .iter()
            .flat_map(|f| f.results.iter())
            .flat_map(|r| r.findings.iter())
            .map(|f| f.severity)
            .max();
        match worst {
            Some(severity) if severity >= fail_on => 1,
            _ => 0,
        }
    }
}

/// Owns the shared state for one invocation: the project root, the ordered layer
/// registry, the Rule Store, the Transformation Logger, and a cancellation flag a
/// host can set to stop scheduling new (file, layer) work.
pub struct PipelineDriver {
    project_root: PathBuf,
    registry: LayerRegistry,
    rule_store: Arc<RuleStore>,
    logger: Arc<TransformationLogger>,
    backup_manager: BackupManager,
    cancelled: Arc<AtomicBool>,
    session_id: String,
}

impl PipelineDriver {
    /// `mutating_layers` is the ordered registry of layers 1-6 (see `layers::mutating_layers`).
    /// The adaptive layer (7) and signature scanner (8) are appended here since they need
    /// the shared `rule_store`/`logger` handles this driver already owns.
    pub fn new(project_root: impl Into<PathBuf>, mutating_layers: LayerRegistry, rule_store: Arc<RuleStore>, logger: Arc<TransformationLogger>) -> Self {
        let project_root = project_root.into();
        let session_id = uuid::Uuid::new_v4().to_string();
        let neurolint_dir = project_root.join(".neurolint");

        let registry = mutating_layers
            .register(Box::new(AdaptiveLayer {
                rule_store: rule_store.clone(),
                logger: logger.clone(),
                min_confidence: rule_store::MIN_CONFIDENCE,
            }))
            .register(Box::new(SignatureScanner::new(scanner::builtin_signatures())));

        Self {
            backup_manager: BackupManager::new(neurolint_dir, session_id.clone()),
            project_root,
            registry,
            rule_store,
            logger,
            cancelled: Arc::new(AtomicBool::new(false)),
            session_id,
        }
    }

    pub fn cancellation_handle(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    /// Runs `selected_layers` (intersected with registry order) over `files`.
    pub fn run(&self, files: &[PathBuf], selected_layers: &[LayerId], opts: &RunOptions) -> Result<RunReport> {
        let layers = self.registry.select(selected_layers);
        let backup_id = Arc::new(parking_lot::Mutex::new(None::<String>));

        let file_reports: Vec<FileReport> = files
            .par_iter()
            .map_while(|path| {
                if self.cancelled.load(Ordering::SeqCst) {
                    return None;
                }
                Some(self.run_file(path, &layers, opts, &backup_id))
            })
            .collect();

        let cancelled = file_reports.len() < files.len();
        Ok(RunReport {
            files: file_reports,
            backup_id: backup_id.lock().clone(),
            cancelled,
        })
    }

    fn run_file(&self, path: &Path, layers: &[&dyn crate::registry::Layer], opts: &RunOptions, backup_id: &parking_lot::Mutex<Option<String>>) -> FileReport {
        let language = match Language::from_extension(path) {
            Some(l) => l,
            None => {
                return FileReport {
                    path: path.to_path_buf(),
                    results: Vec::new(),
                    failed: true,
                    failure_reason: Some("unrecognized file extension".to_string()),
                }
            }
        };

        let original = match std::fs::metadata(path).map(|m| m.len()).and_then(|len| {
            if len > opts.max_file_size {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "file too large"))
            } else {
                std::fs::read_to_string(path)
            }
        }) {
            Ok(source) => source,
            Err(e) => {
                return FileReport {
                    path: path.to_path_buf(),
                    results: Vec::new(),
                    failed: true,
                    failure_reason: Some(e.to_string()),
                }
            }
        };

        let mut results: Vec<LayerResult> = Vec::new();
        let mut current = original.clone();

        for layer in layers {
            let ctx = LayerContext {
                project_root: &self.project_root,
                file: path,
                verbose: opts.verbose,
                dry_run: opts.dry_run,
                prior_results: PriorResultsView::new(&results),
            };
            let result = orchestrator::run_stage(*layer, &current, language, &ctx);
            if result.success {
                current = result.code.clone();
            }
            results.push(result);
        }

        if current != original && !opts.dry_run {
            if let Err(e) = self.persist_accepted_file(path, &original, &current, &results, backup_id, opts) {
                return FileReport {
                    path: path.to_path_buf(),
                    results,
                    failed: true,
                    failure_reason: Some(e.to_string()),
                };
            }
        } else if current != original && opts.dry_run {
            self.log_simulated_entries(path, &original, &current, &results);
        }

        FileReport {
            path: path.to_path_buf(),
            results,
            failed: false,
            failure_reason: None,
        }
    }

    fn persist_accepted_file(
        &self,
        path: &Path,
        original: &str,
        current: &str,
        results: &[LayerResult],
        backup_id: &parking_lot::Mutex<Option<String>>,
        opts: &RunOptions,
    ) -> Result<()> {
        {
            let mut guard = backup_id.lock();
            if guard.is_none() && !opts.no_backup {
                let files = vec![(path.to_path_buf(), original.as_bytes().to_vec())];
                let mode = if opts.encrypt_backups { Mode::Encrypted } else { Mode::Plain };
                let id = self.backup_manager.create_backup(&files, mode, opts.backup_passphrase.as_deref())?;
                *guard = Some(id);
            }
        }

        std::fs::write(path, current).map_err(|e| Error::io(path, e))?;

        for result in results.iter().filter(|r| r.success && r.change_count > 0) {
            let entry = TransformationLogEntry {
                session_id: self.session_id.clone(),
                timestamp: chrono::Utc::now(),
                file: path.to_path_buf(),
                layer_id: result.layer_id,
                before_sha: crate::backup::sha256_hex(result.original_code.as_bytes()),
                after_sha: crate::backup::sha256_hex(result.code.as_bytes()),
                before_snippet: snippet(&result.original_code),
                after_snippet: snippet(&result.code),
                simulated: false,
            };
            self.logger.append(&entry)?;
        }
        Ok(())
    }

    fn log_simulated_entries(&self, path: &Path, _original: &str, _current: &str, results: &[LayerResult]) {
        for result in results.iter().filter(|r| r.success && r.change_count > 0) {
            let entry = TransformationLogEntry {
                session_id: self.session_id.clone(),
                timestamp: chrono::Utc::now(),
                file: path.to_path_buf(),
                layer_id: result.layer_id,
                before_sha: crate::backup::sha256_hex(result.original_code.as_bytes()),
                after_sha: crate::backup::sha256_hex(result.code.as_bytes()),
                before_snippet: snippet(&result.original_code),
                after_snippet: snippet(&result.code),
                simulated: true,
            };
            let _ = self.logger.append(&entry);
        }
    }
}

fn snippet(code: &str) -> String {
    code.chars().take(200).collect()
}
