//! Thin CLI binary (SPEC_FULL.md §0.5): parse `CliArgs`, load `NeurolintConfig`,
//! construct the `PipelineDriver`, dispatch to the selected subcommand, print the
//! report, and translate the run's aggregate status into an exit code.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use neurolint::backup::{BackupManager, Mode};
use neurolint::config::{BackupAction, CliArgs, Command, NeurolintConfig, RulesAction};
use neurolint::driver::{PipelineDriver, RunOptions};
use neurolint::layers;
use neurolint::logger::TransformationLogger;
use neurolint::report;
use neurolint::rule_store::RuleStore;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    std::process::exit(run());
}

fn run() -> i32 {
    let cli = CliArgs::parse();

    let project_root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let config = match NeurolintConfig::load(&project_root).and_then(|c| c.merge_cli(&cli)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("[{}] {}", e.severity(), e.user_message());
            return 2;
        }
    };

    let neurolint_dir = project_root.join(".neurolint");
    let rule_store = match RuleStore::load(neurolint_dir.join("learned-rules.json")) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!("[{}] {}", e.severity(), e.user_message());
            return 3;
        }
    };
    let logger = Arc::new(
        TransformationLogger::new(neurolint_dir.join("transformation-log.json")).with_rotation_policy(config.max_log_bytes, config.max_age_days as i64),
    );

    match cli.command {
        Command::Analyze { path, baseline: _ } => run_analyze(&project_root, &path, &config, rule_store, logger, cli.verbose),
        Command::Fix { path, dry_run, no_backup } => run_fix(&project_root, &path, &config, rule_store, logger, dry_run, no_backup, cli.verbose),
        Command::Restore { backup_id, interactive: _ } => run_restore(&project_root, &backup_id),
        Command::Backup { action } => run_backup_action(&project_root, action),
        Command::Rules { action } => run_rules_action(&rule_store, action),
    }
}

fn collect_files(path: &std::path::Path) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }
    walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| neurolint::types::Language::from_extension(p).is_some())
        .collect()
}

fn run_opts(config: &NeurolintConfig, dry_run: bool, no_backup: bool, verbose: bool) -> RunOptions {
    RunOptions {
        dry_run,
        no_backup,
        verbose,
        encrypt_backups: config.encrypt_backups,
        backup_passphrase: std::env::var("NEUROLINT_BACKUP_PASSPHRASE").ok(),
        fail_on: config.fail_on,
        max_file_size: config.max_file_size,
    }
}

fn run_analyze(
    project_root: &std::path::Path,
    path: &std::path::Path,
    config: &NeurolintConfig,
    rule_store: Arc<RuleStore>,
    logger: Arc<TransformationLogger>,
    verbose: bool,
) -> i32 {
    let driver = PipelineDriver::new(project_root, layers::mutating_layers(), rule_store, logger);
    let files = collect_files(path);
    let opts = run_opts(config, true, true, verbose);
    let run = match driver.run(&files, &config.layers, &opts) {
        Ok(run) => run,
        Err(e) => {
            eprintln!("[{}] {}", e.severity(), e.user_message());
            return 3;
        }
    };
    print_and_exit(&run, config)
}

fn run_fix(
    project_root: &std::path::Path,
    path: &std::path::Path,
    config: &NeurolintConfig,
    rule_store: Arc<RuleStore>,
    logger: Arc<TransformationLogger>,
    dry_run: bool,
    no_backup: bool,
    verbose: bool,
) -> i32 {
    let driver = PipelineDriver::new(project_root, layers::mutating_layers(), rule_store, logger);
    let files = collect_files(path);
    let opts = run_opts(config, dry_run, no_backup, verbose);
    let run = match driver.run(&files, &config.layers, &opts) {
        Ok(run) => run,
        Err(e) => {
            eprintln!("[{}] {}", e.severity(), e.user_message());
            return 3;
        }
    };
    print_and_exit(&run, config)
}

fn print_and_exit(run: &neurolint::driver::RunReport, config: &NeurolintConfig) -> i32 {
    let summary = report::build_cli_summary(run);
    for line in &summary.info_lines {
        println!("{line}");
    }
    for line in &summary.warning_lines {
        eprintln!("{line}");
    }
    run.exit_code(config.fail_on)
}

fn run_restore(project_root: &std::path::Path, backup_id: &str) -> i32 {
    let manager = BackupManager::new(project_root.join(".neurolint"), "cli".to_string());
    let passphrase = std::env::var("NEUROLINT_BACKUP_PASSPHRASE").ok();
    match manager.restore(backup_id, project_root, passphrase.as_deref()) {
        Ok(report) => {
            for path in &report.restored {
                println!("restored {}", path.display());
            }
            0
        }
        Err(e) => {
            eprintln!("[{}] {}", e.severity(), e.user_message());
            1
        }
    }
}

fn run_backup_action(project_root: &std::path::Path, action: BackupAction) -> i32 {
    let manager = BackupManager::new(project_root.join(".neurolint"), "cli".to_string());
    match action {
        BackupAction::List => match manager.list() {
            Ok(entries) => {
                for entry in entries {
                    println!("{} ({} file(s), {})", entry.backup_id, entry.files.len(), entry.created_at);
                }
                0
            }
            Err(e) => {
                eprintln!("[{}] {}", e.severity(), e.user_message());
                1
            }
        },
        BackupAction::Verify { backup_id } => {
            let passphrase = std::env::var("NEUROLINT_BACKUP_PASSPHRASE").ok();
            let restore_dir = std::env::temp_dir().join(format!("neurolint-verify-{backup_id}"));
            match manager.restore(&backup_id, &restore_dir, passphrase.as_deref()) {
                Ok(_) => {
                    let _ = std::fs::remove_dir_all(&restore_dir);
                    println!("{backup_id}: ok");
                    0
                }
                Err(e) => {
                    eprintln!("[{}] {}", e.severity(), e.user_message());
                    1
                }
            }
        }
        BackupAction::Delete { backup_id: _ } => {
            eprintln!("delete a single backup by id is not yet exposed; use `backup list` and `delete_oldest` via the library API");
            2
        }
    }
}

fn run_rules_action(rule_store: &RuleStore, action: RulesAction) -> i32 {
    match action {
        RulesAction::List => {
            println!("{:<36} | {:<18} | {:>10} | {:>9} | description", "id", "category", "confidence", "frequency");
            for rule in rule_store.list() {
                println!("{:<36} | {:<18} | {:>10.2} | {:>9} | {}", rule.id, rule.category, rule.confidence, rule.frequency, rule.description);
            }
            0
        }
        RulesAction::Export { path } => match rule_store.export(&path) {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("[{}] {}", e.severity(), e.user_message());
                1
            }
        },
        RulesAction::Import { path } => match rule_store.import(&path) {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("[{}] {}", e.severity(), e.user_message());
                1
            }
        },
        RulesAction::Edit { id, confidence } => {
            if rule_store.edit_rule(&id, Some(confidence)) {
                let _ = rule_store.save();
                0
            } else {
                eprintln!("no such rule '{id}'");
                1
            }
        }
        RulesAction::Reset => {
            rule_store.reset();
            let _ = rule_store.save();
            0
        }
    }
}
