//! Rule Store (component E): the persisted, confidence-weighted collection of
//! transformation rules consulted and updated by the Adaptive Layer. Shared
//! read-mostly across worker threads per the concurrency model: readers take a
//! shared lock, `add_rule`/`save` take an exclusive one.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::error::Result;
use crate::types::{Language, Rule, RuleSpec};
use crate::validator::{self, Verdict};

/// Minimum confidence a rule must have to be attempted by `apply_rules`.
pub const MIN_CONFIDENCE: f32 = 0.70;
/// Seed confidence for rules extracted from a layer's own accepted diff.
pub const LEARNED_SEED_CONFIDENCE: f32 = 0.90;
/// Seed confidence for rules derived from security scanner findings.
pub const SECURITY_SEED_CONFIDENCE: f32 = 0.95;
/// Seed confidence for generic structural patterns with no stronger provenance.
pub const GENERIC_SEED_CONFIDENCE: f32 = 0.65;
/// Confidence gained each time an equivalent rule is re-observed.
const REINFORCE_DELTA: f32 = 0.05;
/// Confidence lost when an applied rule's effect fails validation and is discarded.
const DECAY_DELTA: f32 = 0.02;

/// One rule applied during a call to `apply_rules`, with the number of times it fired.
#[derive(Debug, Clone)]
pub struct AppliedRule {
    pub rule_id: String,
    pub count: u32,
}

pub struct RuleStore {
    path: PathBuf,
    rules: RwLock<Vec<Rule>>,
}

impl RuleStore {
    /// Loads the store from `path`; a missing file is an empty store, not an error.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let rules = if path.exists() {
            let bytes = fs::read(&path).map_err(|e| crate::error::Error::io(&path, e))?;
            serde_json::from_slice(&bytes)?
        } else {
            Vec::new()
        };
        Ok(Self { path, rules: RwLock::new(rules) })
    }

    /// Persists the store atomically (temp file + rename).
    pub fn save(&self) -> Result<()> {
        let rules = self.rules.read();
        let bytes = serde_json::to_vec_pretty(&*rules)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| crate::error::Error::io(parent, e))?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &bytes).map_err(|e| crate::error::Error::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| crate::error::Error::io(&self.path, e))?;
        Ok(())
    }

    /// Adds `rule`. An equivalent rule (same `match_spec`) has its `frequency`
    /// incremented and confidence raised by `REINFORCE_DELTA` (clamped at 1.0)
    /// instead of being duplicated.
    pub fn add_rule(&self, rule: Rule) {
        let mut rules = self.rules.write();
        if let Some(existing) = rules.iter_mut().find(|r| r.match_spec == rule.match_spec) {
            existing.frequency += 1;
            existing.confidence = (existing.confidence + REINFORCE_DELTA).min(1.0);
            existing.last_seen_at = rule.last_seen_at;
        } else {
            rules.push(rule);
        }
    }

    pub fn delete_rule(&self, id: &str) {
        self.rules.write().retain(|r| r.id != id);
    }

    pub fn reset(&self) {
        self.rules.write().clear();
    }

    pub fn edit_rule(&self, id: &str, confidence: Option<f32>) -> bool {
        let mut rules = self.rules.write();
        if let Some(rule) = rules.iter_mut().find(|r| r.id == id) {
            if let Some(confidence) = confidence {
                rule.confidence = confidence.clamp(0.0, 1.0);
            }
            true
        } else {
            false
        }
    }

    pub fn export(&self, path: &Path) -> Result<()> {
        let rules = self.rules.read();
        let bytes = serde_json::to_vec_pretty(&*rules)?;
        fs::write(path, bytes).map_err(|e| crate::error::Error::io(path, e))
    }

    pub fn import(&self, path: &Path) -> Result<()> {
        let bytes = fs::read(path).map_err(|e| crate::error::Error::io(path, e))?;
        let imported: Vec<Rule> = serde_json::from_slice(&bytes)?;
        let mut rules = self.rules.write();
        for rule in imported {
            if let Some(existing) = rules.iter_mut().find(|r| r.match_spec == rule.match_spec) {
                existing.frequency += rule.frequency;
                existing.confidence = existing.confidence.max(rule.confidence).min(1.0);
            } else {
                rules.push(rule);
            }
        }
        Ok(())
    }

    pub fn list(&self) -> Vec<Rule> {
        self.rules.read().clone()
    }

    /// Applies rules with `confidence >= min_confidence`, highest confidence first
    /// (ties broken by descending frequency, then insertion order), validating each
    /// effect and discarding + decaying any that fail.
    pub fn apply_rules(&self, code: &str, language: Language, min_confidence: f32) -> (String, Vec<AppliedRule>) {
        let mut ordered: Vec<usize> = {
            let rules = self.rules.read();
            let mut indices: Vec<usize> = (0..rules.len()).filter(|&i| rules[i].confidence >= min_confidence).collect();
            indices.sort_by(|&a, &b| {
                rules[b]
                    .confidence
                    .partial_cmp(&rules[a].confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(rules[b].frequency.cmp(&rules[a].frequency))
                    .then(a.cmp(&b))
            });
            indices
        };

        let mut current = code.to_string();
        let mut applied = Vec::new();
        let mut decayed: Vec<(usize, f32)> = Vec::new();

        for idx in ordered.drain(..) {
            let (match_spec, transform_spec, rule_id) = {
                let rules = self.rules.read();
                let rule = &rules[idx];
                (rule.match_spec.clone(), rule.transform_spec.clone(), rule.id.clone())
            };
            let (candidate, count) = apply_one(&current, &match_spec, &transform_spec);
            if count == 0 {
                continue;
            }
            if validator::validate(&candidate, language, Some(&current)) == Verdict::Valid {
                current = candidate;
                applied.push(AppliedRule { rule_id, count });
            } else {
                decayed.push((idx, DECAY_DELTA));
            }
        }

        if !decayed.is_empty() {
            let mut rules = self.rules.write();
            for (idx, delta) in decayed {
                rules[idx].confidence = (rules[idx].confidence - delta).max(0.0);
            }
        }

        (current, applied)
    }
}

fn apply_one(code: &str, match_spec: &RuleSpec, transform_spec: &RuleSpec) -> (String, u32) {
    match (match_spec, transform_spec) {
        (RuleSpec::Regex { pattern, .. }, RuleSpec::Regex { replacement, .. }) => match regex::Regex::new(pattern) {
            Ok(re) => {
                let count = re.find_iter(code).count() as u32;
                (re.replace_all(code, replacement.as_str()).into_owned(), count)
            }
            Err(_) => (code.to_string(), 0),
        },
        _ => (code.to_string(), 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_rule(id: &str, pattern: &str, replacement: &str, confidence: f32) -> Rule {
        Rule {
            id: id.to_string(),
            description: "test rule".to_string(),
            match_spec: RuleSpec::Regex {
                pattern: pattern.to_string(),
                replacement: replacement.to_string(),
            },
            transform_spec: RuleSpec::Regex {
                pattern: pattern.to_string(),
                replacement: replacement.to_string(),
            },
            confidence,
            frequency: 1,
            category: "style".to_string(),
            source_layer: 2,
            created_at: chrono::Utc::now(),
            last_seen_at: chrono::Utc::now(),
            security_related: false,
        }
    }

    #[test]
    fn missing_file_is_empty_store_not_error() {
        let dir = tempdir().unwrap();
        let store = RuleStore::load(dir.path().join("rules.json")).unwrap();
        assert!(store.list().is_empty());
    }

    #[test]
    fn add_rule_reinforces_duplicate_confidence_and_frequency() {
        let dir = tempdir().unwrap();
        let store = RuleStore::load(dir.path().join("rules.json")).unwrap();
        store.add_rule(sample_rule("r1", "console\\.log", "", 0.80));
        store.add_rule(sample_rule("r1-dup", "console\\.log", "", 0.80));
        let rules = store.list();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].frequency, 2);
        assert!(rules[0].confidence > 0.80);
    }

    #[test]
    fn confidence_never_exceeds_one() {
        let dir = tempdir().unwrap();
        let store = RuleStore::load(dir.path().join("rules.json")).unwrap();
        store.add_rule(sample_rule("r1", "foo", "bar", 0.99));
        for _ in 0..5 {
            store.add_rule(sample_rule("r1-dup", "foo", "bar", 0.99));
        }
        assert!(store.list()[0].confidence <= 1.0);
    }

    #[test]
    fn save_and_reload_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rules.json");
        let store = RuleStore::load(&path).unwrap();
        store.add_rule(sample_rule("r1", "foo", "bar", 0.80));
        store.save().unwrap();

        let reloaded = RuleStore::load(&path).unwrap();
        assert_eq!(reloaded.list().len(), 1);
    }

    #[test]
    fn apply_rules_below_min_confidence_are_skipped() {
        let dir = tempdir().unwrap();
        let store = RuleStore::load(dir.path().join("rules.json")).unwrap();
        store.add_rule(sample_rule("r1", "console\\.log\\([^)]*\\);?", "", 0.50));
        let (code, applied) = store.apply_rules("console.log('x');\n", Language::Js, MIN_CONFIDENCE);
        assert!(applied.is_empty());
        assert!(code.contains("console.log"));
    }

    #[test]
    fn apply_rules_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = RuleStore::load(dir.path().join("rules.json")).unwrap();
        store.add_rule(sample_rule("r1", "console\\.log\\([^)]*\\);?", "", 0.90));
        let (once, _) = store.apply_rules("console.log('x');\nconst a = 1;\n", Language::Js, MIN_CONFIDENCE);
        let (twice, _) = store.apply_rules(&once, Language::Js, MIN_CONFIDENCE);
        assert_eq!(once, twice);
    }

    #[test]
    fn delete_rule_is_always_safe() {
        let dir = tempdir().unwrap();
        let store = RuleStore::load(dir.path().join("rules.json")).unwrap();
        store.delete_rule("nonexistent");
        assert!(store.list().is_empty());
    }
}
