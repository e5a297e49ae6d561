//! Adaptive Layer (id 7, component J): a cross-session, confidence-weighted rule
//! engine. Harvests diffs from prior layers' accepted mutations (component D),
//! extracts candidate rules, ingests them into the Rule Store (component E), then
//! applies previously-persisted high-confidence rules to the current file.
//!
//! Grounded in the harvest → extract → ingest → apply shape of the teacher's own
//! adaptive pattern analyzer, adapted to the Rule/RuleSpec schema of this crate
//! rather than its looser `GeneratedRule` bag.

use std::sync::Arc;

use uuid::Uuid;

use crate::diff::{self, Edit, EditClass};
use crate::logger::TransformationLogger;
use crate::registry::{Layer, LayerContext};
use crate::rule_store::{self, RuleStore};
use crate::types::{Language, LayerId, LayerResult, Rule, RuleSpec, LAYER_ADAPTIVE};

/// Owns `Arc` handles rather than borrowing so it can be registered in a
/// `LayerRegistry` alongside the other layers, the same way the driver owns them.
pub struct AdaptiveLayer {
    pub rule_store: Arc<RuleStore>,
    pub logger: Arc<TransformationLogger>,
    pub min_confidence: f32,
}

impl Layer for AdaptiveLayer {
    fn id(&self) -> LayerId {
        LAYER_ADAPTIVE
    }

    fn name(&self) -> &'static str {
        "adaptive"
    }

    fn transform(&self, source: &str, ctx: &LayerContext) -> LayerResult {
        self.harvest_and_ingest(ctx);

        let language = Language::from_extension(ctx.file).unwrap_or(Language::Js);
        // Apply only rules already persisted before this invocation began, so a rule
        // extracted from this same run's own diffs cannot be applied before it has
        // been written and re-read — keeping "apply" deterministic and replayable.
        let (code, applied) = self.rule_store.apply_rules(source, language, self.min_confidence);
        if applied.is_empty() {
            return LayerResult::unchanged(self.id(), source);
        }
        let change_count = applied.iter().map(|a| a.count).sum();
        let mut result = LayerResult::changed(self.id(), source, code, change_count);
        result.diagnostics = applied
            .into_iter()
            .map(|a| crate::types::Diagnostic {
                severity: crate::types::Severity::Info,
                message: format!("applied rule {} ({} match(es))", a.rule_id, a.count),
                category: "adaptive".to_string(),
            })
            .collect();
        result
    }
}

impl AdaptiveLayer {
    /// Harvest: diff every prior mutating result with changes, via the AST Diff
    /// Engine. Extract: map each edit to a candidate rule using a per-source-layer
    /// extractor. Ingest: merge candidates into the Rule Store.
    fn harvest_and_ingest(&self, ctx: &LayerContext) {
        for prior in ctx.prior_results.all() {
            if prior.layer_id == self.id() || prior.change_count == 0 {
                continue;
            }
            let edits = diff::diff(&prior.original_code, &prior.code);
            for edit in edits {
                if let Some(rule) = extract_rule(&edit, prior.layer_id) {
                    self.rule_store.add_rule(rule);
                }
            }
            for finding in &prior.findings {
                self.rule_store.add_rule(security_rule_from_finding(finding));
            }
        }
        // Persist before the apply phase reads the store, so a rule harvested from
        // this very invocation's own prior results is "re-read" rather than applied
        // straight out of the in-memory ingest step.
        let _ = self.rule_store.save();
    }
}

/// Maps a single structural edit to a candidate rule, using a source-layer-specific
/// extractor: a config extractor for layer 1, a JSX/component extractor for layer 3,
/// a generic extractor otherwise.
fn extract_rule(edit: &Edit, source_layer: LayerId) -> Option<Rule> {
    let class = diff::classify(edit);
    // A removed line (e.g. a stray `console.log(...)` call) is a learnable rule too:
    // match the removed text, replace it with nothing. `AttributeAdd` carries only the
    // post-image element text, with no pre-image to anchor a match on, so it is not
    // (yet) a source of learned rules.
    let (before, after) = match edit {
        Edit::Modification { before, after } => (before.clone(), after.clone()),
        Edit::Wrap { inner, wrapper } => (inner.clone(), wrapper.clone()),
        Edit::Removal { node } => (node.clone(), String::new()),
        Edit::AttributeAdd { .. } | Edit::Addition { .. } => return None,
    };
    if before.is_empty() || before.len() > 200 {
        return None;
    }

    let category = match (source_layer, class) {
        (crate::types::LAYER_CONFIG, _) => "config",
        (crate::types::LAYER_COMPONENT_HYGIENE, _) => "component-hygiene",
        (_, EditClass::ConditionalWrapping) => "ssr-guard",
        (_, EditClass::Wrapping) => "wrapping",
        (_, EditClass::PropertyAddition) => "property-addition",
        (_, EditClass::Removal) => "removal",
        _ => "generic",
    };

    // A pure removal's replacement is always empty regardless of what matched, so its
    // match pattern can be generalized over quoted-literal contents (the removed call's
    // arguments) without risking a wrong substitution; a modification or wrap's
    // replacement embeds the matched text verbatim, so those stay anchored to the exact
    // observed string.
    let pattern = match edit {
        Edit::Removal { .. } => generalize_literals(&before),
        _ => regex::escape(&before),
    };

    let now = chrono::Utc::now();
    Some(Rule {
        id: Uuid::new_v4().to_string(),
        description: format!("learned from layer {source_layer}: replace observed pattern"),
        match_spec: RuleSpec::Regex {
            pattern: pattern.clone(),
            replacement: String::new(),
        },
        transform_spec: RuleSpec::Regex {
            pattern,
            replacement: after,
        },
        confidence: rule_store::LEARNED_SEED_CONFIDENCE,
        frequency: 1,
        category: category.to_string(),
        source_layer,
        created_at: now,
        last_seen_at: now,
        security_related: false,
    })
}

/// Escapes `text` for use as a regex, except that quoted string literals within it
/// are widened to match any same-quoted literal (`'x'` -> `'[^']*'`). Lets a rule
/// learned from one call site's literal argument (`console.log('x')`) generalize to
/// other literal arguments (`console.log('y')`) rather than re-matching only the
/// exact text it was learned from.
fn generalize_literals(text: &str) -> String {
    static STRING_LITERAL: once_cell::sync::Lazy<regex::Regex> = once_cell::sync::Lazy::new(|| regex::Regex::new(r#"'[^'\\]*'|"[^"\\]*""#).unwrap());

    let mut pattern = String::new();
    let mut last = 0;
    for m in STRING_LITERAL.find_iter(text) {
        pattern.push_str(&regex::escape(&text[last..m.start()]));
        let quote = &text[m.start()..m.start() + 1];
        pattern.push_str(quote);
        pattern.push_str("[^");
        pattern.push_str(quote);
        pattern.push_str("]*");
        pattern.push_str(quote);
        last = m.end();
    }
    pattern.push_str(&regex::escape(&text[last..]));
    pattern
}

/// The seven security-derived categories named in the specification: `eval`,
/// `innerHTML`, `dangerouslySetInnerHTML`, hardcoded credentials, command injection
/// via process spawn, SQL template-literal injection, and a catch-all contextual
/// pattern — seeded at confidence 0.95.
fn security_rule_from_finding(finding: &crate::types::Finding) -> Rule {
    let now = chrono::Utc::now();
    Rule {
        id: Uuid::new_v4().to_string(),
        description: format!("security finding '{}': {}", finding.signature_id, finding.category),
        match_spec: RuleSpec::Regex {
            pattern: regex::escape(&finding.matched_text),
            replacement: String::new(),
        },
        transform_spec: RuleSpec::Regex {
            pattern: regex::escape(&finding.matched_text),
            replacement: format!("/* neurolint: flagged by {} */", finding.signature_id),
        },
        confidence: rule_store::SECURITY_SEED_CONFIDENCE,
        frequency: 1,
        category: finding.category.clone(),
        source_layer: crate::types::LAYER_SIGNATURE_SCANNER,
        created_at: now,
        last_seen_at: now,
        security_related: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::tempdir;

    #[test]
    fn cross_session_learning_extracts_and_later_applies_a_rule() {
        let dir = tempdir().unwrap();
        let store = Arc::new(RuleStore::load(dir.path().join("rules.json")).unwrap());
        let logger = Arc::new(TransformationLogger::new(dir.path().join("log.json")));

        // Simulate a prior run: layer 2 removed a console.log call.
        let prior = LayerResult::changed(2, "console.log('x');\nconst a = 1;\n", "const a = 1;\n", 1);

        let adaptive = AdaptiveLayer {
            rule_store: store.clone(),
            logger: logger.clone(),
            min_confidence: rule_store::MIN_CONFIDENCE,
        };
        let ctx = LayerContext {
            project_root: Path::new("."),
            file: Path::new("a.ts"),
            verbose: false,
            dry_run: false,
            prior_results: crate::registry::PriorResultsView::new(std::slice::from_ref(&prior)),
        };

        // First pass: harvest/extract/ingest a rule, but it was not persisted before
        // this call started, so apply() on the *same* current file does not yet fire.
        let _ = adaptive.transform("console.log('y');\nconst b = 2;\n", &ctx);

        // A later invocation over a fresh file sees the now-persisted rule.
        let ctx2 = LayerContext {
            project_root: Path::new("."),
            file: Path::new("b.ts"),
            verbose: false,
            dry_run: false,
            prior_results: crate::registry::PriorResultsView::new(&[]),
        };
        let result = adaptive.transform("console.log('y');\nconst c = 3;\n", &ctx2);
        assert!(!result.code.contains("console.log"));
    }
}
