//! Per-File Orchestrator (component H): the 5-stage fail-safe pipeline. A pure
//! function of its inputs plus the layer's own invocation — no disk side effects
//! happen inside it; that is the Pipeline Driver's job.

use crate::registry::{Layer, LayerContext};
use crate::types::{Language, LayerResult};
use crate::validator::{self, Verdict};

/// Runs the 5-stage fail-safe for one (file, layer) pair:
/// 1. AST attempt (`layer.transform`).
/// 2. First validation.
/// 3. Regex fallback on the *original* input, if stage 2 failed and a fallback exists.
/// 4. Second validation.
/// 5. Accept the first validated candidate, or revert to the original with
///    `success = false`.
pub fn run_stage(layer: &dyn Layer, source: &str, language: Language, ctx: &LayerContext) -> LayerResult {
    let attempt = layer.transform(source, ctx);

    if attempt.code == attempt.original_code && attempt.findings.is_empty() {
        return attempt;
    }

    if validator::validate(&attempt.code, language, Some(source)) == Verdict::Valid {
        return attempt;
    }

    if let Some(fallback) = layer.regex_fallback(source, ctx) {
        if validator::validate(&fallback.code, language, Some(source)) == Verdict::Valid {
            return fallback;
        }
    }

    LayerResult::rejected(layer.id(), source, "validator rejected both AST and fallback output")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PriorResultsView;
    use std::path::Path;

    struct AlwaysInvalidLayer;
    impl Layer for AlwaysInvalidLayer {
        fn id(&self) -> crate::types::LayerId {
            99
        }
        fn name(&self) -> &'static str {
            "always-invalid"
        }
        fn transform(&self, source: &str, _ctx: &LayerContext) -> LayerResult {
            LayerResult::changed(self.id(), source, format!("{source} {{{{"), 1)
        }
        fn regex_fallback(&self, source: &str, _ctx: &LayerContext) -> Option<LayerResult> {
            Some(LayerResult::changed(self.id(), source, format!("{source} )))"), 1))
        }
    }

    fn ctx() -> LayerContext<'static> {
        LayerContext {
            project_root: Path::new("."),
            file: Path::new("a.ts"),
            verbose: false,
            dry_run: false,
            prior_results: PriorResultsView::new(&[]),
        }
    }

    #[test]
    fn rejects_and_reverts_when_both_ast_and_fallback_fail_validation() {
        let layer = AlwaysInvalidLayer;
        let source = "const a = 1;\n";
        let result = run_stage(&layer, source, Language::Js, &ctx());
        assert!(!result.success);
        assert_eq!(result.code, source);
        assert!(result.error.is_some());
    }

    struct NoopLayer;
    impl Layer for NoopLayer {
        fn id(&self) -> crate::types::LayerId {
            1
        }
        fn name(&self) -> &'static str {
            "noop"
        }
        fn transform(&self, source: &str, _ctx: &LayerContext) -> LayerResult {
            LayerResult::unchanged(self.id(), source)
        }
    }

    #[test]
    fn no_op_result_short_circuits_validation() {
        let layer = NoopLayer;
        let source = "const a = 1;\n";
        let result = run_stage(&layer, source, Language::Js, &ctx());
        assert!(result.success);
        assert_eq!(result.change_count, 0);
    }
}
