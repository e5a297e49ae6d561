//! Layer 2: pattern fixes over plain source text — the layer whose accepted edits
//! feed the cross-session learning scenario in spec.md §8 scenario 6 (removing a
//! stray `console.log(...)` call).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::registry::{Layer, LayerContext};
use crate::types::{LayerId, LayerResult, LAYER_PATTERN};

static CONSOLE_LOG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*console\.log\([^;\n]*\);?[ \t]*\n?").unwrap());

pub struct PatternLayer;

impl Layer for PatternLayer {
    fn id(&self) -> LayerId {
        LAYER_PATTERN
    }

    fn name(&self) -> &'static str {
        "pattern"
    }

    fn transform(&self, source: &str, _ctx: &LayerContext) -> LayerResult {
        let count = CONSOLE_LOG.find_iter(source).count() as u32;
        if count == 0 {
            return LayerResult::unchanged(self.id(), source);
        }
        let code = CONSOLE_LOG.replace_all(source, "").into_owned();
        LayerResult::changed(self.id(), source, code, count)
    }

    fn regex_fallback(&self, source: &str, _ctx: &LayerContext) -> Option<LayerResult> {
        let count = CONSOLE_LOG.find_iter(source).count() as u32;
        if count == 0 {
            return None;
        }
        Some(LayerResult::changed(self.id(), source, CONSOLE_LOG.replace_all(source, "").into_owned(), count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn ctx() -> LayerContext<'static> {
        LayerContext {
            project_root: Path::new("."),
            file: Path::new("a.ts"),
            verbose: false,
            dry_run: false,
            prior_results: crate::registry::PriorResultsView::new(&[]),
        }
    }

    #[test]
    fn removes_console_log_call() {
        let layer = PatternLayer;
        let result = layer.transform("console.log('x');\nconst a = 1;\n", &ctx());
        assert_eq!(result.change_count, 1);
        assert!(!result.code.contains("console.log"));
        assert!(result.code.contains("const a = 1;"));
    }

    #[test]
    fn is_a_no_op_when_no_console_log_present() {
        let layer = PatternLayer;
        let result = layer.transform("const a = 1;\n", &ctx());
        assert_eq!(result.change_count, 0);
    }
}
