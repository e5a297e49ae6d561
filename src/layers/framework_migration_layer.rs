//! Layer 5: framework migration fixes. Implements spec.md §8 scenario 3: each
//! `ReactDOM.render(<App/>, container)` call becomes a distinct `createRoot(...)`
//! binding plus a `.render(...)` call, with identifiers `root`, `root1`, `root2`, …
//! chosen so none shadows another or any identifier already present in the file.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::registry::{Layer, LayerContext};
use crate::types::{LayerId, LayerResult, LAYER_FRAMEWORK_MIGRATION};

static REACT_DOM_RENDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"ReactDOM\.render\(\s*(.+?),\s*(.+?)\)").unwrap());
static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z_$][\w$]*").unwrap());

pub struct FrameworkMigrationLayer;

impl Layer for FrameworkMigrationLayer {
    fn id(&self) -> LayerId {
        LAYER_FRAMEWORK_MIGRATION
    }

    fn name(&self) -> &'static str {
        "framework-migration"
    }

    fn transform(&self, source: &str, _ctx: &LayerContext) -> LayerResult {
        let (code, count) = migrate(source);
        if count == 0 {
            LayerResult::unchanged(self.id(), source)
        } else {
            LayerResult::changed(self.id(), source, code, count)
        }
    }

    fn regex_fallback(&self, source: &str, _ctx: &LayerContext) -> Option<LayerResult> {
        let (code, count) = migrate(source);
        (count > 0).then(|| LayerResult::changed(self.id(), source, code, count))
    }
}

fn migrate(source: &str) -> (String, u32) {
    let existing: std::collections::HashSet<String> = IDENTIFIER.find_iter(source).map(|m| m.as_str().to_string()).collect();
    let mut next_suffix = 0u32;
    let mut count = 0u32;

    let code = REACT_DOM_RENDER
        .replace_all(source, |caps: &regex::Captures| {
            let element = caps[1].trim();
            let container = caps[2].trim();
            let mut ident = fresh_identifier(&existing, &mut next_suffix);
            while existing.contains(&ident) {
                ident = fresh_identifier(&existing, &mut next_suffix);
            }
            count += 1;
            format!("const {ident} = createRoot({container});\n{ident}.render({element})")
        })
        .into_owned();
    (code, count)
}

fn fresh_identifier(existing: &std::collections::HashSet<String>, next_suffix: &mut u32) -> String {
    loop {
        let candidate = if *next_suffix == 0 { "root".to_string() } else { format!("root{}", *next_suffix) };
        *next_suffix += 1;
        if !existing.contains(&candidate) {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn ctx() -> LayerContext<'static> {
        LayerContext {
            project_root: Path::new("."),
            file: Path::new("index.tsx"),
            verbose: false,
            dry_run: false,
            prior_results: crate::registry::PriorResultsView::new(&[]),
        }
    }

    #[test]
    fn migrates_three_render_calls_with_distinct_identifiers() {
        let layer = FrameworkMigrationLayer;
        let src = "ReactDOM.render(<A/>, a);\nReactDOM.render(<B/>, b);\nReactDOM.render(<C/>, c);\n";
        let result = layer.transform(src, &ctx());
        assert_eq!(result.change_count, 3);
        assert!(result.code.contains("const root = createRoot(a);"));
        assert!(result.code.contains("const root1 = createRoot(b);"));
        assert!(result.code.contains("const root2 = createRoot(c);"));
        assert!(result.code.contains("root.render(<A/>)"));
        assert!(result.code.contains("root1.render(<B/>)"));
        assert!(result.code.contains("root2.render(<C/>)"));
    }

    #[test]
    fn avoids_shadowing_an_existing_root_identifier() {
        let layer = FrameworkMigrationLayer;
        let src = "const root = getContainer();\nReactDOM.render(<A/>, root);\n";
        let result = layer.transform(src, &ctx());
        assert!(!result.code.contains("const root = createRoot"));
        assert!(result.code.contains("const root1 = createRoot(root);"));
    }
}
