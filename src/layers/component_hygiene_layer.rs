//! Layer 3: component hygiene fixes. Implements the JSX key injection scenario from
//! spec.md §8 scenario 1: a `.map(item => <Element>...)` callback whose returned JSX
//! element has no `key` attribute gets one derived from the map callback's parameter.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::registry::{Layer, LayerContext};
use crate::types::{LayerId, LayerResult, LAYER_COMPONENT_HYGIENE};

static MAP_JSX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.map\(\s*(?:\(?\s*(\w+)\s*,?\s*\w*\s*\)?)\s*=>\s*(<([A-Za-z][\w.]*)\b)").unwrap());

pub struct ComponentHygieneLayer;

impl Layer for ComponentHygieneLayer {
    fn id(&self) -> LayerId {
        LAYER_COMPONENT_HYGIENE
    }

    fn name(&self) -> &'static str {
        "component-hygiene"
    }

    fn transform(&self, source: &str, _ctx: &LayerContext) -> LayerResult {
        let (code, count) = inject_keys(source);
        if count == 0 {
            LayerResult::unchanged(self.id(), source)
        } else {
            LayerResult::changed(self.id(), source, code, count)
        }
    }

    fn regex_fallback(&self, source: &str, _ctx: &LayerContext) -> Option<LayerResult> {
        let (code, count) = inject_keys(source);
        (count > 0).then(|| LayerResult::changed(self.id(), source, code, count))
    }
}

fn inject_keys(source: &str) -> (String, u32) {
    let mut count = 0;
    let code = MAP_JSX
        .replace_all(source, |caps: &regex::Captures| {
            let item = &caps[1];
            let open_tag_start = &caps[2];
            // Only inject when this element does not already carry a `key=` attribute
            // on its opening tag; a full attribute scan would need the real AST, but
            // the opening-tag text is bounded here so a direct substring check suffices.
            if open_tag_start.contains("key=") {
                caps[0].to_string()
            } else {
                count += 1;
                format!("{open_tag_start} key={{{item}.id ?? {item}}}")
            }
        })
        .into_owned();
    (code, count)
}
