//! Layer 1: configuration fixes (e.g. normalizing `tsconfig.json`/`package.json`
//! compiler-option shapes). Config files are JSON, so this layer's "AST attempt" is a
//! structural JSON rewrite rather than an oxc parse.

use crate::registry::{Layer, LayerContext};
use crate::types::{LayerId, LayerResult, LAYER_CONFIG};

pub struct ConfigLayer;

impl Layer for ConfigLayer {
    fn id(&self) -> LayerId {
        LAYER_CONFIG
    }

    fn name(&self) -> &'static str {
        "config"
    }

    fn transform(&self, source: &str, _ctx: &LayerContext) -> LayerResult {
        match serde_json::from_str::<serde_json::Value>(source) {
            Ok(mut value) => {
                let changed = normalize(&mut value);
                if changed {
                    let code = serde_json::to_string_pretty(&value).unwrap_or_else(|_| source.to_string());
                    LayerResult::changed(self.id(), source, code, 1)
                } else {
                    LayerResult::unchanged(self.id(), source)
                }
            }
            Err(_) => LayerResult::unchanged(self.id(), source),
        }
    }
}

/// Ensures a `compilerOptions.strict` flag is present when `compilerOptions` exists,
/// the one config normalization named explicitly as an example in the broader rule
/// catalogue this layer's contract stands in for.
fn normalize(value: &mut serde_json::Value) -> bool {
    if let Some(compiler_options) = value.get_mut("compilerOptions").and_then(|v| v.as_object_mut()) {
        if !compiler_options.contains_key("strict") {
            compiler_options.insert("strict".to_string(), serde_json::Value::Bool(true));
            return true;
        }
    }
    false
}
