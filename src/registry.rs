//! Layer Registry (component G): the uniform contract every transformation layer
//! implements, plus the ordered registry the Pipeline Driver selects from.

use std::path::PathBuf;

use crate::types::{LayerId, LayerResult};

/// A read-only view of the results produced so far for the current file, in registry
/// order. Layers consult this instead of stashing fields on each other.
pub struct PriorResultsView<'a> {
    results: &'a [LayerResult],
}

impl<'a> PriorResultsView<'a> {
    pub fn new(results: &'a [LayerResult]) -> Self {
        Self { results }
    }

    pub fn for_layer(&self, layer_id: LayerId) -> Option<&LayerResult> {
        self.results.iter().find(|r| r.layer_id == layer_id)
    }

    pub fn all(&self) -> &[LayerResult] {
        self.results
    }
}

/// Per-(file, layer) invocation context threaded through the layer contract.
pub struct LayerContext<'a> {
    pub project_root: &'a std::path::Path,
    pub file: &'a std::path::Path,
    pub verbose: bool,
    pub dry_run: bool,
    pub prior_results: PriorResultsView<'a>,
}

/// The uniform contract every layer implements. `regex_fallback` is optional: layers
/// with no textual fallback simply never get a second validation attempt.
pub trait Layer: Send + Sync {
    fn id(&self) -> LayerId;
    fn name(&self) -> &'static str;

    /// The AST-based transformation attempt. May suspend on I/O only.
    fn transform(&self, source: &str, ctx: &LayerContext) -> LayerResult;

    /// A textual fallback run on the *original* input when the AST attempt's output
    /// fails validation. Layers without a fallback return `None`.
    fn regex_fallback(&self, _source: &str, _ctx: &LayerContext) -> Option<LayerResult> {
        None
    }
}

/// An ordered collection of layers. Execution order is registry order intersected
/// with the driver's selection; layers never run out of dependency order even if the
/// caller lists them out of order.
pub struct LayerRegistry {
    layers: Vec<Box<dyn Layer>>,
}

impl LayerRegistry {
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    pub fn register(mut self, layer: Box<dyn Layer>) -> Self {
        self.layers.push(layer);
        self.layers.sort_by_key(|l| l.id());
        self
    }

    /// Returns the registered layers matching `selected`, in registry order.
    pub fn select(&self, selected: &[LayerId]) -> Vec<&dyn Layer> {
        self.layers.iter().filter(|l| selected.contains(&l.id())).map(|l| l.as_ref()).collect()
    }

    pub fn all_ids(&self) -> Vec<LayerId> {
        self.layers.iter().map(|l| l.id()).collect()
    }
}

impl Default for LayerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub fn default_project_root() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LayerResult;

    struct NoopLayer(LayerId);
    impl Layer for NoopLayer {
        fn id(&self) -> LayerId {
            self.0
        }
        fn name(&self) -> &'static str {
            "noop"
        }
        fn transform(&self, source: &str, _ctx: &LayerContext) -> LayerResult {
            LayerResult::unchanged(self.0, source)
        }
    }

    #[test]
    fn selection_preserves_registry_order_regardless_of_input_order() {
        let registry = LayerRegistry::new().register(Box::new(NoopLayer(3))).register(Box::new(NoopLayer(1)));
        let selected = registry.select(&[3, 1]);
        assert_eq!(selected[0].id(), 1);
        assert_eq!(selected[1].id(), 3);
    }
}
