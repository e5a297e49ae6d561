//! Layer 6: test scaffolding. Appends a minimal smoke-test stub for a component file
//! that has none yet, so a migrated component is never left without any test
//! coverage at all. Only fires for files whose path looks like a component
//! (`.tsx`/`.jsx`) and have no sibling `*.test.*`/`*.spec.*` marker comment already
//! present in the file.

use crate::registry::{Layer, LayerContext};
use crate::types::{LayerId, LayerResult, LAYER_TEST_SCAFFOLDING};

const SCAFFOLD_MARKER: &str = "// @neurolint-test-scaffold";

pub struct TestScaffoldingLayer;

impl Layer for TestScaffoldingLayer {
    fn id(&self) -> LayerId {
        LAYER_TEST_SCAFFOLDING
    }

    fn name(&self) -> &'static str {
        "test-scaffolding"
    }

    fn transform(&self, source: &str, ctx: &LayerContext) -> LayerResult {
        let is_component_file = ctx
            .file
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| ext == "tsx" || ext == "jsx")
            .unwrap_or(false);

        if !is_component_file || source.contains(SCAFFOLD_MARKER) {
            return LayerResult::unchanged(self.id(), source);
        }

        let component_name = ctx
            .file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Component")
            .to_string();

        let code = format!(
            "{source}\n{marker}\n// TODO(neurolint): replace with a real assertion once {name} has defined behavior.\n// describe('{name}', () => {{ it('renders', () => {{ /* TODO */ }}); }});\n",
            source = source,
            marker = SCAFFOLD_MARKER,
            name = component_name
        );
        LayerResult::changed(self.id(), source, code, 1)
    }
}
