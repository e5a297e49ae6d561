//! The six mutating layers (1-6), the adaptive layer (7), and the signature scanner
//! (8). Each module implements the `Layer` contract from `registry.rs`; the contract
//! itself, not these rule bodies, is the specified surface — see spec.md §4.G.

pub mod component_hygiene_layer;
pub mod config_layer;
pub mod framework_migration_layer;
pub mod pattern_layer;
pub mod ssr_guard_layer;
pub mod test_scaffolding_layer;

use crate::registry::LayerRegistry;

/// Builds a registry containing the six mutating layers in order. The adaptive layer
/// (7) and signature scanner (8) are registered separately by the driver since they
/// depend on the Rule Store and Logger, which the mutating layers do not need.
pub fn mutating_layers() -> LayerRegistry {
    LayerRegistry::new()
        .register(Box::new(config_layer::ConfigLayer))
        .register(Box::new(pattern_layer::PatternLayer))
        .register(Box::new(component_hygiene_layer::ComponentHygieneLayer))
        .register(Box::new(ssr_guard_layer::SsrGuardLayer))
        .register(Box::new(framework_migration_layer::FrameworkMigrationLayer))
        .register(Box::new(test_scaffolding_layer::TestScaffoldingLayer))
}
