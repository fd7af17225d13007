// model selection module

use super::intelligence::{ChangeAnalysis, Complexity};
use crate::config::GenerationConfig;
use tracing::debug;

/// select model based on complexity
///
/// complex and major changes use `detailed_model` when one is configured
pub fn select_model(analysis: &ChangeAnalysis, config: &GenerationConfig) -> String {
    let (model, reason) = match &config.detailed_model {
        Some(detailed) if analysis.complexity >= Complexity::Complex => {
            (detailed, "complex change detected - using detailed model")
        }
        _ => (&config.model, "using default model"),
    };

    debug!("model selection: {reason} ({model})");
    model.clone()
}
