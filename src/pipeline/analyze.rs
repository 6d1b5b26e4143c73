// src/pipeline/analyze.rs
//! Analyze stage: best-effort product analysis from a source reference.

use crate::reasoning_client::ReasoningService;
use crate::types::{ProductDescriptor, ReasoningModel, ReferenceImage};

/// Derives a product descriptor from the source URL and merges in the
/// user-supplied reference image.
///
/// Infallible by policy: a transport or parse failure degrades to a
/// placeholder descriptor instead of stalling the run. Every later stage
/// propagates its failures.
pub async fn run(
    reasoning: &dyn ReasoningService,
    model: ReasoningModel,
    source_url: &str,
    reference_image: Option<ReferenceImage>,
) -> ProductDescriptor {
    let mut product = match reasoning.analyze(model, source_url).await {
        Ok(product) => product,
        Err(e) => {
            tracing::warn!(
                "product analysis failed ({}), continuing with placeholder descriptor",
                e
            );
            ProductDescriptor::placeholder(source_url)
        }
    };
    product.image = reference_image;
    tracing::info!("analyzed product '{}' from {}", product.name, source_url);
    product
}
