// src/pipeline/storyboard.rs
//! Storyboard stage: one schema-constrained reasoning call that turns a
//! product descriptor into a complete shot list.

use serde_json::{json, Value};

use crate::error::PipelineError;
use crate::reasoning_client::ReasoningService;
use crate::types::{ProductDescriptor, ReasoningModel, Storyboard, SCENE_COUNT};

const SYSTEM_INSTRUCTION: &str = "You are the world's leading Creative Director for \
    social media ads. Your goal is viral conversion. Generate extreme detail for visual \
    prompts including lighting, camera angles (Dolly, POV, Close-up), and character \
    movements. Return valid JSON only.";

fn build_prompt(product: &ProductDescriptor) -> String {
    format!(
        "Act as a cinematic commercial director.\n\
         PRODUCT: {}\n\
         DESCRIPTION: {}\n\
         USP: {}\n\n\
         REQUIREMENTS:\n\
         1. Create {} short, punchy scenes for a vertical (9:16) video.\n\
         2. Style: cinematic raw footage, IP camera, or TikTok trend depending on the product type.\n\
         3. Global style: define one visual style that runs through every scene \
         (e.g. \"Soft morning light, cinematic film grain, raw look\").\n\
         4. Character consistency: describe the main character in enough detail that a \
         video generator keeps their identity stable across scenes.\n\n\
         The output must be valid JSON.",
        product.name, product.description, product.usp, SCENE_COUNT
    )
}

fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "character_seed_description": { "type": "STRING" },
            "global_style": { "type": "STRING" },
            "scenes": {
                "type": "ARRAY",
                "minItems": SCENE_COUNT,
                "maxItems": SCENE_COUNT,
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "id": { "type": "STRING" },
                        "timestamp": { "type": "STRING" },
                        "visual_prompt": { "type": "STRING" },
                        "audio_prompt": { "type": "STRING" },
                        "negative_prompt": { "type": "STRING" },
                        "transition": { "type": "STRING", "description": "cut, fade, glitch or zoom" }
                    },
                    "required": ["id", "timestamp", "visual_prompt", "audio_prompt", "negative_prompt", "transition"]
                }
            }
        },
        "required": ["character_seed_description", "global_style", "scenes"]
    })
}

/// Runs the storyboard stage. Unlike analysis there is no fallback: parse
/// and schema trouble propagate so the user sees exactly what went wrong.
pub async fn run(
    reasoning: &dyn ReasoningService,
    model: ReasoningModel,
    product: &ProductDescriptor,
) -> Result<Storyboard, PipelineError> {
    let prompt = build_prompt(product);
    let payload = reasoning
        .direct(model, &prompt, Some(SYSTEM_INSTRUCTION), response_schema())
        .await?;
    let storyboard = parse_storyboard(payload)?;
    tracing::info!(
        "storyboard ready: {} scenes, style '{}'",
        storyboard.scenes.len(),
        storyboard.global_style
    );
    Ok(storyboard)
}

/// Validates the parsed payload against the storyboard shape: exactly
/// `SCENE_COUNT` scenes, every required field non-empty.
pub(crate) fn parse_storyboard(payload: Value) -> Result<Storyboard, PipelineError> {
    let storyboard: Storyboard = serde_json::from_value(payload)
        .map_err(|e| PipelineError::SchemaViolation(e.to_string()))?;

    if storyboard.scenes.len() != SCENE_COUNT {
        return Err(PipelineError::SchemaViolation(format!(
            "expected {} scenes, got {}",
            SCENE_COUNT,
            storyboard.scenes.len()
        )));
    }
    if storyboard.character_seed_description.trim().is_empty()
        || storyboard.global_style.trim().is_empty()
    {
        return Err(PipelineError::SchemaViolation(
            "missing character seed or global style".to_string(),
        ));
    }
    for (index, scene) in storyboard.scenes.iter().enumerate() {
        if scene.id.trim().is_empty()
            || scene.timestamp.trim().is_empty()
            || scene.visual_prompt.trim().is_empty()
            || scene.audio_prompt.trim().is_empty()
            || scene.negative_prompt.trim().is_empty()
        {
            return Err(PipelineError::SchemaViolation(format!(
                "scene {} has an empty required field",
                index
            )));
        }
    }

    Ok(storyboard)
}
