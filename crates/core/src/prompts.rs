//! Fixed instruction texts sent to the generation service.

use crate::model::OutputKind;

/// Request text for the base texture.
pub fn base_prompt(prompt: &str) -> String {
    format!(
        "Generate a seamless, tileable, top-down square texture of: {}. \
         Flat even lighting with no shadows, no perspective, no highlights. \
         The texture must repeat without visible seams on every edge.",
        prompt.trim()
    )
}

/// Instruction describing the target semantics of a derived map.
///
/// Returns `None` for the base kind, which is generated from text alone.
pub fn derived_instruction(kind: OutputKind) -> Option<&'static str> {
    let text = match kind {
        OutputKind::Albedo => return None,
        OutputKind::Normal => {
            "Convert this texture into a tangent-space normal map. \
             Use the standard purple-blue normal map palette (RGB 128,128,255 is flat). \
             Keep exactly the same layout and make it seamless."
        }
        OutputKind::Height => {
            "Convert this texture into a grayscale height map. \
             White is high, black is low. \
             Keep exactly the same layout and make it seamless."
        }
        OutputKind::Metallic => {
            "Convert this texture into a grayscale metallic map. \
             White is bare metal, black is non-metal (dielectric). \
             Keep exactly the same layout and make it seamless."
        }
        OutputKind::Ao => {
            "Convert this texture into a grayscale ambient occlusion map. \
             White is fully exposed, dark is occluded crevices and cavities. \
             Keep exactly the same layout and make it seamless."
        }
    };
    Some(text)
}
