use huefit_contracts::images::EncodedImage;
use huefit_contracts::palette::ColorSuggestion;

use crate::error::GatewayError;

/// The external AI collaborator. One request per call, no streaming, no
/// partial results. Calls are safe to repeat with identical inputs but the
/// remote model may return different pixels each time.
pub trait TryOnGateway {
    fn name(&self) -> &str;

    /// Portrait in, exactly six clothing-color suggestions out.
    fn analyze_undertone(
        &self,
        portrait: &EncodedImage,
    ) -> Result<Vec<ColorSuggestion>, GatewayError>;

    /// Recolors the garment to `target_hex` and composites it onto the
    /// person, preserving pose, face, and background.
    fn compose_try_on(
        &self,
        person: &EncodedImage,
        garment: &EncodedImage,
        target_hex: &str,
    ) -> Result<EncodedImage, GatewayError>;

    /// Alters only the hair region of `photo`, preserving face, clothing,
    /// and background.
    fn restyle_hair(
        &self,
        photo: &EncodedImage,
        style_description: &str,
    ) -> Result<EncodedImage, GatewayError>;
}

pub(crate) fn analysis_instruction() -> String {
    "From the provided portrait image, identify the user's skin undertone \
     (e.g., cool, warm, neutral, olive). Based on this undertone, recommend a \
     palette of 6 complementary clothing colors. Provide the output as strict \
     JSON: an object with a single key \"colors\" holding an array of 6 hex \
     color code strings. No other text, explanations, or markdown."
        .to_string()
}

pub(crate) fn composition_instruction(target_hex: &str) -> String {
    format!(
        "The first image is a person, the second is a clothing item. Change \
         the color of the clothing item to {target_hex} and show the person \
         wearing it. Preserve the person's pose, face, and the original \
         background, and keep the garment's textures, folds, shadows, and \
         highlights so the recolor looks natural."
    )
}

pub(crate) fn restyle_instruction(style_description: &str) -> String {
    format!(
        "Change the person's hairstyle in this image to {style_description}. \
         Alter only the hair; keep the face, clothing, and background exactly \
         as they are."
    )
}
