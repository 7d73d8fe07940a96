use std::io::Cursor;

use huefit_contracts::images::EncodedImage;
use huefit_contracts::palette::{normalize_hex, ColorSuggestion, PALETTE_SIZE};
use image::{ImageFormat, Rgb, RgbImage};
use sha2::{Digest, Sha256};

use crate::error::GatewayError;
use crate::gateway::TryOnGateway;

const DRYRUN_CANVAS: u32 = 512;

/// Offline stand-in for the remote model: deterministic outputs derived from
/// a digest of the inputs, so tests and `--dryrun` sessions never touch the
/// network.
#[derive(Debug, Default)]
pub struct DryrunGateway;

impl DryrunGateway {
    pub fn new() -> Self {
        Self
    }

    fn solid_png(rgb: (u8, u8, u8), artifact_name: &str) -> Result<EncodedImage, String> {
        let mut canvas = RgbImage::new(DRYRUN_CANVAS, DRYRUN_CANVAS);
        for pixel in canvas.pixels_mut() {
            *pixel = Rgb([rgb.0, rgb.1, rgb.2]);
        }
        let mut bytes = Vec::new();
        canvas
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|err| err.to_string())?;
        Ok(EncodedImage::from_bytes(&bytes, "image/png", artifact_name))
    }
}

impl TryOnGateway for DryrunGateway {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn analyze_undertone(
        &self,
        portrait: &EncodedImage,
    ) -> Result<Vec<ColorSuggestion>, GatewayError> {
        let mut hasher = Sha256::new();
        hasher.update(portrait.data.as_bytes());
        let digest = hasher.finalize();

        let palette = (0..PALETTE_SIZE)
            .map(|idx| {
                let chunk = &digest[idx * 3..idx * 3 + 3];
                ColorSuggestion {
                    hex: format!("#{}", hex::encode_upper(chunk)),
                    name: None,
                }
            })
            .collect();
        Ok(palette)
    }

    fn compose_try_on(
        &self,
        _person: &EncodedImage,
        _garment: &EncodedImage,
        target_hex: &str,
    ) -> Result<EncodedImage, GatewayError> {
        let normalized = normalize_hex(target_hex)
            .ok_or_else(|| GatewayError::Composition(format!("invalid target color '{target_hex}'")))?;
        let suggestion = ColorSuggestion {
            hex: normalized,
            name: None,
        };
        Self::solid_png(suggestion.rgb(), "try-on.png").map_err(GatewayError::Composition)
    }

    fn restyle_hair(
        &self,
        photo: &EncodedImage,
        style_description: &str,
    ) -> Result<EncodedImage, GatewayError> {
        let mut hasher = Sha256::new();
        hasher.update(photo.data.as_bytes());
        hasher.update(style_description.as_bytes());
        let digest = hasher.finalize();
        Self::solid_png((digest[0], digest[1], digest[2]), "restyle.png")
            .map_err(GatewayError::Restyle)
    }
}
