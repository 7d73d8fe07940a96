use anyhow::{Context, Result};
use huefit_contracts::images::EncodedImage;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbImage};

pub const ADJUST_MIN: i64 = 50;
pub const ADJUST_MAX: i64 = 150;
pub const ADJUST_NEUTRAL: i64 = 100;

const COMMIT_JPEG_QUALITY: u8 = 90;

/// Brightness and contrast as percentages, 50-150, 100 = no-op. Values are
/// clamped into range on the way in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdjustParams {
    brightness: i64,
    contrast: i64,
}

impl Default for AdjustParams {
    fn default() -> Self {
        Self::neutral()
    }
}

impl AdjustParams {
    pub fn neutral() -> Self {
        Self {
            brightness: ADJUST_NEUTRAL,
            contrast: ADJUST_NEUTRAL,
        }
    }

    pub fn brightness(&self) -> i64 {
        self.brightness
    }

    pub fn contrast(&self) -> i64 {
        self.contrast
    }

    pub fn set_brightness(&mut self, percent: i64) {
        self.brightness = percent.clamp(ADJUST_MIN, ADJUST_MAX);
    }

    pub fn set_contrast(&mut self, percent: i64) {
        self.contrast = percent.clamp(ADJUST_MIN, ADJUST_MAX);
    }

    pub fn is_neutral(&self) -> bool {
        self.brightness == ADJUST_NEUTRAL && self.contrast == ADJUST_NEUTRAL
    }
}

/// Brightness scales each channel by `b/100`; contrast pivots around mid-gray
/// (`(v - 128) * c/100 + 128`). Applied in that order, clamped to 0..=255.
fn transform(raster: &mut RgbImage, params: AdjustParams) {
    let brightness = params.brightness as f32 / 100.0;
    let contrast = params.contrast as f32 / 100.0;
    for pixel in raster.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            let brightened = f32::from(*channel) * brightness;
            let contrasted = (brightened - 128.0) * contrast + 128.0;
            *channel = contrasted.round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// The manual adjustment stage. Holds the source image and the current
/// parameters; presenting a new source resets both parameters to neutral.
#[derive(Debug)]
pub struct Editor {
    source: EncodedImage,
    params: AdjustParams,
}

impl Editor {
    pub fn present(source: EncodedImage) -> Self {
        Self {
            source,
            params: AdjustParams::neutral(),
        }
    }

    pub fn source(&self) -> &EncodedImage {
        &self.source
    }

    pub fn params(&self) -> AdjustParams {
        self.params
    }

    pub fn set_brightness(&mut self, percent: i64) {
        self.params.set_brightness(percent);
    }

    pub fn set_contrast(&mut self, percent: i64) {
        self.params.set_contrast(percent);
    }

    /// Rasterizes the source through the current parameters and re-encodes
    /// as JPEG at quality 90, even when the parameters are neutral.
    pub fn commit(self) -> Result<EncodedImage> {
        let source_name = self.source.source_name.clone();
        let bytes = self.source.decode()?;
        let decoded = image::load_from_memory(&bytes)
            .with_context(|| format!("failed decoding {source_name} for adjustment"))?;
        let mut raster = decoded.to_rgb8();
        transform(&mut raster, self.params);

        let mut encoded = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut encoded, COMMIT_JPEG_QUALITY);
        encoder
            .encode_image(&DynamicImage::ImageRgb8(raster))
            .with_context(|| format!("failed re-encoding {source_name}"))?;
        Ok(EncodedImage::from_bytes(&encoded, "image/jpeg", source_name))
    }

    /// Cancellation hands back the original source unchanged.
    pub fn cancel(self) -> EncodedImage {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, Rgb};

    use super::*;

    fn checker_source() -> EncodedImage {
        let mut raster = RgbImage::new(8, 8);
        for (x, y, pixel) in raster.enumerate_pixels_mut() {
            *pixel = if (x + y) % 2 == 0 {
                Rgb([200, 100, 50])
            } else {
                Rgb([30, 60, 90])
            };
        }
        let mut bytes = Vec::new();
        raster
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        EncodedImage::from_bytes(&bytes, "image/png", "checker.png")
    }

    #[test]
    fn params_clamp_to_range_and_default_neutral() {
        let mut params = AdjustParams::neutral();
        assert!(params.is_neutral());
        params.set_brightness(500);
        params.set_contrast(-20);
        assert_eq!(params.brightness(), ADJUST_MAX);
        assert_eq!(params.contrast(), ADJUST_MIN);
        assert!(!params.is_neutral());
    }

    #[test]
    fn presenting_a_new_source_resets_params() {
        let mut editor = Editor::present(checker_source());
        editor.set_brightness(130);
        editor.set_contrast(70);
        let editor = Editor::present(editor.cancel());
        assert!(editor.params().is_neutral());
    }

    #[test]
    fn cancel_returns_the_source_byte_for_byte() {
        let source = checker_source();
        let mut editor = Editor::present(source.clone());
        editor.set_brightness(140);
        assert_eq!(editor.cancel(), source);
    }

    #[test]
    fn commit_re_encodes_as_jpeg_with_same_dimensions() -> Result<()> {
        let editor = Editor::present(checker_source());
        let committed = editor.commit()?;
        assert_eq!(committed.mime_type, "image/jpeg");
        assert_eq!(committed.source_name, "checker.png");
        let decoded = image::load_from_memory(&committed.decode()?)?;
        assert_eq!(decoded.to_rgb8().dimensions(), (8, 8));
        Ok(())
    }

    #[test]
    fn brightness_raises_mean_luminance() -> Result<()> {
        let mean = |image: &EncodedImage| -> Result<f64> {
            let raster = image::load_from_memory(&image.decode()?)?.to_rgb8();
            let sum: u64 = raster.pixels().flat_map(|p| p.0).map(u64::from).sum();
            Ok(sum as f64 / (raster.width() * raster.height() * 3) as f64)
        };

        let neutral = Editor::present(checker_source()).commit()?;
        let mut brighter = Editor::present(checker_source());
        brighter.set_brightness(150);
        let brighter = brighter.commit()?;
        assert!(mean(&brighter)? > mean(&neutral)?);
        Ok(())
    }

    #[test]
    fn contrast_spreads_values_away_from_mid_gray() {
        let mut raster = RgbImage::new(2, 1);
        raster.put_pixel(0, 0, Rgb([100, 100, 100]));
        raster.put_pixel(1, 0, Rgb([160, 160, 160]));
        let mut params = AdjustParams::neutral();
        params.set_contrast(150);
        transform(&mut raster, params);
        assert!(raster.get_pixel(0, 0).0[0] < 100);
        assert!(raster.get_pixel(1, 0).0[0] > 160);
    }
}
