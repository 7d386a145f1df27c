//! Still image stretching
//!
//! The whole source is drawn into a canvas of the stretched size, so the
//! non-uniform scale happens in the resampler and nothing is cropped.

use image::{DynamicImage, ImageDecoder, ImageReader};
use std::io::Cursor;

use crate::aspect_ratio::AspectRatio;
use crate::config::ImageSettings;
use crate::error::{StretchError, StretchResult};
use crate::media::ImageAsset;
use crate::sizing::stretched_size;

/// Default edge length for grid thumbnails
pub const THUMBNAIL_SIZE: u32 = 200;

/// Decode an encoded image buffer, honouring any EXIF orientation
pub fn decode_image(bytes: &[u8]) -> StretchResult<ImageAsset> {
    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| StretchError::decode(format!("Unrecognised image data: {}", e)))?
        .into_decoder()
        .map_err(|e| StretchError::decode(e.to_string()))?;

    let orientation = decoder
        .orientation()
        .map_err(|e| StretchError::decode(e.to_string()))?;
    let mut image =
        DynamicImage::from_decoder(decoder).map_err(|e| StretchError::decode(e.to_string()))?;
    image.apply_orientation(orientation);

    Ok(ImageAsset::new(image))
}

/// Compute the pixel canvas for a stretched image
pub fn image_canvas(
    asset: &ImageAsset,
    target: AspectRatio,
    settings: &ImageSettings,
) -> StretchResult<(u32, u32)> {
    let natural = asset.natural_size();
    if !natural.is_positive() {
        return Err(StretchError::decode(format!(
            "Image has no pixels ({}x{})",
            asset.width(),
            asset.height()
        )));
    }

    let mut canvas = stretched_size(natural, target);
    if settings.even_dimensions {
        canvas = canvas.even_ceil();
    }
    let (width, height) = canvas.to_pixels();

    if u64::from(width) * u64::from(height) > settings.max_canvas_pixels {
        return Err(StretchError::Render(format!(
            "Canvas {}x{} exceeds the {} pixel limit",
            width, height, settings.max_canvas_pixels
        )));
    }

    Ok((width, height))
}

/// Stretch `asset` to `target` without cropping
pub fn stretch_image(
    asset: &ImageAsset,
    target: AspectRatio,
    settings: &ImageSettings,
) -> StretchResult<ImageAsset> {
    let (width, height) = image_canvas(asset, target, settings)?;

    if (width, height) == (asset.width(), asset.height()) {
        tracing::debug!("Image already {}, re-rendering unchanged", target);
        return Ok(asset.clone());
    }

    let stretched = asset
        .image()
        .resize_exact(width, height, settings.filter.as_filter_type());

    tracing::debug!(
        "Stretched image {}x{} -> {}x{} ({})",
        asset.width(),
        asset.height(),
        width,
        height,
        target
    );

    Ok(ImageAsset::new(stretched))
}

/// Small preview that keeps the source's aspect ratio
pub fn load_thumbnail(bytes: &[u8], max_size: u32) -> StretchResult<ImageAsset> {
    let asset = decode_image(bytes)?;
    Ok(ImageAsset::new(asset.image().thumbnail(max_size, max_size)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResampleFilter;
    use image::{ImageFormat, Rgba, RgbaImage};

    fn solid(width: u32, height: u32) -> ImageAsset {
        ImageAsset::new(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba([200, 40, 90, 255]),
        )))
    }

    fn encode_png(asset: &ImageAsset) -> Vec<u8> {
        let mut bytes = Vec::new();
        asset
            .image()
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_stretch_landscape_to_wider() {
        let out = stretch_image(&solid(400, 300), AspectRatio::Ratio16x9, &ImageSettings::default())
            .unwrap();
        assert_eq!((out.width(), out.height()), (533, 300));
    }

    #[test]
    fn test_stretch_portrait_to_square() {
        let out = stretch_image(&solid(108, 192), AspectRatio::Ratio1x1, &ImageSettings::default())
            .unwrap();
        assert_eq!((out.width(), out.height()), (192, 192));
    }

    #[test]
    fn test_stretch_grows_height_for_portrait_target() {
        let out = stretch_image(&solid(160, 90), AspectRatio::Ratio9x16, &ImageSettings::default())
            .unwrap();
        assert_eq!(out.width(), 160);
        assert_eq!(out.height(), 284);
    }

    #[test]
    fn test_stretch_keeps_content() {
        let settings = ImageSettings {
            filter: ResampleFilter::Nearest,
            ..Default::default()
        };
        let out = stretch_image(&solid(30, 30), AspectRatio::Ratio3x2, &settings).unwrap();
        assert_eq!((out.width(), out.height()), (45, 30));
        let rgba = out.image().to_rgba8();
        // Solid source stays solid: the whole canvas is covered, no padding
        for corner in [(0, 0), (44, 0), (0, 29), (44, 29), (22, 15)] {
            assert_eq!(rgba.get_pixel(corner.0, corner.1), &Rgba([200, 40, 90, 255]));
        }
    }

    #[test]
    fn test_matching_ratio_unchanged() {
        let source = solid(160, 90);
        let out = stretch_image(&source, AspectRatio::Ratio16x9, &ImageSettings::default()).unwrap();
        assert_eq!((out.width(), out.height()), (160, 90));
    }

    #[test]
    fn test_even_dimensions_option() {
        let settings = ImageSettings {
            even_dimensions: true,
            ..Default::default()
        };
        let out = stretch_image(&solid(400, 300), AspectRatio::Ratio16x9, &settings).unwrap();
        assert_eq!((out.width(), out.height()), (534, 300));
    }

    #[test]
    fn test_canvas_limit() {
        let settings = ImageSettings {
            max_canvas_pixels: 1000,
            ..Default::default()
        };
        let result = stretch_image(&solid(40, 30), AspectRatio::Ratio16x9, &settings);
        assert!(matches!(result, Err(StretchError::Render(_))));
    }

    #[test]
    fn test_empty_image_is_decode_failure() {
        let empty = ImageAsset::new(DynamicImage::new_rgba8(0, 0));
        let result = stretch_image(&empty, AspectRatio::Ratio1x1, &ImageSettings::default());
        assert!(matches!(result, Err(StretchError::Decode(_))));
    }

    #[test]
    fn test_decode_roundtrip_and_garbage() {
        let bytes = encode_png(&solid(12, 7));
        let decoded = decode_image(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (12, 7));

        assert!(matches!(
            decode_image(b"definitely not an image"),
            Err(StretchError::Decode(_))
        ));
    }

    #[test]
    fn test_thumbnail_fits_box() {
        let bytes = encode_png(&solid(800, 400));
        let thumb = load_thumbnail(&bytes, THUMBNAIL_SIZE).unwrap();
        assert_eq!((thumb.width(), thumb.height()), (200, 100));
    }
}
