use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;

use super::model::InferenceError;

pub const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Decodes `bytes` and turns it into a normalized `[1, 3, size, size]` array.
///
/// The shorter side is resized to `size`, the result is center cropped to
/// `size x size`, scaled to `[0, 1]` and normalized with the ImageNet
/// channel statistics.
pub fn preprocess(bytes: &[u8], size: u32) -> Result<Array4<f32>, InferenceError> {
    let rgb = decode_rgb(bytes)?;
    if rgb.width() == 0 || rgb.height() == 0 {
        return Err(InferenceError::Preprocessing("image has no pixels".into()));
    }

    let resized = resize_shorter_side(&rgb, size);
    let cropped = center_crop(&resized, size);
    Ok(normalize(&cropped))
}

pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, InferenceError> {
    let image = image::load_from_memory(bytes).map_err(InferenceError::Decode)?;
    Ok(image.to_rgb8())
}

/// Output size when the shorter side becomes `size`, keeping aspect ratio.
/// The longer side is truncated, not rounded.
pub fn resized_dimensions(width: u32, height: u32, size: u32) -> (u32, u32) {
    let (w, h, s) = (width as u64, height as u64, size as u64);
    if w <= h {
        (size, (s * h / w) as u32)
    } else {
        ((s * w / h) as u32, size)
    }
}

fn resize_shorter_side(image: &RgbImage, size: u32) -> RgbImage {
    let (width, height) = resized_dimensions(image.width(), image.height(), size);
    if (width, height) == image.dimensions() {
        return image.clone();
    }
    imageops::resize(image, width, height, FilterType::Triangle)
}

/// Top-left corner of a centered `size x size` window. Halves round to even.
pub fn crop_offsets(width: u32, height: u32, size: u32) -> (u32, u32) {
    let offset = |dim: u32| (dim.saturating_sub(size) as f64 / 2.0).round_ties_even() as u32;
    (offset(width), offset(height))
}

fn center_crop(image: &RgbImage, size: u32) -> RgbImage {
    let (left, top) = crop_offsets(image.width(), image.height(), size);
    imageops::crop_imm(image, left, top, size, size).to_image()
}

fn normalize(image: &RgbImage) -> Array4<f32> {
    let (width, height) = image.dimensions();
    Array4::from_shape_fn(
        (1, 3, height as usize, width as usize),
        |(_, c, y, x)| {
            let value = image.get_pixel(x as u32, y as u32)[c] as f32 / 255.0;
            (value - MEAN[c]) / STD[c]
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb};
    use std::io::Cursor;

    fn encode_png(image: &RgbImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_resized_dimensions_keep_aspect() {
        assert_eq!(resized_dimensions(448, 300, 224), (334, 224));
        assert_eq!(resized_dimensions(300, 448, 224), (224, 334));
        assert_eq!(resized_dimensions(100, 100, 224), (224, 224));
        assert_eq!(resized_dimensions(224, 224, 224), (224, 224));
    }

    #[test]
    fn test_crop_offsets_round_half_to_even() {
        assert_eq!(crop_offsets(224, 224, 224), (0, 0));
        assert_eq!(crop_offsets(334, 224, 224), (55, 0));
        // (225 - 224) / 2 = 0.5 -> 0, (227 - 224) / 2 = 1.5 -> 2
        assert_eq!(crop_offsets(225, 227, 224), (0, 2));
    }

    #[test]
    fn test_output_shape_for_non_square_input() {
        let image = RgbImage::from_pixel(640, 480, Rgb([10, 20, 30]));
        let array = preprocess(&encode_png(&image), 224).unwrap();
        assert_eq!(array.shape(), &[1, 3, 224, 224]);
    }

    #[test]
    fn test_normalization_uses_channel_statistics() {
        let image = RgbImage::from_pixel(224, 224, Rgb([255, 0, 255]));
        let array = preprocess(&encode_png(&image), 224).unwrap();

        let expected = [
            (1.0 - MEAN[0]) / STD[0],
            (0.0 - MEAN[1]) / STD[1],
            (1.0 - MEAN[2]) / STD[2],
        ];
        for (c, want) in expected.iter().enumerate() {
            let got = array[[0, c, 100, 100]];
            assert!((got - want).abs() < 1e-5, "channel {c}: {got} != {want}");
        }
    }

    #[test]
    fn test_center_crop_keeps_middle() {
        // Left and right thirds red, middle blue; the crop must be all blue.
        let image = RgbImage::from_fn(672, 224, |x, _| {
            if (224..448).contains(&x) {
                Rgb([0, 0, 255])
            } else {
                Rgb([255, 0, 0])
            }
        });
        let array = preprocess(&encode_png(&image), 224).unwrap();
        let blue = (1.0 - MEAN[2]) / STD[2];
        for x in [0, 111, 223] {
            assert!((array[[0, 2, 112, x]] - blue).abs() < 1e-5);
        }
    }

    #[test]
    fn test_grayscale_is_expanded_to_rgb() {
        let gray = image::GrayImage::from_pixel(300, 300, image::Luma([128]));
        let mut bytes = Vec::new();
        gray.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();

        let array = preprocess(&bytes, 224).unwrap();
        assert_eq!(array.shape(), &[1, 3, 224, 224]);
    }

    #[test]
    fn test_garbage_bytes_fail_to_decode() {
        let err = preprocess(b"definitely not an image", 224).unwrap_err();
        assert!(matches!(err, InferenceError::Decode(_)));
    }
}
