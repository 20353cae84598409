use image::ImageFormat;
use std::io::Cursor;

/// Longest edge of a rendered thumbnail, in pixels.
const MAX_DIM: u32 = 256;

/// Decode image bytes and render a JPEG thumbnail bounded by `MAX_DIM`,
/// preserving aspect ratio. Fails on bytes that do not decode as a supported
/// image format (the classic permanent-failure case: a corrupt upload).
pub fn render(source: &[u8]) -> Result<Vec<u8>, ThumbnailError> {
    let decoded = image::load_from_memory(source)?;
    let thumb = decoded.thumbnail(MAX_DIM, MAX_DIM).to_rgb8();

    let mut out = Cursor::new(Vec::new());
    thumb.write_to(&mut out, ImageFormat::Jpeg)?;
    Ok(out.into_inner())
}

#[derive(Debug, thiserror::Error)]
pub enum ThumbnailError {
    #[error("image decode/encode failed: {0}")]
    Image(#[from] image::ImageError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img =
            DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([120, 80, 40])));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn renders_bounded_jpeg() {
        let thumb = render(&png_bytes(512, 256)).unwrap();
        assert_eq!(image::guess_format(&thumb).unwrap(), ImageFormat::Jpeg);

        let decoded = image::load_from_memory(&thumb).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (256, 128));
    }

    #[test]
    fn rejects_non_image_bytes() {
        assert!(render(b"definitely not an image").is_err());
    }
}
