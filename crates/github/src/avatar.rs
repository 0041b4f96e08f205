use image::imageops::FilterType;
use image::{DynamicImage, Rgba, RgbaImage};

/// Edge length of every avatar texture, in pixels.
pub const AVATAR_SIZE: u32 = 256;

/// Gap between the texture edge and the clip circle.
const CLIP_INSET: f32 = 4.0;
/// Stroke width of the border, centred on the clip circle. Only the inner half survives the clip.
const BORDER_WIDTH: f32 = 8.0;
const PLACEHOLDER_FILL: Rgba<u8> = Rgba([0x5a, 0x5a, 0x6e, 0xff]);

/// Errors from avatar loading. Never fatal: the pet keeps going without a texture.
#[derive(Debug, thiserror::Error)]
pub enum ImageLoadError {
    #[error("avatar fetch failed: {0}")]
    Fetch(String),
    #[error("avatar decode failed: {0}")]
    Decode(#[from] image::ImageError),
}

/// A square RGBA8 avatar texture (straight alpha), ready for upload.
#[derive(Debug, Clone)]
pub struct AvatarImage {
    image: RgbaImage,
}

impl AvatarImage {
    /// Decode raw image bytes and composite them into a circular avatar.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ImageLoadError> {
        let decoded = image::load_from_memory(bytes)?;
        Ok(Self {
            image: compose_circular(&decoded, AVATAR_SIZE),
        })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Row-major RGBA8 pixel data.
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

/// Draw `src` stretched into a `size` square, clipped to a circle and ringed in white.
///
/// Edges carry a one-pixel coverage ramp so the disc reads smoothly when magnified.
pub fn compose_circular(src: &DynamicImage, size: u32) -> RgbaImage {
    let mut out = src.resize_exact(size, size, FilterType::Triangle).to_rgba8();

    let center = size as f32 / 2.0;
    let radius = center - CLIP_INSET;
    let border_start = radius - BORDER_WIDTH / 2.0;

    for (x, y, px) in out.enumerate_pixels_mut() {
        let dx = x as f32 + 0.5 - center;
        let dy = y as f32 + 0.5 - center;
        let d = (dx * dx + dy * dy).sqrt();

        let clip = (radius - d + 0.5).clamp(0.0, 1.0);
        let border = (d - border_start + 0.5).clamp(0.0, 1.0);

        let [r, g, b, a] = px.0;
        let over = |c: u8| c as f32 * (1.0 - border) + 255.0 * border;
        let alpha = over(a) * clip;
        *px = Rgba([
            over(r).round() as u8,
            over(g).round() as u8,
            over(b).round() as u8,
            alpha.round() as u8,
        ]);
    }
    out
}

/// Neutral grey disc shown for pets whose avatar never arrived.
pub fn placeholder_avatar() -> AvatarImage {
    let fill = RgbaImage::from_pixel(AVATAR_SIZE, AVATAR_SIZE, PLACEHOLDER_FILL);
    AvatarImage {
        image: compose_circular(&DynamicImage::ImageRgba8(fill), AVATAR_SIZE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(color: [u8; 4], size: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(size, size, Rgba(color)))
    }

    #[test]
    fn output_is_fixed_size() {
        let out = compose_circular(&solid([10, 20, 30, 255], 40), AVATAR_SIZE);
        assert_eq!(out.dimensions(), (AVATAR_SIZE, AVATAR_SIZE));
    }

    #[test]
    fn corners_are_transparent() {
        let out = compose_circular(&solid([10, 20, 30, 255], 64), AVATAR_SIZE);
        let last = AVATAR_SIZE - 1;
        for (x, y) in [(0, 0), (last, 0), (0, last), (last, last)] {
            assert_eq!(out.get_pixel(x, y).0[3], 0, "corner ({x},{y})");
        }
    }

    #[test]
    fn center_keeps_source_color() {
        let out = compose_circular(&solid([10, 20, 30, 255], 64), AVATAR_SIZE);
        let c = AVATAR_SIZE / 2;
        assert_eq!(out.get_pixel(c, c).0, [10, 20, 30, 255]);
    }

    #[test]
    fn rim_is_white() {
        let out = compose_circular(&solid([10, 20, 30, 255], 64), AVATAR_SIZE);
        let c = AVATAR_SIZE / 2;
        // A few pixels inside the clip circle, within the visible half of the stroke.
        let x = c + (c - CLIP_INSET as u32) - 3;
        assert_eq!(out.get_pixel(x, c).0, [255, 255, 255, 255]);
    }

    #[test]
    fn outside_clip_is_transparent() {
        let out = compose_circular(&solid([200, 200, 200, 255], 64), AVATAR_SIZE);
        let c = AVATAR_SIZE / 2;
        assert_eq!(out.get_pixel(AVATAR_SIZE - 2, c).0[3], 0);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = AvatarImage::from_bytes(b"definitely not an image").unwrap_err();
        assert!(matches!(err, ImageLoadError::Decode(_)));
    }

    #[test]
    fn png_bytes_round_into_avatar() {
        let mut bytes = std::io::Cursor::new(Vec::new());
        solid([1, 2, 3, 255], 16)
            .write_to(&mut bytes, image::ImageFormat::Png)
            .unwrap();
        let avatar = AvatarImage::from_bytes(bytes.get_ref()).unwrap();
        assert_eq!(avatar.width(), AVATAR_SIZE);
        assert_eq!(avatar.as_raw().len(), (AVATAR_SIZE * AVATAR_SIZE * 4) as usize);
    }

    #[test]
    fn placeholder_is_opaque_in_the_middle() {
        let p = placeholder_avatar();
        let c = AVATAR_SIZE / 2;
        assert_eq!(p.image().get_pixel(c, c).0, PLACEHOLDER_FILL.0);
    }
}
