use image::{ImageFormat, Rgba, RgbaImage};
use log::info;
use rusttype::{point, Font, Scale};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Font size of the overlay text in pixels
pub const OVERLAY_FONT_SIZE: f32 = 15.0;
/// Left edge of the overlay text
pub const OVERLAY_ORIGIN_X: f32 = 10.0;
/// Baseline of the first overlay line; later lines follow every `OVERLAY_LINE_SPACING`
pub const OVERLAY_FIRST_BASELINE: f32 = 30.0;
pub const OVERLAY_LINE_SPACING: f32 = 30.0;

const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

#[derive(Debug, thiserror::Error)]
pub enum AnnotationError {
    #[error("Overlay font unavailable: {0}")]
    FontUnavailable(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Image encoding error: {0}")]
    ImageError(#[from] image::ImageError),
}

/// Draws text lines onto a captured frame
pub trait FrameAnnotator: Send + Sync {
    fn stamp(&self, frame: &mut RgbaImage, lines: &[String]) -> Result<(), AnnotationError>;
}

/// White text overlay rendered with a TrueType font
pub struct TextOverlay {
    font: Font<'static>,
    scale: Scale,
    color: Rgba<u8>,
}

impl TextOverlay {
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, AnnotationError> {
        let font = Font::try_from_vec(data)
            .ok_or_else(|| AnnotationError::FontUnavailable("invalid font data".to_string()))?;

        Ok(Self {
            font,
            scale: Scale::uniform(OVERLAY_FONT_SIZE),
            color: Rgba([255, 255, 255, 255]),
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, AnnotationError> {
        let data = std::fs::read(path).map_err(|e| {
            AnnotationError::FontUnavailable(format!("{}: {}", path.display(), e))
        })?;
        let overlay = Self::from_bytes(data)?;
        info!("Overlay font loaded from {}", path.display());
        Ok(overlay)
    }

    /// Configured font path if given, otherwise the first well-known system font present
    pub fn locate_font(configured: Option<&str>) -> Option<PathBuf> {
        if let Some(path) = configured {
            return Some(PathBuf::from(path));
        }
        FONT_CANDIDATES
            .iter()
            .map(PathBuf::from)
            .find(|path| path.is_file())
    }

    fn draw_line(&self, frame: &mut RgbaImage, text: &str, baseline: f32) {
        let (width, height) = frame.dimensions();
        let glyphs = self
            .font
            .layout(text, self.scale, point(OVERLAY_ORIGIN_X, baseline));

        for glyph in glyphs {
            let Some(bounds) = glyph.pixel_bounding_box() else {
                continue;
            };
            glyph.draw(|gx, gy, coverage| {
                let x = gx as i32 + bounds.min.x;
                let y = gy as i32 + bounds.min.y;
                if x < 0 || y < 0 || x >= width as i32 || y >= height as i32 {
                    return;
                }
                let pixel = frame.get_pixel_mut(x as u32, y as u32);
                blend(pixel, self.color, coverage);
            });
        }
    }
}

impl FrameAnnotator for TextOverlay {
    fn stamp(&self, frame: &mut RgbaImage, lines: &[String]) -> Result<(), AnnotationError> {
        for (index, line) in lines.iter().enumerate() {
            let baseline = OVERLAY_FIRST_BASELINE + index as f32 * OVERLAY_LINE_SPACING;
            self.draw_line(frame, line, baseline);
        }
        Ok(())
    }
}

fn blend(pixel: &mut Rgba<u8>, color: Rgba<u8>, coverage: f32) {
    let alpha = coverage.clamp(0.0, 1.0);
    for channel in 0..3 {
        let base = pixel.0[channel] as f32;
        let top = color.0[channel] as f32;
        pixel.0[channel] = (top * alpha + base * (1.0 - alpha)).round() as u8;
    }
    pixel.0[3] = pixel.0[3].max((alpha * 255.0).round() as u8);
}

pub fn encode_png(frame: &RgbaImage) -> Result<Vec<u8>, AnnotationError> {
    let mut buffer = Cursor::new(Vec::new());
    frame.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_png_signature() {
        let frame = RgbaImage::from_pixel(4, 3, Rgba([1, 2, 3, 255]));
        let png = encode_png(&frame).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (4, 3));
        assert_eq!(decoded.get_pixel(0, 0), &Rgba([1, 2, 3, 255]));
    }

    #[test]
    fn test_blend() {
        let mut pixel = Rgba([0, 0, 0, 255]);
        blend(&mut pixel, Rgba([255, 255, 255, 255]), 1.0);
        assert_eq!(pixel, Rgba([255, 255, 255, 255]));

        let mut pixel = Rgba([0, 100, 200, 255]);
        blend(&mut pixel, Rgba([255, 255, 255, 255]), 0.0);
        assert_eq!(pixel, Rgba([0, 100, 200, 255]));

        let mut pixel = Rgba([0, 0, 0, 255]);
        blend(&mut pixel, Rgba([255, 255, 255, 255]), 0.5);
        assert_eq!(pixel.0[0], 128);
    }

    #[test]
    fn test_invalid_font_data() {
        assert!(matches!(
            TextOverlay::from_bytes(b"definitely not a font".to_vec()),
            Err(AnnotationError::FontUnavailable(_))
        ));
        assert!(matches!(
            TextOverlay::from_file(Path::new("/nonexistent/font.ttf")),
            Err(AnnotationError::FontUnavailable(_))
        ));
    }

    #[test]
    fn test_locate_font_prefers_configured_path() {
        assert_eq!(
            TextOverlay::locate_font(Some("/opt/fonts/custom.ttf")),
            Some(PathBuf::from("/opt/fonts/custom.ttf"))
        );
    }

    #[test]
    fn test_overlay_draws_inside_text_band() {
        // Skipped on hosts without any of the well-known fonts
        let Some(path) = TextOverlay::locate_font(None) else {
            return;
        };
        let overlay = TextOverlay::from_file(&path).unwrap();
        let mut frame = RgbaImage::from_pixel(320, 120, Rgba([0, 0, 0, 255]));

        overlay
            .stamp(
                &mut frame,
                &["1/2/2025, 3:04:05 PM".to_string(), "Main Street".to_string()],
            )
            .unwrap();

        let lit_in_band = |top: u32, bottom: u32| {
            (top..bottom).any(|y| (0..frame.width()).any(|x| frame.get_pixel(x, y).0[0] > 0))
        };
        assert!(lit_in_band(15, 35), "first line should be drawn near y=30");
        assert!(lit_in_band(45, 65), "second line should be drawn near y=60");
        assert!(!lit_in_band(80, 120), "nothing below the second line");
    }
}
