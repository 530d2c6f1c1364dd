//! Border compositor
//!
//! Turns an uploaded image into a repeating pattern with its light background
//! knocked out, then paints that pattern into the four border strips of a
//! transparent canvas.

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

/// Channel value above which a pixel counts as background
pub const BACKGROUND_THRESHOLD: u8 = 200;

/// Largest canvas or pattern edge we are willing to allocate
pub const MAX_CANVAS_DIMENSION: u32 = 8192;

/// Canvas geometry for the border preview
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorderPreviewSettings {
    pub border_width: u32,
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Scale applied to the source image before it is tiled
    pub pattern_scale: f32,
}

impl Default for BorderPreviewSettings {
    fn default() -> Self {
        Self {
            border_width: 40,
            canvas_width: 800,
            canvas_height: 600,
            pattern_scale: 1.0,
        }
    }
}

impl BorderPreviewSettings {
    /// Size of the area left inside the border strips
    pub fn inner_size(&self) -> (i64, i64) {
        let b = 2 * self.border_width as i64;
        (self.canvas_width as i64 - b, self.canvas_height as i64 - b)
    }
}

/// Compositing errors
#[derive(Debug, Clone, PartialEq)]
pub enum CompositeError {
    /// Border strips would meet or overlap; nothing is drawn
    BorderTooWide { border_width: u32, canvas_width: u32, canvas_height: u32 },
    /// Scale is not a positive finite number or rounds the pattern to nothing
    InvalidScale(f32),
    /// Canvas or pattern exceeds [`MAX_CANVAS_DIMENSION`]
    TooLarge { width: u64, height: u64 },
}

impl std::fmt::Display for CompositeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompositeError::BorderTooWide { border_width, canvas_width, canvas_height } => write!(
                f,
                "Border width {} leaves no inner area on a {}x{} canvas",
                border_width, canvas_width, canvas_height
            ),
            CompositeError::InvalidScale(s) => write!(f, "Invalid pattern scale: {}", s),
            CompositeError::TooLarge { width, height } => {
                write!(f, "Image {}x{} exceeds {}px", width, height, MAX_CANVAS_DIMENSION)
            }
        }
    }
}

impl std::error::Error for CompositeError {}

/// Resize `image` by `scale` (dimensions rounded up) and make every pixel whose
/// R, G and B all exceed [`BACKGROUND_THRESHOLD`] fully transparent.
pub fn remove_background(image: &DynamicImage, scale: f32) -> Result<RgbaImage, CompositeError> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(CompositeError::InvalidScale(scale));
    }
    let width = (image.width() as f64 * scale as f64).ceil();
    let height = (image.height() as f64 * scale as f64).ceil();
    if width < 1.0 || height < 1.0 {
        return Err(CompositeError::InvalidScale(scale));
    }
    if width > MAX_CANVAS_DIMENSION as f64 || height > MAX_CANVAS_DIMENSION as f64 {
        return Err(CompositeError::TooLarge { width: width as u64, height: height as u64 });
    }
    let (width, height) = (width as u32, height as u32);

    let rgba = image.to_rgba8();
    let mut pattern = if (width, height) == rgba.dimensions() {
        rgba
    } else {
        imageops::resize(&rgba, width, height, FilterType::Triangle)
    };

    for pixel in pattern.pixels_mut() {
        let [r, g, b, _] = pixel.0;
        if r > BACKGROUND_THRESHOLD && g > BACKGROUND_THRESHOLD && b > BACKGROUND_THRESHOLD {
            pixel.0[3] = 0;
        }
    }

    Ok(pattern)
}

/// Composite the border preview for `source`.
///
/// The pattern repeats from the canvas origin. Strips are filled top, bottom,
/// left, right with source-over, so corners receive two coats.
pub fn composite_border(source: &DynamicImage, settings: &BorderPreviewSettings) -> Result<RgbaImage, CompositeError> {
    let (inner_w, inner_h) = settings.inner_size();
    if inner_w <= 0 || inner_h <= 0 {
        return Err(CompositeError::BorderTooWide {
            border_width: settings.border_width,
            canvas_width: settings.canvas_width,
            canvas_height: settings.canvas_height,
        });
    }
    if settings.canvas_width > MAX_CANVAS_DIMENSION || settings.canvas_height > MAX_CANVAS_DIMENSION {
        return Err(CompositeError::TooLarge {
            width: settings.canvas_width as u64,
            height: settings.canvas_height as u64,
        });
    }

    let pattern = remove_background(source, settings.pattern_scale)?;
    let (w, h, b) = (settings.canvas_width, settings.canvas_height, settings.border_width);
    let mut canvas = RgbaImage::new(w, h);

    fill_pattern_rect(&mut canvas, &pattern, 0, 0, w, b);
    fill_pattern_rect(&mut canvas, &pattern, 0, h - b, w, b);
    fill_pattern_rect(&mut canvas, &pattern, 0, 0, b, h);
    fill_pattern_rect(&mut canvas, &pattern, w - b, 0, b, h);

    Ok(canvas)
}

fn fill_pattern_rect(canvas: &mut RgbaImage, pattern: &RgbaImage, x0: u32, y0: u32, width: u32, height: u32) {
    let (pw, ph) = pattern.dimensions();
    for y in y0..y0 + height {
        for x in x0..x0 + width {
            let src = pattern.get_pixel(x % pw, y % ph);
            let dst = canvas.get_pixel_mut(x, y);
            *dst = source_over(*src, *dst);
        }
    }
}

/// Porter-Duff source-over on straight (non-premultiplied) alpha
fn source_over(src: Rgba<u8>, dst: Rgba<u8>) -> Rgba<u8> {
    let sa = src.0[3] as f32 / 255.0;
    if sa >= 1.0 {
        return src;
    }
    let da = dst.0[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let mut out = [0u8; 4];
    for i in 0..3 {
        let c = (src.0[i] as f32 * sa + dst.0[i] as f32 * da * (1.0 - sa)) / out_a;
        out[i] = c.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba(out)
}
