//! Grid preview
//!
//! Maps a linear cell index onto the outer ring ("border") or the centre of a
//! `gridCountX × gridCountY` grid, and rasterizes the preview the settings
//! panel shows: the image painted into either the border or the centre cells,
//! everything else a flat fill colour.

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};

use crate::border::BorderSettings;

/// Outer padding around the grid in pixels
pub const GRID_PADDING: u32 = 2;

/// Gap between neighbouring cells in pixels
pub const GRID_GAP: u32 = 2;

/// Largest preview edge we are willing to allocate
pub const MAX_PREVIEW_DIMENSION: u32 = 8192;

const GAP_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Classification of a grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Border,
    Center,
}

/// One cell of the preview grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridCell {
    pub index: u32,
    pub row: u32,
    pub col: u32,
    pub kind: CellKind,
    /// Whether the uploaded image is painted into this cell
    pub shows_image: bool,
}

/// Grid geometry derived from [`BorderSettings`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    pub count_x: u32,
    pub count_y: u32,
    pub cell_size: u32,
    pub reversed: bool,
}

impl GridLayout {
    pub fn new(count_x: u32, count_y: u32, cell_size: u32, reversed: bool) -> Self {
        Self { count_x, count_y, cell_size, reversed }
    }

    pub fn from_settings(settings: &BorderSettings) -> Self {
        Self::new(settings.grid_count_x, settings.grid_count_y, settings.grid_size, settings.is_reversed)
    }

    /// Total number of cells
    pub fn cell_count(&self) -> u32 {
        self.count_x.saturating_mul(self.count_y)
    }

    /// Row and column of a cell, or `None` when the index is outside the grid
    pub fn position(&self, index: u32) -> Option<(u32, u32)> {
        if index >= self.cell_count() {
            return None;
        }
        Some((index / self.count_x, index % self.count_x))
    }

    /// A cell is a border cell iff it sits in the first/last row or column.
    pub fn is_border_cell(&self, index: u32) -> bool {
        match self.position(index) {
            Some((row, col)) => row == 0 || row == self.count_y - 1 || col == 0 || col == self.count_x - 1,
            None => false,
        }
    }

    pub fn kind(&self, index: u32) -> Option<CellKind> {
        self.position(index).map(|_| {
            if self.is_border_cell(index) {
                CellKind::Border
            } else {
                CellKind::Center
            }
        })
    }

    /// Reversed grids paint the image into the border, normal grids into the centre.
    pub fn shows_image(&self, index: u32) -> bool {
        match self.kind(index) {
            Some(CellKind::Border) => self.reversed,
            Some(CellKind::Center) => !self.reversed,
            None => false,
        }
    }

    pub fn cells(&self) -> impl Iterator<Item = GridCell> + '_ {
        (0..self.cell_count()).map(move |index| {
            let (row, col) = (index / self.count_x, index % self.count_x);
            let kind = if self.is_border_cell(index) { CellKind::Border } else { CellKind::Center };
            GridCell {
                index,
                row,
                col,
                kind,
                shows_image: self.shows_image(index),
            }
        })
    }

    /// Top-left pixel of a cell in the rendered preview
    pub fn cell_origin(&self, row: u32, col: u32) -> (u32, u32) {
        let stride = self.cell_size.saturating_add(GRID_GAP);
        let offset = |n: u32| GRID_PADDING.saturating_add(n.saturating_mul(stride));
        (offset(col), offset(row))
    }

    /// Pixel size of the rendered preview (padding, cells and gaps).
    /// Saturates at `u64::MAX` for absurd settings.
    pub fn pixel_size(&self) -> (u64, u64) {
        let span = |count: u32| {
            let count = count as u64;
            (2 * GRID_PADDING as u64)
                .saturating_add(count.saturating_mul(self.cell_size as u64))
                .saturating_add(count.saturating_sub(1).saturating_mul(GRID_GAP as u64))
        };
        (span(self.count_x), span(self.count_y))
    }

    /// Rasterize the preview.
    ///
    /// Image cells get `image` scaled to cover the cell and centre-cropped; without
    /// an image they fall back to `fill` like every other cell.
    pub fn render(&self, image: Option<&DynamicImage>, fill: [u8; 4]) -> Result<RgbaImage, GridError> {
        if self.cell_count() == 0 || self.cell_size == 0 {
            return Err(GridError::Empty);
        }
        let (width, height) = self.pixel_size();
        if width > MAX_PREVIEW_DIMENSION as u64 || height > MAX_PREVIEW_DIMENSION as u64 {
            return Err(GridError::TooLarge { width, height });
        }

        let mut canvas = RgbaImage::from_pixel(width as u32, height as u32, GAP_COLOR);
        let tile = image.and_then(|img| cover_tile(img, self.cell_size));
        let fill = Rgba(fill);

        for cell in self.cells() {
            let (x0, y0) = self.cell_origin(cell.row, cell.col);
            match (&tile, cell.shows_image) {
                (Some(tile), true) => imageops::replace(&mut canvas, tile, x0 as i64, y0 as i64),
                _ => {
                    for y in y0..y0 + self.cell_size {
                        for x in x0..x0 + self.cell_size {
                            canvas.put_pixel(x, y, fill);
                        }
                    }
                }
            }
        }

        Ok(canvas)
    }
}

/// Scale `image` so it covers a `size × size` square, then crop the centre
/// (CSS `background-size: cover; background-position: center`).
fn cover_tile(image: &DynamicImage, size: u32) -> Option<RgbaImage> {
    let (w, h) = (image.width(), image.height());
    if w == 0 || h == 0 || size == 0 {
        return None;
    }
    let scale = f64::max(size as f64 / w as f64, size as f64 / h as f64);
    let scaled_w = ((w as f64 * scale).ceil() as u32).max(size);
    let scaled_h = ((h as f64 * scale).ceil() as u32).max(size);
    let resized = imageops::resize(&image.to_rgba8(), scaled_w, scaled_h, FilterType::Triangle);
    let x = (scaled_w - size) / 2;
    let y = (scaled_h - size) / 2;
    Some(imageops::crop_imm(&resized, x, y, size, size).to_image())
}

/// Grid rendering errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    /// Zero columns, rows or cell size
    Empty,
    /// Preview would exceed [`MAX_PREVIEW_DIMENSION`]
    TooLarge { width: u64, height: u64 },
}

impl std::fmt::Display for GridError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GridError::Empty => write!(f, "Grid has no cells"),
            GridError::TooLarge { width, height } => {
                write!(f, "Grid preview {}x{} exceeds {}px", width, height, MAX_PREVIEW_DIMENSION)
            }
        }
    }
}

impl std::error::Error for GridError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corner_cells_are_border() {
        for x in 3..12 {
            for y in 2..9 {
                let grid = GridLayout::new(x, y, 10, false);
                assert!(grid.is_border_cell(0), "first cell of {}x{}", x, y);
                assert!(grid.is_border_cell(x * y - 1), "last cell of {}x{}", x, y);
            }
        }
    }

    #[test]
    fn test_default_grid_classification() {
        let grid = GridLayout::from_settings(&BorderSettings::default());
        assert_eq!(grid.cell_count(), 40);
        // 8x5: interior is 6x3
        let centers = grid.cells().filter(|c| c.kind == CellKind::Center).count();
        assert_eq!(centers, 18);
        assert_eq!(grid.position(9), Some((1, 1)));
        assert!(!grid.is_border_cell(9));
        assert!(grid.is_border_cell(8)); // row 1, col 0
        assert!(grid.is_border_cell(15)); // row 1, col 7
        assert!(grid.is_border_cell(33)); // last row
    }

    #[test]
    fn test_reverse_flips_image_cells() {
        let normal = GridLayout::new(4, 4, 10, false);
        let reversed = GridLayout::new(4, 4, 10, true);
        for i in 0..16 {
            assert_ne!(normal.shows_image(i), reversed.shows_image(i));
        }
        assert!(normal.shows_image(5));
        assert!(reversed.shows_image(0));
    }

    #[test]
    fn test_out_of_range_index() {
        let grid = GridLayout::new(3, 3, 10, false);
        assert_eq!(grid.position(9), None);
        assert!(!grid.is_border_cell(9));
        assert!(!grid.shows_image(9));

        let empty = GridLayout::new(0, 5, 10, false);
        assert_eq!(empty.cell_count(), 0);
        assert!(!empty.is_border_cell(0));
    }

    #[test]
    fn test_render_dimensions_and_fill() {
        let grid = GridLayout::new(3, 2, 10, false);
        let fill = [10, 20, 30, 255];
        let img = grid.render(None, fill).unwrap();
        // 2 + 3*10 + 2*2 + 2
        assert_eq!(img.width(), 38);
        assert_eq!(img.height(), 26);
        assert_eq!(img.get_pixel(0, 0), &GAP_COLOR);
        assert_eq!(img.get_pixel(2, 2), &Rgba(fill));
        assert_eq!(img.get_pixel(12, 2), &GAP_COLOR);
    }

    #[test]
    fn test_render_paints_image_into_center_only() {
        let grid = GridLayout::new(3, 3, 4, false);
        let red = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 2, Rgba([255, 0, 0, 255])));
        let fill = [0, 0, 255, 255];
        let img = grid.render(Some(&red), fill).unwrap();

        let (cx, cy) = grid.cell_origin(1, 1);
        assert_eq!(img.get_pixel(cx + 1, cy + 1), &Rgba([255, 0, 0, 255]));
        let (bx, by) = grid.cell_origin(0, 0);
        assert_eq!(img.get_pixel(bx + 1, by + 1), &Rgba(fill));
    }

    #[test]
    fn test_render_rejects_empty_and_huge() {
        assert_eq!(GridLayout::new(0, 3, 10, false).render(None, [0; 4]), Err(GridError::Empty));
        assert!(matches!(
            GridLayout::new(1000, 2, 60, false).render(None, [0; 4]),
            Err(GridError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_extreme_dimensions_do_not_overflow() {
        let grid = GridLayout::new(u32::MAX, u32::MAX, u32::MAX, false);
        assert_eq!(grid.pixel_size(), (u64::MAX, u64::MAX));
        assert_eq!(grid.cell_origin(u32::MAX, 1), (u32::MAX, u32::MAX));
        assert_eq!(
            grid.render(None, [0; 4]),
            Err(GridError::TooLarge { width: u64::MAX, height: u64::MAX })
        );
    }
}
