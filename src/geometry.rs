// nametag-pdf: page geometry
//
// All output is in PDF points with the origin at the bottom-left corner.
// Callers must pick margin and gap values that leave a positive cell area;
// nothing here clamps negative cell sizes.

use crate::model::{ExportConfig, PaperSize};

// ============================================================================
// Constants
// ============================================================================

/// 1 mm in PDF points
pub const MM_TO_POINTS: f32 = 2.83465;

/// Layout used whenever the configured one cannot be parsed
pub const DEFAULT_LAYOUT: (usize, usize) = (2, 2);

pub fn mm_to_pt(mm: f32) -> f32 {
    mm * MM_TO_POINTS
}

pub fn pt_to_mm(pt: f32) -> f32 {
    pt / MM_TO_POINTS
}

// ============================================================================
// Rectangles
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }
}

// ============================================================================
// Grid
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub paper: PaperSize,
    pub page_width: f32,
    pub page_height: f32,
    pub margin: f32,
    pub cols: usize,
    pub rows: usize,
    pub cell_width: f32,
    pub cell_height: f32,
    pub grid_gap: f32,
}

impl PageGeometry {
    pub fn resolve(config: &ExportConfig) -> Self {
        let paper = config.paper_size;
        let (width_mm, height_mm) = paper.dimensions_mm();
        let page_width = mm_to_pt(width_mm);
        let page_height = mm_to_pt(height_mm);
        let margin = mm_to_pt(config.margin_mm);
        let grid_gap = mm_to_pt(config.grid_gap_mm);
        let (cols, rows) = parse_layout(&config.layout);

        let cell_width = cell_extent(page_width, margin, grid_gap, cols);
        let cell_height = cell_extent(page_height, margin, grid_gap, rows);

        Self {
            paper,
            page_width,
            page_height,
            margin,
            cols,
            rows,
            cell_width,
            cell_height,
            grid_gap,
        }
    }

    pub fn per_page(&self) -> usize {
        self.cols * self.rows
    }

    /// (col, row) of a position on the page; row 0 is the top row
    pub fn grid_position(&self, pos: usize) -> (usize, usize) {
        (pos % self.cols, pos / self.cols)
    }

    /// Bottom-left corner of the cell at position `pos` within a page
    pub fn cell_origin(&self, pos: usize) -> (f32, f32) {
        let (col, row) = self.grid_position(pos);
        let x = self.margin + col as f32 * (self.cell_width + self.grid_gap);
        let y = self.page_height
            - self.margin
            - (row as f32 + 1.0) * self.cell_height
            - row as f32 * self.grid_gap;
        (x, y)
    }

    pub fn cell(&self, pos: usize) -> Rect {
        let (x, y) = self.cell_origin(pos);
        Rect::new(x, y, self.cell_width, self.cell_height)
    }

    pub fn page_count(&self, slots: usize) -> usize {
        slots.div_ceil(self.per_page())
    }
}

fn cell_extent(page: f32, margin: f32, gap: f32, count: usize) -> f32 {
    (page - 2.0 * margin - gap * (count as f32 - 1.0)) / count as f32
}

/// Parse "<cols>x<rows>". Anything else, including zero dimensions,
/// yields the 2x2 default.
pub fn parse_layout(layout: &str) -> (usize, usize) {
    let parts: Vec<&str> = layout.trim().split('x').collect();
    if parts.len() != 2 {
        return DEFAULT_LAYOUT;
    }
    match (parts[0].trim().parse::<usize>(), parts[1].trim().parse::<usize>()) {
        (Ok(cols), Ok(rows)) if cols >= 1 && rows >= 1 => (cols, rows),
        _ => DEFAULT_LAYOUT,
    }
}

/// Page count the caller can announce before rendering: persons plus
/// blank slots over the grid capacity.
pub fn estimate_page_count(person_count: usize, config: &ExportConfig) -> usize {
    PageGeometry::resolve(config).page_count(person_count + config.blank_slot_count())
}
