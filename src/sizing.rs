// nametag-pdf: nametag sizing inside a grid cell

use crate::geometry::{mm_to_pt, Rect};
use crate::model::{ExportConfig, SizeMode};

/// Drawn nametag size and its offset from the cell origin, in points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NametagSize {
    pub width: f32,
    pub height: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl NametagSize {
    /// Final rectangle on the page for a cell
    pub fn place_in(&self, cell: &Rect) -> Rect {
        Rect::new(
            cell.x + self.offset_x,
            cell.y + self.offset_y,
            self.width,
            self.height,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sizing {
    /// Fit the template aspect ratio inside the cell
    Grid,
    /// Fixed physical size in points
    Fixed { width: f32, height: f32 },
}

impl Sizing {
    pub fn from_config(config: &ExportConfig) -> Self {
        match config.size_mode {
            SizeMode::Grid => Sizing::Grid,
            SizeMode::Fixed => Sizing::Fixed {
                width: mm_to_pt(config.fixed_width_mm),
                height: mm_to_pt(config.fixed_height_mm),
            },
        }
    }

    /// Size a nametag with the given template aspect ratio (width / height)
    /// for a cell of `cell_width` x `cell_height` points.
    pub fn size(&self, cell_width: f32, cell_height: f32, aspect_ratio: f32) -> NametagSize {
        let (width, height) = match *self {
            // Fixed tags may overflow the cell on purpose
            Sizing::Fixed { width, height } => (width, height),
            Sizing::Grid => {
                let mut width = cell_width;
                let mut height = cell_width / aspect_ratio;
                if height > cell_height {
                    height = cell_height;
                    width = cell_height * aspect_ratio;
                }
                (width, height)
            }
        };

        NametagSize {
            width,
            height,
            offset_x: (cell_width - width) / 2.0,
            offset_y: (cell_height - height) / 2.0,
        }
    }
}
