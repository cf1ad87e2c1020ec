// nametag-pdf: PDF document writer
//
// Owns the printpdf document. Pages are handed out to the assembler as
// `WriterPage` values; the document itself is only serialized once every
// page handle is gone.

use ::image::RgbImage;
use printpdf::*;
use tracing::{debug, warn};

use crate::assembler::{PageCanvas, PageSink};
use crate::error::RenderError;
use crate::fonts::Face;
use crate::geometry::{pt_to_mm, Rect};
use crate::model::PaperSize;

// ============================================================================
// Constants
// ============================================================================

/// Watermark text size in points
pub const WATERMARK_FONT_SIZE: f32 = 40.0;

/// Watermark fill, light gray standing in for translucency
const WATERMARK_GRAY: f32 = 0.8;

// ============================================================================
// Watermark Font
// ============================================================================

#[derive(Clone)]
enum WatermarkFont {
    /// Embedded TrueType face, checked glyph by glyph
    Embedded { font: IndirectFontRef, face: Face },
    /// Standard Helvetica, WinAnsi encoded
    Builtin(IndirectFontRef),
}

impl WatermarkFont {
    fn font_ref(&self) -> &IndirectFontRef {
        match self {
            WatermarkFont::Embedded { font, .. } => font,
            WatermarkFont::Builtin(font) => font,
        }
    }

    fn covers(&self, ch: char) -> bool {
        match self {
            WatermarkFont::Embedded { face, .. } => face.covers(ch),
            WatermarkFont::Builtin(_) => (ch as u32) < 0x100 && !ch.is_control(),
        }
    }

    /// Every visible character must be drawable, and there must be one
    fn can_draw(&self, text: &str) -> bool {
        let mut visible = text.chars().filter(|c| !c.is_whitespace()).peekable();
        visible.peek().is_some() && visible.all(|c| self.covers(c))
    }
}

// ============================================================================
// Document Writer
// ============================================================================

pub struct DocumentWriter {
    doc: PdfDocumentReference,
    page_width_mm: f32,
    page_height_mm: f32,
    watermark_font: Option<WatermarkFont>,
}

impl DocumentWriter {
    pub fn new(title: &str, paper: PaperSize) -> Self {
        let conformance = PdfConformance::Custom(CustomPdfConformance {
            requires_icc_profile: false,
            requires_xmp_metadata: false,
            ..Default::default()
        });
        let doc = PdfDocument::empty(title).with_conformance(conformance);
        let (page_width_mm, page_height_mm) = paper.dimensions_mm();

        Self {
            doc,
            page_width_mm,
            page_height_mm,
            watermark_font: None,
        }
    }

    /// Embed the face used for watermark text. Falls back to Helvetica when
    /// the face cannot be embedded.
    pub fn load_watermark_font(&mut self, face: &Face) -> Result<(), RenderError> {
        let font = match self.doc.add_external_font(face.bytes.as_slice()) {
            Ok(font) => WatermarkFont::Embedded {
                font,
                face: face.clone(),
            },
            Err(e) => {
                warn!("Could not embed watermark font, using Helvetica: {}", e);
                let font = self
                    .doc
                    .add_builtin_font(BuiltinFont::Helvetica)
                    .map_err(|e| RenderError::FontError(e.to_string()))?;
                WatermarkFont::Builtin(font)
            }
        };
        self.watermark_font = Some(font);
        Ok(())
    }

    /// Serialize the finished document
    pub fn finish(self) -> Result<Vec<u8>, RenderError> {
        self.doc
            .save_to_bytes()
            .map_err(|e| RenderError::PdfError(e.to_string()))
    }
}

impl PageSink for DocumentWriter {
    type Page = WriterPage;

    fn open_page(&mut self, index: usize) -> Result<WriterPage, RenderError> {
        let (page, layer) = self.doc.add_page(
            Mm(self.page_width_mm),
            Mm(self.page_height_mm),
            format!("Page {}", index + 1),
        );
        Ok(WriterPage {
            layer: self.doc.get_page(page).get_layer(layer),
            watermark_font: self.watermark_font.clone(),
        })
    }
}

// ============================================================================
// Pages
// ============================================================================

pub struct WriterPage {
    layer: PdfLayerReference,
    watermark_font: Option<WatermarkFont>,
}

impl PageCanvas for WriterPage {
    fn place_nametag(&mut self, raster: &RgbImage, rect: &Rect) -> Result<(), RenderError> {
        let (width_px, height_px) = raster.dimensions();
        let width_mm = pt_to_mm(rect.width);

        let image = Image::from(ImageXObject {
            width: Px(width_px as usize),
            height: Px(height_px as usize),
            color_space: ColorSpace::Rgb,
            bits_per_component: ColorBits::Bit8,
            interpolate: true,
            image_data: raster.as_raw().clone(),
            image_filter: None,
            clipping_bbox: None,
            smask: None,
        });

        // DPI sets the width; rounding the raster can skew the height a
        // little, so scale it back onto the rect.
        let dpi = width_px as f32 / (width_mm / 25.4);
        let natural_height = Px(height_px as usize).into_pt(dpi).0;
        let scale_y = if natural_height > 0.0 {
            rect.height / natural_height
        } else {
            1.0
        };

        image.add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(Mm(pt_to_mm(rect.x))),
                translate_y: Some(Mm(pt_to_mm(rect.y))),
                scale_y: Some(scale_y),
                dpi: Some(dpi),
                ..Default::default()
            },
        );

        Ok(())
    }

    fn stamp_tile(&mut self, text: &str, x: f32, y: f32) -> Result<(), RenderError> {
        let font = self
            .watermark_font
            .as_ref()
            .ok_or_else(|| RenderError::FontError("no watermark font loaded".into()))?;

        if !font.can_draw(text) {
            return Err(RenderError::FontError(format!(
                "font has no glyphs for {:?}",
                text
            )));
        }

        self.layer.save_graphics_state();
        self.layer.set_fill_color(Color::Rgb(Rgb::new(
            WATERMARK_GRAY,
            WATERMARK_GRAY,
            WATERMARK_GRAY,
            None,
        )));
        self.layer.use_text(
            text,
            WATERMARK_FONT_SIZE,
            Mm(pt_to_mm(x)),
            Mm(pt_to_mm(y)),
            font.font_ref(),
        );
        self.layer.restore_graphics_state();
        Ok(())
    }
}

impl Drop for WriterPage {
    fn drop(&mut self) {
        debug!("Released page layer");
    }
}
