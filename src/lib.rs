// nametag-pdf: lay out, composite and paginate printable name tags

pub mod assembler;
pub mod compositor;
pub mod error;
pub mod fonts;
pub mod geometry;
pub mod job;
pub mod model;
pub mod sizing;
pub mod writer;

use tracing::info;

pub use assembler::Placement;
pub use error::{ComposeError, RenderError};
pub use geometry::{estimate_page_count, Rect};
pub use model::{
    ExportConfig, FontOverrides, PaperSize, PersonRecord, RenderRequest, SizeMode,
    TemplateAsset, TemplateDesign, TextFieldSpec, TextStyle, WatermarkSpec,
};

use assembler::PageAssembler;
use compositor::Compositor;
use fonts::FontSet;
use geometry::PageGeometry;
use writer::DocumentWriter;

const DEFAULT_TITLE: &str = "Nametags";

/// A finished PDF plus where every slot landed
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub bytes: Vec<u8>,
    pub page_count: usize,
    pub placements: Vec<Placement>,
}

/// Render every person (and blank slot) onto grid pages.
///
/// Per-record problems leave their slot empty and are logged; only a
/// document that cannot be produced at all is an error.
pub fn render(request: &RenderRequest) -> Result<RenderedDocument, RenderError> {
    let fonts = FontSet::load(&request.fonts)?;
    let geometry = PageGeometry::resolve(&request.export);
    let watermark = request.watermark.active_text();

    let title = match request.title.trim() {
        "" => DEFAULT_TITLE,
        title => title,
    };
    let mut writer = DocumentWriter::new(title, geometry.paper);
    if watermark.is_some() {
        writer.load_watermark_font(&fonts.regular)?;
    }

    let compositor = Compositor::new(
        &fonts,
        &request.text_fields,
        request.role_column.as_deref(),
        &request.role_colors,
    );
    let assembler = PageAssembler::new(
        geometry,
        &request.export,
        compositor,
        &request.templates,
        watermark,
    );
    let report = assembler.assemble(&mut writer, &request.persons, &request.export)?;
    let bytes = writer.finish()?;

    info!(
        "Rendered {} slot(s) onto {} page(s) ({} bytes)",
        report.placements.len(),
        report.page_count,
        bytes.len()
    );

    Ok(RenderedDocument {
        bytes,
        page_count: report.page_count,
        placements: report.placements,
    })
}
