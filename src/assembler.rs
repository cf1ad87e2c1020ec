// nametag-pdf: page assembly
//
// Walks the slots in order (persons first, then blank slots), opening a
// new page whenever the slot index crosses a grid boundary. The page in
// progress is owned by `PageState::Open`; it is watermarked and finished
// before the next one opens, and dropped on any early return.

use std::collections::HashMap;

use ::image::RgbImage;
use tracing::{debug, warn};

use crate::compositor::{raster_size, Compositor};
use crate::error::RenderError;
use crate::geometry::{PageGeometry, Rect};
use crate::model::{ExportConfig, PersonRecord, TemplateAsset};
use crate::sizing::Sizing;

// ============================================================================
// Watermark Tiling
// ============================================================================

pub const WATERMARK_ORIGIN: (f32, f32) = (50.0, 100.0);
pub const WATERMARK_STEP_X: f32 = 200.0;
pub const WATERMARK_STEP_Y: f32 = 150.0;

/// Tile anchors for a page, bottom row first, left to right
pub fn watermark_tiles(page_width: f32, page_height: f32) -> Vec<(f32, f32)> {
    let mut tiles = Vec::new();
    let mut y = WATERMARK_ORIGIN.1;
    while y < page_height {
        let mut x = WATERMARK_ORIGIN.0;
        while x < page_width {
            tiles.push((x, y));
            x += WATERMARK_STEP_X;
        }
        y += WATERMARK_STEP_Y;
    }
    tiles
}

// ============================================================================
// Page Sink
// ============================================================================

/// Something that can hand out pages in order.
pub trait PageSink {
    type Page: PageCanvas;

    fn open_page(&mut self, index: usize) -> Result<Self::Page, RenderError>;
}

/// One open page. Dropping it releases the page without a watermark.
pub trait PageCanvas {
    fn place_nametag(&mut self, raster: &RgbImage, rect: &Rect) -> Result<(), RenderError>;

    /// Stamp one watermark tile at (x, y) points
    fn stamp_tile(&mut self, text: &str, x: f32, y: f32) -> Result<(), RenderError>;
}

enum PageState<P> {
    NoPage,
    Open { page: P, index: usize },
    Closed,
    Done,
}

impl<P: PageCanvas> PageState<P> {
    /// Finish the open page, if any
    fn close(self, watermark: Option<&str>, tiles: &[(f32, f32)]) -> Self {
        match self {
            PageState::Open { mut page, index } => {
                if let Some(text) = watermark {
                    stamp_watermark(&mut page, text, tiles);
                }
                debug!("Closed page {}", index + 1);
                PageState::Closed
            }
            other => other,
        }
    }

    /// Close whatever is still open; no page can follow
    fn finish(self, watermark: Option<&str>, tiles: &[(f32, f32)]) -> Self {
        drop(self.close(watermark, tiles));
        PageState::Done
    }
}

/// Tiles that fail are skipped one by one; the page carries on.
fn stamp_watermark<P: PageCanvas>(page: &mut P, text: &str, tiles: &[(f32, f32)]) {
    for &(x, y) in tiles {
        if let Err(e) = page.stamp_tile(text, x, y) {
            debug!("Watermark tile at ({}, {}) skipped: {}", x, y, e);
        }
    }
}

// ============================================================================
// Slots
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Slot<'a> {
    Person(&'a PersonRecord),
    /// Reserved cell showing its template without text
    Blank(Option<&'a TemplateAsset>),
}

/// Where one slot ended up
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub slot: usize,
    pub page: usize,
    pub col: usize,
    pub row: usize,
    /// `None` for blank slots
    pub person_id: Option<String>,
    pub template_id: Option<String>,
    /// Drawn rectangle in points; `None` when no template resolved
    pub rect: Option<Rect>,
    pub drawn: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AssemblyReport {
    pub page_count: usize,
    pub placements: Vec<Placement>,
}

// ============================================================================
// Assembler
// ============================================================================

pub struct PageAssembler<'a> {
    geometry: PageGeometry,
    sizing: Sizing,
    compositor: Compositor<'a>,
    templates: &'a [TemplateAsset],
    by_id: HashMap<&'a str, &'a TemplateAsset>,
    watermark: Option<&'a str>,
}

impl<'a> PageAssembler<'a> {
    pub fn new(
        geometry: PageGeometry,
        config: &ExportConfig,
        compositor: Compositor<'a>,
        templates: &'a [TemplateAsset],
        watermark: Option<&'a str>,
    ) -> Self {
        let by_id = templates.iter().map(|t| (t.id.as_str(), t)).collect();
        Self {
            geometry,
            sizing: Sizing::from_config(config),
            compositor,
            templates,
            by_id,
            watermark,
        }
    }

    /// The person's assigned template, else the first one supplied
    fn template_for(&self, person: &PersonRecord) -> Option<&'a TemplateAsset> {
        person
            .template_id
            .as_deref()
            .and_then(|id| self.by_id.get(id).copied())
            .or_else(|| self.templates.first())
    }

    /// Blank slots in template order. Counts for unknown template ids, and
    /// a plain blank count, use the first template.
    fn blank_slots(&self, config: &ExportConfig) -> Vec<Slot<'a>> {
        let first = self.templates.first();
        if config.blank_pages_per_template.is_empty() {
            return vec![Slot::Blank(first); config.blank_pages as usize];
        }

        let mut slots = Vec::with_capacity(config.blank_slot_count());
        for template in self.templates {
            if let Some(count) = config.blank_pages_per_template.get(&template.id) {
                slots.extend(std::iter::repeat(Slot::Blank(Some(template))).take(*count as usize));
            }
        }
        for (id, count) in &config.blank_pages_per_template {
            if !self.by_id.contains_key(id.as_str()) {
                slots.extend(std::iter::repeat(Slot::Blank(first)).take(*count as usize));
            }
        }
        slots
    }

    pub fn assemble<S: PageSink>(
        &self,
        sink: &mut S,
        persons: &'a [PersonRecord],
        config: &ExportConfig,
    ) -> Result<AssemblyReport, RenderError> {
        let slots: Vec<Slot<'a>> = persons
            .iter()
            .map(Slot::Person)
            .chain(self.blank_slots(config))
            .collect();

        let per_page = self.geometry.per_page();
        let tiles = watermark_tiles(self.geometry.page_width, self.geometry.page_height);
        let mut report = AssemblyReport::default();
        let mut state: PageState<S::Page> = PageState::NoPage;

        for (i, slot) in slots.iter().enumerate() {
            let pos = i % per_page;

            state = match state {
                PageState::Open { page, index } if pos != 0 => PageState::Open { page, index },
                previous => {
                    let _closed = previous.close(self.watermark, &tiles);
                    let index = report.page_count;
                    let page = sink.open_page(index)?;
                    report.page_count += 1;
                    debug!("Opened page {}", index + 1);
                    PageState::Open { page, index }
                }
            };

            if let PageState::Open { page, index } = &mut state {
                let placement = self.place_slot(page, *index, i, pos, *slot)?;
                report.placements.push(placement);
            }
        }

        state = state.finish(self.watermark, &tiles);
        debug_assert!(matches!(state, PageState::Done));
        debug!("Assembled {} page(s)", report.page_count);

        Ok(report)
    }

    fn place_slot<P: PageCanvas>(
        &self,
        page: &mut P,
        page_index: usize,
        slot_index: usize,
        pos: usize,
        slot: Slot<'a>,
    ) -> Result<Placement, RenderError> {
        let (col, row) = self.geometry.grid_position(pos);
        let cell = self.geometry.cell(pos);

        let (person, template) = match slot {
            Slot::Person(person) => (Some(person), self.template_for(person)),
            Slot::Blank(template) => (None, template),
        };

        let mut placement = Placement {
            slot: slot_index,
            page: page_index,
            col,
            row,
            person_id: person.map(|p| p.id.clone()),
            template_id: template.map(|t| t.id.clone()),
            rect: None,
            drawn: false,
        };

        let Some(template) = template else {
            debug!("Slot {} has no template, left blank", slot_index);
            return Ok(placement);
        };

        let size = self
            .sizing
            .size(cell.width, cell.height, template.aspect_ratio());
        let rect = size.place_in(&cell);
        placement.rect = Some(rect);

        let (width_px, height_px) = raster_size(&size);
        match self.compositor.compose(person, Some(template), width_px, height_px) {
            Ok(Some(raster)) => {
                page.place_nametag(&raster, &rect)?;
                placement.drawn = true;
            }
            Ok(None) => {}
            Err(e) => warn!(
                "Nametag for slot {} ({}) skipped: {}",
                slot_index,
                person.map(|p| p.id.as_str()).unwrap_or("blank"),
                e
            ),
        }

        Ok(placement)
    }
}
