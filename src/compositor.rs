// nametag-pdf: nametag compositing
//
// Renders one nametag as an RGB raster: a background (built-in card design
// or a decoded template image) with the person's text fields on top. Card
// shapes are painted with tiny-skia; glyphs come from rusttype and are
// blended by coverage onto the finished background.

use std::collections::HashMap;

use ::image::{imageops, imageops::FilterType, Rgb, RgbImage, Rgba};
use rusttype::{point, Scale};
use tiny_skia::{
    Color, FillRule, GradientStop, LinearGradient, Paint, Path, PathBuilder, Pixmap, Point,
    Rect as SkRect, SpreadMode, Stroke, Transform,
};
use tracing::warn;

use crate::error::ComposeError;
use crate::fonts::{Face, FontSet};
use crate::geometry::{pt_to_mm, MM_TO_POINTS};
use crate::model::{PersonRecord, TemplateAsset, TemplateDesign, TextFieldSpec};
use crate::sizing::NametagSize;

// ============================================================================
// Constants
// ============================================================================

/// Raster resolution: 10 px per mm, roughly 254 dpi
pub const PX_PER_MM: f32 = 10.0;

/// Longest raster side we are willing to allocate
const MAX_RASTER_SIDE: u32 = 10_000;

/// Width of the editor preview the built-in design was laid out against
const PREVIEW_WIDTH: f32 = 400.0;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

/// Built-in design palette
const GRADIENT_FROM: Rgb<u8> = Rgb([248, 250, 252]);
const GRADIENT_TO: Rgb<u8> = Rgb([226, 232, 240]);
const CARD_BORDER: Rgb<u8> = Rgb([203, 213, 225]);
const DEFAULT_HEADER: Rgb<u8> = Rgb([59, 130, 246]);
const DIVIDER: Rgb<u8> = Rgb([226, 232, 240]);
const FOOTER_TEXT: Rgb<u8> = Rgb([148, 163, 184]);

/// Bezier control offset for a quarter circle, as a fraction of the radius
const CORNER_KAPPA: f32 = 0.552_284_8;

const HEADER_CAPTION: &str = "NAME TAG";
const FOOTER_CAPTION: &str = "Company / Organization";

/// Pixel dimensions of the raster for a drawn nametag size in points
pub fn raster_size(size: &NametagSize) -> (u32, u32) {
    let to_px = |pt: f32| (pt_to_mm(pt) * PX_PER_MM).round().max(1.0) as u32;
    (to_px(size.width), to_px(size.height))
}

/// Parse "#rrggbb" or "#rgb"
pub fn parse_hex_color(value: &str) -> Option<Rgb<u8>> {
    let hex = value.trim().strip_prefix('#')?;
    if !hex.is_ascii() {
        return None;
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        6 => Some(Rgb([
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
        ])),
        3 => {
            let short = |s: &str| channel(s).map(|v| v * 17);
            Some(Rgb([short(&hex[0..1])?, short(&hex[1..2])?, short(&hex[2..3])?]))
        }
        _ => None,
    }
}

// ============================================================================
// Compositor
// ============================================================================

pub struct Compositor<'a> {
    fonts: &'a FontSet,
    text_fields: &'a [TextFieldSpec],
    role_column: Option<&'a str>,
    role_colors: &'a HashMap<String, String>,
}

impl<'a> Compositor<'a> {
    pub fn new(
        fonts: &'a FontSet,
        text_fields: &'a [TextFieldSpec],
        role_column: Option<&'a str>,
        role_colors: &'a HashMap<String, String>,
    ) -> Self {
        Self {
            fonts,
            text_fields,
            role_column,
            role_colors,
        }
    }

    /// Compose one nametag. `Ok(None)` means there was nothing to draw
    /// (no template). A missing person draws the template without text.
    pub fn compose(
        &self,
        person: Option<&PersonRecord>,
        template: Option<&TemplateAsset>,
        width: u32,
        height: u32,
    ) -> Result<Option<RgbImage>, ComposeError> {
        let Some(template) = template else {
            return Ok(None);
        };
        if width == 0 || height == 0 {
            return Err(ComposeError::InvalidSize { width, height });
        }
        if width > MAX_RASTER_SIDE || height > MAX_RASTER_SIDE {
            return Err(ComposeError::TooLarge { width, height });
        }

        let mut canvas = match &template.design {
            TemplateDesign::Builtin => self.draw_builtin(width, height, self.header_color(person))?,
            TemplateDesign::Custom(bytes) => template_background(&template.id, bytes, width, height),
        };

        if let Some(person) = person {
            self.draw_text_fields(&mut canvas, person);
        }

        Ok(Some(canvas))
    }

    fn header_color(&self, person: Option<&PersonRecord>) -> Rgb<u8> {
        person
            .zip(self.role_column)
            .and_then(|(person, column)| person.value(column))
            .and_then(|role| self.role_colors.get(role))
            .and_then(|color| parse_hex_color(color))
            .unwrap_or(DEFAULT_HEADER)
    }

    fn draw_builtin(&self, width: u32, height: u32, header_color: Rgb<u8>) -> Result<RgbImage, ComposeError> {
        let mut pixmap = Pixmap::new(width, height).ok_or(ComposeError::InvalidSize { width, height })?;
        let (w, h) = (width as f32, height as f32);

        let background = LinearGradient::new(
            Point::from_xy(0.0, 0.0),
            Point::from_xy(w, h),
            vec![
                GradientStop::new(0.0, skia_color(GRADIENT_FROM)),
                GradientStop::new(1.0, skia_color(GRADIENT_TO)),
            ],
            SpreadMode::Pad,
            Transform::identity(),
        );
        match (background, SkRect::from_xywh(0.0, 0.0, w, h)) {
            (Some(shader), Some(full)) => {
                let paint = Paint {
                    shader,
                    anti_alias: true,
                    ..Paint::default()
                };
                pixmap.fill_rect(full, &paint, Transform::identity(), None);
            }
            _ => pixmap.fill(skia_color(GRADIENT_FROM)),
        }

        // Card inset by 3% of the smaller side
        let padding = w.min(h) * 0.03;
        let Some(card) = SkRect::from_xywh(padding, padding, w - padding * 2.0, h - padding * 2.0) else {
            return Ok(pixmap_to_rgb(&pixmap));
        };
        let radius = card.width().min(card.height()) * 0.05;

        if let Some(outline) = rounded_rect(card, radius, true) {
            pixmap.fill_path(&outline, &solid(WHITE), FillRule::Winding, Transform::identity(), None);
            let border = Stroke {
                width: 2.0,
                ..Stroke::default()
            };
            pixmap.stroke_path(&outline, &solid(CARD_BORDER), &border, Transform::identity(), None);
        }

        // Header band: rounded on top, square along the bottom edge
        let header_height = card.height() * 0.22;
        if let Some(header) = SkRect::from_xywh(card.x(), card.y(), card.width(), header_height)
            .and_then(|rect| rounded_rect(rect, radius, false))
        {
            pixmap.fill_path(&header, &solid(header_color), FillRule::Winding, Transform::identity(), None);
        }

        // Footer divider
        let line_y = card.y() + card.height() * 0.82;
        if let Some(divider) = SkRect::from_xywh(card.x() + card.width() * 0.1, line_y - 1.0, card.width() * 0.8, 2.0) {
            pixmap.fill_rect(divider, &solid(DIVIDER), Transform::identity(), None);
        }

        let mut canvas = pixmap_to_rgb(&pixmap);
        let center_x = card.x() + card.width() / 2.0;

        let caption_px = (card.width() * 0.08).min(header_height * 0.5);
        draw_text_centered(
            &mut canvas,
            self.fonts.face(true),
            caption_px,
            center_x,
            card.y() + header_height / 2.0,
            WHITE,
            HEADER_CAPTION,
        );

        let scale = w / PREVIEW_WIDTH;
        let footer_px = (card.width() * 0.045).min(12.0 * scale);
        draw_text_centered(
            &mut canvas,
            self.fonts.face(false),
            footer_px,
            center_x,
            line_y + card.height() * 0.08,
            FOOTER_TEXT,
            FOOTER_CAPTION,
        );

        Ok(canvas)
    }

    fn draw_text_fields(&self, canvas: &mut RgbImage, person: &PersonRecord) {
        let width = canvas.width() as f32;
        let height = canvas.height() as f32;

        for field in self.text_fields {
            let Some(text) = person.value(&field.column) else {
                continue;
            };

            let face = self.fonts.face(field.style.is_bold());
            let color = field
                .style
                .color
                .as_deref()
                .and_then(parse_hex_color)
                .unwrap_or(BLACK);
            let px = points_to_pixels(field.style.font_size);

            draw_text_centered(
                canvas,
                face,
                px,
                width * field.x / 100.0,
                height * field.y / 100.0,
                color,
                text,
            );
        }
    }
}

/// Font size in points to raster pixels
fn points_to_pixels(points: f32) -> f32 {
    points / MM_TO_POINTS * PX_PER_MM
}

/// Decode a template image scaled to exactly `width` x `height`, flattened
/// onto white. Unreadable images degrade to a plain white background.
fn template_background(template_id: &str, bytes: &[u8], width: u32, height: u32) -> RgbImage {
    let decoded = match ::image::load_from_memory(bytes) {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!("Template {} image unreadable, using white background: {}", template_id, e);
            return RgbImage::from_pixel(width, height, WHITE);
        }
    };

    let scaled = imageops::resize(&decoded.to_rgba8(), width, height, FilterType::Triangle);

    let mut canvas = RgbImage::new(width, height);
    for (x, y, pixel) in scaled.enumerate_pixels() {
        let Rgba([r, g, b, a]) = *pixel;
        let alpha = a as f32 / 255.0;
        let over_white = |c: u8| (c as f32 * alpha + 255.0 * (1.0 - alpha)).round() as u8;
        canvas.put_pixel(x, y, Rgb([over_white(r), over_white(g), over_white(b)]));
    }
    canvas
}

// ============================================================================
// Drawing Primitives
// ============================================================================

fn skia_color(color: Rgb<u8>) -> Color {
    Color::from_rgba8(color.0[0], color.0[1], color.0[2], 255)
}

fn solid(color: Rgb<u8>) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.0[0], color.0[1], color.0[2], 255);
    paint.anti_alias = true;
    paint
}

/// Rectangle with circular corners. The bottom corners stay square unless
/// `round_bottom` is set.
fn rounded_rect(rect: SkRect, radius: f32, round_bottom: bool) -> Option<Path> {
    let r = radius.min(rect.width() / 2.0).min(rect.height() / 2.0).max(0.0);
    let k = r * CORNER_KAPPA;
    let (left, top, right, bottom) = (rect.left(), rect.top(), rect.right(), rect.bottom());

    let mut pb = PathBuilder::new();
    pb.move_to(left + r, top);
    pb.line_to(right - r, top);
    pb.cubic_to(right - r + k, top, right, top + r - k, right, top + r);
    if round_bottom {
        pb.line_to(right, bottom - r);
        pb.cubic_to(right, bottom - r + k, right - r + k, bottom, right - r, bottom);
        pb.line_to(left + r, bottom);
        pb.cubic_to(left + r - k, bottom, left, bottom - r + k, left, bottom - r);
    } else {
        pb.line_to(right, bottom);
        pb.line_to(left, bottom);
    }
    pb.line_to(left, top + r);
    pb.cubic_to(left, top + r - k, left + r - k, top, left + r, top);
    pb.close();
    pb.finish()
}

/// Every pixel of the card is opaque, so dropping alpha loses nothing
fn pixmap_to_rgb(pixmap: &Pixmap) -> RgbImage {
    let mut canvas = RgbImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in canvas.pixels_mut().zip(pixmap.pixels()) {
        let color = src.demultiply();
        *dst = Rgb([color.red(), color.green(), color.blue()]);
    }
    canvas
}

/// Advance width of `text` at `px` pixels, kerning included
fn measure_text(face: &Face, px: f32, text: &str) -> f32 {
    let scale = Scale::uniform(px);
    face.font
        .layout(text, scale, point(0.0, 0.0))
        .last()
        .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
        .unwrap_or(0.0)
}

/// Draw `text` centered on (cx, cy), horizontally by advance width and
/// vertically between ascent and descent.
fn draw_text_centered(
    canvas: &mut RgbImage,
    face: &Face,
    px: f32,
    cx: f32,
    cy: f32,
    color: Rgb<u8>,
    text: &str,
) {
    if px <= 0.0 || text.is_empty() {
        return;
    }
    let scale = Scale::uniform(px);
    let v_metrics = face.font.v_metrics(scale);
    let width = measure_text(face, px, text);
    let origin = point(cx - width / 2.0, cy + (v_metrics.ascent + v_metrics.descent) / 2.0);

    let (canvas_w, canvas_h) = (canvas.width() as i32, canvas.height() as i32);
    for glyph in face.font.layout(text, scale, origin) {
        let Some(bb) = glyph.pixel_bounding_box() else {
            continue;
        };
        glyph.draw(|gx, gy, coverage| {
            let x = gx as i32 + bb.min.x;
            let y = gy as i32 + bb.min.y;
            if x < 0 || y < 0 || x >= canvas_w || y >= canvas_h {
                return;
            }
            if coverage <= 0.0 {
                return;
            }
            let coverage = coverage.min(1.0);
            let dst = canvas.get_pixel_mut(x as u32, y as u32);
            for i in 0..3 {
                let mixed = color.0[i] as f32 * coverage + dst.0[i] as f32 * (1.0 - coverage);
                dst.0[i] = mixed.round() as u8;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FontOverrides, TextStyle};
    use ::image::{DynamicImage, ImageFormat};
    use std::io::Cursor;

    fn fonts() -> FontSet {
        FontSet::load(&FontOverrides::default()).unwrap()
    }

    fn png_bytes(color: Rgb<u8>) -> Vec<u8> {
        let img = RgbImage::from_pixel(30, 20, color);
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn name_field() -> TextFieldSpec {
        TextFieldSpec {
            column: "Name".into(),
            x: 50.0,
            y: 50.0,
            style: TextStyle {
                font_size: 24.0,
                font_weight: 700,
                color: Some("#000000".into()),
                ..Default::default()
            },
        }
    }

    fn dark_pixels(img: &RgbImage) -> usize {
        img.pixels().filter(|p| p.0.iter().all(|c| *c < 100)).count()
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#3b82f6"), Some(Rgb([59, 130, 246])));
        assert_eq!(parse_hex_color("#FFF"), Some(Rgb([255, 255, 255])));
        assert_eq!(parse_hex_color("3b82f6"), None);
        assert_eq!(parse_hex_color("#12345"), None);
        assert_eq!(parse_hex_color("#gg0000"), None);
        assert_eq!(parse_hex_color("red"), None);
    }

    #[test]
    fn test_raster_size_is_ten_px_per_mm() {
        let size = NametagSize {
            width: 90.0 * MM_TO_POINTS,
            height: 55.0 * MM_TO_POINTS,
            offset_x: 0.0,
            offset_y: 0.0,
        };
        assert_eq!(raster_size(&size), (900, 550));

        let tiny = NametagSize {
            width: 0.01,
            height: 0.01,
            offset_x: 0.0,
            offset_y: 0.0,
        };
        assert_eq!(raster_size(&tiny), (1, 1));
    }

    #[test]
    fn test_no_template_draws_nothing() {
        let fonts = fonts();
        let colors = HashMap::new();
        let compositor = Compositor::new(&fonts, &[], None, &colors);
        let person = PersonRecord::new("p1", [("Name", "Ada")]);
        assert!(compositor.compose(Some(&person), None, 100, 60).unwrap().is_none());
    }

    #[test]
    fn test_invalid_sizes_are_errors() {
        let fonts = fonts();
        let colors = HashMap::new();
        let compositor = Compositor::new(&fonts, &[], None, &colors);
        let template = TemplateAsset::builtin("default-template", 900, 550);
        assert!(compositor.compose(None, Some(&template), 0, 10).is_err());
        assert!(compositor.compose(None, Some(&template), 20_000, 10).is_err());
    }

    #[test]
    fn test_builtin_design() {
        let fonts = fonts();
        let colors = HashMap::new();
        let compositor = Compositor::new(&fonts, &[], None, &colors);
        let template = TemplateAsset::builtin("default-template", 900, 550);
        let img = compositor.compose(None, Some(&template), 400, 300).unwrap().unwrap();
        assert_eq!(img.dimensions(), (400, 300));

        // Outer corner shows the gradient start tone
        let corner = img.get_pixel(0, 0);
        for i in 0..3 {
            assert!((corner.0[i] as i32 - GRADIENT_FROM.0[i] as i32).abs() <= 1);
        }
        // Far corner shows the end tone
        let far = img.get_pixel(399, 299);
        for i in 0..3 {
            assert!((far.0[i] as i32 - GRADIENT_TO.0[i] as i32).abs() <= 1);
        }
        // Left part of the header band, clear of the caption
        assert_eq!(*img.get_pixel(40, 40), DEFAULT_HEADER);
        // Card body between header and footer
        assert_eq!(*img.get_pixel(60, 150), WHITE);
    }

    #[test]
    fn test_header_rounded_on_top_only() {
        let fonts = fonts();
        let colors = HashMap::new();
        let compositor = Compositor::new(&fonts, &[], None, &colors);
        let template = TemplateAsset::builtin("default-template", 900, 550);
        let img = compositor.compose(None, Some(&template), 400, 300).unwrap().unwrap();

        // Card spans 9..391 x 9..291 with a 14 px corner radius; the header
        // ends at y = 71
        assert_ne!(*img.get_pixel(10, 10), DEFAULT_HEADER);
        assert_eq!(*img.get_pixel(11, 69), DEFAULT_HEADER);
        assert_eq!(*img.get_pixel(388, 69), DEFAULT_HEADER);
        // Just below the band the card is white again
        assert_eq!(*img.get_pixel(40, 74), WHITE);
        // Divider across the footer
        assert_eq!(*img.get_pixel(200, 240), DIVIDER);
    }

    #[test]
    fn test_role_color_tints_header() {
        let fonts = fonts();
        let colors = HashMap::from([("Staff".to_string(), "#ef4444".to_string())]);
        let compositor = Compositor::new(&fonts, &[], Some("Role"), &colors);
        let template = TemplateAsset::builtin("default-template", 900, 550);

        let staff = PersonRecord::new("p1", [("Role", "Staff")]);
        let img = compositor.compose(Some(&staff), Some(&template), 400, 300).unwrap().unwrap();
        assert_eq!(*img.get_pixel(40, 40), Rgb([239, 68, 68]));

        let guest = PersonRecord::new("p2", [("Role", "Guest")]);
        let img = compositor.compose(Some(&guest), Some(&template), 400, 300).unwrap().unwrap();
        assert_eq!(*img.get_pixel(40, 40), DEFAULT_HEADER);
    }

    #[test]
    fn test_custom_template_fills_target() {
        let fonts = fonts();
        let colors = HashMap::new();
        let compositor = Compositor::new(&fonts, &[], None, &colors);
        let template = TemplateAsset::custom("t1", 30, 20, png_bytes(Rgb([200, 10, 10])));
        let img = compositor.compose(None, Some(&template), 120, 40).unwrap().unwrap();
        assert_eq!(img.dimensions(), (120, 40));
        assert_eq!(*img.get_pixel(0, 0), Rgb([200, 10, 10]));
        assert_eq!(*img.get_pixel(119, 39), Rgb([200, 10, 10]));
    }

    #[test]
    fn test_unreadable_template_degrades_to_white() {
        let fonts = fonts();
        let colors = HashMap::new();
        let compositor = Compositor::new(&fonts, &[], None, &colors);
        let template = TemplateAsset::custom("broken", 30, 20, b"not an image".to_vec());
        let img = compositor.compose(None, Some(&template), 50, 50).unwrap().unwrap();
        assert!(img.pixels().all(|p| *p == WHITE));
    }

    #[test]
    fn test_text_field_overlay() {
        let fonts = fonts();
        let colors = HashMap::new();
        let fields = vec![name_field()];
        let compositor = Compositor::new(&fonts, &fields, None, &colors);
        let template = TemplateAsset::custom("t1", 30, 20, png_bytes(WHITE));

        let named = PersonRecord::new("p1", [("Name", "Ada Lovelace")]);
        let img = compositor.compose(Some(&named), Some(&template), 600, 300).unwrap().unwrap();
        assert!(dark_pixels(&img) > 0);
        // Text sits around the anchor, not at the edges
        assert_eq!(*img.get_pixel(2, 2), WHITE);

        let unnamed = PersonRecord::new("p2", [("Name", "")]);
        let img = compositor.compose(Some(&unnamed), Some(&template), 600, 300).unwrap().unwrap();
        assert_eq!(dark_pixels(&img), 0);
    }

    #[test]
    fn test_text_is_centered_on_anchor() {
        let fonts = fonts();
        let colors = HashMap::new();
        let fields = vec![name_field()];
        let compositor = Compositor::new(&fonts, &fields, None, &colors);
        let template = TemplateAsset::custom("t1", 30, 20, png_bytes(WHITE));
        let person = PersonRecord::new("p1", [("Name", "HHHH")]);
        let img = compositor.compose(Some(&person), Some(&template), 600, 300).unwrap().unwrap();

        let dark: Vec<(u32, u32)> = img
            .enumerate_pixels()
            .filter(|(_, _, p)| p.0[0] < 100)
            .map(|(x, y, _)| (x, y))
            .collect();
        let min_x = dark.iter().map(|p| p.0).min().unwrap() as f32;
        let max_x = dark.iter().map(|p| p.0).max().unwrap() as f32;
        let min_y = dark.iter().map(|p| p.1).min().unwrap() as f32;
        let max_y = dark.iter().map(|p| p.1).max().unwrap() as f32;

        assert!(((min_x + max_x) / 2.0 - 300.0).abs() < 8.0);
        assert!(((min_y + max_y) / 2.0 - 150.0).abs() < 15.0);
    }

    #[test]
    fn test_bad_color_defaults_to_black() {
        let fonts = fonts();
        let colors = HashMap::new();
        let mut field = name_field();
        field.style.color = Some("blue".into());
        let fields = vec![field];
        let compositor = Compositor::new(&fonts, &fields, None, &colors);
        let template = TemplateAsset::custom("t1", 30, 20, png_bytes(WHITE));
        let person = PersonRecord::new("p1", [("Name", "Ada")]);
        let img = compositor.compose(Some(&person), Some(&template), 400, 200).unwrap().unwrap();
        assert!(img.pixels().any(|p| *p == BLACK));
    }
}
