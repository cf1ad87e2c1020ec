// nametag-pdf: input model
//
// Every value here is an immutable input to a single render call.

use std::collections::{BTreeMap, HashMap};

// ============================================================================
// Export Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaperSize {
    #[default]
    A4,
    Letter,
}

impl PaperSize {
    /// Unknown names fall back to A4.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "letter" => PaperSize::Letter,
            _ => PaperSize::A4,
        }
    }

    /// (width, height) in mm
    pub fn dimensions_mm(self) -> (f32, f32) {
        match self {
            PaperSize::A4 => (210.0, 297.0),
            PaperSize::Letter => (215.9, 279.4),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizeMode {
    /// Aspect-fit inside the grid cell
    #[default]
    Grid,
    /// Literal physical size, may overflow the cell
    Fixed,
}

impl SizeMode {
    pub fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("fixed") {
            SizeMode::Fixed
        } else {
            SizeMode::Grid
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportConfig {
    pub paper_size: PaperSize,
    /// "<cols>x<rows>", anything unparsable means 2x2
    pub layout: String,
    pub margin_mm: f32,
    /// Carried for the caller, not used by the engine
    pub dpi: Option<u32>,
    pub size_mode: SizeMode,
    pub grid_gap_mm: f32,
    pub fixed_width_mm: f32,
    pub fixed_height_mm: f32,
    pub blank_pages: u32,
    pub blank_pages_per_template: BTreeMap<String, u32>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            paper_size: PaperSize::A4,
            layout: "2x2".to_string(),
            margin_mm: 10.0,
            dpi: None,
            size_mode: SizeMode::Grid,
            grid_gap_mm: 0.0,
            fixed_width_mm: 90.0,
            fixed_height_mm: 55.0,
            blank_pages: 0,
            blank_pages_per_template: BTreeMap::new(),
        }
    }
}

impl ExportConfig {
    /// Total number of blank slots requested. A non-empty per-template map
    /// takes precedence over the plain count.
    pub fn blank_slot_count(&self) -> usize {
        if self.blank_pages_per_template.is_empty() {
            self.blank_pages as usize
        } else {
            self.blank_pages_per_template
                .values()
                .map(|n| *n as usize)
                .sum()
        }
    }
}

// ============================================================================
// Templates, People, Text
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateDesign {
    /// The built-in card design
    Builtin,
    /// Encoded image bytes (PNG, JPEG, ...). Empty or undecodable bytes
    /// render as a white background.
    Custom(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateAsset {
    pub id: String,
    pub width: u32,
    pub height: u32,
    pub design: TemplateDesign,
    pub role: Option<String>,
}

impl TemplateAsset {
    pub fn builtin(id: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            id: id.into(),
            width,
            height,
            design: TemplateDesign::Builtin,
            role: None,
        }
    }

    pub fn custom(id: impl Into<String>, width: u32, height: u32, bytes: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            width,
            height,
            design: TemplateDesign::Custom(bytes),
            role: None,
        }
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PersonRecord {
    pub id: String,
    pub data: BTreeMap<String, String>,
    pub template_id: Option<String>,
}

impl PersonRecord {
    pub fn new<K, V>(id: impl Into<String>, data: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            id: id.into(),
            data: data
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            template_id: None,
        }
    }

    pub fn with_template(mut self, template_id: impl Into<String>) -> Self {
        self.template_id = Some(template_id.into());
        self
    }

    /// Value of `column`, `None` when absent or empty
    pub fn value(&self, column: &str) -> Option<&str> {
        self.data
            .get(column)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub font_family: Option<String>,
    /// Points
    pub font_size: f32,
    pub font_weight: u16,
    pub color: Option<String>,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_family: None,
            font_size: 16.0,
            font_weight: 400,
            color: None,
        }
    }
}

impl TextStyle {
    pub fn is_bold(&self) -> bool {
        self.font_weight >= 700
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextFieldSpec {
    pub column: String,
    /// Percent of the nametag width, 0-100
    pub x: f32,
    /// Percent of the nametag height, 0-100
    pub y: f32,
    pub style: TextStyle,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct WatermarkSpec {
    pub enabled: bool,
    pub text: String,
}

impl WatermarkSpec {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            enabled: true,
            text: text.into(),
        }
    }

    /// The text to tile, if the pass should run at all
    pub fn active_text(&self) -> Option<&str> {
        let text = self.text.trim();
        (self.enabled && !text.is_empty()).then_some(text)
    }
}

// ============================================================================
// Request
// ============================================================================

/// Caller-supplied TrueType data preferred over the bundled fonts
#[derive(Debug, Clone, Default)]
pub struct FontOverrides {
    pub regular: Option<Vec<u8>>,
    pub bold: Option<Vec<u8>>,
}

/// Everything one render call needs, already resolved by the caller.
#[derive(Debug, Clone, Default)]
pub struct RenderRequest {
    pub title: String,
    pub templates: Vec<TemplateAsset>,
    pub persons: Vec<PersonRecord>,
    pub text_fields: Vec<TextFieldSpec>,
    pub export: ExportConfig,
    pub watermark: WatermarkSpec,
    /// Column whose value names a person's role
    pub role_column: Option<String>,
    /// Role value -> "#rrggbb" header color for the built-in design
    pub role_colors: HashMap<String, String>,
    pub fonts: FontOverrides,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paper_size_names() {
        assert_eq!(PaperSize::from_name("Letter"), PaperSize::Letter);
        assert_eq!(PaperSize::from_name(" letter "), PaperSize::Letter);
        assert_eq!(PaperSize::from_name("A4"), PaperSize::A4);
        assert_eq!(PaperSize::from_name("Tabloid"), PaperSize::A4);
    }

    #[test]
    fn test_blank_slot_count_prefers_per_template_map() {
        let mut config = ExportConfig {
            blank_pages: 7,
            ..Default::default()
        };
        assert_eq!(config.blank_slot_count(), 7);

        config.blank_pages_per_template.insert("a".into(), 2);
        config.blank_pages_per_template.insert("b".into(), 3);
        assert_eq!(config.blank_slot_count(), 5);
    }

    #[test]
    fn test_person_value_skips_empty() {
        let person = PersonRecord::new("p1", [("Name", "Ada"), ("Team", "")]);
        assert_eq!(person.value("Name"), Some("Ada"));
        assert_eq!(person.value("Team"), None);
        assert_eq!(person.value("Missing"), None);
    }

    #[test]
    fn test_watermark_active_text() {
        assert_eq!(WatermarkSpec::new("SAMPLE").active_text(), Some("SAMPLE"));
        assert_eq!(WatermarkSpec::new("   ").active_text(), None);
        let disabled = WatermarkSpec {
            enabled: false,
            text: "SAMPLE".into(),
        };
        assert_eq!(disabled.active_text(), None);
    }
}
