// nametag-pdf: JSON job files
//
// A job file mirrors the generate request of the web service: templates,
// persons, text fields, export settings and watermark. Loading it resolves
// template image sources into bytes and turns everything into a
// `RenderRequest`.

use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use base64::Engine;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::{
    ExportConfig, FontOverrides, PaperSize, PersonRecord, RenderRequest, SizeMode, TemplateAsset,
    TextFieldSpec, TextStyle, WatermarkSpec,
};

/// Template id that selects the built-in card design
pub const BUILTIN_TEMPLATE_ID: &str = "default-template";

/// Role mapping key for persons with an empty role column
pub const NO_ROLE_KEY: &str = "__no_role__";

/// Raster size assumed for templates that declare none (90x55 mm at 10 px/mm)
const FALLBACK_TEMPLATE_SIZE: (u32, u32) = (900, 550);

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Failed to read job file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Invalid job file: {0}")]
    Parse(#[from] serde_json::Error),
}

// ============================================================================
// Job File Format
// ============================================================================

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Job {
    pub templates: Vec<TemplateEntry>,
    pub persons: Vec<PersonEntry>,
    pub text_fields: Vec<TextFieldEntry>,
    pub export_config: ExportConfigEntry,
    pub role_mappings: HashMap<String, String>,
    pub role_colors: HashMap<String, String>,
    pub template_column: Option<String>,
    pub selected_template_id: Option<String>,
    pub watermark_enabled: bool,
    pub watermark_text: Option<String>,
    pub project_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct TemplateEntry {
    pub id: String,
    pub file_name: Option<String>,
    /// Local file, relative to the job file
    pub image_path: Option<String>,
    pub image_url: Option<String>,
    pub data_url: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonEntry {
    pub id: String,
    pub data: BTreeMap<String, String>,
    pub template_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct TextFieldEntry {
    pub id: Option<String>,
    pub column: String,
    pub label: Option<String>,
    pub position: PositionEntry,
    pub style: StyleEntry,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PositionEntry {
    pub x: f32,
    pub y: f32,
}

impl Default for PositionEntry {
    fn default() -> Self {
        Self { x: 50.0, y: 50.0 }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct StyleEntry {
    pub font_family: Option<String>,
    pub font_size: Option<f32>,
    pub font_weight: Option<u16>,
    pub color: Option<String>,
}

/// Every field is optional; missing values take the engine defaults.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportConfigEntry {
    pub paper_size: Option<String>,
    pub layout: Option<String>,
    pub margin: Option<f32>,
    pub dpi: Option<u32>,
    pub size_mode: Option<String>,
    pub grid_gap: Option<f32>,
    pub fixed_width: Option<f32>,
    pub fixed_height: Option<f32>,
    pub blank_pages: Option<u32>,
    pub blank_pages_per_template: Option<BTreeMap<String, u32>>,
}

impl From<ExportConfigEntry> for ExportConfig {
    fn from(entry: ExportConfigEntry) -> Self {
        let defaults = ExportConfig::default();
        ExportConfig {
            paper_size: entry
                .paper_size
                .as_deref()
                .map(PaperSize::from_name)
                .unwrap_or(defaults.paper_size),
            layout: entry.layout.unwrap_or(defaults.layout),
            margin_mm: entry.margin.unwrap_or(defaults.margin_mm),
            dpi: entry.dpi,
            size_mode: entry
                .size_mode
                .as_deref()
                .map(SizeMode::from_name)
                .unwrap_or(defaults.size_mode),
            grid_gap_mm: entry.grid_gap.unwrap_or(defaults.grid_gap_mm),
            fixed_width_mm: entry.fixed_width.unwrap_or(defaults.fixed_width_mm),
            fixed_height_mm: entry.fixed_height.unwrap_or(defaults.fixed_height_mm),
            blank_pages: entry.blank_pages.unwrap_or(defaults.blank_pages),
            blank_pages_per_template: entry.blank_pages_per_template.unwrap_or_default(),
        }
    }
}

impl From<TextFieldEntry> for TextFieldSpec {
    fn from(entry: TextFieldEntry) -> Self {
        let defaults = TextStyle::default();
        TextFieldSpec {
            column: entry.column,
            x: entry.position.x,
            y: entry.position.y,
            style: TextStyle {
                font_family: entry.style.font_family,
                font_size: entry.style.font_size.unwrap_or(defaults.font_size),
                font_weight: entry.style.font_weight.unwrap_or(defaults.font_weight),
                color: entry.style.color,
            },
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

impl Job {
    pub fn load(path: &Path) -> Result<Self, JobError> {
        let content = std::fs::read_to_string(path).map_err(|source| JobError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, JobError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn project_name(&self) -> &str {
        self.project_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or("nametags")
    }

    /// Build the render request. Template images are fetched here;
    /// `base_dir` anchors relative `imagePath` values.
    pub fn into_request(self, base_dir: &Path, fonts: FontOverrides) -> RenderRequest {
        let title = self.project_name().to_string();
        let templates: Vec<TemplateAsset> = self
            .templates
            .iter()
            .map(|entry| resolve_template(entry, base_dir))
            .collect();

        let known: Vec<&str> = templates.iter().map(|t| t.id.as_str()).collect();
        let persons = self
            .persons
            .into_iter()
            .enumerate()
            .map(|(i, entry)| {
                let template_id = assign_template(
                    &entry,
                    &known,
                    self.template_column.as_deref(),
                    &self.role_mappings,
                    self.selected_template_id.as_deref(),
                );
                let id = if entry.id.is_empty() {
                    format!("person-{}", i + 1)
                } else {
                    entry.id
                };
                PersonRecord {
                    id,
                    data: entry.data,
                    template_id,
                }
            })
            .collect();

        RenderRequest {
            title,
            templates,
            persons,
            text_fields: self.text_fields.into_iter().map(Into::into).collect(),
            export: self.export_config.into(),
            watermark: WatermarkSpec {
                enabled: self.watermark_enabled,
                text: self.watermark_text.unwrap_or_default(),
            },
            role_column: self.template_column,
            role_colors: self.role_colors,
            fonts,
        }
    }
}

/// A person's own template wins; then the role mapping for their role
/// column value; then the job's selected template.
fn assign_template(
    person: &PersonEntry,
    known: &[&str],
    role_column: Option<&str>,
    role_mappings: &HashMap<String, String>,
    selected: Option<&str>,
) -> Option<String> {
    let is_known = |id: &&str| known.contains(id);

    if let Some(id) = person.template_id.as_deref().filter(is_known) {
        return Some(id.to_string());
    }

    if let Some(column) = role_column {
        let key = match person.data.get(column).map(|v| v.trim()) {
            Some(role) if !role.is_empty() => role,
            _ => NO_ROLE_KEY,
        };
        if let Some(id) = role_mappings.get(key).map(String::as_str).filter(is_known) {
            return Some(id.to_string());
        }
    }

    selected
        .filter(is_known)
        .map(str::to_string)
        .or_else(|| person.template_id.clone())
}

// ============================================================================
// Template Sources
// ============================================================================

fn resolve_template(entry: &TemplateEntry, base_dir: &Path) -> TemplateAsset {
    if entry.id == BUILTIN_TEMPLATE_ID {
        let (width, height) = declared_size(entry).unwrap_or(FALLBACK_TEMPLATE_SIZE);
        return with_role(TemplateAsset::builtin(&entry.id, width, height), entry);
    }

    let bytes = match load_template_bytes(entry, base_dir) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Template {} image unavailable: {}", entry.id, e);
            Vec::new()
        }
    };

    let (width, height) = declared_size(entry)
        .or_else(|| image_size(&bytes))
        .unwrap_or(FALLBACK_TEMPLATE_SIZE);
    with_role(TemplateAsset::custom(&entry.id, width, height, bytes), entry)
}

fn with_role(mut template: TemplateAsset, entry: &TemplateEntry) -> TemplateAsset {
    template.role = entry.role.clone();
    template
}

fn declared_size(entry: &TemplateEntry) -> Option<(u32, u32)> {
    match (entry.width, entry.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => Some((w, h)),
        _ => None,
    }
}

fn image_size(bytes: &[u8]) -> Option<(u32, u32)> {
    ::image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

/// Sources are tried in order: data URL, local path, remote URL.
fn load_template_bytes(entry: &TemplateEntry, base_dir: &Path) -> Result<Vec<u8>, String> {
    if let Some(data_url) = entry.data_url.as_deref().filter(|u| u.starts_with("data:")) {
        return decode_data_url(data_url);
    }

    if let Some(path) = entry.image_path.as_deref() {
        let full: PathBuf = base_dir.join(path);
        debug!("Reading template {} from {}", entry.id, full.display());
        return std::fs::read(&full).map_err(|e| format!("{}: {}", full.display(), e));
    }

    if let Some(url) = entry.image_url.as_deref() {
        debug!("Fetching template {} from {}", entry.id, url);
        let response = ureq::get(url)
            .call()
            .map_err(|e| format!("Failed to fetch URL: {}", e))?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(|e| format!("Failed to read response: {}", e))?;
        return Ok(bytes);
    }

    Err("no image source".to_string())
}

/// Decode the payload of a base64 `data:` URL
pub fn decode_data_url(data_url: &str) -> Result<Vec<u8>, String> {
    let (_, payload) = data_url
        .split_once(',')
        .ok_or_else(|| "data URL has no payload".to_string())?;
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| format!("Invalid base64: {}", e))
}
