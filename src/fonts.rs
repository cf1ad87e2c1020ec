// nametag-pdf: font loading
//
// Caller-supplied TrueType data is preferred; the bundled DejaVu Sans faces
// are the fallback. Only when neither parses is the render abandoned.

use rusttype::Font;
use tracing::warn;

use crate::error::RenderError;
use crate::model::FontOverrides;

static BUNDLED_REGULAR: &[u8] = include_bytes!("../assets/fonts/DejaVuSans.ttf");
static BUNDLED_BOLD: &[u8] = include_bytes!("../assets/fonts/DejaVuSans-Bold.ttf");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontOrigin {
    Preferred,
    Bundled,
}

/// One parsed face plus the raw bytes it came from
#[derive(Clone)]
pub struct Face {
    pub font: Font<'static>,
    pub bytes: Vec<u8>,
    pub origin: FontOrigin,
}

impl Face {
    fn parse(bytes: Vec<u8>, origin: FontOrigin) -> Option<Self> {
        let font = Font::try_from_vec(bytes.clone())?;
        Some(Self {
            font,
            bytes,
            origin,
        })
    }

    /// True when the face has a real glyph for `ch`
    pub fn covers(&self, ch: char) -> bool {
        ch.is_whitespace() || self.font.glyph(ch).id().0 != 0
    }
}

pub struct FontSet {
    pub regular: Face,
    pub bold: Face,
}

impl FontSet {
    pub fn load(overrides: &FontOverrides) -> Result<Self, RenderError> {
        let regular = load_face(overrides.regular.as_ref(), BUNDLED_REGULAR, "regular")?;

        // A preferred regular face stands in for a missing preferred bold
        let bold = match (&overrides.bold, regular.origin) {
            (Some(bytes), _) => load_face(Some(bytes), BUNDLED_BOLD, "bold")?,
            (None, FontOrigin::Preferred) => Face::parse(regular.bytes.clone(), FontOrigin::Preferred)
                .ok_or_else(|| RenderError::FontError("regular face failed to re-parse".into()))?,
            (None, FontOrigin::Bundled) => load_face(None, BUNDLED_BOLD, "bold")?,
        };

        Ok(Self { regular, bold })
    }

    pub fn face(&self, bold: bool) -> &Face {
        if bold {
            &self.bold
        } else {
            &self.regular
        }
    }
}

fn load_face(
    preferred: Option<&Vec<u8>>,
    bundled: &'static [u8],
    label: &str,
) -> Result<Face, RenderError> {
    if let Some(bytes) = preferred {
        match Face::parse(bytes.clone(), FontOrigin::Preferred) {
            Some(face) => return Ok(face),
            None => warn!("Preferred {} font is not a usable TrueType font, using bundled face", label),
        }
    }

    Face::parse(bundled.to_vec(), FontOrigin::Bundled)
        .ok_or_else(|| RenderError::FontError(format!("bundled {} font failed to parse", label)))
}
