// nametag-pdf: error types

use thiserror::Error;

/// Fatal faults: the document as a whole cannot be produced.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to create PDF: {0}")]
    PdfError(String),
    #[error("No usable font: {0}")]
    FontError(String),
}

/// Per-record faults. These never abort a render; the slot is left blank.
#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("Invalid nametag size {width}x{height} px")]
    InvalidSize { width: u32, height: u32 },
    #[error("Nametag raster too large: {width}x{height} px")]
    TooLarge { width: u32, height: u32 },
}
