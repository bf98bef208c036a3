//! QR codes pointing at a guide.
//!
//! Codes use error-correction level H so they still scan when printed small
//! or partly covered by a logo sticker.

use qrcode::render::svg;
use qrcode::{EcLevel, QrCode};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QrError {
    #[error("cannot encode QR code: {0}")]
    Encode(#[from] qrcode::types::QrError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Standalone SVG document for `data`, at least `size` pixels wide.
pub fn qr_svg_document(data: &str, size: u32) -> Result<String, QrError> {
    let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::H)?;
    Ok(code
        .render::<svg::Color<'_>>()
        .min_dimensions(size, size)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build())
}

/// SVG element for inlining into HTML (no XML declaration).
pub fn qr_svg(data: &str, size: u32) -> Result<String, QrError> {
    let document = qr_svg_document(data, size)?;
    Ok(match document.find("<svg") {
        Some(start) => document[start..].to_string(),
        None => document,
    })
}

pub fn write_qr_svg(data: &str, size: u32, path: &Path) -> Result<(), QrError> {
    std::fs::write(path, qr_svg_document(data, size)?)?;
    Ok(())
}
