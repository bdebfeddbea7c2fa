//! QR codes pointing phones at the upload page.
//!
//! The terminal gets a Unicode rendering when the server starts; the web
//! API serves the same code as SVG.
//!
//! ## Example
//!
//! ```rust,ignore
//! use lanbeam_core::qr;
//!
//! let ascii = qr::generate_ascii("http://192.168.1.2:8000/static/upload.html")?;
//! println!("{}", ascii);
//! ```

use qrcode::render::{svg, unicode};
use qrcode::{EcLevel, QrCode};

use crate::error::{Error, Result};

fn encode(url: &str) -> Result<QrCode> {
    QrCode::with_error_correction_level(url, EcLevel::M)
        .map_err(|e| Error::Internal(format!("Failed to generate QR code: {e}")))
}

/// Generate a QR code for `url` for terminal display.
///
/// Uses Unicode half blocks so two module rows fit in one line of text.
///
/// # Errors
///
/// Returns an error if `url` is too long to encode.
pub fn generate_ascii(url: &str) -> Result<String> {
    let rendered = encode(url)?
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .build();

    Ok(rendered)
}

/// Generate a QR code for `url` as an SVG document.
///
/// # Errors
///
/// Returns an error if `url` is too long to encode.
pub fn generate_svg(url: &str) -> Result<String> {
    let svg_string = encode(url)?
        .render::<svg::Color>()
        .min_dimensions(200, 200)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build();

    Ok(svg_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "http://192.168.1.2:8000/static/upload.html";

    #[test]
    fn test_generate_ascii_multiline() {
        let qr = generate_ascii(URL).unwrap();
        assert!(qr.contains('█') || qr.contains('▀') || qr.contains('▄'));
        assert!(qr.lines().count() > 5);
    }

    #[test]
    fn test_generate_svg_valid_xml() {
        let svg = generate_svg(URL).unwrap();
        assert!(svg.starts_with("<?xml") || svg.starts_with("<svg"));
        assert!(svg.contains("</svg>"));
        assert!(svg.contains("width") && svg.contains("height"));
    }

    #[test]
    fn test_different_urls_produce_different_qrs() {
        let other = generate_ascii("http://10.0.0.7:8000/static/upload.html").unwrap();
        assert_ne!(generate_ascii(URL).unwrap(), other);
    }

    #[test]
    fn test_oversized_input_fails() {
        let huge = "x".repeat(8000);
        assert!(matches!(generate_svg(&huge), Err(Error::Internal(_))));
    }
}
