//! Cheap binary-format checks run before extraction.

use image::ImageFormat;

use super::AdmissionProfile;

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// True when `bytes` starts with the `%PDF` header.
///
/// Only the header is inspected; a `true` result says nothing about the
/// body being well-formed.
pub fn is_pdf(bytes: &[u8]) -> bool {
    bytes.len() >= PDF_MAGIC.len() && &bytes[..PDF_MAGIC.len()] == PDF_MAGIC
}

/// Per-profile format validator.
#[derive(Debug, Clone, Copy)]
pub struct FormatValidator {
    profile: AdmissionProfile,
}

impl FormatValidator {
    pub fn new(profile: AdmissionProfile) -> Self {
        Self { profile }
    }

    /// Check that `bytes` plausibly match the profile's format.
    pub fn validate(&self, bytes: &[u8]) -> bool {
        if bytes.is_empty() {
            return false;
        }
        match self.profile {
            AdmissionProfile::Document => is_pdf(bytes),
            AdmissionProfile::Image => matches!(
                image::guess_format(bytes),
                Ok(ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP)
            ),
        }
    }
}
