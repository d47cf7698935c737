//! PDF text and image extraction using lopdf and pdf-extract.

use image::{DynamicImage, GrayImage, RgbImage};
use lopdf::{Document, Object};
use tracing::{debug, trace};

use super::{PdfProcessor, PdfType, Result};
use crate::error::PdfError;

/// PDF content extractor using lopdf.
pub struct PdfExtractor {
    document: Option<Document>,
    raw_data: Vec<u8>,
}

impl PdfExtractor {
    /// Create a new PDF extractor.
    pub fn new() -> Self {
        Self {
            document: None,
            raw_data: Vec::new(),
        }
    }

    fn decode_image(&self, doc: &Document, obj: &Object) -> Option<DynamicImage> {
        let Object::Stream(stream) = obj else {
            return None;
        };
        let dict = &stream.dict;

        if dict.get(b"Subtype").ok()?.as_name().ok()? != b"Image" {
            return None;
        }

        let width = dict.get(b"Width").ok()?.as_i64().ok()? as u32;
        let height = dict.get(b"Height").ok()?.as_i64().ok()? as u32;
        trace!("Found image object: {}x{}", width, height);

        let filter = dict.get(b"Filter").ok().and_then(|f| match f {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
            _ => None,
        });

        match filter {
            Some(b"DCTDecode") => {
                return image::load_from_memory_with_format(
                    &stream.content,
                    image::ImageFormat::Jpeg,
                )
                .ok();
            }
            Some(b"JPXDecode") | Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
                trace!("Skipping unsupported image filter");
                return None;
            }
            _ => {}
        }

        let bits = dict
            .get(b"BitsPerComponent")
            .ok()
            .and_then(|o| o.as_i64().ok())
            .unwrap_or(8);
        if bits != 8 {
            return None;
        }

        let color_space = dict
            .get(b"ColorSpace")
            .ok()
            .and_then(|o| match o {
                Object::Name(name) => Some(name.as_slice()),
                Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
                Object::Reference(r) => doc.get_object(*r).ok().and_then(|o| o.as_name().ok()),
                _ => None,
            })
            .unwrap_or(b"DeviceRGB");

        let data = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());
        let pixels = (width as usize) * (height as usize);

        match color_space {
            b"DeviceRGB" | b"RGB" if data.len() >= pixels * 3 => {
                RgbImage::from_raw(width, height, data[..pixels * 3].to_vec())
                    .map(DynamicImage::ImageRgb8)
            }
            b"DeviceGray" | b"G" if data.len() >= pixels => {
                GrayImage::from_raw(width, height, data[..pixels].to_vec())
                    .map(DynamicImage::ImageLuma8)
            }
            _ => {
                trace!("Could not decode image: data_len={}, pixels={}", data.len(), pixels);
                None
            }
        }
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfProcessor for PdfExtractor {
    fn load(&mut self, data: &[u8]) -> Result<()> {
        let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        // Handle PDFs with empty password encryption
        if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");

            let mut decrypted_data = Vec::new();
            doc.save_to(&mut decrypted_data)
                .map_err(|e| PdfError::Parse(format!("Failed to save decrypted PDF: {}", e)))?;
            self.raw_data = decrypted_data;
        } else {
            self.raw_data = data.to_vec();
        }

        let page_count = doc.get_pages().len();
        if page_count == 0 {
            return Err(PdfError::NoPages);
        }

        debug!("Loaded PDF with {} pages", page_count);
        self.document = Some(doc);
        Ok(())
    }

    fn page_count(&self) -> u32 {
        self.document
            .as_ref()
            .map(|doc| doc.get_pages().len() as u32)
            .unwrap_or(0)
    }

    fn analyze(&self, min_text_length: usize) -> PdfType {
        let text = self.extract_text().unwrap_or_default();
        let has_text = text.trim().len() >= min_text_length;
        let has_images = !self.extract_images().is_empty();

        let pdf_type = match (has_text, has_images) {
            (true, false) => PdfType::Text,
            (false, true) => PdfType::Image,
            (true, true) => PdfType::Hybrid,
            (false, false) => PdfType::Empty,
        };

        debug!("PDF analysis: has_text={}, has_images={} -> {:?}", has_text, has_images, pdf_type);
        pdf_type
    }

    fn extract_text(&self) -> Result<String> {
        if self.document.is_none() {
            return Err(PdfError::Parse("No document loaded".to_string()));
        }
        pdf_extract::extract_text_from_mem(&self.raw_data)
            .map_err(|e| PdfError::TextExtraction(e.to_string()))
    }

    fn extract_images(&self) -> Vec<DynamicImage> {
        let Some(doc) = self.document.as_ref() else {
            return Vec::new();
        };

        let images: Vec<DynamicImage> = doc
            .objects
            .values()
            .filter_map(|obj| self.decode_image(doc, obj))
            .collect();

        debug!("Found {} images in document", images.len());
        images
    }
}
