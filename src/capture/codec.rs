use std::io::Cursor;

use base64ct::{Base64, Encoding};
use image::{GrayImage, ImageFormat};
use qrcode::{Color, QrCode};

use super::CaptureError;

const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Square module grid produced by the encoder; `true` is a dark module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrMatrix {
    width: usize,
    modules: Vec<bool>,
}

impl QrMatrix {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        self.modules[y * self.width + x]
    }
}

/// 8-bit greyscale image, the unit the decoder works on.
#[derive(Debug, Clone)]
pub struct GrayFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl GrayFrame {
    /// Decodes PNG or JPEG bytes.
    pub fn from_image_bytes(bytes: &[u8]) -> Result<Self, CaptureError> {
        let img = image::load_from_memory(bytes)?.to_luma8();
        Ok(Self::from(img))
    }

    pub fn to_png(&self) -> Result<Vec<u8>, CaptureError> {
        let img = GrayImage::from_raw(self.width, self.height, self.pixels.clone()).ok_or_else(
            || CaptureError::Decoder("frame buffer does not match its dimensions".into()),
        )?;
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
        Ok(buf)
    }
}

impl From<GrayImage> for GrayFrame {
    fn from(img: GrayImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            pixels: img.into_raw(),
        }
    }
}

pub fn encode(text: &str) -> Result<QrMatrix, CaptureError> {
    let code = QrCode::new(text.as_bytes()).map_err(|e| CaptureError::Encode(e.to_string()))?;
    let width = code.width();
    let modules = code
        .to_colors()
        .into_iter()
        .map(|c| c == Color::Dark)
        .collect();
    Ok(QrMatrix { width, modules })
}

/// First QR payload found in the frame, if any.
pub fn decode(frame: &GrayFrame) -> Option<String> {
    let (w, h) = (frame.width as usize, frame.height as usize);
    if w == 0 || h == 0 || frame.pixels.len() < w * h {
        return None;
    }
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(w, h, |x, y| frame.pixels[y * w + x]);
    prepared
        .detect_grids()
        .into_iter()
        .find_map(|grid| grid.decode().ok().map(|(_, content)| content))
}

pub fn png_data_uri(png: &[u8]) -> String {
    format!("{PNG_DATA_URI_PREFIX}{}", Base64::encode_string(png))
}

/// Accepts any `data:<mime>;base64,<payload>` URI and returns the payload bytes.
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>, CaptureError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| CaptureError::DataUri("missing data: scheme".into()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| CaptureError::DataUri("missing payload separator".into()))?;
    if !meta.ends_with(";base64") {
        return Err(CaptureError::DataUri("only base64 payloads are supported".into()));
    }
    Base64::decode_vec(payload.trim()).map_err(|e| CaptureError::DataUri(e.to_string()))
}
