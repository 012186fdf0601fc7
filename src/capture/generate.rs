use std::io::Cursor;

use ab_glyph::{FontRef, PxScale};
use image::{imageops, imageops::FilterType, ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use time::OffsetDateTime;

use super::{
    codec::{self, QrMatrix},
    CaptureError,
};
use crate::qrcodes::dto::CreateQrRequest;

const DARK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const LIGHT: Rgba<u8> = Rgba([255, 255, 255, 255]);

const BUNDLED_FONT: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");
const TITLE_PX: f32 = 20.0;
const LOGO_SIDE: u32 = 30;
const LOGO_GAP: u32 = 10;

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Pixels per module.
    pub scale: u32,
    /// Blank modules around the code.
    pub quiet_zone: u32,
    /// Drawn centred in the header strip; also the saved record's title.
    pub title: Option<String>,
    /// PNG/JPEG bytes drawn left of the title in the header strip.
    pub logo: Option<Vec<u8>>,
    /// TrueType/OpenType bytes for the title; DejaVu Sans when unset.
    pub font: Option<Vec<u8>>,
    pub header_height: u32,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            scale: 8,
            quiet_zone: 4,
            title: None,
            logo: None,
            font: None,
            header_height: 40,
        }
    }
}

impl GenerateOptions {
    fn title(&self) -> Option<&str> {
        self.title.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct GeneratedQr {
    pub text: String,
    pub title: Option<String>,
    pub matrix: QrMatrix,
    pub png: Vec<u8>,
}

impl GeneratedQr {
    pub fn data_uri(&self) -> String {
        codec::png_data_uri(&self.png)
    }

    /// Payload for saving this code to the user's history.
    pub fn to_request(&self) -> CreateQrRequest {
        CreateQrRequest {
            title: self.title.clone(),
            content: self.text.clone(),
            image: self.data_uri(),
        }
    }

    pub fn download_file_name(&self, at: OffsetDateTime) -> String {
        download_file_name(self.title.as_deref(), at)
    }
}

pub fn generate(text: &str, opts: &GenerateOptions) -> Result<GeneratedQr, CaptureError> {
    if text.trim().is_empty() {
        return Err(CaptureError::Encode("nothing to encode".into()));
    }
    let matrix = codec::encode(text)?;
    let canvas = render(&matrix, opts)?;

    let mut png = Vec::new();
    canvas.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(GeneratedQr {
        text: text.to_string(),
        title: opts.title().map(str::to_string),
        matrix,
        png,
    })
}

fn render(matrix: &QrMatrix, opts: &GenerateOptions) -> Result<RgbaImage, CaptureError> {
    let scale = opts.scale.max(1);
    let side = (matrix.width() as u32 + opts.quiet_zone * 2) * scale;
    let header = if opts.title().is_some() || opts.logo.is_some() {
        opts.header_height
    } else {
        0
    };

    let mut canvas = RgbaImage::from_pixel(side, side + header, LIGHT);
    let offset = opts.quiet_zone * scale;
    for y in 0..matrix.width() {
        for x in 0..matrix.width() {
            if !matrix.is_dark(x, y) {
                continue;
            }
            let px = offset + x as u32 * scale;
            let py = header + offset + y as u32 * scale;
            for dy in 0..scale {
                for dx in 0..scale {
                    canvas.put_pixel(px + dx, py + dy, DARK);
                }
            }
        }
    }

    if header > 0 {
        draw_header(&mut canvas, header, opts)?;
    }
    Ok(canvas)
}

/// Logo then title, centred as one row inside the top `height` pixels.
fn draw_header(canvas: &mut RgbaImage, height: u32, opts: &GenerateOptions) -> Result<(), CaptureError> {
    let logo = match &opts.logo {
        Some(bytes) => {
            let side = LOGO_SIDE.min(height).max(1);
            Some(
                image::load_from_memory(bytes)?
                    .resize(side, side, FilterType::Triangle)
                    .to_rgba8(),
            )
        }
        None => None,
    };

    let font = match opts.title() {
        Some(_) => {
            let bytes = opts.font.as_deref().unwrap_or(BUNDLED_FONT);
            Some(FontRef::try_from_slice(bytes).map_err(|e| CaptureError::Font(e.to_string()))?)
        }
        None => None,
    };
    let scale = PxScale::from(TITLE_PX);
    let text = match (opts.title(), &font) {
        (Some(title), Some(font)) => Some((title, text_size(scale, font, title))),
        _ => None,
    };

    let logo_w = logo.as_ref().map_or(0, |l| l.width());
    let gap = if logo.is_some() && text.is_some() { LOGO_GAP } else { 0 };
    let text_w = text.map_or(0, |(_, (w, _))| w);
    let mut x = canvas.width().saturating_sub(logo_w + gap + text_w) / 2;

    if let Some(logo) = &logo {
        let y = height.saturating_sub(logo.height()) / 2;
        imageops::overlay(canvas, logo, x as i64, y as i64);
        x += logo_w + gap;
    }
    if let (Some((title, (_, text_h))), Some(font)) = (text, &font) {
        let y = height.saturating_sub(text_h) / 2;
        draw_text_mut(canvas, DARK, x as i32, y as i32, scale, font, title);
    }
    Ok(())
}

/// `My Site` -> `My-Site-1700000000000.png`; untitled codes get `qr-code`.
pub fn download_file_name(title: Option<&str>, at: OffsetDateTime) -> String {
    let stem = title
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join("-"))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "qr-code".to_string());
    let millis = at.unix_timestamp_nanos() / 1_000_000;
    format!("{stem}-{millis}.png")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::codec::{decode, GrayFrame};

    fn titled(title: &str) -> GenerateOptions {
        GenerateOptions {
            title: Some(title.into()),
            ..GenerateOptions::default()
        }
    }

    fn logo_png() -> Vec<u8> {
        let logo = RgbaImage::from_pixel(64, 64, Rgba([200, 30, 30, 255]));
        let mut buf = Vec::new();
        logo.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        buf
    }

    fn header_has_ink(png: &[u8], header: u32) -> bool {
        let img = image::load_from_memory(png).unwrap().to_luma8();
        (0..header).any(|y| (0..img.width()).any(|x| img.get_pixel(x, y).0[0] < 128))
    }

    #[test]
    fn generated_png_scans_back_to_the_text() {
        let qr = generate("https://example.com", &GenerateOptions::default()).unwrap();
        let frame = GrayFrame::from_image_bytes(&qr.png).unwrap();
        assert_eq!(decode(&frame).as_deref(), Some("https://example.com"));
    }

    #[test]
    fn untitled_code_has_no_header() {
        let qr = generate("hi", &GenerateOptions::default()).unwrap();
        let img = image::load_from_memory(&qr.png).unwrap();
        assert_eq!(img.width(), img.height());
    }

    #[test]
    fn title_alone_draws_a_header() {
        let opts = titled("My Site");
        let plain = generate("hi", &GenerateOptions::default()).unwrap();
        let branded = generate("hi", &opts).unwrap();

        let a = image::load_from_memory(&plain.png).unwrap();
        let b = image::load_from_memory(&branded.png).unwrap();
        assert_eq!(b.height(), a.height() + opts.header_height);
        assert!(header_has_ink(&branded.png, opts.header_height));
    }

    #[test]
    fn logo_alone_draws_a_header() {
        let opts = GenerateOptions {
            logo: Some(logo_png()),
            ..GenerateOptions::default()
        };
        let plain = generate("hi", &GenerateOptions::default()).unwrap();
        let branded = generate("hi", &opts).unwrap();

        let a = image::load_from_memory(&plain.png).unwrap();
        let b = image::load_from_memory(&branded.png).unwrap();
        assert_eq!(a.width(), b.width());
        assert_eq!(b.height(), a.height() + opts.header_height);
    }

    #[test]
    fn titled_code_with_logo_still_scans() {
        let opts = GenerateOptions {
            logo: Some(logo_png()),
            ..titled("Menu")
        };
        let qr = generate("https://example.com/menu", &opts).unwrap();
        assert!(header_has_ink(&qr.png, opts.header_height));
        let frame = GrayFrame::from_image_bytes(&qr.png).unwrap();
        assert_eq!(decode(&frame).as_deref(), Some("https://example.com/menu"));
    }

    #[test]
    fn unusable_font_is_reported() {
        let opts = GenerateOptions {
            font: Some(vec![0, 1, 2, 3]),
            ..titled("Menu")
        };
        assert!(matches!(generate("hi", &opts), Err(CaptureError::Font(_))));
    }

    #[test]
    fn blank_title_counts_as_untitled() {
        let qr = generate("hi", &titled("   ")).unwrap();
        assert_eq!(qr.title, None);
        let img = image::load_from_memory(&qr.png).unwrap();
        assert_eq!(img.width(), img.height());
    }

    #[test]
    fn empty_text_is_refused() {
        assert!(generate("   ", &GenerateOptions::default()).is_err());
    }

    #[test]
    fn request_carries_title_and_data_uri() {
        let qr = generate("plain words", &titled("Note")).unwrap();
        let req = qr.to_request();
        assert_eq!(req.content, "plain words");
        assert!(req.image.starts_with("data:image/png;base64,"));
        assert_eq!(req.title.as_deref(), Some("Note"));
    }

    #[test]
    fn file_names_collapse_whitespace() {
        let at = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        assert_eq!(download_file_name(Some("My  Site"), at), "My-Site-1700000000000.png");
        assert_eq!(download_file_name(None, at), "qr-code-1700000000000.png");
        assert_eq!(download_file_name(Some("  "), at), "qr-code-1700000000000.png");
        let qr = generate("x", &titled("Menu Card")).unwrap();
        assert_eq!(qr.download_file_name(at), "Menu-Card-1700000000000.png");
    }
}
