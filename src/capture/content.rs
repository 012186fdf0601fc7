use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Url,
    Text,
}

impl ContentKind {
    /// A successful URL parse is the only signal.
    pub fn classify(text: &str) -> Self {
        match Url::parse(text) {
            Ok(_) => ContentKind::Url,
            Err(_) => ContentKind::Text,
        }
    }

    /// Title given to records saved straight from a scan.
    pub fn scan_title(self) -> &'static str {
        match self {
            ContentKind::Url => "Scanned URL",
            ContentKind::Text => "Scanned QR Code",
        }
    }
}
