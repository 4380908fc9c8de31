//! Page sources
//!
//! Opens client buffers as read-only page sources. Two adapters exist:
//! [`PdfSource`] for structured documents and [`ImageSource`] for a single
//! raster image that becomes one RGB page. Assemblers only see the
//! [`PageSource`] capability set.

use std::path::Path;

use image::ImageFormat;
use tracing::debug;

use crate::document::{Assembly, Document};
use crate::error::AssembleError;
use crate::range::PageRange;

/// Declared kind of an input buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Pdf,
    Image(ImageFormat),
}

impl SourceKind {
    /// Kind implied by a file name's extension, if recognised
    pub fn from_filename(name: &str) -> Option<Self> {
        let ext = Path::new(name).extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("pdf") {
            return Some(SourceKind::Pdf);
        }
        ImageFormat::from_extension(ext).map(SourceKind::Image)
    }

    /// Kind implied by the buffer's magic bytes
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"%PDF-") {
            return Some(SourceKind::Pdf);
        }
        image::guess_format(bytes).ok().map(SourceKind::Image)
    }

    /// Content first, extension second. Magic bytes win over a misleading
    /// extension; the extension only decides for buffers nothing recognises,
    /// which then fail when opened.
    pub fn detect(name: &str, bytes: &[u8]) -> Result<Self, AssembleError> {
        Self::sniff(bytes)
            .or_else(|| Self::from_filename(name))
            .ok_or_else(|| AssembleError::unreadable(name, "unsupported document type"))
    }

    pub fn is_image(&self) -> bool {
        matches!(self, SourceKind::Image(_))
    }
}

/// Capability set shared by every page source
pub trait PageSource {
    /// Name used in error messages
    fn name(&self) -> &str;

    fn page_count(&self) -> u32;

    /// Append the pages in `range` to `assembly`, in source order
    fn append_to(&self, range: PageRange, assembly: &mut Assembly) -> Result<(), AssembleError>;

    /// Range covering every page
    fn full_range(&self) -> PageRange {
        PageRange::whole(self.page_count())
    }
}

/// A PDF opened for page copying
#[derive(Debug, Clone)]
pub struct PdfSource {
    name: String,
    document: Document,
}

impl PdfSource {
    pub fn open(name: &str, bytes: &[u8]) -> Result<Self, AssembleError> {
        if !bytes.starts_with(b"%PDF-") {
            return Err(AssembleError::unreadable(name, "missing %PDF- header"));
        }

        let inner = lopdf::Document::load_mem(bytes)
            .map_err(|e| AssembleError::unreadable(name, format!("failed to parse PDF: {}", e)))?;

        if inner.is_encrypted() {
            return Err(AssembleError::unreadable(name, "document is encrypted"));
        }

        let document = Document::loaded(inner, name);
        if document.page_count() == 0 {
            return Err(AssembleError::unreadable(name, "document has no pages"));
        }

        debug!(input = name, pages = document.page_count(), "opened PDF");

        Ok(Self {
            name: name.to_string(),
            document,
        })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }
}

impl PageSource for PdfSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn page_count(&self) -> u32 {
        self.document.page_count()
    }

    fn append_to(&self, range: PageRange, assembly: &mut Assembly) -> Result<(), AssembleError> {
        let page_ids = self.document.page_ids();
        let selected = page_ids.get(range.indices()).ok_or_else(|| {
            AssembleError::InvalidRange(format!(
                "Pages {}-{} do not exist (document has {} pages)",
                range.start(),
                range.end(),
                page_ids.len()
            ))
        })?;
        assembly.append_pages(&self.name, self.document.as_lopdf(), selected)
    }
}

/// Pixel data of a decoded image, normalised to 8-bit RGB
#[derive(Debug, Clone)]
pub struct DecodedImage {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
}

impl DecodedImage {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn rgb(&self) -> &[u8] {
        &self.rgb
    }
}

/// A single raster image, presented as a one-page source
#[derive(Debug, Clone)]
pub struct ImageSource {
    name: String,
    format: ImageFormat,
    image: DecodedImage,
}

impl ImageSource {
    pub fn open(name: &str, bytes: &[u8], format: ImageFormat) -> Result<Self, AssembleError> {
        let decoded = image::load_from_memory_with_format(bytes, format).map_err(|e| {
            AssembleError::unreadable(name, format!("failed to decode {:?} image: {}", format, e))
        })?;

        let rgb = decoded.to_rgb8();
        let (width, height) = rgb.dimensions();
        if width == 0 || height == 0 {
            return Err(AssembleError::unreadable(name, "image has no pixels"));
        }

        debug!(input = name, width, height, ?format, "decoded image");

        Ok(Self {
            name: name.to_string(),
            format,
            image: DecodedImage {
                width,
                height,
                rgb: rgb.into_raw(),
            },
        })
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn image(&self) -> &DecodedImage {
        &self.image
    }
}

impl PageSource for ImageSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn page_count(&self) -> u32 {
        1
    }

    fn append_to(&self, range: PageRange, assembly: &mut Assembly) -> Result<(), AssembleError> {
        if range.start() != 1 || range.end() != 1 {
            return Err(AssembleError::InvalidRange(format!(
                "Image {:?} has a single page",
                self.name
            )));
        }
        assembly.append_image(&self.image)
    }
}

/// Either kind of page source
#[derive(Debug, Clone)]
pub enum Source {
    Pdf(PdfSource),
    Image(ImageSource),
}

impl Source {
    /// Open `bytes` as whatever kind `name` and the content declare
    pub fn open(name: &str, bytes: &[u8]) -> Result<Self, AssembleError> {
        let kind = SourceKind::detect(name, bytes)?;
        Self::open_as(name, bytes, kind)
    }

    pub fn open_as(name: &str, bytes: &[u8], kind: SourceKind) -> Result<Self, AssembleError> {
        if bytes.is_empty() {
            return Err(AssembleError::unreadable(name, "empty buffer"));
        }
        match kind {
            SourceKind::Pdf => PdfSource::open(name, bytes).map(Source::Pdf),
            SourceKind::Image(format) => ImageSource::open(name, bytes, format).map(Source::Image),
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            Source::Pdf(_) => SourceKind::Pdf,
            Source::Image(image) => SourceKind::Image(image.format()),
        }
    }

    /// Narrow to an image source; anything else is unreadable as an image
    pub fn into_image(self) -> Result<ImageSource, AssembleError> {
        match self {
            Source::Image(image) => Ok(image),
            Source::Pdf(pdf) => Err(AssembleError::unreadable(&pdf.name, "not an image")),
        }
    }
}

impl PageSource for Source {
    fn name(&self) -> &str {
        match self {
            Source::Pdf(pdf) => pdf.name(),
            Source::Image(image) => image.name(),
        }
    }

    fn page_count(&self) -> u32 {
        match self {
            Source::Pdf(pdf) => pdf.page_count(),
            Source::Image(image) => image.page_count(),
        }
    }

    fn append_to(&self, range: PageRange, assembly: &mut Assembly) -> Result<(), AssembleError> {
        match self {
            Source::Pdf(pdf) => pdf.append_to(range, assembly),
            Source::Image(image) => image.append_to(range, assembly),
        }
    }
}
