//! Image to PDF conversion
//!
//! Packages decoded images as one page each, in submission order.

use tracing::debug;

use crate::document::{Assembly, Document};
use crate::error::AssembleError;
use crate::source::{ImageSource, PageSource};

pub fn convert_images(images: &[ImageSource]) -> Result<Document, AssembleError> {
    if images.is_empty() {
        return Err(AssembleError::EmptyInputSet("No images to convert".into()));
    }

    let mut assembly = Assembly::new("convert");
    for image in images {
        debug!(
            input = image.name(),
            width = image.image().width(),
            height = image.image().height(),
            "adding image page"
        );
        image.append_to(image.full_range(), &mut assembly)?;
    }

    assembly.finish()
}
