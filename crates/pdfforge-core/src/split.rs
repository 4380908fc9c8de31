//! Split algorithm
//!
//! Extracts one contiguous page range into a new document.

use tracing::debug;

use crate::document::{Assembly, Document};
use crate::error::AssembleError;
use crate::range::PageRange;
use crate::source::PageSource;

/// Copy the pages in `range` of `source` into a new document, keeping
/// their order. The range is re-checked against the source since it may
/// have been resolved against a different one.
pub fn split_document<S: PageSource + ?Sized>(
    source: &S,
    range: PageRange,
) -> Result<Document, AssembleError> {
    if range.end() > source.page_count() {
        return Err(AssembleError::InvalidRange(format!(
            "Page {} does not exist (document has {} pages)",
            range.end(),
            source.page_count()
        )));
    }
    if range.is_empty() {
        return Err(AssembleError::EmptyInputSet("No pages in range".into()));
    }

    debug!(
        input = source.name(),
        start = range.start(),
        end = range.end(),
        "extracting range"
    );

    let mut assembly = Assembly::new("split");
    source.append_to(range, &mut assembly)?;

    if assembly.page_count() != range.len() {
        return Err(AssembleError::EmptyInputSet(format!(
            "Expected {} pages from {:?}, got {}",
            range.len(),
            source.name(),
            assembly.page_count()
        )));
    }

    assembly.finish()
}
