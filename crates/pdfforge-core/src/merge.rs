//! Merge algorithm
//!
//! Concatenates every page of every source, sources in the order given and
//! pages in their native order.

use tracing::debug;

use crate::document::{Assembly, Document};
use crate::error::AssembleError;
use crate::source::PageSource;

/// Merge sources into one new document.
///
/// Repeated sources are legal and yield repeated pages.
pub fn merge_documents<S: PageSource>(sources: &[S]) -> Result<Document, AssembleError> {
    if sources.is_empty() {
        return Err(AssembleError::EmptyInputSet("No documents to merge".into()));
    }

    let mut assembly = Assembly::new("merge");
    for source in sources {
        debug!(
            input = source.name(),
            pages = source.page_count(),
            "appending source"
        );
        source.append_to(source.full_range(), &mut assembly)?;
    }

    assembly.finish()
}
