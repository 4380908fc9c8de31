//! PDF document assembly
//!
//! Builds one PDF out of uploaded buffers:
//! - `merge_documents`: every page of every source, in submission order
//! - `split_document`: one contiguous, 1-based inclusive page range
//! - `convert_images`: one RGB page per raster image
//!
//! Each request runs as a [`JobCommand`] inside its own [`Job`] directory
//! allocated from a [`Workspace`], so concurrent requests never share
//! files. Everything here is synchronous and may block on disk I/O.

pub mod command;
pub mod convert;
pub mod document;
pub mod error;
pub mod merge;
pub mod range;
pub mod source;
pub mod split;
pub mod workspace;
pub mod writer;

#[cfg(test)]
mod fixtures;

pub use command::{JobCommand, JobMetrics, JobOutput, NamedInput};
pub use convert::convert_images;
pub use document::{Assembly, Document, Origin};
pub use error::{AssembleError, ErrorKind};
pub use merge::merge_documents;
pub use range::{PageBound, PageRange, RequestedRange};
pub use source::{ImageSource, PageSource, PdfSource, Source, SourceKind};
pub use split::split_document;
pub use workspace::{InputHandle, Job, Retention, Workspace};
pub use writer::{to_bytes, write_document, Artifact};
