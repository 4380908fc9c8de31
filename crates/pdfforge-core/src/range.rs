//! Page range resolution
//!
//! Ranges are 1-based and inclusive. Validation happens in two steps: the
//! raw bounds are checked on their own (numeric, positive, not inverted)
//! before any input is touched, then bound to a concrete page count.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::AssembleError;
use crate::source::PageSource;

/// A page bound as submitted by a client, either a JSON number or a form string
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PageBound {
    Number(i64),
    Text(String),
}

impl PageBound {
    fn parse(&self, label: &str) -> Result<i64, AssembleError> {
        match self {
            PageBound::Number(n) => Ok(*n),
            PageBound::Text(raw) => raw
                .trim()
                .parse()
                .map_err(|_| AssembleError::InvalidRange(format!("Invalid {}: {:?}", label, raw))),
        }
    }
}

impl From<i64> for PageBound {
    fn from(n: i64) -> Self {
        PageBound::Number(n)
    }
}

impl From<&str> for PageBound {
    fn from(raw: &str) -> Self {
        PageBound::Text(raw.to_string())
    }
}

/// Bounds that are well-formed but not yet checked against a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestedRange {
    start: u32,
    end: u32,
}

impl RequestedRange {
    pub fn new(start: i64, end: i64) -> Result<Self, AssembleError> {
        if start < 1 || end < 1 {
            return Err(AssembleError::InvalidRange(
                "Page numbers must be >= 1".into(),
            ));
        }
        if start > end {
            return Err(AssembleError::InvalidRange(format!(
                "Start {} > end {}",
                start, end
            )));
        }
        let start = u32::try_from(start)
            .map_err(|_| AssembleError::InvalidRange(format!("Start {} is too large", start)))?;
        let end = u32::try_from(end)
            .map_err(|_| AssembleError::InvalidRange(format!("End {} is too large", end)))?;
        Ok(Self { start, end })
    }

    pub fn parse(start: &PageBound, end: &PageBound) -> Result<Self, AssembleError> {
        Self::new(start.parse("start_page")?, end.parse("end_page")?)
    }

    /// Bind to a document with `page_count` pages. Out-of-bounds ranges are
    /// rejected, never clamped.
    pub fn resolve(self, page_count: u32) -> Result<PageRange, AssembleError> {
        if self.end > page_count {
            return Err(AssembleError::InvalidRange(format!(
                "Page {} does not exist (document has {} pages)",
                self.end, page_count
            )));
        }
        Ok(PageRange {
            start: self.start,
            end: self.end,
        })
    }
}

/// Closed interval of pages within one document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRange {
    start: u32,
    end: u32,
}

impl PageRange {
    /// Validate `start..=end` against `source` without touching it
    pub fn resolve<S: PageSource + ?Sized>(
        source: &S,
        start: i64,
        end: i64,
    ) -> Result<Self, AssembleError> {
        let requested = RequestedRange::new(start, end)?;
        requested.resolve(source.page_count())
    }

    pub(crate) fn whole(page_count: u32) -> Self {
        Self {
            start: 1,
            end: page_count,
        }
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    pub fn len(&self) -> u32 {
        (self.end + 1).saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 0-based slice indices
    pub fn indices(&self) -> Range<usize> {
        (self.start as usize).saturating_sub(1)..self.end as usize
    }
}
