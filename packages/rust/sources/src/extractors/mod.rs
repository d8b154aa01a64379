//! Extractor trait and the per-source variants.
//!
//! Each job source publishes its postings in a slightly different table and
//! wants its own message format. An [`Extractor`] owns both concerns for one
//! source; the ingestion pipeline treats it as an opaque capability.

mod generic;
mod internships;
mod new_grad;

use jobdigest_shared::{Posting, Result, SourceKind};

pub use generic::{TableExtractor, TableLayout};
pub use internships::InternshipExtractor;
pub use new_grad::NewGradExtractor;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Source-specific parsing and rendering of postings.
pub trait Extractor: Send + Sync {
    /// Parse a raw source document into postings with `company`, `role` and
    /// a year-less `date_posted` populated.
    ///
    /// Fails with [`jobdigest_shared::JobDigestError::Extraction`] when the
    /// document has no recognizable postings table.
    fn extract(&self, document: &str) -> Result<Vec<Posting>>;

    /// Render one posting as message text, including its trailing separator.
    fn render(&self, posting: &Posting) -> String;

    /// Human-readable extractor name for tracing.
    fn name(&self) -> &str;
}

/// Build the extractor for a configured source kind.
pub fn extractor_for(kind: SourceKind) -> Box<dyn Extractor> {
    match kind {
        SourceKind::Internships => Box::new(InternshipExtractor::new()),
        SourceKind::NewGrad => Box::new(NewGradExtractor::new()),
    }
}
