//! Job sources: where postings come from and how they are parsed and rendered.
//!
//! This crate provides:
//! - [`table`]: markdown pipe-table parsing and cell cleanup
//! - [`extractors`]: the [`Extractor`] capability and its per-source variants
//! - [`JobSource`]: a configured source: locator, sent-record file, extractor

pub mod extractors;
pub mod table;

use jobdigest_shared::SourceConfig;

pub use extractors::{
    Extractor, InternshipExtractor, NewGradExtractor, TableExtractor, TableLayout, extractor_for,
};
pub use table::{MarkdownTable, parse_tables};

/// A job source composed from its locator, storage file name and extractor.
pub struct JobSource {
    /// Unique short name.
    pub name: String,
    /// Label used in message headers, e.g. "Internships".
    pub job_type: String,
    /// Document locator handed to the fetcher.
    pub url: String,
    /// Sent-record file name inside each audience's storage.
    pub sent_file: String,
    extractor: Box<dyn Extractor>,
}

impl JobSource {
    pub fn new(
        name: impl Into<String>,
        job_type: impl Into<String>,
        url: impl Into<String>,
        sent_file: impl Into<String>,
        extractor: Box<dyn Extractor>,
    ) -> Self {
        Self {
            name: name.into(),
            job_type: job_type.into(),
            url: url.into(),
            sent_file: sent_file.into(),
            extractor,
        }
    }

    /// Build a source from its config entry.
    pub fn from_config(config: &SourceConfig) -> Self {
        Self::new(
            &config.name,
            &config.job_type,
            &config.url,
            &config.sent_file,
            extractor_for(config.kind),
        )
    }

    pub fn extractor(&self) -> &dyn Extractor {
        self.extractor.as_ref()
    }

    /// First line(s) of every message for this source.
    pub fn header(&self) -> String {
        format!("📢 New Job Opportunities for {} 📢\n\n", self.job_type)
    }
}

impl std::fmt::Debug for JobSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobSource")
            .field("name", &self.name)
            .field("job_type", &self.job_type)
            .field("url", &self.url)
            .field("sent_file", &self.sent_file)
            .field("extractor", &self.extractor.name())
            .finish()
    }
}
