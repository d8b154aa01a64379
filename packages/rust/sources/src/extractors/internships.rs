//! Internship listings.

use jobdigest_shared::{Posting, Result};

use super::{Extractor, TableExtractor, TableLayout};

/// Extractor for internship tables (`Company | Role | Location | Application/Link | Date Posted`).
#[derive(Debug, Clone)]
pub struct InternshipExtractor {
    table: TableExtractor,
}

impl InternshipExtractor {
    pub fn new() -> Self {
        Self {
            table: TableExtractor::new(TableLayout {
                role: &["role", "position"],
                date: &["date posted", "date"],
                ..TableLayout::default()
            }),
        }
    }
}

impl Default for InternshipExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for InternshipExtractor {
    fn extract(&self, document: &str) -> Result<Vec<Posting>> {
        self.table.extract_postings(document)
    }

    fn render(&self, posting: &Posting) -> String {
        let mut out = format!(
            "🏢 Company: {}\n💼 Role: {}\n",
            posting.company, posting.role
        );
        if let Some(location) = &posting.location {
            out.push_str(&format!("📍 Location: {location}\n"));
        }
        if let Some(link) = &posting.application_link {
            out.push_str(&format!("🔗 Apply: {link}\n"));
        }
        out.push_str(&format!("📅 Posted: {}\n\n", posting.date_posted));
        out
    }

    fn name(&self) -> &str {
        "internships"
    }
}
