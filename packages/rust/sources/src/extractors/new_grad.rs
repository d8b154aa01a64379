//! New-grad position listings.
//!
//! These tables label the role column "Position" or "Title" and link to the
//! application from a column headed "Apply".

use jobdigest_shared::{Posting, Result};

use super::{Extractor, TableExtractor, TableLayout};

#[derive(Debug, Clone)]
pub struct NewGradExtractor {
    table: TableExtractor,
}

impl NewGradExtractor {
    pub fn new() -> Self {
        Self {
            table: TableExtractor::new(TableLayout {
                role: &["role", "position", "title"],
                link: &["apply", "application", "link"],
                ..TableLayout::default()
            }),
        }
    }
}

impl Default for NewGradExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for NewGradExtractor {
    fn extract(&self, document: &str) -> Result<Vec<Posting>> {
        self.table.extract_postings(document)
    }

    fn render(&self, posting: &Posting) -> String {
        let mut out = format!("🎓 {} | {}\n", posting.company, posting.role);
        if let Some(location) = &posting.location {
            out.push_str(&format!("📍 {location}\n"));
        }
        if let Some(link) = &posting.application_link {
            out.push_str(&format!("🔗 {link}\n"));
        }
        out.push_str(&format!("📅 {}\n\n", posting.date_posted));
        out
    }

    fn name(&self) -> &str {
        "new-grad"
    }
}
