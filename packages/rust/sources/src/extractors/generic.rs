//! Column-mapped table extractor shared by the source variants.
//!
//! Columns are located by header label, so reordered or extra columns in the
//! upstream document do not break extraction.

use jobdigest_shared::{JobDigestError, Posting, Result};
use tracing::debug;

use crate::table::{clean_cell, first_link, parse_tables};

/// Company cell meaning "same company as the row above".
const CONTINUATION_MARK: &str = "↳";

/// Marker in the link column for postings that no longer accept applications.
const CLOSED_MARK: &str = "🔒";

/// Header aliases (lowercase substrings) used to locate each column.
#[derive(Debug, Clone)]
pub struct TableLayout {
    pub company: &'static [&'static str],
    pub role: &'static [&'static str],
    pub date: &'static [&'static str],
    pub location: &'static [&'static str],
    pub link: &'static [&'static str],
    /// Drop rows whose link column carries the closed marker.
    pub skip_closed: bool,
}

impl Default for TableLayout {
    fn default() -> Self {
        Self {
            company: &["company"],
            role: &["role", "position"],
            date: &["date"],
            location: &["location"],
            link: &["application", "link", "apply"],
            skip_closed: true,
        }
    }
}

/// Column positions resolved against one table's header.
struct Columns {
    company: usize,
    role: usize,
    date: usize,
    location: Option<usize>,
    link: Option<usize>,
}

impl Columns {
    fn required_width(&self) -> usize {
        [self.company, self.role, self.date].into_iter().max().unwrap_or(0) + 1
    }
}

/// Extracts postings from every markdown table whose header matches a layout.
#[derive(Debug, Clone, Default)]
pub struct TableExtractor {
    layout: TableLayout,
}

impl TableExtractor {
    pub fn new(layout: TableLayout) -> Self {
        Self { layout }
    }

    /// Parse every matching table in `document` into unsent postings.
    pub fn extract_postings(&self, document: &str) -> Result<Vec<Posting>> {
        let mut postings = Vec::new();
        let mut matched_tables = 0;

        for table in parse_tables(document) {
            let Some(columns) = self.resolve_columns(&table) else {
                debug!(header = ?table.header, "table header does not match layout, skipping");
                continue;
            };
            matched_tables += 1;

            let mut previous_company: Option<String> = None;
            for row in &table.rows {
                if row.len() < columns.required_width() {
                    debug!(cells = row.len(), "row too short, skipping");
                    continue;
                }

                let link_cell = columns.link.and_then(|i| row.get(i));
                let closed = link_cell.is_some_and(|c| c.contains(CLOSED_MARK));

                let company = clean_cell(&row[columns.company]);
                let company = if company == CONTINUATION_MARK {
                    previous_company.clone().ok_or_else(|| {
                        JobDigestError::extraction(
                            "continuation row without a preceding company",
                        )
                    })?
                } else {
                    company
                };
                if !company.is_empty() {
                    previous_company = Some(company.clone());
                }

                if closed && self.layout.skip_closed {
                    debug!(%company, "posting closed, skipping");
                    continue;
                }

                let role = clean_cell(&row[columns.role]);
                let date = clean_cell(&row[columns.date]);
                if company.is_empty() || role.is_empty() || date.is_empty() {
                    debug!(%company, %role, %date, "row missing required fields, skipping");
                    continue;
                }

                let mut posting = Posting::new(company, role, date);
                if let Some(location) = columns
                    .location
                    .and_then(|i| row.get(i))
                    .map(|c| clean_cell(c))
                    .filter(|l| !l.is_empty())
                {
                    posting = posting.with_location(location);
                }
                if let Some(link) = link_cell.and_then(|c| first_link(c)) {
                    posting = posting.with_application_link(link);
                }
                postings.push(posting);
            }
        }

        if matched_tables == 0 {
            return Err(JobDigestError::extraction(
                "no table with company, role and date columns found",
            ));
        }

        debug!(tables = matched_tables, postings = postings.len(), "extracted postings");
        Ok(postings)
    }

    fn resolve_columns(&self, table: &crate::table::MarkdownTable) -> Option<Columns> {
        Some(Columns {
            company: table.column(self.layout.company)?,
            role: table.column(self.layout.role)?,
            date: table.column(self.layout.date)?,
            location: table.column(self.layout.location),
            link: table.column(self.layout.link),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "\
| Company | Role | Location | Application/Link | Date Posted |
| ------- | ---- | -------- | ---------------- | ----------- |
| **[Acme](https://simplify.jobs/c/Acme)** | Software Engineering Intern | Austin, TX | <a href=\"https://acme.example.com/apply\"><img src=\"a.png\" alt=\"Apply\"></a> | Jan 05 |
| ↳ | Data Science Intern | Remote | <a href=\"https://acme.example.com/ds\">Apply</a> | Jan 04 |
| Beta Corp | Firmware Intern | Boston, MA | 🔒 | Jan 03 |
| ↳ | Hardware Intern | Boston, MA | <a href=\"https://beta.example.com/hw\">Apply</a> | Jan 03 |
| Gamma | Broken row |
";

    #[test]
    fn extracts_rows_with_continuations_and_links() {
        let postings = TableExtractor::default().extract_postings(DOC).unwrap();

        assert_eq!(postings.len(), 3);
        assert_eq!(postings[0].company, "Acme");
        assert_eq!(postings[0].date_posted, "Jan 05");
        assert_eq!(postings[0].location.as_deref(), Some("Austin, TX"));
        assert_eq!(
            postings[0].application_link.as_deref(),
            Some("https://acme.example.com/apply")
        );
        assert_eq!(postings[1].company, "Acme");
        assert_eq!(postings[1].role, "Data Science Intern");
        // Closed Beta row is dropped but still anchors the continuation.
        assert_eq!(postings[2].company, "Beta Corp");
        assert_eq!(postings[2].role, "Hardware Intern");
        assert!(postings.iter().all(|p| !p.is_sent()));
    }

    #[test]
    fn closed_rows_kept_when_layout_allows() {
        let layout = TableLayout {
            skip_closed: false,
            ..TableLayout::default()
        };
        let postings = TableExtractor::new(layout).extract_postings(DOC).unwrap();
        assert_eq!(postings.len(), 4);
        assert_eq!(postings[2].application_link, None);
    }

    #[test]
    fn leading_continuation_is_an_error() {
        let doc = "| Company | Role | Date |\n|---|---|---|\n| ↳ | Intern | Jan 1 |\n";
        let err = TableExtractor::default().extract_postings(doc).unwrap_err();
        assert!(matches!(err, JobDigestError::Extraction { .. }));
    }

    #[test]
    fn document_without_matching_table_is_an_error() {
        let doc = "# Nothing here\n\n| Name | Score |\n|---|---|\n| a | 1 |\n";
        let err = TableExtractor::default().extract_postings(doc).unwrap_err();
        assert!(err.to_string().contains("no table"));
    }

    #[test]
    fn matching_table_with_no_rows_is_empty_not_error() {
        let doc = "| Company | Role | Date Posted |\n|---|---|---|\n";
        let postings = TableExtractor::default().extract_postings(doc).unwrap();
        assert!(postings.is_empty());
    }
}
