//! Splitting postings into header-prefixed text messages.

use jobdigest_shared::{JobDigestError, Posting, Result};

/// Groups postings into messages of at most `page_size` postings each.
#[derive(Debug, Clone, Copy)]
pub struct MessageBatcher {
    page_size: usize,
}

impl MessageBatcher {
    /// Fails with a config error if `page_size` is zero.
    pub fn new(page_size: usize) -> Result<Self> {
        if page_size == 0 {
            return Err(JobDigestError::config("jobs_per_message must be at least 1"));
        }
        Ok(Self { page_size })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// One message per chunk of postings, each starting with `header`,
    /// followed by every posting passed through `render`. Order is preserved
    /// and no postings means no messages.
    pub fn batch<F>(&self, postings: &[Posting], header: &str, render: F) -> Vec<String>
    where
        F: Fn(&Posting) -> String,
    {
        postings
            .chunks(self.page_size)
            .map(|chunk| {
                chunk.iter().fold(header.to_string(), |mut message, posting| {
                    message.push_str(&render(posting));
                    message
                })
            })
            .collect()
    }
}

/// Shorthand for `MessageBatcher::new(page_size)?.batch(..)`.
pub fn batch<F>(postings: &[Posting], header: &str, page_size: usize, render: F) -> Result<Vec<String>>
where
    F: Fn(&Posting) -> String,
{
    Ok(MessageBatcher::new(page_size)?.batch(postings, header, render))
}
