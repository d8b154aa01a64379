//! Per-audience de-duplication against previously sent postings.
//!
//! Each `(room, sent file)` pair owns one persisted list of postings that
//! have already gone out, newest first. Reconciling a batch of candidates
//! returns the ones not in that list and prepends them to it.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument, warn};

use jobdigest_shared::{JobDigestError, Posting, PostingKey, Result};
use jobdigest_storage::{JsonStoreExt, KeyValueStore};

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Whether a reconcile left the persisted sent list durable.
#[derive(Debug)]
pub enum WriteStatus {
    /// New postings were found and the updated list was written.
    Committed,
    /// Nothing new; storage was not touched.
    Unchanged,
    /// New postings were found but the updated list could not be written.
    Failed(JobDigestError),
}

impl WriteStatus {
    /// `true` unless the write failed.
    pub fn is_durable(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }

    pub fn error(&self) -> Option<&JobDigestError> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}

impl std::fmt::Display for WriteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Committed => f.write_str("committed"),
            Self::Unchanged => f.write_str("unchanged"),
            Self::Failed(e) => write!(f, "failed: {e}"),
        }
    }
}

/// Output of [`DedupStore::reconcile`].
#[derive(Debug)]
pub struct Reconciliation {
    /// Postings not sent before, in candidate order, stamped as sent.
    pub fresh: Vec<Posting>,
    /// Outcome of persisting them.
    pub write: WriteStatus,
}

impl Reconciliation {
    /// The fresh postings, or the write error if they were not recorded.
    pub fn into_result(self) -> Result<Vec<Posting>> {
        match self.write {
            WriteStatus::Failed(e) => Err(e),
            _ => Ok(self.fresh),
        }
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Sent-record bookkeeping for one source, over any [`KeyValueStore`].
///
/// The store handle is explicit; audiences are separated only by the key
/// passed to each call.
#[derive(Debug)]
pub struct DedupStore<S> {
    store: S,
    sent_file: String,
}

impl<S: KeyValueStore> DedupStore<S> {
    pub fn new(store: S, sent_file: impl Into<String>) -> Self {
        Self {
            store,
            sent_file: sent_file.into(),
        }
    }

    pub fn sent_file(&self) -> &str {
        &self.sent_file
    }

    /// Postings already sent to `key`, newest first. Missing state is empty.
    pub fn load(&self, key: &str) -> Result<Vec<Posting>> {
        if !self.store.exists(key, &self.sent_file)? {
            return Ok(Vec::new());
        }
        let sent: Vec<Posting> = self.store.read_json(key, &self.sent_file)?;

        let unstamped = sent.iter().filter(|p| !p.is_sent()).count();
        if unstamped > 0 {
            warn!(key, file = %self.sent_file, unstamped, "sent records without a send time");
        }
        Ok(sent)
    }

    /// Reconcile `candidates` for `key` at the current time.
    pub fn reconcile(&self, key: &str, candidates: &[Posting]) -> Result<Reconciliation> {
        self.reconcile_at(key, candidates, Utc::now())
    }

    /// Reconcile `candidates` for `key`, stamping new postings with `now`.
    ///
    /// A read failure is returned as an error and nothing is computed. A
    /// write failure is reported in [`Reconciliation::write`] alongside the
    /// fresh postings.
    #[instrument(skip_all, fields(key = %key, file = %self.sent_file))]
    pub fn reconcile_at(
        &self,
        key: &str,
        candidates: &[Posting],
        now: DateTime<Utc>,
    ) -> Result<Reconciliation> {
        let prior = self.load(key)?;
        let fresh: Vec<Posting> = unseen(&prior, candidates)
            .into_iter()
            .map(|p| p.mark_sent(now))
            .collect();

        debug!(
            prior = prior.len(),
            candidates = candidates.len(),
            fresh = fresh.len(),
            "reconciled"
        );

        if fresh.is_empty() {
            return Ok(Reconciliation {
                fresh,
                write: WriteStatus::Unchanged,
            });
        }

        let merged: Vec<&Posting> = fresh.iter().chain(prior.iter()).collect();
        let write = match self.store.write_json(key, &self.sent_file, &merged) {
            Ok(()) => {
                info!(added = fresh.len(), total = merged.len(), "sent records updated");
                WriteStatus::Committed
            }
            Err(e) => {
                error!(error = %e, fresh = fresh.len(), "failed to record sent postings");
                WriteStatus::Failed(e)
            }
        };

        Ok(Reconciliation { fresh, write })
    }
}

/// Candidates whose identity is in neither `prior` nor earlier candidates.
pub(crate) fn unseen<'a>(prior: &'a [Posting], candidates: &'a [Posting]) -> Vec<&'a Posting> {
    let mut seen: HashSet<PostingKey<'a>> = prior.iter().map(Posting::key).collect();
    candidates.iter().filter(|c| seen.insert(c.key())).collect()
}
