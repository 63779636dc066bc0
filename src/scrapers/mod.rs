//! Source adapters: where raw postings come from.
//!
//! The sweep never parses a job site itself. Each query is handed to a
//! [`SourceAdapter`], which may be slow, flaky, or return nothing at all;
//! the scheduler bounds it with a timeout and isolates its failures.
//!
//! # Adapters
//!
//! | Adapter | Module | Method |
//! |---------|--------|--------|
//! | JobSpy API | [`jobspy`] | JSON over HTTP from a JobSpy-compatible search service |

use crate::error::SweepError;
use crate::models::{RawPosting, SearchQuery};
use async_trait::async_trait;

pub mod jobspy;

/// Anything that can answer a (site, term, location) query with raw postings.
///
/// Results are returned in the order the source produced them; an empty
/// vector is a valid answer, not an error.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<RawPosting>, SweepError>;
}
