//! File outputs.
//!
//! # Submodules
//!
//! - [`dataset`]: the per-day JSON dataset written by the sweep and read by screening
//! - [`table`]: the CSV of postings accepted by screening
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── job_results_2025-05-06.json   # sweep dataset
//! └── filtered_jobs.csv             # screening output
//! ```

pub mod dataset;
pub mod table;
