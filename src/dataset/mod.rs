//! Batch input and output files.
//!
//! Input is newline-delimited JSON, one request per line. Output is one
//! result per line in input order, plus a single stats document.

mod reader;
mod writer;

pub use reader::{parse_requests, read_requests};
pub use writer::{stats_path_for, write_results, write_stats};
