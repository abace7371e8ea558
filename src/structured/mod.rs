//! Structured output helpers for batch responses.
//!
//! Downstream consumers usually want JSON out of free-form model text. The
//! extraction here is deliberately lenient: it returns no structures instead of
//! an error when a response holds no valid JSON.
//!
//! # Examples
//!
//! ```
//! use batch_infer::structured::extract_json;
//! use serde_json::json;
//!
//! let response = "Result:\n```json\n{\"triplets\": []}\n```";
//! assert_eq!(extract_json(response), vec![json!({"triplets": []})]);
//! assert!(extract_json("no json here").is_empty());
//! ```

pub mod extract;

pub use extract::{extract_first_object, extract_json};
