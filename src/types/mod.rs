//! 类型模块：批处理请求、结果与统计的数据模型。
//!
//! # Types Module
//!
//! Data model shared by every stage of a batch run.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`RequestRecord`] | One unit of work, immutable once read |
//! | [`Attachment`] | Binary blob tagged with a media type |
//! | [`ResultRecord`] | One-to-one outcome of a request, success or failure |
//! | [`BatchStats`] | Aggregate counts, elapsed time and throughput |
//!
//! ## Example
//!
//! ```rust
//! use batch_infer::types::{RequestRecord, ResultRecord};
//!
//! let req = RequestRecord::new(0, "Summarise this abstract").with_field("title", "X");
//! let res = ResultRecord::failure(&req, "HTTP 503: overloaded");
//! assert_eq!(res.index, 0);
//! assert_eq!(res.passthrough["title"], "X");
//! ```

pub mod record;
pub mod stats;

pub use record::{media_type_for, Attachment, AttachmentSource, RequestRecord, ResultRecord};
pub use stats::BatchStats;
