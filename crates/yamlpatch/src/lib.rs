//! # yamlpatch
//!
//! Structure-preserving edits of YAML mapping documents.
//!
//! Only the lines holding an edited value are rewritten. Comments, blank
//! lines, key order and the formatting of every other value are left
//! exactly as they were, so applying the same edits twice yields the same
//! file.
//!
//! ## Example
//!
//! ```
//! use yamlpatch::{Document, Value};
//!
//! let mut doc = Document::parse("# relay\nsmtp:\n  port: 25 # default\n").unwrap();
//! doc.set("smtp.port", 587).unwrap();
//! doc.set("available_methods", Value::flow_seq(["mail"])).unwrap();
//!
//! assert_eq!(
//!     doc.render(),
//!     "# relay\nsmtp:\n  port: 587 # default\navailable_methods: [\"mail\"]\n"
//! );
//! ```

mod document;
mod error;
mod line;
mod value;

pub use document::Document;
pub use error::{Error, Result};
pub use line::mask_value;
pub use value::Value;
