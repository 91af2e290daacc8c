//! Output generation for the cached article collection.
//!
//! # Submodules
//!
//! - [`digest`]: Renders the collection as a Markdown listing for the terminal
//! - [`json`]: Exports the collection to a JSON file for other tools

pub mod digest;
pub mod json;
