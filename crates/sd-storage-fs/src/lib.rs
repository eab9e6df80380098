//! Filesystem access to the servedown source tree.
//!
//! - [`Scanner`] discovers source files with include/exclude filters on
//!   directory and file names.
//! - [`SourceDir`] reads individual files, distinguishing a missing file from
//!   other I/O failures and refusing paths that leave the source root.

mod scanner;
mod source;

pub use scanner::{ScanError, Scanner};
pub use source::{SourceDir, SourceError, resolve_relative};
