//! Purpose: Define the stable public Rust API boundary for papyra.
//! Exports: Core types and operations needed by the CLI and library callers.
//! Role: Public, additive-only surface; hides internal module layout.
//! Invariants: This module is the only public path library callers should use.
//! Invariants: Re-exported names stay stable once published.

mod document;

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::fsops::{CopyOptions, CopyReport, FileInfo, copy, exists, remove, stat};
pub use crate::core::handle::{Handle, HandleLock, Mode, SeekTo};
pub use crate::core::json::{DumpOptions, dump, from_str, load, sorted, to_string};
pub use document::Document;
