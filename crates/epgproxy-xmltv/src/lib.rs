//! XMLTV lookup engine for epgproxy.
//!
//! Resolves user-typed channel names against an alias table and scans raw
//! XMLTV text for channel and programme entries without building a tree.

/// Channel alias table and name normalization.
pub mod alias;
/// Channel resolution against a guide document.
pub mod channel;
/// Programme extraction for a channel and date.
pub mod program;
mod scan;

pub use alias::{AliasEntry, AliasIndex, AliasTable};
pub use channel::{ChannelMatch, list_channels, resolve_channel};
pub use program::{ProgramEntry, date_prefix, extract_programs, format_time};
