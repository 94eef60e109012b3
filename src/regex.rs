//! Re-exports from either `regex` or `regex_lite`, depending on features.
//!
//! The format-validity checks only need `is_match`, so both backends expose the
//! same surface here.

#[cfg(feature = "lite")]
pub(crate) use regex_lite::Regex;
#[cfg(all(feature = "regex", not(feature = "lite")))]
pub(crate) use regex::Regex;

#[cfg(not(any(feature = "regex", feature = "lite")))]
compile_error!("bibrecon requires the \"regex\" or \"lite\" feature to be enabled");
