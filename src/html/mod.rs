//! HTML processing for fetched pages.
//!
//! - [`clean`]: strips navigation, footers, scripts and other noise
//! - [`extract`]: turns the cleaned document into ordered content fragments

pub mod clean;
pub mod extract;

pub use clean::clean;
pub use extract::{extract, page_title};
