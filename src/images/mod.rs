//! Image filtering and download.
//!
//! - [`filter`]: decides which candidate images are real content
//! - [`download`]: saves accepted images next to the page's content file

pub mod download;
pub mod filter;

pub use download::download_images;
pub use filter::ImageFilter;
