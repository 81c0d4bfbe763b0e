//! Output writers for crawled pages.
//!
//! # Submodules
//!
//! - [`content`]: renders content fragments to `content.txt`
//! - [`metadata`]: writes the `metadata.json` sidecar
//! - [`links`]: appends harvested links to a link list file
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! └── gioi-thieu_co-cau-to-chuc/
//!     ├── content.txt
//!     ├── metadata.json
//!     └── images/
//!         ├── image_1.jpg
//!         └── image_3.png
//! ```

pub mod content;
pub mod links;
pub mod metadata;
