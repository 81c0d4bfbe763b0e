//! Removal of non-content subtrees (navigation, footers, scripts, ads).

use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::debug;

/// Structural selectors whose matches never carry page content.
pub const NOISE_SELECTORS: [&str; 17] = [
    "footer",
    "footer.footer-area",
    ".single-blog-post",
    ".post-thumbnail",
    "nav",
    ".navigation",
    ".sidebar",
    ".ads",
    ".advertisement",
    "script",
    "style",
    ".cookie-notice",
    "#comments",
    ".social-media",
    ".breadcrumbs",
    ".site-header",
    ".menu",
];

static NOISE: Lazy<Vec<Selector>> = Lazy::new(|| {
    NOISE_SELECTORS
        .iter()
        .map(|s| Selector::parse(s).unwrap())
        .collect()
});

/// Detach every element matching [`NOISE_SELECTORS`] from the document.
///
/// Returns the number of distinct elements removed. Detached subtrees are
/// unreachable from the root, so a second call finds nothing and returns 0.
pub fn clean(doc: &mut Html) -> usize {
    let view: &Html = doc;
    let matched = NOISE
        .iter()
        .flat_map(|selector| view.select(selector).map(|el| el.id()))
        .unique()
        .collect::<Vec<_>>();

    for id in &matched {
        if let Some(mut node) = doc.tree.get_mut(*id) {
            node.detach();
        }
    }

    debug!(removed = matched.len(), "Cleaned document");
    matched.len()
}
