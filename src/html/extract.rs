//! Document-order content extraction.
//!
//! Walks the body's descendants and classifies `h1` headings, paragraphs,
//! tables and images into [`ContentFragment`]s. Images come out as provisional
//! [`ContentFragment::ImageMarker`]s; the image filter decides later which
//! of them survive.

use crate::models::ContentFragment;
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::warn;
use url::Url;

static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static ROWS: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").unwrap());
static CELLS: Lazy<Selector> = Lazy::new(|| Selector::parse("td, th").unwrap());

/// Fragments of one page, before image filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub fragments: Vec<ContentFragment>,
    /// The document had no `<body>`; fragments are empty.
    pub missing_body: bool,
}

/// Text of the page's `<title>`, if present and non-empty.
pub fn page_title(doc: &Html) -> Option<String> {
    doc.select(&TITLE)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())
}

/// Extract ordered content fragments from a (cleaned) document.
pub fn extract(doc: &Html, base_url: &Url) -> Extraction {
    let Some(body) = doc.select(&BODY).next() else {
        warn!(%base_url, "No body element found in HTML");
        return Extraction {
            fragments: Vec::new(),
            missing_body: true,
        };
    };

    let mut fragments = Vec::new();
    for element in body.descendants().filter_map(ElementRef::wrap) {
        match element.value().name() {
            "h1" => {
                let text = element_text(element);
                if !text.is_empty() {
                    fragments.push(ContentFragment::Heading(text));
                }
            }
            "p" => {
                if inside_table(element) {
                    continue;
                }
                let text = element_text(element);
                if !text.is_empty() {
                    fragments.push(ContentFragment::Paragraph(text));
                }
            }
            "table" => {
                fragments.push(ContentFragment::Separator);
                fragments.extend(table_rows(element).map(ContentFragment::TableRow));
            }
            "img" => {
                let Some(src) = element.value().attr("src").filter(|s| !s.is_empty()) else {
                    continue;
                };
                if let Some(url) = resolve_image_src(src, base_url) {
                    fragments.push(ContentFragment::ImageMarker(url));
                }
            }
            _ => {}
        }
    }

    Extraction {
        fragments,
        missing_body: false,
    }
}

/// Rows of a table with at least one non-empty cell.
fn table_rows(table: ElementRef<'_>) -> impl Iterator<Item = Vec<String>> + '_ {
    table
        .select(&ROWS)
        .map(|row| row.select(&CELLS).map(element_text).collect::<Vec<_>>())
        .filter(|cells| cells.iter().any(|c| !c.is_empty()))
}

fn inside_table(element: ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| a.value().name() == "table")
}

/// Resolve an `img` src against the page URL unless it is already absolute.
pub fn resolve_image_src(src: &str, base_url: &Url) -> Option<String> {
    let src = src.trim();
    if src.starts_with("http://") || src.starts_with("https://") {
        return Some(src.to_string());
    }
    base_url.join(src).ok().map(String::from)
}

/// Whitespace-normalized text content of an element.
pub fn element_text(element: ElementRef<'_>) -> String {
    element.text().flat_map(str::split_whitespace).join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://hus.vnu.edu.vn/gioi-thieu/lich-su.html").unwrap()
    }

    fn run(html: &str) -> Vec<ContentFragment> {
        extract(&Html::parse_document(html), &base()).fragments
    }

    #[test]
    fn test_paragraphs_in_source_order() {
        let fragments = run(
            "<html><body><p>One</p><div><p>  Two \n words </p></div><p></p><p>Three</p></body></html>",
        );
        assert_eq!(
            fragments,
            vec![
                ContentFragment::Paragraph("One".into()),
                ContentFragment::Paragraph("Two words".into()),
                ContentFragment::Paragraph("Three".into()),
            ]
        );
    }

    #[test]
    fn test_paragraph_inside_table_is_not_standalone() {
        let fragments = run(
            "<body><table><tr><td><p>Cell para</p></td><td>x</td></tr></table><p>After</p></body>",
        );
        assert_eq!(
            fragments,
            vec![
                ContentFragment::Separator,
                ContentFragment::TableRow(vec!["Cell para".into(), "x".into()]),
                ContentFragment::Paragraph("After".into()),
            ]
        );
    }

    #[test]
    fn test_table_skips_empty_rows() {
        let fragments = run(
            "<body><table>
               <tr><th>Năm</th><th>Sự kiện</th></tr>
               <tr><td> </td><td></td></tr>
               <tr><td>1956</td><td>Thành lập</td></tr>
             </table></body>",
        );
        assert_eq!(
            fragments,
            vec![
                ContentFragment::Separator,
                ContentFragment::TableRow(vec!["Năm".into(), "Sự kiện".into()]),
                ContentFragment::TableRow(vec!["1956".into(), "Thành lập".into()]),
            ]
        );
    }

    #[test]
    fn test_headings_and_images() {
        let fragments = run(
            r#"<body><h1>Lịch sử</h1><h3>Giai đoạn</h3><h2> </h2>
               <img src="/DATA/IMAGES/a.jpg"><img src=""><img alt="no src">
               <img src="https://cdn.example.com/b.png"></body>"#,
        );
        assert_eq!(
            fragments,
            vec![
                ContentFragment::Heading("Lịch sử".into()),
                ContentFragment::ImageMarker("https://hus.vnu.edu.vn/DATA/IMAGES/a.jpg".into()),
                ContentFragment::ImageMarker("https://cdn.example.com/b.png".into()),
            ]
        );
    }

    #[test]
    fn test_lower_headings_are_ignored() {
        let fragments = run(
            "<body><h2>Tổng quan</h2><h3>Giai đoạn</h3><h6>Chú thích</h6><p>Nội dung</p></body>",
        );
        assert_eq!(fragments, vec![ContentFragment::Paragraph("Nội dung".into())]);
    }

    #[test]
    fn test_relative_image_resolves_against_page() {
        assert_eq!(
            resolve_image_src("img/x.png", &base()).as_deref(),
            Some("https://hus.vnu.edu.vn/gioi-thieu/img/x.png")
        );
    }

    #[test]
    fn test_page_title() {
        let doc = Html::parse_document("<html><head><title> Trang  chủ </title></head></html>");
        assert_eq!(page_title(&doc).as_deref(), Some("Trang chủ"));
        let doc = Html::parse_document("<html><body></body></html>");
        assert_eq!(page_title(&doc), None);
    }

    #[test]
    fn test_empty_body_yields_no_fragments() {
        let extraction = extract(&Html::parse_document("<html><body></body></html>"), &base());
        assert!(extraction.fragments.is_empty());
        assert!(!extraction.missing_body);
    }

    #[test]
    fn test_fragment_without_body_element() {
        // html5ever always synthesizes a body for documents, but not for fragments.
        let doc = Html::parse_fragment("<p>loose</p>");
        let extraction = extract(&doc, &base());
        assert!(extraction.missing_body);
        assert!(extraction.fragments.is_empty());
    }
}
