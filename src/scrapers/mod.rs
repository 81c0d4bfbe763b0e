//! Crawl workflows, one per CLI subcommand.
//!
//! | Workflow | Module | Output |
//! |----------|--------|--------|
//! | Page content | [`page`] | `{id}/content.txt`, `{id}/metadata.json`, `{id}/images/` |
//! | PDF harvest | [`pdfs`] | PDFs (and debug snippets) under one output folder |
//! | Menu links | [`links`] | one link list file |
//!
//! Each module exports a `run(urls, config, fetcher)` that processes the whole
//! URL list and returns a [`BatchSummary`](crate::models::BatchSummary).
//! Failed URLs are logged and counted, never fatal.

pub mod links;
pub mod page;
pub mod pdfs;
