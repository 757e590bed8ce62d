//! Integration tests
//!
//! These tests use wiremock to create mock HTTP servers and tempfile
//! directories for output, and drive the scraper end-to-end.

mod common;
mod crawl_tests;
mod fetch_tests;
mod output_tests;
