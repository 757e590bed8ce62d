//! Template-driven content extraction
//!
//! An [`Extractor`] applies a [`Template`] to one parsed page:
//!
//! 1. every exclusion selector is resolved and its matches are detached from
//!    the document;
//! 2. every normal category is resolved against the pruned document and
//!    turned into normalized text, or into harvested links in link mode.
//!
//! The document is consumed by the call and must not be reused.

mod captcha;
mod links;
mod record;
mod text;

pub use captcha::detect_captcha;
pub use links::{harvest_links, resolve_link};
pub use record::{FieldValue, Record};
pub use text::{clean_lines, document_text, has_visible_text, normalized_text};

use crate::config::OutputMode;
use crate::selector;
use crate::template::{Template, TemplateEntry};
use ego_tree::NodeId;
use scraper::Html;
use tracing::debug;
use url::Url;

/// Applies one template to fetched pages
#[derive(Debug, Clone)]
pub struct Extractor {
    exclusions: Vec<TemplateEntry>,
    categories: Vec<TemplateEntry>,
    mode: OutputMode,
}

impl Extractor {
    pub fn new(template: &Template, mode: OutputMode) -> Self {
        Self {
            exclusions: template.exclusions().cloned().collect(),
            categories: template.categories().cloned().collect(),
            mode,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Parses `html` and extracts one record for `page_url`
    pub fn extract(&self, html: &str, page_url: &Url) -> Record {
        let mut document = Html::parse_document(html);
        self.extract_document(&mut document, page_url)
    }

    /// Extracts one record from an already-parsed document, pruning it in place
    pub fn extract_document(&self, document: &mut Html, page_url: &Url) -> Record {
        self.apply_exclusions(document);

        let document: &Html = document;
        let url = page_url.to_string();

        if self.mode.is_link_harvest() {
            let mut urls = Vec::new();
            for entry in &self.categories {
                for element in selector::resolve(document, &entry.selector) {
                    urls.extend(harvest_links(element, page_url));
                }
            }
            return Record::Links { url, urls };
        }

        let fields = self
            .categories
            .iter()
            .map(|entry| {
                let elements = selector::resolve(document, &entry.selector);
                let value = if elements.is_empty() {
                    FieldValue::Missing
                } else {
                    let texts = elements
                        .into_iter()
                        .map(normalized_text)
                        .filter(|t| !t.is_empty())
                        .collect();
                    FieldValue::from_texts(texts)
                };
                (entry.category.clone(), value)
            })
            .collect();

        Record::Extracted { url, fields }
    }

    /// Detaches every subtree matched by an exclusion selector
    fn apply_exclusions(&self, document: &mut Html) {
        // Collect first: the matches borrow the document immutably
        let mut doomed: Vec<NodeId> = Vec::new();
        for entry in &self.exclusions {
            let matched = selector::resolve(document, &entry.selector);
            debug!(
                "Exclusion '{}' removes {} element(s)",
                entry.category,
                matched.len()
            );
            doomed.extend(matched.iter().map(|el| el.id()));
        }

        for id in doomed {
            if let Some(mut node) = document.tree.get_mut(id) {
                node.detach();
            }
        }
    }
}
