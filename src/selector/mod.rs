//! Selector resolution
//!
//! Template selectors are written either as CSS or as path expressions, and
//! the template does not say which. Resolution is an attempt chain: a
//! selector is first parsed as CSS; if it is not valid CSS it falls back to
//! the path-expression engine (when compiled in with the `xpath` feature).

#[cfg(feature = "xpath")]
pub mod xpath;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

/// Outcome of one attempt in the resolution chain
#[derive(Debug)]
pub enum Resolution<'a> {
    /// The selector was understood; the elements may be empty
    Matched(Vec<ElementRef<'a>>),
    /// The selector is not valid in this grammar; try the next one
    FallbackNeeded,
    /// The selector cannot be resolved by any remaining grammar
    Failed { reason: String },
}

/// Resolves `selector` against `document`, returning matches in document order.
///
/// Never fails: selectors that cannot be resolved yield an empty list and a
/// warning so the remaining categories are still extracted.
pub fn resolve<'a>(document: &'a Html, selector: &str) -> Vec<ElementRef<'a>> {
    let resolution = match try_structural(document, selector) {
        Resolution::FallbackNeeded => try_path(document, selector),
        other => other,
    };

    match resolution {
        Resolution::Matched(elements) => {
            debug!("Selector '{}' matched {} element(s)", selector, elements.len());
            elements
        }
        Resolution::Failed { reason } => {
            warn!("Skipping selector '{}': {}", selector, reason);
            Vec::new()
        }
        Resolution::FallbackNeeded => {
            warn!("Skipping selector '{}': no grammar accepted it", selector);
            Vec::new()
        }
    }
}

/// CSS attempt
pub fn try_structural<'a>(document: &'a Html, selector: &str) -> Resolution<'a> {
    match Selector::parse(selector) {
        Ok(parsed) => Resolution::Matched(document.select(&parsed).collect()),
        Err(_) => Resolution::FallbackNeeded,
    }
}

/// Path-expression attempt
#[cfg(feature = "xpath")]
pub fn try_path<'a>(document: &'a Html, selector: &str) -> Resolution<'a> {
    let compiled = match xpath::XPath::compile(selector) {
        Ok(compiled) => compiled,
        Err(e) => {
            return Resolution::Failed {
                reason: format!("not valid CSS or XPath ({})", e),
            }
        }
    };
    match compiled.select(document) {
        Ok(elements) => Resolution::Matched(elements),
        Err(e) => Resolution::Failed {
            reason: format!("XPath evaluation failed ({})", e),
        },
    }
}

/// Path-expression attempt
#[cfg(not(feature = "xpath"))]
pub fn try_path<'a>(_document: &'a Html, _selector: &str) -> Resolution<'a> {
    Resolution::Failed {
        reason: "not valid CSS and XPath support is not compiled in".to_string(),
    }
}

/// Validates a selector against the available grammars without a document
pub fn is_resolvable(selector: &str) -> bool {
    if Selector::parse(selector).is_ok() {
        return true;
    }
    #[cfg(feature = "xpath")]
    {
        xpath::XPath::compile(selector).is_ok()
    }
    #[cfg(not(feature = "xpath"))]
    {
        false
    }
}
