//! A compact path-expression engine over `scraper` documents
//!
//! Covers the subset of XPath 1.0 that selector templates use in practice:
//! absolute and relative location paths, the common axes, name / `*` /
//! `text()` / `node()` tests, positional and boolean predicates, unions,
//! parenthesised filter expressions, and the core string, number and
//! node-set functions. Element names are matched ASCII case-insensitively
//! since HTML parsing lowercases them.

mod eval;
mod lexer;
mod parser;

use ego_tree::NodeRef;
use eval::{Evaluator, Item, Value};
use parser::Expr;
use scraper::{ElementRef, Html, Node};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum XPathError {
    #[error("invalid character at position {position}: {message}")]
    Lex { position: usize, message: String },

    #[error("syntax error: {0}")]
    Parse(String),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("wrong number of arguments ({found}) for {function}()")]
    Arity { function: String, found: usize },

    #[error("expression yields a {0}, not a node-set")]
    NotANodeSet(String),
}

/// A compiled path expression
#[derive(Debug, Clone)]
pub struct XPath {
    source: String,
    expr: Expr,
}

impl XPath {
    pub fn compile(source: &str) -> Result<Self, XPathError> {
        let tokens = lexer::tokenize(source)?;
        let expr = parser::parse(tokens)?;
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Evaluates against `html` and returns the matched elements in document order.
    ///
    /// Text-node results stand in for their parent element; attribute
    /// results have no element of their own and are dropped.
    pub fn select<'a>(&self, html: &'a Html) -> Result<Vec<ElementRef<'a>>, XPathError> {
        let root = html.tree.root();
        let evaluator = Evaluator::new(root);
        let items = match evaluator.evaluate(&self.expr)? {
            Value::Nodes(items) => items,
            Value::Str(_) => return Err(XPathError::NotANodeSet("string".to_string())),
            Value::Num(_) => return Err(XPathError::NotANodeSet("number".to_string())),
            Value::Bool(_) => return Err(XPathError::NotANodeSet("boolean".to_string())),
        };

        let mut seen = HashSet::new();
        let mut elements = Vec::new();
        for item in items {
            let Some(node) = element_for(item) else {
                continue;
            };
            if seen.insert(node.id()) {
                if let Some(element) = ElementRef::wrap(node) {
                    elements.push(element);
                }
            }
        }

        // Parents promoted from text nodes may be out of order
        let order: std::collections::HashMap<_, _> = root
            .descendants()
            .enumerate()
            .map(|(i, n)| (n.id(), i))
            .collect();
        elements.sort_by_key(|el| order.get(&el.id()).copied().unwrap_or(usize::MAX));
        Ok(elements)
    }
}

fn element_for(item: Item<'_>) -> Option<NodeRef<'_, Node>> {
    match item {
        Item::Node(node) => match node.value() {
            Node::Element(_) => Some(node),
            Node::Text(_) => node.parent().filter(|p| p.value().is_element()),
            _ => None,
        },
        Item::Attr { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <div id="main" class="content">
            <h1>Title</h1>
            <p class="lead">First</p>
            <p>Second <b>bold</b></p>
            <ul>
              <li><a href="/a">A</a></li>
              <li><a href="/b">B</a></li>
              <li class="last"><a href="/c">C</a></li>
            </ul>
          </div>
          <div class="footer"><p>Footer</p></div>
        </body></html>
    "#;

    fn texts(expr: &str) -> Vec<String> {
        let html = Html::parse_document(PAGE);
        XPath::compile(expr)
            .unwrap()
            .select(&html)
            .unwrap()
            .into_iter()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .collect()
    }

    #[test]
    fn test_descendant_and_child_paths() {
        assert_eq!(texts("//h1"), vec!["Title"]);
        assert_eq!(texts("/html/body/div/h1"), vec!["Title"]);
        assert_eq!(texts("//ul/li/a"), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_attribute_predicates() {
        assert_eq!(texts("//p[@class='lead']"), vec!["First"]);
        assert_eq!(texts("//div[@id='main']/h1"), vec!["Title"]);
        assert_eq!(texts("//li[@class]"), vec!["C"]);
        assert_eq!(texts("//div[contains(@class, 'foot')]/p"), vec!["Footer"]);
    }

    #[test]
    fn test_positional_predicates() {
        assert_eq!(texts("//li[1]"), vec!["A"]);
        assert_eq!(texts("//li[last()]"), vec!["C"]);
        assert_eq!(texts("//li[position() > 1]"), vec!["B", "C"]);
        assert_eq!(texts("(//p)[2]"), vec!["Second bold"]);
        assert_eq!(texts("(//a)[last()]"), vec!["C"]);
    }

    #[test]
    fn test_text_predicates() {
        assert_eq!(texts("//h1[text()='Title']"), vec!["Title"]);
        assert_eq!(texts("//p[normalize-space(.)='Second bold']"), vec!["Second bold"]);
        assert_eq!(texts("//a[starts-with(@href, '/b')]"), vec!["B"]);
    }

    #[test]
    fn test_reverse_and_sibling_axes() {
        assert_eq!(texts("//b/ancestor::p"), vec!["Second bold"]);
        assert_eq!(texts("//h1/following-sibling::p[1]"), vec!["First"]);
        assert_eq!(texts("//li[@class='last']/preceding-sibling::li[1]"), vec!["B"]);
        assert_eq!(texts("//b/.."), vec!["Second bold"]);
    }

    #[test]
    fn test_union_in_document_order() {
        assert_eq!(texts("//p[@class='lead'] | //h1"), vec!["Title", "First"]);
    }

    #[test]
    fn test_text_nodes_map_to_parent() {
        assert_eq!(texts("//h1/text()"), vec!["Title"]);
    }

    #[test]
    fn test_attribute_results_are_dropped() {
        assert!(texts("//a/@href").is_empty());
    }

    #[test]
    fn test_uppercase_names_match() {
        assert_eq!(texts("//H1"), vec!["Title"]);
    }

    #[test]
    fn test_no_match_is_empty() {
        assert!(texts("//table").is_empty());
    }

    #[test]
    fn test_scalar_result_is_error() {
        let html = Html::parse_document(PAGE);
        let xpath = XPath::compile("count(//li)").unwrap();
        assert!(matches!(
            xpath.select(&html),
            Err(XPathError::NotANodeSet(_))
        ));
    }

    #[test]
    fn test_compile_errors() {
        let html = Html::parse_document(PAGE);
        assert!(XPath::compile("//div[").is_err());
        assert!(matches!(
            XPath::compile("//div[bogus(1)]").map(|x| x.select(&html).map(|v| v.len())),
            Ok(Err(XPathError::UnknownFunction(_)))
        ));
        assert!(matches!(
            XPath::compile("//div[#]"),
            Err(XPathError::Lex { .. })
        ));
    }
}
