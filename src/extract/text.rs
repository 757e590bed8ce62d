//! Text normalization

use ego_tree::iter::Edge;
use scraper::{ElementRef, Html, Node};

/// Elements whose boundaries start a new line
fn is_block(name: &str) -> bool {
    matches!(
        name,
        "address"
            | "article"
            | "aside"
            | "blockquote"
            | "dd"
            | "div"
            | "dl"
            | "dt"
            | "figcaption"
            | "figure"
            | "footer"
            | "form"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "header"
            | "hr"
            | "li"
            | "main"
            | "nav"
            | "ol"
            | "pre"
            | "section"
            | "table"
            | "td"
            | "th"
            | "tr"
            | "ul"
    )
}

fn is_hidden(name: &str) -> bool {
    matches!(name, "script" | "style" | "noscript" | "template")
}

/// Returns the element's text with line structure preserved.
///
/// `<br>` and block boundaries become line breaks and paragraphs are set off
/// by a blank line; horizontal whitespace collapses to one space, every line
/// is trimmed, and blank lines are dropped.
pub fn normalized_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    let mut hidden_depth = 0usize;

    for edge in element.traverse() {
        match edge {
            Edge::Open(node) => match node.value() {
                Node::Element(el) => {
                    let name = el.name();
                    if is_hidden(name) {
                        hidden_depth += 1;
                    } else if hidden_depth == 0 {
                        if name == "br" {
                            raw.push('\n');
                        } else if name == "p" {
                            raw.push_str("\n\n");
                        } else if is_block(name) {
                            raw.push('\n');
                        }
                    }
                }
                Node::Text(text) if hidden_depth == 0 => raw.push_str(&text.text),
                _ => {}
            },
            Edge::Close(node) => {
                if let Node::Element(el) = node.value() {
                    let name = el.name();
                    if is_hidden(name) {
                        hidden_depth = hidden_depth.saturating_sub(1);
                    } else if hidden_depth == 0 && (name == "p" || is_block(name)) {
                        raw.push('\n');
                    }
                }
            }
        }
    }

    clean_lines(&raw)
}

/// Collapses whitespace within lines and drops blank lines
pub fn clean_lines(raw: &str) -> String {
    raw.split(['\n', '\r'])
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Visible text of a whole document
pub fn document_text(document: &Html) -> String {
    normalized_text(document.root_element())
}

/// True if the page has any visible text at all
pub fn has_visible_text(html: &str) -> bool {
    let document = Html::parse_document(html);
    !document_text(&document).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Selector;

    fn text_of(html: &str, selector: &str) -> String {
        let doc = Html::parse_document(html);
        let sel = Selector::parse(selector).unwrap();
        normalized_text(doc.select(&sel).next().unwrap())
    }

    #[test]
    fn test_br_becomes_newline() {
        assert_eq!(
            text_of("<div id=a>line one<br>line two</div>", "#a"),
            "line one\nline two"
        );
    }

    #[test]
    fn test_paragraphs_are_separate_lines() {
        assert_eq!(
            text_of("<div id=a><p>First</p><p>Second</p></div>", "#a"),
            "First\nSecond"
        );
    }

    #[test]
    fn test_whitespace_collapsed_and_trimmed() {
        assert_eq!(
            text_of("<div id=a>   lots \t of\n\n\n   space   </div>", "#a"),
            "lots of\nspace"
        );
    }

    #[test]
    fn test_inline_elements_stay_on_line() {
        assert_eq!(
            text_of("<p id=a>Some <b>bold</b> and <i>italic</i> text</p>", "#a"),
            "Some bold and italic text"
        );
    }

    #[test]
    fn test_script_and_style_ignored() {
        assert_eq!(
            text_of(
                "<div id=a><script>var x = 1;</script>Visible<style>.c{}</style></div>",
                "#a"
            ),
            "Visible"
        );
    }

    #[test]
    fn test_list_items_on_own_lines() {
        assert_eq!(
            text_of("<ul id=a><li>one</li><li>two</li></ul>", "#a"),
            "one\ntwo"
        );
    }

    #[test]
    fn test_has_visible_text() {
        assert!(has_visible_text("<html><body><p>x</p></body></html>"));
        assert!(!has_visible_text("<html><body>  <script>x()</script></body></html>"));
        assert!(!has_visible_text(""));
    }
}
