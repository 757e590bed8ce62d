//! Tokenizer for path expressions

use super::XPathError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Slash,
    DoubleSlash,
    LBracket,
    RBracket,
    LParen,
    RParen,
    At,
    Comma,
    Pipe,
    Dot,
    DotDot,
    ColonColon,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Star,
    Literal(String),
    Number(f64),
    Name(String),
}

/// Splits an expression into tokens, skipping whitespace
pub(crate) fn tokenize(input: &str) -> Result<Vec<Token>, XPathError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let (token, width) = match c {
            '/' if next == Some('/') => (Token::DoubleSlash, 2),
            '/' => (Token::Slash, 1),
            '[' => (Token::LBracket, 1),
            ']' => (Token::RBracket, 1),
            '(' => (Token::LParen, 1),
            ')' => (Token::RParen, 1),
            '@' => (Token::At, 1),
            ',' => (Token::Comma, 1),
            '|' => (Token::Pipe, 1),
            '+' => (Token::Plus, 1),
            '-' => (Token::Minus, 1),
            '*' => (Token::Star, 1),
            '=' => (Token::Eq, 1),
            '!' if next == Some('=') => (Token::NotEq, 2),
            '<' if next == Some('=') => (Token::LtEq, 2),
            '<' => (Token::Lt, 1),
            '>' if next == Some('=') => (Token::GtEq, 2),
            '>' => (Token::Gt, 1),
            ':' if next == Some(':') => (Token::ColonColon, 2),
            '.' if next == Some('.') => (Token::DotDot, 2),
            '.' if next.is_some_and(|n| n.is_ascii_digit()) => {
                let (number, width) = scan_number(&chars[i..]);
                (Token::Number(number), width)
            }
            '.' => (Token::Dot, 1),
            '\'' | '"' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&ch| ch == c)
                    .ok_or_else(|| XPathError::Lex {
                        position: i,
                        message: "unterminated string literal".to_string(),
                    })?;
                let literal: String = chars[i + 1..i + 1 + end].iter().collect();
                (Token::Literal(literal), end + 2)
            }
            d if d.is_ascii_digit() => {
                let (number, width) = scan_number(&chars[i..]);
                (Token::Number(number), width)
            }
            n if is_name_start(n) => {
                let width = chars[i..]
                    .iter()
                    .take_while(|&&ch| is_name_char(ch))
                    .count();
                let mut name: String = chars[i..i + width].iter().collect();
                // A trailing '.' is a following step, not part of the name
                let mut width = width;
                while name.ends_with('.') {
                    name.pop();
                    width -= 1;
                }
                (Token::Name(name), width)
            }
            other => {
                return Err(XPathError::Lex {
                    position: i,
                    message: format!("unexpected character '{}'", other),
                })
            }
        };

        tokens.push(token);
        i += width;
    }

    Ok(tokens)
}

fn scan_number(chars: &[char]) -> (f64, usize) {
    let mut width = 0;
    let mut seen_dot = false;
    for &c in chars {
        if c.is_ascii_digit() {
            width += 1;
        } else if c == '.' && !seen_dot {
            seen_dot = true;
            width += 1;
        } else {
            break;
        }
    }
    let text: String = chars[..width].iter().collect();
    (text.parse().unwrap_or(f64::NAN), width)
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '.'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_axis_step() {
        let tokens = tokenize("following-sibling::dd[1]").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Name("following-sibling".to_string()),
                Token::ColonColon,
                Token::Name("dd".to_string()),
                Token::LBracket,
                Token::Number(1.0),
                Token::RBracket,
            ]
        );
    }

    #[test]
    fn test_tokenize_literals_and_operators() {
        let tokens = tokenize(r#"//a[@href != "x" and contains(@class, 'btn')]"#).unwrap();
        assert_eq!(tokens[0], Token::DoubleSlash);
        assert!(tokens.contains(&Token::NotEq));
        assert!(tokens.contains(&Token::Literal("x".to_string())));
        assert!(tokens.contains(&Token::Literal("btn".to_string())));
        assert!(tokens.contains(&Token::Name("and".to_string())));
    }

    #[test]
    fn test_tokenize_dots() {
        let tokens = tokenize("../.").unwrap();
        assert_eq!(tokens, vec![Token::DotDot, Token::Slash, Token::Dot]);
        assert_eq!(tokenize(".5").unwrap(), vec![Token::Number(0.5)]);
    }

    #[test]
    fn test_unterminated_literal() {
        assert!(matches!(
            tokenize("//a[@id='x]"),
            Err(XPathError::Lex { .. })
        ));
    }

    #[test]
    fn test_unexpected_character() {
        assert!(tokenize("//a[$var]").is_err());
    }
}
