//! Tokenizer for template strings.

use reelforge_common::{Error, Result};

/// Lexical token of a template string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Plain text.
    Text(String),
    /// `{name}`
    Var(String),
    /// `(`
    Open,
    /// `)`
    Close,
    /// `/!`
    RequiredMarker,
    /// `<parent>`
    Parent,
}

const PARENT: &str = "<parent>";
const REQUIRED: &str = "/!";

/// Split a template string into tokens.
///
/// # Errors
///
/// Returns [`Error::TemplateSyntax`] for an unterminated or empty `{}`
/// reference, or a stray `}`.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut text = String::new();
    let mut pos = 0;

    while pos < input.len() {
        let rest = &input[pos..];

        let token = if rest.starts_with('{') {
            let end = rest
                .find('}')
                .ok_or_else(|| Error::TemplateSyntax(format!("unterminated '{{' in {input:?}")))?;
            let name = rest[1..end].trim();
            if name.is_empty() || name.contains(['{', '(', ')']) {
                return Err(Error::TemplateSyntax(format!(
                    "invalid variable reference {:?} in {input:?}",
                    &rest[..=end]
                )));
            }
            pos += end + 1;
            Token::Var(name.to_string())
        } else if rest.starts_with('}') {
            return Err(Error::TemplateSyntax(format!("unmatched '}}' in {input:?}")));
        } else if rest.starts_with('(') {
            pos += 1;
            Token::Open
        } else if rest.starts_with(')') {
            pos += 1;
            Token::Close
        } else if rest.starts_with(REQUIRED) {
            pos += REQUIRED.len();
            Token::RequiredMarker
        } else if rest.starts_with(PARENT) {
            pos += PARENT.len();
            Token::Parent
        } else {
            let c = rest.chars().next().unwrap_or_default();
            text.push(c);
            pos += c.len_utf8();
            continue;
        };

        if !text.is_empty() {
            tokens.push(Token::Text(std::mem::take(&mut text)));
        }
        tokens.push(token);
    }

    if !text.is_empty() {
        tokens.push(Token::Text(text));
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn mixed_tokens() {
        let tokens = tokenize("{root}/!shots/(pad {frame} 4)<parent>").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Var("root".into()),
                Token::RequiredMarker,
                Token::Text("shots/".into()),
                Token::Open,
                Token::Text("pad ".into()),
                Token::Var("frame".into()),
                Token::Text(" 4".into()),
                Token::Close,
                Token::Parent,
            ]
        );
    }

    #[test]
    fn plain_text_is_one_token() {
        assert_eq!(
            tokenize("/data/plates/a.exr").unwrap(),
            vec![Token::Text("/data/plates/a.exr".into())]
        );
    }

    #[test]
    fn broken_var_references() {
        assert_matches!(tokenize("{shot"), Err(Error::TemplateSyntax(_)));
        assert_matches!(tokenize("{}"), Err(Error::TemplateSyntax(_)));
        assert_matches!(tokenize("shot}"), Err(Error::TemplateSyntax(_)));
    }
}
