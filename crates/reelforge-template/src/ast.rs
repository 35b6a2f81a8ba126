//! Template syntax tree.

use indexmap::IndexSet;
use reelforge_common::{Error, Result};

use crate::lexer::{tokenize, Token};

/// A node of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Text copied to the output as is.
    Literal(String),
    /// A variable reference.
    Var(String),
    /// A function call. Its body resolves to `name arg1 arg2 ...`.
    Call(Vec<Node>),
    /// Emits `/` and asserts that the path up to the next separator exists.
    RequiredPath,
    /// The output resolved so far, without a trailing `/`.
    Parent,
}

/// Parse a template string.
///
/// `/!` only acts as a required-path marker outside of calls; inside a
/// call it is plain text.
///
/// # Errors
///
/// Returns [`Error::TemplateSyntax`] on unbalanced parentheses, broken
/// variable references or empty calls.
pub fn parse(input: &str) -> Result<Vec<Node>> {
    let tokens = tokenize(input)?;
    let mut iter = tokens.into_iter();
    let nodes = parse_nodes(&mut iter, input, false)?;
    Ok(nodes)
}

fn parse_nodes(
    tokens: &mut impl Iterator<Item = Token>,
    input: &str,
    in_call: bool,
) -> Result<Vec<Node>> {
    let mut nodes = Vec::new();
    loop {
        let Some(token) = tokens.next() else {
            if in_call {
                return Err(Error::TemplateSyntax(format!("unmatched '(' in {input:?}")));
            }
            return Ok(nodes);
        };

        match token {
            Token::Text(text) => push_literal(&mut nodes, &text),
            Token::Var(name) => nodes.push(Node::Var(name)),
            Token::Parent => nodes.push(Node::Parent),
            Token::RequiredMarker if in_call => push_literal(&mut nodes, "/!"),
            Token::RequiredMarker => nodes.push(Node::RequiredPath),
            Token::Open => {
                let body = parse_nodes(tokens, input, true)?;
                let blank = body
                    .iter()
                    .all(|n| matches!(n, Node::Literal(text) if text.trim().is_empty()));
                if blank {
                    return Err(Error::TemplateSyntax(format!("empty call in {input:?}")));
                }
                nodes.push(Node::Call(body));
            }
            Token::Close if in_call => return Ok(nodes),
            Token::Close => {
                return Err(Error::TemplateSyntax(format!("unmatched ')' in {input:?}")));
            }
        }
    }
}

fn push_literal(nodes: &mut Vec<Node>, text: &str) {
    if let Some(Node::Literal(last)) = nodes.last_mut() {
        last.push_str(text);
    } else {
        nodes.push(Node::Literal(text.to_string()));
    }
}

/// Variable names referenced anywhere in `nodes`, in first-seen order.
pub fn var_names(nodes: &[Node]) -> IndexSet<String> {
    let mut names = IndexSet::new();
    collect_vars(nodes, &mut names);
    names
}

fn collect_vars(nodes: &[Node], names: &mut IndexSet<String>) {
    for node in nodes {
        match node {
            Node::Var(name) => {
                names.insert(name.clone());
            }
            Node::Call(body) => collect_vars(body, names),
            _ => {}
        }
    }
}
