//! Query Builder
//!
//! Turns a flat operation path such as `Interfaces InterfaceTable` into a
//! framed NETCONF `<get>` request whose filter selects that subtree of the
//! device's `Operational` data.
//!
//! # Document Layout
//!
//! ```text
//! <?xml version="1.0" encoding="UTF-8" ?>
//! <rpc message-id="1" xmlns="urn:ietf:params:xml:ns:netconf:base:1.0"><get><filter><Operational>...</Operational></filter></get></rpc>
//! ]]>]]>
//! ```
//!
//! # Path Tokens
//!
//! Tag tokens nest: each one becomes a child of the previous one. A token
//! that parses as a base-10 integer is leaf content instead of an element.
//! It is written as the text of the element one level above the current
//! one, and the next tag continues next to that text-bearing element:
//!
//! ```text
//! ["A", "B", "3", "C"]  =>  <Operational><A>3<B/></A><C/></Operational>
//! ```
//!
//! This rule only produces a meaningful filter when a single element
//! separates the leaf from its text-bearing ancestor. Other nestings are
//! built the same mechanical way and are not reinterpreted.

pub mod element;

use std::fmt;

use thiserror::Error;

pub use element::{is_valid_tag, ElementNode, ElementTree, NodeId};

/// XML declaration prefixed to every payload
pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>"#;

/// NETCONF base namespace used on the `<rpc>` envelope
pub const NETCONF_BASE_NAMESPACE: &str = "urn:ietf:params:xml:ns:netconf:base:1.0";

/// The single capability advertised in the hello announcement
pub const BASE_CAPABILITY: &str = "urn:ietf:params:netconf:base:1.0";

/// End-of-message marker of the shell-based NETCONF 1.0 framing
pub const FRAMING_DELIMITER: &str = "]]>]]>";

/// Fixed message id of the request envelope
pub const MESSAGE_ID: &str = "1";

/// Errors produced while building a query from path tokens
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidPathError {
    /// No tokens were supplied
    #[error("operation path is empty")]
    Empty,

    /// A tag token is not a usable element name
    #[error("token {position} ({token:?}) is not a valid element name")]
    InvalidTag {
        /// Zero-based token position
        position: usize,
        /// The offending token
        token: String,
    },

    /// A numeric token has no element above it to carry its text
    #[error("token {position} ({token:?}) is leaf content with no enclosing element")]
    OrphanLeaf {
        /// Zero-based token position
        position: usize,
        /// The offending token
        token: String,
    },
}

/// A serialized, framed request ready to be written to the shell
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryDocument {
    label: String,
    payload: String,
}

impl QueryDocument {
    /// Operation label (the path tokens joined by a single space)
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The full payload including envelope and framing delimiter
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.payload
    }

    /// Payload length in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty (never true for a built document)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

impl fmt::Display for QueryDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.payload)
    }
}

/// Split a space-separated operation string into path tokens
///
/// Runs of whitespace collapse; empty segments are dropped.
#[must_use]
pub fn parse_operation(operation: &str) -> Vec<String> {
    operation.split_whitespace().map(str::to_string).collect()
}

/// Whether a token is a base-10 integer (optional sign, ASCII digits)
///
/// There is no width limit: the token is kept verbatim as text, so a value
/// too large for any machine integer is still leaf content.
#[must_use]
pub fn is_integer_token(token: &str) -> bool {
    let digits = token
        .strip_prefix('+')
        .or_else(|| token.strip_prefix('-'))
        .unwrap_or(token);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Build the `get > filter > Operational` subtree for a token path
///
/// # Errors
///
/// Returns [`InvalidPathError`] if `tokens` is empty, a tag token is not
/// a valid element name, or a numeric token would have to be written into
/// the fixed `get > filter > Operational` chain.
pub fn build_tree<S: AsRef<str>>(tokens: &[S]) -> Result<ElementTree, InvalidPathError> {
    let (first, rest) = tokens.split_first().ok_or(InvalidPathError::Empty)?;

    let mut tree = ElementTree::new("get");
    let get = tree.root();
    let filter = tree.append_child(get, "filter");
    let operational = tree.append_child(filter, "Operational");
    let fixed = [get, filter, operational];

    let first = first.as_ref();
    if !is_valid_tag(first) {
        return Err(InvalidPathError::InvalidTag {
            position: 0,
            token: first.to_string(),
        });
    }
    let mut pointer = tree.append_child(operational, first);

    for (offset, token) in rest.iter().enumerate() {
        let position = offset + 1;
        let token = token.as_ref();

        if is_integer_token(token) {
            let target = tree
                .parent(pointer)
                .filter(|target| !fixed.contains(target))
                .ok_or_else(|| InvalidPathError::OrphanLeaf {
                    position,
                    token: token.to_string(),
                })?;
            tree.set_text(target, token);
            // target is a user element, so it always has a parent
            pointer = tree.parent(target).unwrap_or(operational);
        } else {
            if !is_valid_tag(token) {
                return Err(InvalidPathError::InvalidTag {
                    position,
                    token: token.to_string(),
                });
            }
            pointer = tree.append_child(pointer, token);
        }
    }

    Ok(tree)
}

/// Build the framed request document for a token path
///
/// Identical token sequences always produce byte-identical documents.
///
/// # Errors
///
/// See [`build_tree`].
pub fn build_query<S: AsRef<str>>(tokens: &[S]) -> Result<QueryDocument, InvalidPathError> {
    let tree = build_tree(tokens)?;
    let label = tokens
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(" ");

    let payload = format!(
        "{XML_DECLARATION}\n<rpc message-id=\"{MESSAGE_ID}\" xmlns=\"{NETCONF_BASE_NAMESPACE}\">{}</rpc>\n{FRAMING_DELIMITER}",
        tree.to_xml()
    );

    Ok(QueryDocument { label, payload })
}

/// Capability announcement sent ahead of the first request
#[must_use]
pub fn hello_document() -> String {
    format!(
        "{XML_DECLARATION}\n<hello><capabilities><capability>{BASE_CAPABILITY}</capability></capabilities></hello>\n{FRAMING_DELIMITER}"
    )
}
