//! # Newick Reading
//!
//! Parse Newick text into a [`Tree`]. The parser is iterative (explicit stack
//! of open clades), so deep ladder-like trees cannot overflow the call stack.
//!
//! Supported syntax: nested clades, unquoted and single-quoted labels (with
//! `''` as an escaped quote), `:length` branch lengths, `[...]` comments
//! (including NHX annotations) and arbitrary whitespace. The terminating `;`
//! is required.

use std::fs;
use std::path::Path;

use tracing::info_span;

use crate::data::tree::{Node, NodeIdx, Tree};
use crate::error::{PangoError, Result};

/// Read and parse a Newick file
pub fn read_newick(path: &Path) -> Result<Tree> {
    info_span!("newick_read", path = ?path).in_scope(|| {
        if !path.exists() {
            return Err(PangoError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let text = fs::read_to_string(path)?;
        let tree = parse_newick(&text)?;
        tracing::info!(
            n_nodes = tree.len(),
            n_leaves = tree.n_leaves(),
            "loaded tree"
        );
        Ok(tree)
    })
}

/// Parse a Newick string
pub fn parse_newick(text: &str) -> Result<Tree> {
    let mut cursor = Cursor::new(text);
    let mut nodes: Vec<Node> = Vec::new();
    let mut open: Vec<NodeIdx> = Vec::new();
    let mut expect_subtree = true;

    loop {
        cursor.skip_trivia()?;

        if expect_subtree {
            let idx = push_node(&mut nodes, open.last().copied())?;
            if cursor.peek() == Some(b'(') {
                cursor.bump();
                open.push(idx);
                continue;
            }
            cursor.read_label_and_length(&mut nodes[idx.as_usize()])?;
            expect_subtree = false;
            if open.is_empty() {
                break;
            }
            continue;
        }

        match cursor.peek() {
            Some(b',') => {
                if open.is_empty() {
                    return Err(cursor.error("',' outside of any clade"));
                }
                cursor.bump();
                expect_subtree = true;
            }
            Some(b')') => {
                cursor.bump();
                let idx = open
                    .pop()
                    .ok_or_else(|| cursor.error("unbalanced ')'"))?;
                cursor.read_label_and_length(&mut nodes[idx.as_usize()])?;
                if open.is_empty() {
                    break;
                }
            }
            Some(c) => {
                return Err(cursor.error(format!("unexpected character '{}'", c as char)));
            }
            None => return Err(cursor.error("unexpected end of input inside a clade")),
        }
    }

    cursor.skip_trivia()?;
    if cursor.peek() != Some(b';') {
        return Err(cursor.error("expected ';' after the root clade"));
    }
    cursor.bump();
    cursor.skip_trivia()?;
    if cursor.peek().is_some() {
        return Err(cursor.error("trailing content after ';'"));
    }

    Tree::new(nodes, NodeIdx::new(0))
}

fn push_node(nodes: &mut Vec<Node>, parent: Option<NodeIdx>) -> Result<NodeIdx> {
    let idx = NodeIdx::try_from(nodes.len())?;
    nodes.push(Node {
        parent,
        ..Node::default()
    });
    if let Some(p) = parent {
        nodes[p.as_usize()].children.push(idx);
    }
    Ok(idx)
}

#[inline]
fn is_delimiter(c: u8) -> bool {
    matches!(c, b'(' | b')' | b',' | b':' | b';' | b'[') || c.is_ascii_whitespace()
}

/// Byte cursor over the Newick text
struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    #[inline]
    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    #[inline]
    fn bump(&mut self) {
        self.pos += 1;
    }

    fn error(&self, message: impl Into<String>) -> PangoError {
        PangoError::newick(self.pos, message)
    }

    /// Skip whitespace and `[...]` comments
    fn skip_trivia(&mut self) -> Result<()> {
        while let Some(c) = self.peek() {
            if c.is_ascii_whitespace() {
                self.bump();
            } else if c == b'[' {
                let start = self.pos;
                match self.text[self.pos..].find(']') {
                    Some(end) => self.pos += end + 1,
                    None => return Err(PangoError::newick(start, "unterminated comment")),
                }
            } else {
                break;
            }
        }
        Ok(())
    }

    /// Read an optional label followed by an optional `:length`
    fn read_label_and_length(&mut self, node: &mut Node) -> Result<()> {
        self.skip_trivia()?;
        let label = if self.peek() == Some(b'\'') {
            Some(self.read_quoted()?)
        } else {
            let start = self.pos;
            while let Some(c) = self.peek() {
                if is_delimiter(c) {
                    break;
                }
                self.bump();
            }
            let raw = &self.text[start..self.pos];
            (!raw.is_empty()).then(|| raw.to_string())
        };
        if label.is_some() {
            node.name = label;
        }

        self.skip_trivia()?;
        if self.peek() == Some(b':') {
            self.bump();
            self.skip_trivia()?;
            let start = self.pos;
            while let Some(c) = self.peek() {
                if is_delimiter(c) {
                    break;
                }
                self.bump();
            }
            let raw = &self.text[start..self.pos];
            let length = raw
                .parse::<f64>()
                .map_err(|_| PangoError::newick(start, format!("invalid branch length '{}'", raw)))?;
            node.branch_length = Some(length);
        }
        Ok(())
    }

    fn read_quoted(&mut self) -> Result<String> {
        let start = self.pos;
        self.bump();
        let mut out = String::new();
        loop {
            let rest = &self.text[self.pos..];
            let Some(q) = rest.find('\'') else {
                return Err(PangoError::newick(start, "unterminated quoted label"));
            };
            out.push_str(&rest[..q]);
            self.pos += q + 1;
            if self.peek() == Some(b'\'') {
                out.push('\'');
                self.bump();
            } else {
                return Ok(out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf_names(tree: &Tree) -> Vec<&str> {
        tree.descendant_leaf_names(tree.root())
    }

    #[test]
    fn test_parse_simple_tree() {
        let tree = parse_newick("((a,b)X,(c,d)Y)root;").unwrap();
        assert_eq!(tree.len(), 7);
        assert_eq!(tree.name(tree.root()), Some("root"));
        assert_eq!(leaf_names(&tree), vec!["a", "b", "c", "d"]);
        let x = tree.find("X").unwrap();
        assert_eq!(tree.descendant_leaf_names(x), vec!["a", "b"]);
    }

    #[test]
    fn test_parse_branch_lengths_and_comments() {
        let text = "((a:0.1,b:2e-3)X:0.5[&&NHX:S=human], c : 1 ) [root comment] ;\n";
        let tree = parse_newick(text).unwrap();
        let x = tree.find("X").unwrap();
        assert_eq!(tree.node(x).branch_length, Some(0.5));
        let b = tree.find("b").unwrap();
        assert_eq!(tree.node(b).branch_length, Some(0.002));
        let c = tree.find("c").unwrap();
        assert_eq!(tree.node(c).branch_length, Some(1.0));
        // Unlabelled root gets a generated name
        assert_eq!(tree.name(tree.root()), Some("NODE_0000000"));
    }

    #[test]
    fn test_parse_quoted_labels() {
        let tree = parse_newick("('hCoV-19/England/MILK-1/2020','O''Brien (x)')n1;").unwrap();
        assert_eq!(
            leaf_names(&tree),
            vec!["hCoV-19/England/MILK-1/2020", "O'Brien (x)"]
        );
    }

    #[test]
    fn test_parse_slash_labels_unquoted() {
        let tree = parse_newick("(England/MILK-9E05B3/2020,Wuhan/Hu-1/2019)r;").unwrap();
        assert_eq!(
            leaf_names(&tree),
            vec!["England/MILK-9E05B3/2020", "Wuhan/Hu-1/2019"]
        );
    }

    #[test]
    fn test_generated_names_are_pre_order() {
        let tree = parse_newick("(((a,b),c),(d,e));").unwrap();
        let names: Vec<&str> = tree
            .internal_nodes()
            .into_iter()
            .filter_map(|i| tree.name(i))
            .collect();
        assert_eq!(
            names,
            vec!["NODE_0000000", "NODE_0000001", "NODE_0000002", "NODE_0000003"]
        );
        let n2 = tree.find("NODE_0000002").unwrap();
        assert_eq!(tree.descendant_leaf_names(n2), vec!["a", "b"]);
    }

    #[test]
    fn test_single_leaf_tree() {
        let tree = parse_newick("only;").unwrap();
        assert_eq!(tree.len(), 1);
        assert!(tree.internal_nodes().is_empty());
    }

    #[test]
    fn test_deep_ladder_does_not_recurse() {
        let depth = 50_000;
        let mut text = String::with_capacity(depth * 12);
        for _ in 0..depth {
            text.push('(');
        }
        text.push_str("leaf");
        for i in 0..depth {
            text.push_str(&format!(",t{})", i));
        }
        text.push(';');
        let tree = parse_newick(&text).unwrap();
        assert_eq!(tree.n_leaves(), depth + 1);
        assert_eq!(tree.post_order().len(), tree.len());
    }

    #[test]
    fn test_errors() {
        assert!(matches!(parse_newick("(a,b)"), Err(PangoError::Newick { .. })));
        assert!(matches!(parse_newick("(a,b;"), Err(PangoError::Newick { .. })));
        assert!(matches!(parse_newick("(a,b));"), Err(PangoError::Newick { .. })));
        assert!(matches!(parse_newick("(a:x,b);"), Err(PangoError::Newick { .. })));
        assert!(matches!(parse_newick("(a,'b);"), Err(PangoError::Newick { .. })));
        assert!(matches!(parse_newick("(a[,b);"), Err(PangoError::Newick { .. })));
        assert!(matches!(
            parse_newick("(a,a);"),
            Err(PangoError::DuplicateNodeName { .. })
        ));
    }
}
