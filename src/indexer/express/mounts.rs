//! Resolves `<parent>.use('<base>', ..., <router>)` mounts into path prefixes.

use super::declarations::Declarations;
use super::lexer::{self, is_ident_char, is_ident_start};
use crate::indexer::http::compose_path;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEdge {
    pub parent: String,
    pub base: String,
    pub router: String,
    pub line: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MountTable {
    edges: Vec<MountEdge>,
}

impl MountTable {
    pub fn scan(src: &str) -> Self {
        let mut edges = Vec::new();
        for call in lexer::member_calls(src, |member| member == "use") {
            let Some(args) = lexer::call_args(src, call.open) else {
                debug!(line = lexer::line_of(src, call.start), "skipping unbalanced use() call");
                continue;
            };
            let Some((base, router)) = mount_arguments(args.text) else {
                continue;
            };
            let edge = MountEdge {
                parent: call.receiver.to_string(),
                base: base.to_string(),
                router: router.to_string(),
                line: lexer::line_of(src, call.start),
            };
            debug!(
                parent = %edge.parent,
                base = %edge.base,
                router = %edge.router,
                line = edge.line,
                "found mount"
            );
            edges.push(edge);
        }
        Self { edges }
    }

    pub fn edges(&self) -> &[MountEdge] {
        &self.edges
    }

    pub fn is_mounted(&self, name: &str) -> bool {
        self.edges.iter().any(|edge| edge.router == name)
    }

    /// Absolute prefixes for routes registered on `name`.
    ///
    /// Applications and unmounted identifiers resolve to the empty base.
    /// A router mounted on another router picks up each of the parent's
    /// prefixes; a mount cycle is cut where it closes.
    pub fn bases_for(&self, name: &str, declarations: &Declarations) -> Vec<String> {
        let mut visiting = Vec::new();
        self.resolve(name, declarations, &mut visiting)
    }

    fn resolve<'a>(
        &'a self,
        name: &'a str,
        declarations: &Declarations,
        visiting: &mut Vec<&'a str>,
    ) -> Vec<String> {
        if declarations.is_app(name) || visiting.contains(&name) {
            return vec![String::new()];
        }
        let edges: Vec<&MountEdge> = self.edges.iter().filter(|e| e.router == name).collect();
        if edges.is_empty() {
            return vec![String::new()];
        }

        visiting.push(name);
        let mut bases = Vec::new();
        for edge in edges {
            for parent_base in self.resolve(&edge.parent, declarations, visiting) {
                let base = compose_path(&parent_base, &edge.base);
                if !bases.contains(&base) {
                    bases.push(base);
                }
            }
        }
        visiting.pop();
        bases
    }
}

/// First argument must be a plain literal base, last a bare identifier.
fn mount_arguments(text: &str) -> Option<(&str, &str)> {
    let args = lexer::split_args(text)?;
    if args.len() < 2 {
        return None;
    }
    let base = lexer::sole_literal(args[0])?;
    if base.is_interpolated() {
        return None;
    }
    let router = *args.last()?;
    is_identifier(router).then_some((base.value, router))
}

fn is_identifier(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    !bytes.is_empty() && is_ident_start(bytes[0]) && bytes.iter().all(|&b| is_ident_char(b))
}
