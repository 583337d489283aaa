use crate::model::PermissionRecord;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

pub const REQUIRES_ROLE: &str = "REQUIRES_ROLE";

/// Routes and roles as a bipartite graph. A route node is keyed by method and
/// path, so the same endpoint declared in several places collapses into one.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AccessGraph {
    pub roles: Vec<RoleNode>,
    pub routes: Vec<RouteNode>,
    pub edges: Vec<AccessEdge>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RoleNode {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RouteNode {
    pub id: String,
    pub method: String,
    pub path: String,
    pub public: bool,
    pub sources: Vec<SourceLocation>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceLocation {
    pub file: String,
    pub line: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AccessEdge {
    pub route: String,
    pub role: String,
    pub kind: &'static str,
}

#[derive(Default)]
struct RouteEntry {
    method: String,
    path: String,
    roles: BTreeSet<String>,
    sources: BTreeSet<SourceLocation>,
}

impl AccessGraph {
    pub fn from_records(records: &[PermissionRecord]) -> Self {
        let mut routes: BTreeMap<String, RouteEntry> = BTreeMap::new();
        let mut roles = BTreeSet::new();
        for record in records {
            let id = route_id(record.method.as_str(), &record.path);
            let entry = routes.entry(id).or_insert_with(|| RouteEntry {
                method: record.method.as_str().to_string(),
                path: record.path.clone(),
                ..RouteEntry::default()
            });
            entry.sources.insert(SourceLocation {
                file: record.file.clone(),
                line: record.line,
            });
            for role in &record.roles {
                entry.roles.insert(role.clone());
                roles.insert(role.clone());
            }
        }

        let mut edges = Vec::new();
        let mut nodes = Vec::with_capacity(routes.len());
        for (id, entry) in routes {
            for role in &entry.roles {
                edges.push(AccessEdge {
                    route: id.clone(),
                    role: role.clone(),
                    kind: REQUIRES_ROLE,
                });
            }
            nodes.push(RouteNode {
                public: entry.roles.is_empty(),
                id,
                method: entry.method,
                path: entry.path,
                sources: entry.sources.into_iter().collect(),
            });
        }

        Self {
            roles: roles.into_iter().map(|name| RoleNode { name }).collect(),
            routes: nodes,
            edges,
        }
    }

    /// Renders idempotent MERGE statements, so the script can be replayed
    /// against a store that already holds part of the graph.
    pub fn to_cypher(&self) -> String {
        let mut out = String::new();
        for role in &self.roles {
            let _ = writeln!(out, "MERGE (:Role {{name: {}}});", quote(&role.name));
        }
        for route in &self.routes {
            let _ = writeln!(
                out,
                "MERGE (:Route {{path: {}, method: {}}});",
                quote(&route.path),
                quote(&route.method)
            );
        }
        let by_id: BTreeMap<&str, &RouteNode> = self
            .routes
            .iter()
            .map(|route| (route.id.as_str(), route))
            .collect();
        for edge in &self.edges {
            let Some(route) = by_id.get(edge.route.as_str()) else {
                continue;
            };
            let _ = writeln!(
                out,
                "MATCH (rt:Route {{path: {}, method: {}}}), (ro:Role {{name: {}}}) MERGE (rt)-[:{}]->(ro);",
                quote(&route.path),
                quote(&route.method),
                quote(&edge.role),
                edge.kind
            );
        }
        out
    }
}

fn route_id(method: &str, path: &str) -> String {
    format!("{method} {path}")
}

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
    out.push('\'');
    out
}
