//! Static route/authorization extraction for Express-style sources.
//!
//! The pipeline is straight-line per file: declarations, mounts, route sites,
//! then one [`PermissionRecord`] per route site and applicable mount base.
//! Nothing here fails: a call site that cannot be read is dropped on its own
//! and the rest of the file is still extracted.

use crate::indexer::http::compose_path;
use crate::model::{PermissionRecord, SourceUnit};
use std::collections::HashMap;
use tracing::debug;

pub mod declarations;
pub mod lexer;
pub mod mounts;
pub mod roles;
pub mod sites;

pub use declarations::{Binding, BindingRole, Declarations};
pub use mounts::{MountEdge, MountTable};
pub use sites::{RouteSite, SiteForm};

/// What to do with routes registered on identifiers that are neither a
/// declared application, a declared router, nor a mounted identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReceiverPolicy {
    /// Keep them as unmounted, root-level routes.
    #[default]
    Permissive,
    /// Drop them.
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Application identifier assumed when no application is declared.
    pub default_app: String,
    /// Dotted callee names that create an application (`express`).
    pub app_factories: Vec<String>,
    /// Dotted callee names that create a router (`express.Router`).
    pub router_factories: Vec<String>,
    /// Middleware names whose literal argument names a required role.
    pub role_guards: Vec<String>,
    pub receivers: ReceiverPolicy,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            default_app: "app".to_string(),
            app_factories: vec!["express".to_string()],
            router_factories: vec!["express.Router".to_string(), "Router".to_string()],
            role_guards: vec!["checkRole".to_string()],
            receivers: ReceiverPolicy::Permissive,
        }
    }
}

pub fn extract_permissions(unit: &SourceUnit<'_>, options: &ExtractOptions) -> Vec<PermissionRecord> {
    let text = unit.text;
    let declarations = Declarations::scan(text, options);
    let mounts = MountTable::scan(text);
    debug!(
        file = unit.name,
        routers = declarations.routers().len(),
        mounts = mounts.edges().len(),
        "scanned declarations"
    );

    let mut bases: HashMap<&str, Vec<String>> = HashMap::new();
    let mut records = Vec::new();
    for site in sites::locate(text) {
        if options.receivers == ReceiverPolicy::Strict
            && !declarations.is_known(site.receiver)
            && !mounts.is_mounted(site.receiver)
        {
            debug!(
                file = unit.name,
                line = site.line,
                receiver = site.receiver,
                form = ?site.form,
                "dropping route on unknown receiver"
            );
            continue;
        }

        let roles = roles::extract_roles(site.args, &options.role_guards);
        let receiver_bases = bases
            .entry(site.receiver)
            .or_insert_with(|| mounts.bases_for(site.receiver, &declarations));
        let mut paths: Vec<String> = Vec::new();
        for base in receiver_bases.iter() {
            let path = compose_path(base, site.raw_path);
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        for path in paths {
            records.push(PermissionRecord::new(
                unit.name,
                site.line,
                site.receiver,
                site.method,
                path,
                roles.clone(),
            ));
        }
    }
    debug!(file = unit.name, records = records.len(), "extracted permissions");
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::http::HttpMethod;

    fn extract(text: &str) -> Vec<PermissionRecord> {
        extract_permissions(&SourceUnit::new("app.js", text), &ExtractOptions::default())
    }

    #[test]
    fn routes_on_the_application_are_never_prefixed() {
        let records = extract("const server = express(); server.use('/x', server); server.get('/a', h);");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, "/a");
        assert_eq!(records[0].source, "server");
    }

    #[test]
    fn equivalent_bases_collapse_to_one_record() {
        let records = extract(
            "const r = express.Router(); app.use('/api', r); app.use('/api/', r); r.get('/x', h);",
        );
        let paths: Vec<_> = records.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/api/x"]);
    }

    #[test]
    fn strict_policy_drops_unknown_receivers() {
        let text = "const app = express(); const r = express.Router(); app.use('/r', r);\n\
                    app.get('/a', h); r.get('/b', h); req.get('host'); other.post('/c', h);";
        let strict = ExtractOptions {
            receivers: ReceiverPolicy::Strict,
            ..ExtractOptions::default()
        };
        let records = extract_permissions(&SourceUnit::new("s.js", text), &strict);
        let paths: Vec<_> = records.iter().map(|r| (r.method, r.path.as_str())).collect();
        assert_eq!(paths, vec![(HttpMethod::Get, "/a"), (HttpMethod::Get, "/r/b")]);

        assert_eq!(extract(text).len(), 4);
    }

    #[test]
    fn role_field_mirrors_first_role() {
        let records = extract("app.put('/p', checkRole('owner'), checkRole('admin'), h)");
        assert_eq!(records[0].roles, vec!["owner", "admin"]);
        assert_eq!(records[0].role.as_deref(), Some("owner"));

        let public = extract("app.get('/health', h)");
        assert!(public[0].is_public());
        assert_eq!(public[0].role, None);
    }

    #[test]
    fn doubly_mounted_router_chain_fans_out_per_level() {
        let mut text = String::from("const app = express();\n");
        let mut parent = "app".to_string();
        for level in 1..=6 {
            let router = format!("r{level}");
            text.push_str(&format!(
                "const {router} = express.Router();\n\
                 {parent}.use('/a', {router});\n\
                 {parent}.use('/b', {router});\n"
            ));
            parent = router;
        }
        for i in 0..20 {
            text.push_str(&format!("r6.get('/x{i}', checkRole('ops'), h);\n"));
        }
        let records = extract(&text);
        assert_eq!(records.len(), 20 * 64);
        assert_eq!(records[0].path, "/a/a/a/a/a/a/x0");
        assert_eq!(records[63].path, "/b/b/b/b/b/b/x0");
        assert!(records.iter().all(|r| r.roles == ["ops"]));
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert!(extract("").is_empty());
        assert!(extract("this is not javascript ((( '").is_empty());
    }
}
