//! Finds identifiers bound to application and router factory calls.

use super::ExtractOptions;
use super::lexer::{self, Cursor};
use tracing::debug;

const DECLARATION_KEYWORDS: &[&str] = &["const", "let", "var"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingRole {
    Application,
    Router,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub name: String,
    pub role: BindingRole,
    pub line: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Declarations {
    bindings: Vec<Binding>,
    apps: Vec<String>,
    routers: Vec<String>,
}

impl Declarations {
    pub fn scan(src: &str, options: &ExtractOptions) -> Self {
        let mut bindings = Vec::new();
        for at in keyword_offsets(src) {
            if let Some(binding) = binding_at(src, at, options) {
                debug!(
                    name = %binding.name,
                    role = ?binding.role,
                    line = binding.line,
                    "found binding"
                );
                bindings.push(binding);
            }
        }

        let mut apps = distinct_names(&bindings, BindingRole::Application);
        if apps.is_empty() {
            apps.push(options.default_app.clone());
        }
        let routers = distinct_names(&bindings, BindingRole::Router);
        Self {
            bindings,
            apps,
            routers,
        }
    }

    /// Every binding in source order, repeats included.
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Distinct application identifiers, falling back to the configured
    /// default when none is declared.
    pub fn apps(&self) -> &[String] {
        &self.apps
    }

    pub fn routers(&self) -> &[String] {
        &self.routers
    }

    pub fn is_app(&self, name: &str) -> bool {
        self.apps.iter().any(|app| app == name)
    }

    pub fn is_router(&self, name: &str) -> bool {
        self.routers.iter().any(|router| router == name)
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.is_app(name) || self.is_router(name)
    }
}

fn keyword_offsets(src: &str) -> Vec<usize> {
    let mut offsets: Vec<usize> = DECLARATION_KEYWORDS
        .iter()
        .flat_map(|keyword| lexer::keyword_ends(src, keyword))
        .collect();
    offsets.sort_unstable();
    offsets
}

/// Parses `<name> = <dotted.factory>(...)` right after a declaration keyword.
fn binding_at(src: &str, at: usize, options: &ExtractOptions) -> Option<Binding> {
    let mut cursor = Cursor::new(src, at);
    cursor.skip_trivia();
    let name = cursor.ident()?;
    cursor.skip_trivia();
    if !cursor.eat(b'=') || cursor.peek() == Some(b'=') {
        return None;
    }
    cursor.skip_trivia();
    let factory = dotted_name(&mut cursor)?;
    cursor.skip_trivia();
    cursor.call_args()?;

    let role = if options.app_factories.iter().any(|f| *f == factory) {
        BindingRole::Application
    } else if options.router_factories.iter().any(|f| *f == factory) {
        BindingRole::Router
    } else {
        return None;
    };
    Some(Binding {
        name: name.to_string(),
        role,
        line: lexer::line_of(src, at),
    })
}

fn dotted_name(cursor: &mut Cursor<'_>) -> Option<String> {
    let mut name = cursor.ident()?.to_string();
    loop {
        let checkpoint = cursor.clone();
        cursor.skip_whitespace();
        if !cursor.eat(b'.') {
            *cursor = checkpoint;
            return Some(name);
        }
        cursor.skip_whitespace();
        let part = cursor.ident()?;
        name.push('.');
        name.push_str(part);
    }
}

fn distinct_names(bindings: &[Binding], role: BindingRole) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for binding in bindings.iter().filter(|binding| binding.role == role) {
        if !names.contains(&binding.name) {
            names.push(binding.name.clone());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(src: &str) -> Declarations {
        Declarations::scan(src, &ExtractOptions::default())
    }

    #[test]
    fn finds_apps_and_routers() {
        let decls = scan(
            "const express = require('express');\n\
             const app = express();\n\
             let users = express.Router();\n\
             var admin = express . Router ({ mergeParams: true });\n\
             const { Router } = require('express');\n\
             const items = Router();",
        );
        assert_eq!(decls.apps(), ["app"]);
        assert_eq!(decls.routers(), ["users", "admin", "items"]);
        assert!(decls.is_router("admin"));
        assert!(!decls.is_known("express"));
        assert_eq!(decls.bindings()[1].line, 3);
    }

    #[test]
    fn falls_back_to_default_app() {
        let decls = scan("const r = express.Router();");
        assert_eq!(decls.apps(), ["app"]);

        let options = ExtractOptions {
            default_app: "server".to_string(),
            ..ExtractOptions::default()
        };
        let decls = Declarations::scan("r.get('/x')", &options);
        assert_eq!(decls.apps(), ["server"]);
    }

    #[test]
    fn tracks_redeclarations_but_names_stay_distinct() {
        let decls = scan("const r = express.Router();\nfunction f() { const r = express.Router(); }");
        assert_eq!(decls.bindings().len(), 2);
        assert_eq!(decls.routers(), ["r"]);
    }

    #[test]
    fn ignores_non_factory_initializers() {
        let decls = scan(
            "const constant = 1; const x = express; const y = expressive(); \
             letter = express(); const z == express();",
        );
        assert!(decls.bindings().is_empty());
        assert_eq!(decls.apps(), ["app"]);
    }

    #[test]
    fn ignores_declarations_in_comments_and_literals() {
        let decls = scan(
            "// const app = express();
             /* let admin = express.Router(); */
             const doc = 'const users = express.Router()';
             const api = express.Router();",
        );
        assert_eq!(decls.routers(), ["api"]);
        assert_eq!(decls.bindings().len(), 1);
        assert_eq!(decls.bindings()[0].line, 4);
        assert_eq!(decls.apps(), ["app"]);
    }
}
