//! Role guards such as `checkRole('admin')` inside a call's argument text.

use super::lexer::{self, Cursor, Quote};

/// Roles named by guard invocations anywhere in `fragment`, including nested
/// callback bodies. Order of first appearance, no duplicates.
///
/// A guard takes a single quoted role or an array of quoted roles; any other
/// argument shape is not a guard we can read and is skipped.
pub fn extract_roles(fragment: &str, guards: &[String]) -> Vec<String> {
    let mut found: Vec<(usize, &str)> = Vec::new();
    for guard in guards.iter().filter(|guard| !guard.is_empty()) {
        for (at, _) in fragment.match_indices(guard.as_str()) {
            found.extend(
                guard_roles(fragment, at, guard.len())
                    .into_iter()
                    .map(|role| (at, role)),
            );
        }
    }
    // Stable: roles from one guard keep their array order.
    found.sort_by_key(|(at, _)| *at);

    let mut roles: Vec<String> = Vec::new();
    for (_, role) in found {
        if !roles.iter().any(|existing| existing == role) {
            roles.push(role.to_string());
        }
    }
    roles
}

fn guard_roles(fragment: &str, at: usize, len: usize) -> Vec<&str> {
    let bytes = fragment.as_bytes();
    if at > 0 && lexer::is_ident_char(bytes[at - 1]) {
        return Vec::new();
    }
    let mut cursor = Cursor::new(fragment, at + len);
    if cursor.peek().is_some_and(lexer::is_ident_char) {
        return Vec::new();
    }
    cursor.skip_whitespace();
    let Some(args) = cursor.call_args() else {
        return Vec::new();
    };

    let text = args.text.trim();
    if let Some(role) = quoted_role(text) {
        return vec![role];
    }
    let Some(inner) = text.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) else {
        return Vec::new();
    };
    let Some(items) = lexer::split_args(inner) else {
        return Vec::new();
    };
    items.into_iter().filter_map(quoted_role).collect()
}

fn quoted_role(text: &str) -> Option<&str> {
    let literal = lexer::sole_literal(text)?;
    let quoted = matches!(literal.quote, Quote::Single | Quote::Double);
    (quoted && !literal.value.is_empty()).then_some(literal.value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guards() -> Vec<String> {
        vec!["checkRole".to_string()]
    }

    #[test]
    fn deduplicates_in_order_of_appearance() {
        let roles = extract_roles(
            r#""/x", checkRole("admin"), checkRole('user'), checkRole( "admin" ), h"#,
            &guards(),
        );
        assert_eq!(roles, vec!["admin", "user"]);
    }

    #[test]
    fn finds_guards_inside_nested_callbacks() {
        let roles = extract_roles(
            "'/x', (req, res, next) => {\n  return checkRole('auditor')(req, res, next);\n}",
            &guards(),
        );
        assert_eq!(roles, vec!["auditor"]);
    }

    #[test]
    fn reads_array_arguments() {
        let roles = extract_roles("'/x', checkRole(['admin', \"editor\"]), checkRole('viewer')", &guards());
        assert_eq!(roles, vec!["admin", "editor", "viewer"]);
    }

    #[test]
    fn public_route_has_no_roles() {
        assert!(extract_roles("'/health', (req, res) => res.send('ok')", &guards()).is_empty());
    }

    #[test]
    fn skips_unreadable_guard_shapes() {
        let roles = extract_roles(
            "mycheckRole('a'), checkRoles('b'), checkRole(role), checkRole(`c`), checkRole(''), checkRole",
            &guards(),
        );
        assert!(roles.is_empty());
    }

    #[test]
    fn honors_configured_guard_names() {
        let guards = vec!["requireRole".to_string(), "checkRole".to_string()];
        let roles = extract_roles("checkRole('b'), auth.requireRole('a')", &guards);
        assert_eq!(roles, vec!["b", "a"]);
    }
}
