//! Locates route registrations and isolates their argument text.
//!
//! Two shapes are recognised, in this order:
//!
//! 1. chained: `<id>.route('<path>')` followed by `.get(...)`, `.post(...)`, ...
//! 2. direct: `<id>.<method>('<path>', ...)`
//!
//! Chained segments claim their method offsets so the direct pass never
//! reports them a second time.

use super::lexer::{self, Cursor};
use crate::indexer::http::HttpMethod;
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteForm {
    Chained,
    Direct,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSite<'a> {
    pub receiver: &'a str,
    pub method: HttpMethod,
    pub raw_path: &'a str,
    pub args: &'a str,
    pub line: usize,
    pub form: SiteForm,
}

pub fn locate(src: &str) -> Vec<RouteSite<'_>> {
    let mut claimed = HashSet::new();
    let mut sites = chained_sites(src, &mut claimed);
    sites.extend(direct_sites(src, &claimed));
    sites
}

fn chained_sites<'a>(src: &'a str, claimed: &mut HashSet<usize>) -> Vec<RouteSite<'a>> {
    let mut sites = Vec::new();
    for call in lexer::member_calls(src, |member| member == "route") {
        let line = lexer::line_of(src, call.start);
        let Some(args) = lexer::call_args(src, call.open) else {
            debug!(line, "skipping unbalanced route() call");
            continue;
        };
        let Some(path) = lexer::sole_literal(args.text) else {
            continue;
        };

        let mut cursor = Cursor::new(src, args.close + 1);
        loop {
            cursor.skip_trivia();
            if !cursor.eat(b'.') {
                break;
            }
            cursor.skip_whitespace();
            let member_start = cursor.pos();
            let Some(method) = cursor.ident().and_then(HttpMethod::from_member) else {
                break;
            };
            cursor.skip_whitespace();
            let Some(segment) = cursor.call_args() else {
                debug!(line, method = %method, "chain segment is malformed, ending chain");
                break;
            };
            claimed.insert(member_start);
            sites.push(RouteSite {
                receiver: call.receiver,
                method,
                raw_path: path.value,
                args: segment.text,
                line,
                form: SiteForm::Chained,
            });
        }
    }
    sites
}

fn direct_sites<'a>(src: &'a str, claimed: &HashSet<usize>) -> Vec<RouteSite<'a>> {
    let mut sites = Vec::new();
    let calls = lexer::member_calls(src, |member| HttpMethod::from_member(member).is_some());
    for call in calls {
        if claimed.contains(&call.member_start) {
            continue;
        }
        let Some(method) = HttpMethod::from_member(call.member) else {
            continue;
        };
        let line = lexer::line_of(src, call.start);
        let Some(args) = lexer::call_args(src, call.open) else {
            debug!(line, receiver = call.receiver, "skipping malformed call site");
            continue;
        };
        let Some(raw_path) = first_literal_argument(args.text) else {
            continue;
        };
        sites.push(RouteSite {
            receiver: call.receiver,
            method,
            raw_path,
            args: args.text,
            line,
            form: SiteForm::Direct,
        });
    }
    sites
}

/// The first argument when it is a complete, non-empty literal.
fn first_literal_argument(text: &str) -> Option<&str> {
    let args = lexer::split_args(text)?;
    let literal = lexer::sole_literal(args.first()?)?;
    (!literal.value.is_empty()).then_some(literal.value)
}
