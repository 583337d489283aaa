use crate::model::PermissionRecord;
use std::borrow::Cow;

pub const HEADER: [&str; 7] = ["file", "line", "source", "method", "path", "roles", "role"];

pub fn to_csv(records: &[PermissionRecord]) -> String {
    let mut out = HEADER.join(",");
    out.push('\n');
    for record in records {
        let line = record.line.to_string();
        let roles = record.roles.join(";");
        let fields = [
            record.file.as_str(),
            line.as_str(),
            record.source.as_str(),
            record.method.as_str(),
            record.path.as_str(),
            roles.as_str(),
            record.role.as_deref().unwrap_or(""),
        ];
        let row: Vec<Cow<'_, str>> = fields.iter().map(|field| escape_field(field)).collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::http::HttpMethod;

    #[test]
    fn writes_header_and_joined_roles() {
        let records = vec![
            PermissionRecord::new(
                "src/app.js",
                3,
                "app",
                HttpMethod::Get,
                "/admin".to_string(),
                vec!["admin".to_string(), "ops".to_string()],
            ),
            PermissionRecord::new("src/app.js", 9, "app", HttpMethod::Get, "/".to_string(), vec![]),
        ];
        let csv = to_csv(&records);
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines[0], "file,line,source,method,path,roles,role");
        assert_eq!(lines[1], "src/app.js,3,app,GET,/admin,admin;ops,admin");
        assert_eq!(lines[2], "src/app.js,9,app,GET,/,,");
    }

    #[test]
    fn quotes_fields_that_need_it() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("/a,b"), "\"/a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
