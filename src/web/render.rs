use std::fmt::Write as _;

use axum::response::Html;

use super::types::{Notice, NoticeLevel};
use super::{AUDIT_PATH, LOG_PATH, LOGIN_PATH, LOGOUT_PATH, PORTAL_PATH, STATUS_PATH};
use crate::types::Username;

/// Escape text for inclusion in HTML content or attribute values.
pub(super) fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn layout(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n<h1>{}</h1>\n{body}</body>\n</html>\n",
        escape(title),
        escape(title),
    ))
}

fn notice_html(out: &mut String, notice: &Notice) {
    let class = match notice.level {
        NoticeLevel::Success => "success",
        NoticeLevel::Danger => "danger",
    };
    let _ = writeln!(out, "<p class=\"{class}\">{}</p>", escape(&notice.message));
}

/// Portal page: a login link, or the operator's controls and pending notices.
pub(super) fn portal(user: Option<&Username>, notices: &[Notice]) -> Html<String> {
    let mut body = String::new();
    for notice in notices {
        notice_html(&mut body, notice);
    }

    let Some(user) = user else {
        let _ = writeln!(body, "<p><a href=\"{LOGIN_PATH}\">Log in</a></p>");
        return layout("Bot portal", &body);
    };

    let _ = writeln!(
        body,
        "<p>Logged in as {} (<a href=\"{LOGOUT_PATH}\">log out</a>)</p>",
        escape(user.as_str())
    );
    let _ = writeln!(
        body,
        "<ul>\n<li><a href=\"{STATUS_PATH}\">Status</a></li>\n<li><a href=\"{LOG_PATH}\">Log</a></li>\n<li><a href=\"{AUDIT_PATH}\">Audit log</a></li>\n</ul>"
    );
    body.push_str(concat!(
        "<form method=\"post\" action=\"/restart\">\n",
        "<select name=\"type\">\n",
        "<option value=\"status\">Status</option>\n",
        "<option value=\"restart\">Restart</option>\n",
        "</select>\n",
        "<button type=\"submit\">Submit</button>\n",
        "</form>\n",
        "<form method=\"post\" action=\"/delete\">\n",
        "<input type=\"text\" name=\"file\" placeholder=\"File name\">\n",
        "<button type=\"submit\">Delete file</button>\n",
        "</form>\n",
    ));
    layout("Bot portal", &body)
}

/// Pre-formatted text page with an optional advisory line above it.
pub(super) fn text_page(title: &str, text: &str, notice: Option<&str>) -> Html<String> {
    let mut body = String::new();
    if let Some(notice) = notice {
        notice_html(&mut body, &Notice::danger(notice));
    }
    let _ = writeln!(body, "<pre>{}</pre>", escape(text));
    let _ = writeln!(body, "<p><a href=\"{PORTAL_PATH}\">Back</a></p>");
    layout(title, &body)
}

pub(super) fn denied(user: &Username) -> Html<String> {
    let body = format!(
        "<p>{} is not allowed to perform this action.</p>\n<p><a href=\"{PORTAL_PATH}\">Back</a></p>\n",
        escape(user.as_str())
    );
    layout("Permission denied", &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#x27;&amp;&#x27;&lt;/a&gt;"
        );
    }

    #[test]
    fn anonymous_portal_offers_login() {
        let Html(page) = portal(None, &[]);
        assert!(page.contains("href=\"/login\""));
        assert!(!page.contains("action=\"/delete\""));
    }

    #[test]
    fn portal_shows_user_and_notices() {
        let user: Username = "<Alice>".parse().unwrap();
        let Html(page) = portal(Some(&user), &[Notice::danger("Illegal input")]);
        assert!(page.contains("Logged in as &lt;Alice&gt;"));
        assert!(page.contains("<p class=\"danger\">Illegal input</p>"));
        assert!(page.contains("action=\"/delete\""));
    }

    #[test]
    fn text_page_escapes_content() {
        let Html(page) = text_page("Log", "<script>", Some("careful"));
        assert!(page.contains("<pre>&lt;script&gt;</pre>"));
        assert!(page.contains("careful"));
    }
}
