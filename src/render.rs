//! Inline HTML pages. Every interpolated value goes through [`escape_html`].

use crate::models::search::SearchResponse;

pub const MAX_RESULTS: usize = 20;
const MAX_SNIPPET_CHARS: usize = 200;
const MAX_DISPLAY_URL_CHARS: usize = 60;

const BASE_STYLE: &str = "body { font-family: system-ui, sans-serif; max-width: 700px; margin: 40px auto; padding: 20px; }
        input { padding: 12px; font-size: 16px; width: 100%; box-sizing: border-box; margin: 10px 0; }
        button { padding: 10px 20px; font-size: 16px; cursor: pointer; }
        a { color: #1a0dab; text-decoration: none; }
        a:hover { text-decoration: underline; }
        .muted { color: #666; font-size: 14px; }
        .result { margin-bottom: 20px; }
        .result .url { color: #006621; font-size: 13px; }
        .result p { color: #666; margin: 5px 0; }";

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn is_web_link(url: &str) -> bool {
    let lower = url.trim_start().to_ascii_lowercase();
    lower.starts_with("https://") || lower.starts_with("http://")
}

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <meta name="referrer" content="no-referrer">
    <title>{title}</title>
    <style>
        {BASE_STYLE}
    </style>
</head>
<body>
{body}
</body>
</html>"#,
        title = escape_html(title),
    )
}

/// The hidden field echoes the caller's own token back to them so the next
/// search stays authenticated. Every response is `no-store` and
/// `no-referrer`, so the page is neither cached nor leaked to result links.
fn search_form(token: &str, query: &str, autofocus: bool) -> String {
    format!(
        r#"    <form action="/search" method="GET">
        <input type="hidden" name="token" value="{token}">
        <input type="text" name="q" value="{query}" placeholder="Search privately..."{autofocus}>
    </form>"#,
        token = escape_html(token),
        query = escape_html(query),
        autofocus = if autofocus { " autofocus" } else { "" },
    )
}

pub fn landing_page(purchase_url: Option<&str>) -> String {
    let purchase = purchase_url
        .filter(|u| is_web_link(u))
        .map(|u| {
            format!(
                r#"    <p class="muted">No token? <a href="{}">Get access</a></p>"#,
                escape_html(u)
            )
        })
        .unwrap_or_default();

    let body = format!(
        r#"    <h1>Death2Data</h1>
    <p>Private search. We know who you are. We don't know what you search.</p>
    <form action="/" method="GET">
        <input type="text" name="token" placeholder="Enter your access token" autocomplete="off">
        <button type="submit">Access Search</button>
    </form>
{purchase}"#
    );
    page("Death2Data - Private Search", &body)
}

pub fn search_page(token: &str) -> String {
    page("Search - Death2Data", &search_form(token, "", true))
}

pub fn results_page(token: &str, query: &str, results: &SearchResponse) -> String {
    let mut body = search_form(token, query, false);
    body.push('\n');

    if results.results.is_empty() {
        body.push_str("    <p class=\"muted\">No results.</p>\n");
    }

    for item in results.results.iter().take(MAX_RESULTS) {
        let title = if item.title.trim().is_empty() {
            item.url.as_str()
        } else {
            item.title.as_str()
        };
        let heading = if is_web_link(&item.url) {
            format!(
                r#"<a href="{}" rel="noreferrer noopener">{}</a>"#,
                escape_html(&item.url),
                escape_html(title)
            )
        } else {
            escape_html(title)
        };

        body.push_str(&format!(
            r#"    <div class="result">
        {heading}
        <div class="url">{url}</div>
        <p>{snippet}</p>
    </div>
"#,
            url = escape_html(truncate_chars(&item.url, MAX_DISPLAY_URL_CHARS)),
            snippet = escape_html(truncate_chars(&item.content, MAX_SNIPPET_CHARS)),
        ));
    }

    page(&format!("{} - Death2Data", query), &body)
}

pub fn error_page(title: &str, message: &str) -> String {
    let body = format!(
        r#"    <h1>{}</h1>
    <p>{} <a href="/">Go back</a></p>"#,
        escape_html(title),
        escape_html(message)
    );
    page(&format!("{} - Death2Data", title), &body)
}
