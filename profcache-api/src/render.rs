//! Web-view rendering.
//!
//! A [`Renderer`] turns a resolved payload into an HTML page. The default
//! [`HtmlRenderer`] lists each top-level section with its JSON
//! pretty-printed; every interpolated string is HTML-escaped.

use profcache_core::{format_timestamp, CacheEntry};
use serde_json::Value;

/// Turns a cache entry into an HTML document.
pub trait Renderer: Send + Sync {
    fn render(&self, entry: &CacheEntry) -> String;
}

/// Section order for the profile page; other fields follow alphabetically.
const SECTION_ORDER: &[&str] = &["profile", "contact_info", "experiences", "skills", "connections"];

/// Built-in HTML renderer.
#[derive(Debug, Clone, Default)]
pub struct HtmlRenderer;

impl HtmlRenderer {
    pub fn new() -> Self {
        Self
    }

    fn display_name(entry: &CacheEntry) -> String {
        let name = format!(
            "{} {}",
            profile_str(entry, "firstName").unwrap_or_default(),
            profile_str(entry, "lastName").unwrap_or_default()
        );
        let name = name.trim();
        if name.is_empty() {
            entry.key.to_string()
        } else {
            name.to_string()
        }
    }
}

impl Renderer for HtmlRenderer {
    fn render(&self, entry: &CacheEntry) -> String {
        let title = escape_html(&Self::display_name(entry));
        let headline = profile_str(entry, "headline")
            .map(|h| format!("<p class=\"headline\">{}</p>\n", escape_html(h)))
            .unwrap_or_default();

        let mut fields: Vec<&String> = entry.payload.keys().collect();
        fields.sort_by(|a, b| section_rank(a).cmp(&section_rank(b)).then_with(|| a.cmp(b)));

        let mut sections = String::new();
        for name in fields {
            let value = &entry.payload[name.as_str()];
            let body = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
            sections.push_str(&format!(
                "<section id=\"{id}\">\n<h2>{title}</h2>\n<pre>{body}</pre>\n</section>\n",
                id = escape_html(name),
                title = escape_html(&section_title(name)),
                body = escape_html(&body),
            ));
        }

        format!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
             <title>{title}</title>\n<style>{css}</style>\n</head>\n<body>\n\
             <h1>{title}</h1>\n{headline}<p class=\"fetched\">Fetched {fetched}</p>\n\
             {sections}</body>\n</html>\n",
            title = title,
            css = PAGE_CSS,
            headline = headline,
            fetched = format_timestamp(entry.fetched_at),
            sections = sections,
        )
    }
}

const PAGE_CSS: &str = "body{font-family:sans-serif;max-width:60em;margin:2em auto;padding:0 1em}\
pre{background:#f6f8fa;padding:1em;overflow-x:auto}.fetched{color:#666}";

fn profile_str<'a>(entry: &'a CacheEntry, field: &str) -> Option<&'a str> {
    entry
        .payload
        .get("profile")
        .and_then(|p| p.get(field))
        .and_then(Value::as_str)
}

fn section_rank(name: &str) -> usize {
    SECTION_ORDER
        .iter()
        .position(|s| *s == name)
        .unwrap_or(SECTION_ORDER.len())
}

/// `contact_info` -> `Contact Info`.
fn section_title(name: &str) -> String {
    name.split(['_', '-'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Escape text for HTML element content and attribute values.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use profcache_core::{CacheKey, Payload};
    use serde_json::json;

    fn entry(value: Value) -> CacheEntry {
        let payload: Payload = match value {
            Value::Object(map) => map,
            _ => panic!("payload must be an object"),
        };
        CacheEntry::fetched_now(CacheKey::parse("alice").unwrap(), payload)
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<script>alert("x&y")</script>"#),
            "&lt;script&gt;alert(&quot;x&amp;y&quot;)&lt;/script&gt;"
        );
    }

    #[test]
    fn test_section_title() {
        assert_eq!(section_title("contact_info"), "Contact Info");
        assert_eq!(section_title("skills"), "Skills");
    }

    #[test]
    fn test_renders_sections_in_profile_order() {
        let html = HtmlRenderer::new().render(&entry(json!({
            "zeta": 1,
            "skills": [{"name": "Rust"}],
            "profile": {"firstName": "Alice", "lastName": "Smith", "headline": "Engineer"},
        })));

        assert!(html.contains("<h1>Alice Smith</h1>"));
        assert!(html.contains("Engineer"));
        let profile = html.find("<h2>Profile</h2>").unwrap();
        let skills = html.find("<h2>Skills</h2>").unwrap();
        let zeta = html.find("<h2>Zeta</h2>").unwrap();
        assert!(profile < skills && skills < zeta);
    }

    #[test]
    fn test_payload_strings_are_escaped() {
        let html = HtmlRenderer::new().render(&entry(json!({
            "profile": {"firstName": "<img src=x onerror=alert(1)>"},
        })));
        assert!(!html.contains("<img"));
        assert!(html.contains("&lt;img"));
    }

    #[test]
    fn test_falls_back_to_key_without_name() {
        let html = HtmlRenderer::new().render(&entry(json!({"skills": []})));
        assert!(html.contains("<h1>alice</h1>"));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_escaped_text_has_no_markup(raw in ".{0,64}") {
                let escaped = escape_html(&raw);
                prop_assert!(!escaped.contains('<'));
                prop_assert!(!escaped.contains('>'));
                prop_assert!(!escaped.contains('"'));
            }

            #[test]
            fn prop_every_section_is_rendered(
                fields in prop::collection::btree_set("[a-z]{1,8}", 0..6)
            ) {
                let payload: Payload = fields
                    .iter()
                    .map(|f| (f.clone(), json!(f)))
                    .collect();
                let html = HtmlRenderer::new()
                    .render(&CacheEntry::fetched_now(CacheKey::parse("alice").unwrap(), payload));
                for field in &fields {
                    let section = format!("<section id=\"{}\">", field);
                    prop_assert!(html.contains(&section));
                }
            }
        }
    }
}
