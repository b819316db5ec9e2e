//! `<urlset>` and `<sitemapindex>` document builders.
//!
//! Pure string assembly: no I/O, and output depends only on the arguments.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

const XML_DECL: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>";
const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeFrequency {
    Always,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Never,
}

impl ChangeFrequency {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Always => "always",
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
            Self::Never => "never",
        }
    }
}

/// One `<url>` block of a leaf sitemap.
#[derive(Debug, Clone, PartialEq)]
pub struct UrlEntry {
    pub location: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub change_frequency: Option<ChangeFrequency>,
    /// Clamped to `[0, 1]` when rendered.
    pub priority: Option<f32>,
}

impl UrlEntry {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            last_modified: None,
            change_frequency: None,
            priority: None,
        }
    }

    pub fn last_modified(mut self, at: DateTime<Utc>) -> Self {
        self.last_modified = Some(at);
        self
    }

    pub fn change_frequency(mut self, freq: ChangeFrequency) -> Self {
        self.change_frequency = Some(freq);
        self
    }

    pub fn priority(mut self, priority: f32) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// Render a timestamp the way sitemap consumers expect (`2024-01-02T03:04:05.000Z`).
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Escape the five XML-reserved characters.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '\'' => out.push_str("&apos;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Build a `<urlset>` document with one `<url>` per entry, in input order.
pub fn build_url_set(entries: &[UrlEntry]) -> String {
    let blocks: Vec<String> = entries.iter().map(url_block).collect();
    document("urlset", &blocks)
}

/// Build a `<sitemapindex>` pointing at each URL, all stamped with `generated_at`.
pub fn build_index(sitemap_urls: &[String], generated_at: DateTime<Utc>) -> String {
    let lastmod = format_timestamp(generated_at);
    let blocks: Vec<String> = sitemap_urls
        .iter()
        .map(|url| {
            format!(
                "  <sitemap>\n    <loc>{}</loc>\n    <lastmod>{lastmod}</lastmod>\n  </sitemap>",
                escape(url)
            )
        })
        .collect();
    document("sitemapindex", &blocks)
}

fn url_block(entry: &UrlEntry) -> String {
    let mut block = format!("  <url>\n    <loc>{}</loc>\n", escape(&entry.location));
    // Writing into a String cannot fail.
    if let Some(at) = entry.last_modified {
        let _ = writeln!(block, "    <lastmod>{}</lastmod>", format_timestamp(at));
    }
    if let Some(freq) = entry.change_frequency {
        let _ = writeln!(block, "    <changefreq>{}</changefreq>", freq.as_str());
    }
    if let Some(priority) = entry.priority {
        let _ = writeln!(block, "    <priority>{:.1}</priority>", priority.clamp(0.0, 1.0));
    }
    block.push_str("  </url>");
    block
}

fn document(root: &str, blocks: &[String]) -> String {
    format!(
        "{XML_DECL}\n<{root} xmlns=\"{SITEMAP_NS}\">\n{}\n</{root}>",
        blocks.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, h, 30, 0).unwrap()
    }

    /// Minimal inverse of `escape`, enough to check the round trip.
    fn unescape(text: &str) -> String {
        text.replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&apos;", "'")
            .replace("&quot;", "\"")
            .replace("&amp;", "&")
    }

    #[test]
    fn url_set_full_entry() {
        let xml = build_url_set(&[UrlEntry::new("https://example.com/blog/news/hello/")
            .last_modified(ts(12))
            .change_frequency(ChangeFrequency::Weekly)
            .priority(0.8)]);

        assert_eq!(
            xml,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n  \
             <url>\n    \
             <loc>https://example.com/blog/news/hello/</loc>\n    \
             <lastmod>2024-03-09T12:30:00.000Z</lastmod>\n    \
             <changefreq>weekly</changefreq>\n    \
             <priority>0.8</priority>\n  \
             </url>\n\
             </urlset>"
        );
    }

    #[test]
    fn url_set_omits_absent_fields() {
        let xml = build_url_set(&[
            UrlEntry::new("https://example.com/"),
            UrlEntry::new("https://example.com/about/").priority(1.0),
        ]);

        assert_eq!(
            xml,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n  \
             <url>\n    <loc>https://example.com/</loc>\n  </url>\n  \
             <url>\n    <loc>https://example.com/about/</loc>\n    <priority>1.0</priority>\n  </url>\n\
             </urlset>"
        );
        assert!(!xml.contains("lastmod"));
        assert!(!xml.contains("changefreq"));
    }

    #[test]
    fn priority_is_clamped() {
        let xml = build_url_set(&[UrlEntry::new("https://example.com/").priority(3.5)]);
        assert!(xml.contains("<priority>1.0</priority>"));
    }

    #[test]
    fn empty_url_set_is_well_formed() {
        assert_eq!(
            build_url_set(&[]),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n\n</urlset>"
        );
    }

    #[test]
    fn index_stamps_generation_time() {
        let urls = vec![
            "https://cms.example.com/api/v1/sitemaps/sitemap-post-1.xml".to_owned(),
            "https://cms.example.com/api/v1/sitemaps/sitemap-post-2.xml".to_owned(),
        ];
        let xml = build_index(&urls, ts(4));

        assert_eq!(
            xml,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <sitemapindex xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n  \
             <sitemap>\n    \
             <loc>https://cms.example.com/api/v1/sitemaps/sitemap-post-1.xml</loc>\n    \
             <lastmod>2024-03-09T04:30:00.000Z</lastmod>\n  \
             </sitemap>\n  \
             <sitemap>\n    \
             <loc>https://cms.example.com/api/v1/sitemaps/sitemap-post-2.xml</loc>\n    \
             <lastmod>2024-03-09T04:30:00.000Z</lastmod>\n  \
             </sitemap>\n\
             </sitemapindex>"
        );
    }

    #[test]
    fn reserved_characters_escaped_in_location() {
        let location = "https://example.com/search?q=\"fish\"&chips='yes'<b>";
        let xml = build_url_set(&[UrlEntry::new(location)]);

        let start = xml.find("<loc>").unwrap() + "<loc>".len();
        let end = xml.find("</loc>").unwrap();
        let escaped = &xml[start..end];

        assert_eq!(
            escaped,
            "https://example.com/search?q=&quot;fish&quot;&amp;chips=&apos;yes&apos;&lt;b&gt;"
        );
        assert!(!escaped.contains('<') && !escaped.contains('"') && !escaped.contains('\''));
        assert_eq!(unescape(escaped), location);
    }

    #[test]
    fn escape_handles_preescaped_text() {
        // Already-escaped input is escaped again, never passed through.
        assert_eq!(escape("&amp;"), "&amp;amp;");
        assert_eq!(unescape(&escape("&amp;")), "&amp;");
    }

    #[test]
    fn change_frequency_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ChangeFrequency::Monthly).unwrap(),
            "\"monthly\""
        );
        assert_eq!(ChangeFrequency::Never.as_str(), "never");
    }
}
