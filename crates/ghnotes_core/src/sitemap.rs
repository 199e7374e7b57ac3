//! `sitemap.xml` generation for the published blog.

use std::fmt::Write as _;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::index::IndexEntry;

/// Priority given to individual note pages.
pub const NOTE_PRIORITY: &str = "0.6";

/// Change frequency given to individual note pages.
pub const NOTE_CHANGEFREQ: &str = "monthly";

/// A static page listed in the sitemap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitemapPage {
    /// Path relative to the domain, starting with `/`
    pub url: String,
    /// Priority between `0.0` and `1.0`
    pub priority: String,
    /// `daily`, `weekly`, `monthly`, ...
    pub changefreq: String,
}

impl SitemapPage {
    /// Create a page entry.
    pub fn new(url: &str, priority: &str, changefreq: &str) -> Self {
        Self {
            url: url.to_string(),
            priority: priority.to_string(),
            changefreq: changefreq.to_string(),
        }
    }
}

/// The blog's static pages.
pub fn default_pages() -> Vec<SitemapPage> {
    vec![
        SitemapPage::new("/", "1.0", "weekly"),
        SitemapPage::new("/notes.html", "0.9", "daily"),
        SitemapPage::new("/write.html", "0.8", "weekly"),
        SitemapPage::new("/profile.html", "0.7", "monthly"),
    ]
}

/// Render a sitemap. Static pages get `lastmod`; each note page gets the
/// note's own date.
pub fn generate_sitemap(
    domain: &str,
    pages: &[SitemapPage],
    notes: &[IndexEntry],
    lastmod: NaiveDate,
) -> String {
    let domain = domain.trim_end_matches('/');
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );

    for page in pages {
        push_url(
            &mut xml,
            &format!("{}{}", domain, page.url),
            lastmod,
            &page.changefreq,
            &page.priority,
        );
    }

    for note in notes {
        push_url(
            &mut xml,
            &format!("{}/note.html?id={}", domain, note.id),
            note.date.date_naive(),
            NOTE_CHANGEFREQ,
            NOTE_PRIORITY,
        );
    }

    xml.push_str("</urlset>\n");
    xml
}

fn push_url(xml: &mut String, loc: &str, lastmod: NaiveDate, changefreq: &str, priority: &str) {
    // Writing to a String cannot fail
    let _ = write!(
        xml,
        "    <url>\n        <loc>{}</loc>\n        <lastmod>{}</lastmod>\n        \
         <changefreq>{}</changefreq>\n        <priority>{}</priority>\n    </url>\n",
        escape_xml(loc),
        lastmod.format("%Y-%m-%d"),
        escape_xml(changefreq),
        escape_xml(priority)
    );
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
