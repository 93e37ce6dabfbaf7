//! Human-readable console output: the crawl report for `--crawl-only` and the
//! digest printed before it is sent.

use crate::models::{Article, DigestEvent};
use crate::utils::truncate_chars;
use std::fmt::Write;

const BANNER_WIDTH: usize = 60;
const PREVIEW_CHARS: usize = 100;

fn banner(out: &mut String, title: &str) {
    let bar = "=".repeat(BANNER_WIDTH);
    let _ = writeln!(out, "\n{bar}\n{title}\n{bar}");
}

/// One block per article: source and title, time and URL, summary preview.
pub fn crawl_report(articles: &[Article]) -> String {
    let mut out = String::new();
    banner(&mut out, &format!("Crawl result: {} articles", articles.len()));
    for a in articles {
        let _ = writeln!(out, "[{}] {}", a.source_name, a.title);
        let _ = writeln!(out, "  time: {}  url: {}", a.published_label(), a.url);
        if let Some(body) = a.body_text.as_deref().filter(|b| !b.is_empty()) {
            let _ = writeln!(out, "  summary: {}...", truncate_chars(body, PREVIEW_CHARS));
        }
        out.push('\n');
    }
    out
}

pub fn digest_report(events: &[DigestEvent]) -> String {
    let mut out = String::new();
    banner(&mut out, &format!("Tech digest: top {} events", events.len()));
    for e in events {
        let _ = writeln!(out, "\n#{} [{}] {}", e.rank, e.category, e.title);
        let _ = writeln!(out, "   {}", e.summary);
        let _ = writeln!(out, "   source: {}  |  {}", e.source, e.url);
    }
    out.push('\n');
    out
}
