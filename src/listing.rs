//! Directory listing rendering.
//!
//! Browsers get an HTML index page; everything else gets the JSON document
//! `{"indexOf", "len", "ls"}`. Entries are sorted directories first, then
//! case-sensitively by name within each group.

use std::cmp::Ordering;
use std::path::Path;
use std::time::UNIX_EPOCH;

use chrono::DateTime;
use serde::Serialize;
use tokio::fs;

use crate::config::Snapshot;
use crate::error::HostError;

/// One entry of a directory index.
#[derive(Debug, Serialize)]
pub struct ListingEntry {
    pub name: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtime: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<bool>,
}

impl ListingEntry {
    pub fn is_dir(&self) -> bool {
        self.dir == Some(true)
    }
}

/// The JSON form of a directory index.
#[derive(Debug, Serialize)]
pub struct ListingDocument {
    #[serde(rename = "indexOf")]
    pub index_of: String,
    pub len: usize,
    pub ls: Vec<ListingEntry>,
}

/// Read the direct entries of `dir`, with `url_path` (trailing slash) as
/// the URL base for each entry's `path` field.
pub async fn scan(dir: &Path, url_path: &str) -> Result<Vec<ListingEntry>, HostError> {
    let mut entries = Vec::new();
    let mut reader = fs::read_dir(dir).await?;

    while let Some(entry) = reader.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        let metadata = entry.metadata().await?;
        let is_dir = metadata.is_dir();
        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs());

        entries.push(ListingEntry {
            path: format!("{url_path}{name}"),
            mtime,
            size: (!is_dir).then(|| metadata.len()),
            dir: is_dir.then_some(true),
            name,
        });
    }

    entries.sort_by(|a, b| match (a.is_dir(), b.is_dir()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a.name.cmp(&b.name),
    });

    Ok(entries)
}

pub fn render_json(url_path: &str, entries: Vec<ListingEntry>) -> ListingDocument {
    ListingDocument {
        index_of: url_path.to_string(),
        len: entries.len(),
        ls: entries,
    }
}

/// Render the HTML index page. `show_parent` adds the `..` link when the
/// listed directory sits below its mount root.
pub fn render_html(
    snapshot: &Snapshot,
    url_path: &str,
    entries: &[ListingEntry],
    show_parent: bool,
) -> String {
    let doc = snapshot.document();
    let col1 = doc.get_u64("display.col1-spacing", 48) as usize;
    let col2 = doc.get_u64("display.col2-spacing", 12) as usize;
    let humanize = doc.get_bool("display.humanize-size", true);
    let gnu = doc.get_bool("display.gnu-style-size", false);
    let dark = doc.get_bool("display.auto-dark-theme", true);

    let title = escape_html(url_path);
    let mut html = String::new();
    html.push_str("<!DOCTYPE html><html><head><meta charset=\"utf-8\">");
    html.push_str(&format!("<title>Index of {title}</title>"));
    html.push_str("<style>body{font-family:monospace;margin:2em}a{text-decoration:none}");
    if dark {
        html.push_str(
            "@media (prefers-color-scheme:dark){body{background:#1d1f21;color:#c5c8c6}a{color:#81a2be}}",
        );
    }
    html.push_str("</style></head><body>");
    html.push_str(&format!("<h1>Index of {title}</h1><hr><pre>"));

    if show_parent {
        html.push_str("<a href=\"../\">..</a>\n");
    }

    for entry in entries {
        let display_name = if entry.is_dir() {
            format!("{}/", entry.name)
        } else {
            entry.name.clone()
        };
        let href = escape_html(&display_name);
        let label = escape_html(&display_name);

        let padding = col1.saturating_sub(display_name.chars().count()).max(1);
        let mtime_cell = entry
            .mtime
            .and_then(|secs| DateTime::from_timestamp(secs as i64, 0))
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        let size_cell = match entry.size {
            Some(size) if humanize => human_size(size, gnu),
            Some(size) => size.to_string(),
            None => "-".to_string(),
        };

        html.push_str(&format!(
            "<a href=\"{href}\">{label}</a>{}{mtime_cell}{}{size_cell}\n",
            " ".repeat(padding),
            " ".repeat(col2.saturating_sub(size_cell.chars().count()).max(1)),
        ));
    }

    html.push_str("</pre><hr></body></html>");
    html
}

/// Human-readable size: IEC suffixes, or GNU `ls -h` single letters.
fn human_size(bytes: u64, gnu: bool) -> String {
    const IEC: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];
    const GNU: [&str; 6] = ["", "K", "M", "G", "T", "P"];

    let mut value = bytes as f64;
    let mut idx = 0;
    while value >= 1024.0 && idx < IEC.len() - 1 {
        value /= 1024.0;
        idx += 1;
    }
    if idx == 0 {
        return if gnu {
            bytes.to_string()
        } else {
            format!("{bytes} B")
        };
    }
    if gnu {
        format!("{value:.1}{}", GNU[idx])
    } else {
        format!("{value:.1} {}", IEC[idx])
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
