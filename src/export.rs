//! "Save offline" snapshots of the active tab.
//!
//! Remote content sits behind isolation layers and cannot be read back, so
//! remote pages are exported as a stub document linking to the original
//! destination. Internal pages get a small static summary card.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::info;

use crate::address::Destination;
use crate::html::escape;

/// A self-contained document ready to be written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub file_name: String,
    pub html: String,
}

impl Snapshot {
    /// Writes the snapshot into `dir` and returns the full path.
    pub fn write_to(&self, dir: &Path) -> io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(&self.file_name);
        fs::write(&path, &self.html)?;
        info!(path = %path.display(), bytes = self.html.len(), "Snapshot written");
        Ok(path)
    }
}

/// Builds the snapshot for a destination.
pub fn snapshot(destination: &Destination, display_name: &str, now: DateTime<Local>) -> Snapshot {
    let name = if display_name.trim().is_empty() {
        "page"
    } else {
        display_name
    };
    let stamp = now.format("%Y-%m-%d %H:%M:%S");
    let address = escape(&destination.to_string());
    let title = escape(name);

    let html = match destination {
        Destination::Internal(_) => format!(
            r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title} - Offline</title>
<style>
body {{ font-family: sans-serif; padding: 40px; background: #f1f3f4; }}
.card {{ background: white; padding: 20px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }}
</style>
</head>
<body>
<div class="card">
<h1>{title}</h1>
<p>This is an offline snapshot of <strong>{address}</strong>.</p>
<p>Generated on {stamp}</p>
</div>
</body>
</html>
"#
        ),
        Destination::Url(_) => format!(
            r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title} - Offline</title>
</head>
<body>
<h1>{title}</h1>
<p>Offline version of: <a href="{address}">{address}</a></p>
<p>Note: external content cannot be saved from inside its isolation layers. Follow the link above when online.</p>
<hr>
<p>Snapshot taken on: {stamp}</p>
</body>
</html>
"#
        ),
    };

    Snapshot {
        file_name: format!("{}.html", file_stem(name)),
        html,
    }
}

/// Replaces characters that are not safe in file names.
fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}
