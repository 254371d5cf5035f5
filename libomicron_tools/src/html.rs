use std::fmt::Write;
use std::path::{Path, PathBuf};

use super::error::HtmlError;
use super::gps::{leap_seconds_at_unix, unix_now};

const INDEX_NAME: &str = "index.html";

const STYLE: &str = r#"
body { font-family: sans-serif; margin: 2em; }
.status { display: inline-block; padding: 0.4em 0.8em; margin: 0.2em; border-radius: 4px; background: #ccc; }
.status-0 { background: #5cb85c; color: white; }
.status-1 { background: #f0ad4e; color: white; }
.status-2 { background: #d9534f; color: white; }
.status-3 { background: #777; color: white; }
img { max-width: 100%; }
table { border-collapse: collapse; }
td, th { border: 1px solid #ccc; padding: 0.2em 0.6em; text-align: left; }
"#;

/// Polls every status document and colours its link by the current status code.
/// LEAP_SECONDS is replaced with the GPS-UTC offset when the page is rendered.
const SCRIPT: &str = r#"
function refreshStatus() {
  document.querySelectorAll('a.status').forEach(function (link) {
    fetch(link.getAttribute('href'), {cache: 'no-store'})
      .then(function (response) { return response.json(); })
      .then(function (doc) {
        var age = Date.now() / 1000 - 315964800 + LEAP_SECONDS - doc.created_gps;
        var code = 3;
        doc.status_intervals.forEach(function (interval) {
          var end = interval.end_sec === undefined ? Infinity : interval.end_sec;
          if (age >= interval.start_sec && age < end) { code = interval.num_status; }
        });
        link.className = 'status status-' + code;
        link.title = doc.status_intervals[0].txt_status;
      })
      .catch(function () { link.className = 'status status-3'; });
  });
}
refreshStatus();
setInterval(refreshStatus, 60000);
"#;

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Everything the dashboard links to. Paths are made relative to the output directory.
#[derive(Debug, Clone, Default)]
pub struct Dashboard {
    pub title: String,
    pub generated: String,
    pub status_documents: Vec<PathBuf>,
    pub plots: Vec<(String, PathBuf)>,
    pub parameters: Vec<(String, String)>,
}

impl Dashboard {
    pub fn render(&self) -> Result<String, HtmlError> {
        let mut page = String::new();
        writeln!(page, "<!DOCTYPE html>")?;
        writeln!(page, "<html lang=\"en\">\n<head>")?;
        writeln!(page, "<meta charset=\"utf-8\">")?;
        writeln!(page, "<title>{}</title>", escape(&self.title))?;
        writeln!(page, "<style>{STYLE}</style>\n</head>\n<body>")?;
        writeln!(page, "<h1>{}</h1>", escape(&self.title))?;
        writeln!(page, "<p>Generated {}</p>", escape(&self.generated))?;

        writeln!(page, "<h2>Status</h2>\n<div>")?;
        for doc in self.status_documents.iter() {
            let name = escape(&file_name(doc));
            writeln!(page, "<a class=\"status\" href=\"{name}\">{name}</a>")?;
        }
        writeln!(page, "</div>")?;

        if !self.plots.is_empty() {
            writeln!(page, "<h2>Plots</h2>")?;
            for (caption, plot) in self.plots.iter() {
                let name = escape(&file_name(plot));
                writeln!(
                    page,
                    "<figure><a href=\"{name}\"><img src=\"{name}\" alt=\"{caption}\"></a><figcaption>{caption}</figcaption></figure>",
                    caption = escape(caption)
                )?;
            }
        }

        writeln!(page, "<h2>Parameters</h2>\n<table>")?;
        for (key, value) in self.parameters.iter() {
            writeln!(
                page,
                "<tr><th>{}</th><td>{}</td></tr>",
                escape(key),
                escape(value)
            )?;
        }
        writeln!(page, "</table>")?;
        let script = SCRIPT.replace(
            "LEAP_SECONDS",
            &leap_seconds_at_unix(unix_now()).to_string(),
        );
        writeln!(page, "<script>{script}</script>\n</body>\n</html>")?;
        Ok(page)
    }

    /// Write index.html into the output directory and return its path
    pub fn write(&self, output_dir: &Path) -> Result<PathBuf, HtmlError> {
        let path = output_dir.join(INDEX_NAME);
        std::fs::write(&path, self.render()?)?;
        log::info!("HTML dashboard written to {}", path.to_string_lossy());
        Ok(path)
    }
}
