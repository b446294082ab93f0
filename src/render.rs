use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use indicatif::ProgressBar;

use crate::models::ModelTable;
use crate::record::{group_by_model, Record};
use crate::AppError;

pub const DEFAULT_OUTPUT_FILE: &str = "overview.html";
pub const DEFAULT_TITLE: &str = "This Place Does Exist";
pub const DEFAULT_SUBTITLE: &str = "stable diffusion logbook";
pub const CREATED_COLUMN: &str = "Created";

const PAGED_POLYFILL: &str = "https://unpkg.com/pagedjs/dist/paged.polyfill.js";
const STYLESHEETS: &[&str] = &["style.css", "pagedjs-interface.css"];
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookletOptions {
    pub title: String,
    pub subtitle: String,
}

impl Default for BookletOptions {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            subtitle: DEFAULT_SUBTITLE.to_string(),
        }
    }
}

/// Renders already sorted records. A section opens whenever the model hash changes.
pub fn render_booklet(
    records: &[Record],
    table: &ModelTable,
    options: &BookletOptions,
    bar: Option<&ProgressBar>,
) -> String {
    let mut html = String::new();
    html.push_str(&head(&options.title));
    html.push_str("<body>\n");
    html.push_str(&format!(
        "<section id=\"cover\">\n<h1 class=\"title\">{}</h1>\n<h2>{}</h2>\n</section>\n",
        escape_html(&options.title),
        escape_html(&options.subtitle)
    ));
    html.push_str(&table_of_contents(table));

    for (hash, run) in group_by_model(records) {
        html.push_str(&format!(
            "<section id=\"model{}\" class=\"prompt\">\n<h1>{}</h1>\n<h2>{}</h2>\n",
            escape_html(hash),
            escape_html(&run[0].model_name),
            escape_html(hash)
        ));
        for record in run {
            html.push_str(&record_block(record));
            if let Some(b) = bar {
                b.inc(1);
            }
        }
        html.push_str("</section>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn head(title: &str) -> String {
    let mut out = String::from(
        "<!DOCTYPE html>\n<html>\n<head>\n\
         <meta charset=\"UTF-8\">\n\
         <meta http-equiv=\"X-UA-Compatible\" content=\"IE=edge\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
    );
    out.push_str(&format!("<title>{}</title>\n", escape_html(title)));
    out.push_str(&format!("<script src=\"{}\"></script>\n", PAGED_POLYFILL));
    for sheet in STYLESHEETS {
        out.push_str(&format!(
            "<link rel=\"stylesheet\" href=\"{}\" type=\"text/css\">\n",
            sheet
        ));
    }
    out.push_str("</head>\n");
    out
}

fn table_of_contents(table: &ModelTable) -> String {
    let mut out = String::from("<section id=\"toc\">\n<h2>Table of contents</h2>\n<ul>\n");
    // データに無いモデルも目次には載せる
    for entry in table.entries() {
        out.push_str(&format!(
            "<li>{} <a class=\"tocitem\" data-target-id=\"#model{}\"></a></li>\n",
            escape_html(&entry.name),
            escape_html(&entry.hash)
        ));
    }
    out.push_str("</ul>\n</section>\n");
    out
}

fn record_block(record: &Record) -> String {
    let mut out = String::from("<div class=\"prompt\">\n");
    out.push_str(&format!(
        "<img src=\"{}\">\n",
        escape_html(&image_src(&record.image_path))
    ));
    out.push_str(&format!("<p>{}</p>\n", escape_html(&record.prompt)));
    if let Some(negative) = &record.negative_prompt {
        out.push_str(&format!(
            "<p><strong>Negative:</strong> {}</p>\n",
            escape_html(negative)
        ));
    }

    let created = format_timestamp(&record.created_at);
    let (mut names, mut values): (Vec<String>, Vec<String>) = record
        .display_fields()
        .map(|(k, v)| {
            // ファイルの作成時刻が同名のパラメータを上書きする
            let v = if k == CREATED_COLUMN { created.clone() } else { escape_html(v) };
            (escape_html(k), v)
        })
        .unzip();
    if record.fields.get(CREATED_COLUMN).is_none() {
        names.push(CREATED_COLUMN.to_string());
        values.push(created);
    }

    out.push_str("<table>\n");
    out.push_str(&format!("<tr><th>{}</th></tr>\n", names.join("</th><th>")));
    out.push_str(&format!("<tr><td>{}</td></tr>\n", values.join("</td><td>")));
    out.push_str("</table>\n</div>\n");
    out
}

pub fn format_timestamp(t: &DateTime<Local>) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

fn image_src(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Replaces `root/file_name` with the finished document.
pub fn write_booklet(root: &Path, file_name: &str, html: &str) -> Result<PathBuf, AppError> {
    let path = root.join(file_name);
    fs::write(&path, html).map_err(|source| AppError::File {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}
