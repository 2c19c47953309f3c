//! Article export rendering.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::models::Article;
use crate::storage::ArticleExport;

/// Export output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Backup document accepted by `import`
    Json,
    Markdown,
}

impl ExportFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "md",
        }
    }
}

/// Render a store snapshot as pretty-printed JSON.
pub fn render_json_export(export: &ArticleExport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(export)
}

/// Render articles in Markdown with frontmatter blocks, newest first.
#[must_use]
pub fn render_markdown_export(export: &ArticleExport) -> String {
    let mut articles = export.articles.values().cloned().collect::<Vec<Article>>();
    crate::search::sort_by_publish_date(&mut articles);

    let mut output = String::new();
    for (index, article) in articles.iter().enumerate() {
        if index > 0 {
            output.push('\n');
        }

        let _ = writeln!(output, "---");
        let _ = writeln!(output, "id: {}", article.id);
        let _ = writeln!(output, "title: {}", article.title);
        let _ = writeln!(output, "category: {}", article.category);
        let _ = writeln!(output, "author: {}", article.author);
        let _ = writeln!(output, "status: {}", article.status);
        let _ = writeln!(output, "visibility: {}", article.visibility);
        let _ = writeln!(output, "publish_date: {}", article.publish_date);
        let _ = writeln!(output, "updated_at: {}", article.updated_at);
        let _ = writeln!(output, "tags:");
        for tag in &article.tags {
            let _ = writeln!(output, "  - {tag}");
        }
        let _ = writeln!(output, "---");
        let _ = writeln!(output);
        output.push_str(&article.content);
        output.push('\n');
    }

    output
}

pub fn render_export(export: &ArticleExport, format: ExportFormat) -> serde_json::Result<String> {
    match format {
        ExportFormat::Json => render_json_export(export),
        ExportFormat::Markdown => Ok(render_markdown_export(export)),
    }
}

/// Build a deterministic default file name for exports.
#[must_use]
pub fn suggested_export_file_name(format: ExportFormat, timestamp_ms: i64) -> String {
    format!("quire-export-{timestamp_ms}.{}", format.extension())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn snapshot(articles: Vec<Article>) -> ArticleExport {
        ArticleExport {
            articles: articles
                .into_iter()
                .map(|article| (article.id.to_string(), article))
                .collect::<BTreeMap<_, _>>(),
            exported_at: 99,
        }
    }

    #[test]
    fn markdown_includes_frontmatter_and_content() {
        let mut article = Article::new("Hello export", "<p>Body</p>");
        article.id = "article-1".parse().unwrap();
        article.tags = vec!["rust".into()];
        article.updated_at = 456;

        let rendered = render_markdown_export(&snapshot(vec![article]));
        assert!(rendered.contains("id: article-1"));
        assert!(rendered.contains("title: Hello export"));
        assert!(rendered.contains("status: draft"));
        assert!(rendered.contains("updated_at: 456"));
        assert!(rendered.contains("tags:\n  - rust"));
        assert!(rendered.contains("<p>Body</p>"));
    }

    #[test]
    fn markdown_orders_by_publish_date() {
        let mut older = Article::new("Older", "a");
        older.publish_date = 1;
        let mut newer = Article::new("Newer", "b");
        newer.publish_date = 2;

        let rendered = render_markdown_export(&snapshot(vec![older, newer]));
        let newer_at = rendered.find("title: Newer").unwrap();
        let older_at = rendered.find("title: Older").unwrap();
        assert!(newer_at < older_at);
    }

    #[test]
    fn json_export_parses_back() {
        let export = snapshot(vec![Article::new("A", "b")]);
        let rendered = render_export(&export, ExportFormat::Json).unwrap();
        let parsed: ArticleExport = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed, export);
    }

    #[test]
    fn suggested_file_name_uses_format_extension() {
        assert_eq!(
            suggested_export_file_name(ExportFormat::Json, 123),
            "quire-export-123.json"
        );
        assert_eq!(
            suggested_export_file_name(ExportFormat::Markdown, 456),
            "quire-export-456.md"
        );
    }
}
