use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use quire_core::db::SqliteKeyValueStore;
use quire_core::models::SyncConflict;
use quire_core::sync::ConflictDetails;
use quire_core::{
    Article, ArticleId, ArticleQuery, ArticleStore, ConnectivityMonitor, HybridStorage,
    LocalArticleStore, SupabaseArticleStore, SupabaseConfig, SyncSettings,
};
use serde::Serialize;

use crate::error::CliError;

/// Where the CLI keeps its data, plus the global `--offline` switch.
#[derive(Debug, Clone)]
pub struct StorageOptions {
    pub db_path: PathBuf,
    pub config_path: PathBuf,
    pub offline: bool,
}

impl StorageOptions {
    pub fn resolve(db_path: Option<PathBuf>, config_path: Option<PathBuf>, offline: bool) -> Self {
        Self {
            db_path: resolve_db_path(db_path),
            config_path: resolve_config_path(config_path),
            offline,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ArticleListItem {
    pub id: String,
    pub title: String,
    pub excerpt: String,
    pub category: String,
    pub status: String,
    pub visibility: String,
    pub tags: Vec<String>,
    pub publish_date: i64,
    pub updated_at: i64,
    pub relative_time: String,
}

/// Open the hybrid store, using the hosted table when `SUPABASE_*` is set.
pub fn open_storage(options: &StorageOptions) -> Result<HybridStorage, CliError> {
    open_storage_with_remote(options, SupabaseConfig::from_env()?)
}

pub fn open_storage_with_remote(
    options: &StorageOptions,
    remote_config: Option<SupabaseConfig>,
) -> Result<HybridStorage, CliError> {
    let mut settings = SyncSettings::load(Some(options.config_path.as_path()))?;
    if options.offline {
        settings.offline_mode = true;
    }

    let kv = SqliteKeyValueStore::open(&options.db_path)?.with_quota(settings.local_quota_bytes);
    let remote = match remote_config {
        Some(config) => {
            let store = SupabaseArticleStore::new(config.with_request_timeout(settings.remote_timeout))?;
            tracing::debug!("Using hosted article table {}", store.config().table);
            Some(Arc::new(store) as Arc<dyn ArticleStore>)
        }
        None => None,
    };

    Ok(HybridStorage::new(
        LocalArticleStore::new(Arc::new(kv)),
        remote,
        ConnectivityMonitor::new(true),
        settings,
    ))
}

/// Find an article by exact ID, falling back to a unique ID prefix among
/// locally known articles.
pub async fn resolve_article(query: &str, storage: &HybridStorage) -> Result<Article, CliError> {
    if let Ok(id) = query.parse::<ArticleId>() {
        if let Some(article) = storage.get(&id).await {
            return Ok(article);
        }
    }

    let matching = storage
        .local()
        .list(&ArticleQuery::default())?
        .into_iter()
        .filter(|article| article.id.as_str().starts_with(query))
        .collect::<Vec<_>>();

    match matching.as_slice() {
        [] => Err(CliError::ArticleNotFound(query.to_string())),
        [article] => Ok(storage.get(&article.id).await.unwrap_or_else(|| article.clone())),
        _ => {
            let options = matching
                .iter()
                .take(3)
                .map(|article| short_id(&article.id))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousArticleId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn short_id(id: &ArticleId) -> String {
    let raw = id.as_str();
    let body = raw.strip_prefix("article-").unwrap_or(raw);
    body.chars().take(13).collect()
}

pub fn format_article_lines(articles: &[Article]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    articles
        .iter()
        .map(|article| {
            let short_id = short_id(&article.id);
            let title = truncate(&article.title, 40);
            let relative_time = format_relative_time(article.updated_at, now_ms);
            let tags = render_tags(article);

            if tags.is_empty() {
                format!(
                    "{short_id:<13}  {title:<40}  {:<9}  {relative_time}",
                    article.status.as_str()
                )
            } else {
                format!(
                    "{short_id:<13}  {title:<40}  {:<9}  {relative_time:<10}  {tags}",
                    article.status.as_str()
                )
            }
        })
        .collect()
}

pub fn article_to_list_item(article: &Article) -> ArticleListItem {
    let now_ms = Utc::now().timestamp_millis();
    ArticleListItem {
        id: article.id.to_string(),
        title: article.title.clone(),
        excerpt: article.excerpt.clone(),
        category: article.category.clone(),
        status: article.status.to_string(),
        visibility: article.visibility.to_string(),
        tags: article.tags.clone(),
        publish_date: article.publish_date,
        updated_at: article.updated_at,
        relative_time: format_relative_time(article.updated_at, now_ms),
    }
}

pub fn format_article_details(article: &Article) -> String {
    let mut lines = vec![
        article.title.clone(),
        format!("id:         {}", article.id),
        format!("status:     {} ({})", article.status, article.visibility),
        format!("category:   {}", article.category),
        format!("author:     {}", article.author),
        format!("published:  {}", format_sync_timestamp(article.publish_date)),
        format!("updated:    {}", format_sync_timestamp(article.updated_at)),
    ];
    if !article.tags.is_empty() {
        lines.push(format!("tags:       {}", render_tags(article)));
    }
    lines.push(String::new());
    lines.push(article.content.clone());
    lines.join("\n")
}

pub fn format_conflict_lines(conflicts: &[ConflictDetails]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            let mut fields = Vec::new();
            if conflict.title_differs {
                fields.push("title");
            }
            if conflict.content_differs {
                fields.push("content");
            }
            if conflict.tags_differ {
                fields.push("tags");
            }
            format!(
                "{}  local={} cloud={}  differs: {}",
                conflict.id,
                format_sync_timestamp(conflict.local_updated_at),
                format_sync_timestamp(conflict.remote_updated_at),
                fields.join(", ")
            )
        })
        .collect()
}

pub fn format_resolved_conflict_lines(conflicts: &[SyncConflict]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            format!(
                "{}  {:<10}  article={}  winner={}  local={} cloud={}",
                format_sync_timestamp(conflict.resolved_at),
                conflict.policy.as_str(),
                conflict.article_id,
                conflict.winner,
                conflict.local_updated_at,
                conflict.remote_updated_at
            )
        })
        .collect()
}

pub fn truncate(text: &str, max_chars: usize) -> String {
    let single_line = text.lines().next().unwrap_or("").trim();
    if single_line.chars().count() <= max_chars {
        return single_line.to_string();
    }
    let mut truncated = single_line
        .chars()
        .take(max_chars.saturating_sub(3))
        .collect::<String>();
    truncated.push_str("...");
    truncated
}

fn render_tags(article: &Article) -> String {
    article
        .tags
        .iter()
        .map(|tag| format!("#{tag}"))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn resolve_article_content(content_parts: &[String]) -> Result<String, CliError> {
    if let Some(content) = normalize_content(&content_parts.join(" ")) {
        return Ok(content);
    }

    if let Some(content) = read_piped_stdin()? {
        return Ok(content);
    }

    if let Some(content) = capture_editor_input()? {
        return Ok(content);
    }

    Err(CliError::EmptyContent)
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn normalize_article_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyArticleId)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn capture_editor_input() -> Result<Option<String>, CliError> {
    capture_editor_input_with_initial("")
}

pub fn capture_editor_input_with_initial(
    initial_content: &str,
) -> Result<Option<String>, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_article_file_path();
    std::fs::write(&temp_file, initial_content)?;

    let launch_result = launch_editor(&editor, &temp_file);
    let content = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(normalize_content(&content))
}

pub fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    match Command::new(editor).arg(file_path).status() {
        Ok(status) => {
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let mut parts = editor.split_whitespace();
            let Some(program) = parts.next() else {
                return Err(CliError::EditorFailed("empty EDITOR command".into()));
            };

            let mut command = Command::new(program);
            command.args(parts).arg(file_path);

            let status = command.status()?;
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) => Err(CliError::Io(err)),
    }
}

pub fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

fn create_temp_article_file_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("quire-article-{}-{now}.html", std::process::id()))
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("QUIRE_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(env::temp_dir)
        .join("quire")
        .join("quire.db")
}

pub fn resolve_config_path(cli_config_path: Option<PathBuf>) -> PathBuf {
    cli_config_path
        .or_else(|| env::var_os("QUIRE_CONFIG").map(PathBuf::from))
        .unwrap_or_else(default_config_path)
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(env::temp_dir)
        .join("quire")
        .join("settings.json")
}
