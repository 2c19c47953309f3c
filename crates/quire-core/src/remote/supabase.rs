//! Hosted article table reached through the Supabase `PostgREST` API.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};

use super::{ArticleStore, StoreBackend};
use crate::error::{Error, ErrorKind, Result};
use crate::models::{Article, ArticleId, ArticleStatus, Visibility};
use crate::retry::{with_retry, RetryPolicy};
use crate::search::ArticleQuery;
use crate::util::{compact_text, is_http_url, normalize_text_option, unix_millis_now};

const ENV_URL: &str = "SUPABASE_URL";
const ENV_ANON_KEY: &str = "SUPABASE_ANON_KEY";
const ENV_SERVICE_ROLE_KEY: &str = "SUPABASE_SERVICE_ROLE_KEY";
const ENV_TABLE: &str = "QUIRE_ARTICLES_TABLE";

/// Table used when `QUIRE_ARTICLES_TABLE` is unset.
pub const DEFAULT_ARTICLES_TABLE: &str = "articles";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Connection settings for the hosted article table.
#[derive(Clone, PartialEq, Eq)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://<project>.supabase.co`
    pub url: String,
    /// Public key used for reads
    pub anon_key: String,
    /// Privileged key used for writes; reads-only when absent
    pub service_role_key: Option<String>,
    pub table: String,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for SupabaseConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SupabaseConfig")
            .field("url", &self.url)
            .field("anon_key", &"[REDACTED]")
            .field(
                "service_role_key",
                &self.service_role_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("table", &self.table)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl SupabaseConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            url: normalize_project_url(url.into())?,
            anon_key: anon_key.into().trim().to_string(),
            service_role_key: None,
            table: DEFAULT_ARTICLES_TABLE.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    #[must_use]
    pub fn with_service_role_key(mut self, key: impl Into<String>) -> Self {
        self.service_role_key = normalize_text_option(Some(key.into()));
        self
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// Returns `Ok(None)` when no Supabase variables are set.
    /// Returns an error when only a partial configuration is provided.
    pub fn from_env() -> Result<Option<Self>> {
        parse_config(|key| env::var(key).ok())
    }

    /// REST endpoint of the article table.
    #[must_use]
    pub fn table_endpoint(&self) -> String {
        format!("{}/rest/v1/{}", self.url, self.table)
    }
}

fn parse_config(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<SupabaseConfig>> {
    let url = normalize_text_option(lookup(ENV_URL));
    let anon_key = normalize_text_option(lookup(ENV_ANON_KEY));
    let service_role_key = normalize_text_option(lookup(ENV_SERVICE_ROLE_KEY));
    let table = normalize_text_option(lookup(ENV_TABLE));

    if url.is_none() && anon_key.is_none() && service_role_key.is_none() {
        return Ok(None);
    }

    let mut missing = Vec::new();
    if url.is_none() {
        missing.push(ENV_URL);
    }
    if anon_key.is_none() {
        missing.push(ENV_ANON_KEY);
    }
    let (Some(url), Some(anon_key)) = (url, anon_key) else {
        return Err(Error::InvalidInput(format!(
            "Supabase configuration is incomplete. Missing: {}",
            missing.join(", ")
        )));
    };

    let mut config = SupabaseConfig::new(url, anon_key)?;
    config.service_role_key = service_role_key;
    if let Some(table) = table {
        config.table = table;
    }
    Ok(Some(config))
}

fn normalize_project_url(raw: String) -> Result<String> {
    let url = normalize_text_option(Some(raw))
        .ok_or_else(|| Error::InvalidInput("Supabase URL must not be empty".to_string()))?;
    if is_http_url(&url) {
        Ok(url.trim_end_matches('/').to_string())
    } else {
        Err(Error::InvalidInput(
            "Supabase URL must include http:// or https://".to_string(),
        ))
    }
}

/// Article as stored in the hosted table: snake_case columns, RFC 3339 times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRow {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub status: Option<ArticleStatus>,
    #[serde(default)]
    pub visibility: Option<Visibility>,
    #[serde(default)]
    pub publish_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&Article> for ArticleRow {
    fn from(article: &Article) -> Self {
        Self {
            id: article.id.to_string(),
            title: article.title.clone(),
            content: article.content.clone(),
            excerpt: Some(article.excerpt.clone()),
            category: Some(article.category.clone()),
            tags: Some(article.tags.clone()),
            author: Some(article.author.clone()),
            status: Some(article.status),
            visibility: Some(article.visibility),
            publish_date: DateTime::from_timestamp_millis(article.publish_date),
            last_modified: DateTime::from_timestamp_millis(article.last_modified),
            created_at: DateTime::from_timestamp_millis(article.created_at),
            updated_at: DateTime::from_timestamp_millis(article.updated_at),
        }
    }
}

impl TryFrom<ArticleRow> for Article {
    type Error = Error;

    fn try_from(row: ArticleRow) -> Result<Self> {
        let id = row.id.parse::<ArticleId>().map_err(|_| Error::Remote {
            kind: ErrorKind::InvalidData,
            message: "article row has an empty id".to_string(),
        })?;
        let millis = |value: Option<DateTime<Utc>>| value.map(|time| time.timestamp_millis());
        let updated_at = millis(row.updated_at)
            .or_else(|| millis(row.last_modified))
            .unwrap_or(0);
        let created_at = millis(row.created_at).unwrap_or(updated_at);

        let mut article = Self::new(row.title, row.content);
        article.id = id;
        article.excerpt = row.excerpt.unwrap_or_default();
        article.ensure_excerpt();
        if let Some(category) = row.category {
            article.category = category;
        }
        article.tags = row.tags.unwrap_or_default();
        if let Some(author) = row.author {
            article.author = author;
        }
        article.status = row.status.unwrap_or_default();
        article.visibility = row.visibility.unwrap_or_default();
        article.publish_date = millis(row.publish_date).unwrap_or(created_at);
        article.created_at = created_at;
        article.updated_at = updated_at;
        article.last_modified = millis(row.last_modified).unwrap_or(updated_at);
        Ok(article)
    }
}

/// Map a `PostgREST`/Postgres error code to the shared taxonomy.
#[must_use]
pub fn classify_postgrest_code(code: &str) -> ErrorKind {
    match code {
        "PGRST116" => ErrorKind::NotFound,
        "23505" => ErrorKind::Duplicate,
        "23502" => ErrorKind::MissingField,
        "23514" => ErrorKind::InvalidData,
        "PGRST301" | "PGRST204" | "42501" => ErrorKind::PermissionDenied,
        "PGRST103" | "PGRST106" => ErrorKind::InvalidRequest,
        _ => ErrorKind::Unknown,
    }
}

const fn classify_status(status: StatusCode) -> ErrorKind {
    match status.as_u16() {
        400 => ErrorKind::InvalidRequest,
        401 | 403 => ErrorKind::PermissionDenied,
        404 => ErrorKind::NotFound,
        409 => ErrorKind::Duplicate,
        408 | 504 => ErrorKind::Timeout,
        429 | 500..=599 => ErrorKind::Network,
        _ => ErrorKind::Unknown,
    }
}

#[derive(Debug, Deserialize)]
struct PostgrestErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> Error {
    if let Ok(payload) = serde_json::from_str::<PostgrestErrorBody>(body) {
        let kind = payload
            .code
            .as_deref()
            .map(classify_postgrest_code)
            .filter(|kind| *kind != ErrorKind::Unknown)
            .unwrap_or_else(|| classify_status(status));
        let mut message = payload
            .message
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
        if let Some(detail) = payload.details.or(payload.hint) {
            message = format!("{message} ({})", compact_text(&detail));
        }
        return Error::Remote { kind, message };
    }

    let trimmed = body.trim();
    let message = if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", compact_text(trimmed), status.as_u16())
    };
    Error::Remote {
        kind: classify_status(status),
        message,
    }
}

fn transport_error(error: &reqwest::Error) -> Error {
    if error.is_timeout() {
        Error::Timeout(error.to_string())
    } else if error.is_decode() {
        Error::Remote {
            kind: ErrorKind::InvalidData,
            message: error.to_string(),
        }
    } else {
        Error::Network(error.to_string())
    }
}

/// `PostgREST` string literal for use inside filter expressions.
fn quote_filter_value(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// `PostgREST` filters shared by list and count requests.
fn filter_params(query: &ArticleQuery) -> Vec<(String, String)> {
    let mut params = Vec::new();

    if let Some(status) = query.status {
        params.push(("status".into(), format!("eq.{status}")));
    }
    if let Some(category) = query.category.as_deref() {
        params.push(("category".into(), format!("eq.{category}")));
    }
    if let Some(visibility) = query.visibility {
        params.push(("visibility".into(), format!("eq.{visibility}")));
    }
    if let Some(needle) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = quote_filter_value(&format!("*{needle}*"));
        params.push((
            "or".into(),
            format!("(title.ilike.{pattern},content.ilike.{pattern},excerpt.ilike.{pattern})"),
        ));
    }
    params
}

/// Build the query string for a list request.
fn build_list_query(query: &ArticleQuery) -> String {
    let mut params = vec![("select".to_string(), "*".to_string())];
    params.extend(filter_params(query));
    params.push(("order".into(), "publish_date.desc,id.asc".into()));
    if let Some(limit) = query.limit {
        params.push(("limit".into(), limit.to_string()));
    }
    if let Some(offset) = query.offset.filter(|offset| *offset > 0) {
        params.push(("offset".into(), offset.to_string()));
    }

    encode_params(&params)
}

/// Build the query string for a count request; paging is ignored.
fn build_count_query(query: &ArticleQuery) -> String {
    let mut params = vec![("select".to_string(), "id".to_string())];
    params.extend(filter_params(query));
    encode_params(&params)
}

/// Total from a `Content-Range` header such as `0-24/3573` or `*/0`.
fn parse_content_range_total(header: &str) -> Option<usize> {
    header.rsplit_once('/')?.1.trim().parse().ok()
}

fn encode_params(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

fn id_filter(id: &ArticleId) -> String {
    encode_params(&[("id".to_string(), format!("eq.{id}"))])
}

/// Article store backed by a Supabase table.
#[derive(Clone)]
pub struct SupabaseArticleStore {
    config: SupabaseConfig,
    endpoint: String,
    client: Client,
}

impl SupabaseArticleStore {
    pub fn new(config: SupabaseConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|error| Error::InvalidInput(format!("failed to build HTTP client: {error}")))?;
        Ok(Self {
            endpoint: config.table_endpoint(),
            config,
            client,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &SupabaseConfig {
        &self.config
    }

    fn request(&self, method: Method, query: &str, key: &str) -> RequestBuilder {
        let url = if query.is_empty() {
            self.endpoint.clone()
        } else {
            format!("{}?{query}", self.endpoint)
        };
        self.client
            .request(method, url)
            .header("apikey", key)
            .bearer_auth(key)
            .header(reqwest::header::ACCEPT, "application/json")
            .header("X-Client-Info", "quire-core")
    }

    fn read_request(&self, method: Method, query: &str) -> RequestBuilder {
        self.request(method, query, &self.config.anon_key)
    }

    fn write_request(&self, method: Method, query: &str) -> RequestBuilder {
        let key = self
            .config
            .service_role_key
            .as_deref()
            .unwrap_or(&self.config.anon_key);
        self.request(method, query, key)
    }

    async fn send(request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(|error| transport_error(&error))?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(parse_api_error(status, &body))
    }

    async fn fetch_rows(request: RequestBuilder) -> Result<Vec<ArticleRow>> {
        Self::send(request)
            .await?
            .json::<Vec<ArticleRow>>()
            .await
            .map_err(|error| transport_error(&error))
    }

    async fn upsert(&self, article: &Article) -> Result<Article> {
        let mut row = ArticleRow::from(article);
        row.updated_at = DateTime::from_timestamp_millis(unix_millis_now());

        let rows = Self::fetch_rows(
            self.write_request(Method::POST, "")
                .header("Prefer", "resolution=merge-duplicates,return=representation")
                .json(&[row]),
        )
        .await?;

        let saved = rows.into_iter().next().ok_or_else(|| Error::Remote {
            kind: ErrorKind::InvalidData,
            message: "upsert returned no rows".to_string(),
        })?;
        Article::try_from(saved)
    }
}

#[async_trait]
impl ArticleStore for SupabaseArticleStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Cloud
    }

    async fn save(&self, article: &Article) -> Result<Article> {
        article.validate()?;
        let saved = with_retry(RetryPolicy::new(3, Duration::from_secs(1)), move || {
            self.upsert(article)
        })
        .await?;
        tracing::debug!("Saved article {} to cloud", saved.id);
        Ok(saved)
    }

    async fn get(&self, id: &ArticleId) -> Result<Option<Article>> {
        let query = format!("select=*&{}&limit=1", id_filter(id));
        let query = query.as_str();
        let rows = with_retry(RetryPolicy::new(2, Duration::from_millis(500)), move || {
            Self::fetch_rows(self.read_request(Method::GET, query))
        })
        .await;

        match rows {
            Ok(rows) => rows.into_iter().next().map(Article::try_from).transpose(),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error),
        }
    }

    async fn list(&self, query: &ArticleQuery) -> Result<Vec<Article>> {
        let query_string = build_list_query(query);
        let query_string = query_string.as_str();
        let rows = with_retry(RetryPolicy::new(2, Duration::from_millis(800)), move || {
            Self::fetch_rows(self.read_request(Method::GET, query_string))
        })
        .await?;
        rows.into_iter().map(Article::try_from).collect()
    }

    async fn count_matching(&self, query: &ArticleQuery) -> Result<usize> {
        let query_string = build_count_query(query);
        let query_string = query_string.as_str();
        let response = with_retry(RetryPolicy::new(2, Duration::from_millis(800)), move || {
            Self::send(
                self.read_request(Method::HEAD, query_string)
                    .header("Prefer", "count=exact"),
            )
        })
        .await?;

        response
            .headers()
            .get(reqwest::header::CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or_else(|| Error::Remote {
                kind: ErrorKind::InvalidData,
                message: "count response has no Content-Range total".to_string(),
            })
    }

    async fn delete(&self, id: &ArticleId) -> Result<()> {
        let query = id_filter(id);
        let query = query.as_str();
        with_retry(RetryPolicy::new(2, Duration::from_secs(1)), move || async move {
            Self::send(self.write_request(Method::DELETE, query))
                .await
                .map(|_| ())
        })
        .await?;
        tracing::debug!("Deleted article {id} from cloud");
        Ok(())
    }

    async fn check_connection(&self) -> Result<()> {
        Self::send(self.read_request(Method::GET, "select=id&limit=1"))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect::<HashMap<_, _>>();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn parse_config_returns_none_when_unset() {
        assert_eq!(parse_config(lookup(&[])).unwrap(), None);
    }

    #[test]
    fn parse_config_reports_missing_variables() {
        let error = parse_config(lookup(&[(ENV_SERVICE_ROLE_KEY, "secret")])).unwrap_err();
        let message = error.to_string();
        assert!(message.contains(ENV_URL));
        assert!(message.contains(ENV_ANON_KEY));
    }

    #[test]
    fn parse_config_reads_all_fields() {
        let config = parse_config(lookup(&[
            (ENV_URL, "https://project.supabase.co/"),
            (ENV_ANON_KEY, "anon"),
            (ENV_SERVICE_ROLE_KEY, "service"),
            (ENV_TABLE, "blog_articles"),
        ]))
        .unwrap()
        .unwrap();
        assert_eq!(config.url, "https://project.supabase.co");
        assert_eq!(config.service_role_key.as_deref(), Some("service"));
        assert_eq!(
            config.table_endpoint(),
            "https://project.supabase.co/rest/v1/blog_articles"
        );
    }

    #[test]
    fn config_rejects_non_http_urls() {
        assert!(SupabaseConfig::new("project.supabase.co", "anon").is_err());
        assert!(SupabaseConfig::new("  ", "anon").is_err());
    }

    #[test]
    fn config_debug_redacts_keys() {
        let config = SupabaseConfig::new("https://p.supabase.co", "anon-secret")
            .unwrap()
            .with_service_role_key("service-secret");
        let debug = format!("{config:?}");
        assert!(!debug.contains("anon-secret"));
        assert!(!debug.contains("service-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn classify_postgrest_codes() {
        assert_eq!(classify_postgrest_code("PGRST116"), ErrorKind::NotFound);
        assert_eq!(classify_postgrest_code("23505"), ErrorKind::Duplicate);
        assert_eq!(classify_postgrest_code("23502"), ErrorKind::MissingField);
        assert_eq!(classify_postgrest_code("23514"), ErrorKind::InvalidData);
        assert_eq!(classify_postgrest_code("42501"), ErrorKind::PermissionDenied);
        assert_eq!(classify_postgrest_code("PGRST106"), ErrorKind::InvalidRequest);
        assert_eq!(classify_postgrest_code("XX000"), ErrorKind::Unknown);
    }

    #[test]
    fn parse_api_error_prefers_postgrest_code() {
        let body = r#"{"code":"23505","message":"duplicate key value","details":"Key (id) exists","hint":null}"#;
        let error = parse_api_error(StatusCode::CONFLICT, body);
        assert_eq!(error.kind(), ErrorKind::Duplicate);
        assert!(error.to_string().contains("Key (id) exists"));
    }

    #[test]
    fn parse_api_error_falls_back_to_status() {
        let error = parse_api_error(StatusCode::SERVICE_UNAVAILABLE, "upstream down");
        assert_eq!(error.kind(), ErrorKind::Network);
        assert!(error.is_retryable());

        let error = parse_api_error(StatusCode::UNAUTHORIZED, "");
        assert_eq!(error.kind(), ErrorKind::PermissionDenied);
        assert!(error.to_string().contains("HTTP 401"));
    }

    #[test]
    fn list_query_encodes_filters() {
        let query = ArticleQuery {
            status: Some(ArticleStatus::Published),
            category: Some("Tech News".into()),
            visibility: Some(Visibility::LinkOnly),
            search: Some("a,b".into()),
            limit: Some(20),
            offset: Some(40),
        };
        let encoded = build_list_query(&query);
        assert_eq!(
            encoded,
            "select=%2A&status=eq.published&category=eq.Tech%20News&visibility=eq.link_only\
             &or=%28title.ilike.%22%2Aa%2Cb%2A%22%2Ccontent.ilike.%22%2Aa%2Cb%2A%22%2Cexcerpt.ilike.%22%2Aa%2Cb%2A%22%29\
             &order=publish_date.desc%2Cid.asc&limit=20&offset=40"
        );
    }

    #[test]
    fn list_query_defaults_to_order_only() {
        assert_eq!(
            build_list_query(&ArticleQuery::default()),
            "select=%2A&order=publish_date.desc%2Cid.asc"
        );
    }

    #[test]
    fn count_query_keeps_filters_and_drops_paging() {
        let query = ArticleQuery {
            category: Some("Tech".into()),
            limit: Some(5),
            offset: Some(10),
            ..ArticleQuery::default()
        }
        .with_status(ArticleStatus::Draft);
        assert_eq!(
            build_count_query(&query),
            "select=id&status=eq.draft&category=eq.Tech"
        );
    }

    #[test]
    fn content_range_totals() {
        assert_eq!(parse_content_range_total("0-24/3573"), Some(3573));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("0-24/*"), None);
        assert_eq!(parse_content_range_total("garbage"), None);
    }

    #[test]
    fn row_conversion_preserves_fields() {
        let mut article = Article::new("Title", "<p>Body</p>");
        article.tags = vec!["rust".into()];
        article.status = ArticleStatus::Published;
        article.visibility = Visibility::Private;
        article.updated_at = 1_700_000_000_123;

        let row = ArticleRow::from(&article);
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["status"], "published");
        assert_eq!(json["visibility"], "private");
        assert_eq!(json["updated_at"], "2023-11-14T22:13:20.123Z");

        let back = Article::try_from(row).unwrap();
        assert_eq!(back, article);
    }

    #[test]
    fn row_with_nulls_gets_defaults() {
        let row: ArticleRow = serde_json::from_str(
            r#"{"id":"article-9","title":"T","content":"C","tags":null,"status":null,
                "updated_at":"2024-01-01T00:00:00+00:00"}"#,
        )
        .unwrap();
        let article = Article::try_from(row).unwrap();
        assert_eq!(article.status, ArticleStatus::Draft);
        assert!(article.tags.is_empty());
        assert_eq!(article.excerpt, "C");
        assert_eq!(article.updated_at, 1_704_067_200_000);
        assert_eq!(article.created_at, article.updated_at);
    }
}
