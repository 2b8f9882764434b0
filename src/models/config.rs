//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::KeywordGroup;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and pacing settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// The watched board
    #[serde(default)]
    pub board: BoardConfig,

    /// Keyword groups
    #[serde(default)]
    pub filter: FilterConfig,

    /// Notification batching and formatting
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Listing and detail page selectors
    #[serde(default)]
    pub parser: ParserConfig,

    /// Output locations
    #[serde(default)]
    pub paths: PathsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.board.name.trim().is_empty() {
            return Err(AppError::validation("board.name is empty"));
        }
        if !self
            .board
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(AppError::validation(format!(
                "board.name may only contain ASCII letters, digits, '-' and '_': {}",
                self.board.name
            )));
        }
        if url::Url::parse(&self.board.base_url).is_err() {
            return Err(AppError::validation(format!(
                "board.base_url is not a valid URL: {}",
                self.board.base_url
            )));
        }
        if self.board.max_pages == 0 {
            return Err(AppError::validation("board.max_pages must be > 0"));
        }
        if self.notify.batch_size == 0 {
            return Err(AppError::validation("notify.batch_size must be > 0"));
        }
        if self.notify.token_env.trim().is_empty() || self.notify.recipient_env.trim().is_empty()
        {
            return Err(AppError::validation(
                "notify.token_env and notify.recipient_env must be set",
            ));
        }
        for (field, selector) in self.parser.selectors() {
            scraper::Selector::parse(selector)
                .map_err(|e| AppError::selector(selector, format!("{field}: {e:?}")))?;
        }
        Ok(())
    }

    /// Directory holding the cache and result files for the configured board.
    pub fn board_dir(&self) -> PathBuf {
        self.paths.board_dir(&self.board.name)
    }
}

/// HTTP client and pacing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Minimum interval between requests in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Cookies sent with every page request (`name=value`)
    #[serde(default = "defaults::cookies")]
    pub cookies: Vec<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: defaults::request_delay(),
            cookies: defaults::cookies(),
        }
    }
}

/// The board being watched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Board identifier, e.g. `Drama-Ticket`
    #[serde(default = "defaults::board_name")]
    pub name: String,

    /// Site root
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Upper bound on listing pages walked per session
    #[serde(default = "defaults::max_pages")]
    pub max_pages: usize,
}

impl BoardConfig {
    /// URL of the newest listing page.
    pub fn start_url(&self) -> String {
        format!(
            "{}/bbs/{}/index.html",
            self.base_url.trim_end_matches('/'),
            self.name
        )
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            name: defaults::board_name(),
            base_url: defaults::base_url(),
            max_pages: defaults::max_pages(),
        }
    }
}

/// Keyword groups.
///
/// `shared` groups constrain every session; each entry of `sessions` starts
/// its own walker combined with the shared groups.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub shared: Vec<KeywordGroup>,

    #[serde(default)]
    pub sessions: Vec<KeywordGroup>,
}

impl FilterConfig {
    /// Active groups per session, labelled by session name.
    ///
    /// Without any session groups a single session runs with the shared
    /// groups alone.
    pub fn session_groups(&self) -> Vec<(String, Vec<KeywordGroup>)> {
        if self.sessions.is_empty() {
            return vec![("default".to_string(), self.shared.clone())];
        }

        self.sessions
            .iter()
            .enumerate()
            .map(|(idx, group)| {
                let name = if group.name.trim().is_empty() {
                    format!("session-{}", idx + 1)
                } else {
                    group.name.clone()
                };
                let mut groups = self.shared.clone();
                groups.push(group.clone());
                (name, groups)
            })
            .collect()
    }
}

/// Notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Entries per combined message
    #[serde(default = "defaults::batch_size")]
    pub batch_size: usize,

    /// Push endpoint of the messaging API
    #[serde(default = "defaults::endpoint")]
    pub endpoint: String,

    /// Environment variable holding the channel access token
    #[serde(default = "defaults::token_env")]
    pub token_env: String,

    /// Environment variable holding the recipient id
    #[serde(default = "defaults::recipient_env")]
    pub recipient_env: String,

    /// Metadata key rendered as publish time
    #[serde(default = "defaults::time_field")]
    pub time_field: String,

    /// Metadata key rendered as author
    #[serde(default = "defaults::author_field")]
    pub author_field: String,

    /// First line of every batch message
    #[serde(default = "defaults::header")]
    pub header: String,

    /// Message sent when a session aborts on a fetch failure
    #[serde(default = "defaults::failure_message")]
    pub failure_message: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            batch_size: defaults::batch_size(),
            endpoint: defaults::endpoint(),
            token_env: defaults::token_env(),
            recipient_env: defaults::recipient_env(),
            time_field: defaults::time_field(),
            author_field: defaults::author_field(),
            header: defaults::header(),
            failure_message: defaults::failure_message(),
        }
    }
}

/// CSS selectors for listing and detail pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    /// One listing row per post
    #[serde(default = "defaults::row_selector")]
    pub row_selector: String,

    /// Title link inside a row
    #[serde(default = "defaults::title_selector")]
    pub title_selector: String,

    /// Paging buttons
    #[serde(default = "defaults::paging_selector")]
    pub paging_selector: String,

    /// Text of the previous-page button
    #[serde(default = "defaults::prev_label")]
    pub prev_label: String,

    /// Metadata lines on a detail page
    #[serde(default = "defaults::metaline_selector")]
    pub metaline_selector: String,

    /// Field label inside a metadata line
    #[serde(default = "defaults::meta_tag_selector")]
    pub meta_tag_selector: String,

    /// Field value inside a metadata line
    #[serde(default = "defaults::meta_value_selector")]
    pub meta_value_selector: String,

    /// Metadata labels to drop
    #[serde(default = "defaults::skip_tags")]
    pub skip_tags: Vec<String>,
}

impl ParserConfig {
    /// All selector strings, labelled by field name.
    pub fn selectors(&self) -> [(&'static str, &str); 6] {
        [
            ("parser.row_selector", self.row_selector.as_str()),
            ("parser.title_selector", self.title_selector.as_str()),
            ("parser.paging_selector", self.paging_selector.as_str()),
            ("parser.metaline_selector", self.metaline_selector.as_str()),
            ("parser.meta_tag_selector", self.meta_tag_selector.as_str()),
            ("parser.meta_value_selector", self.meta_value_selector.as_str()),
        ]
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            row_selector: defaults::row_selector(),
            title_selector: defaults::title_selector(),
            paging_selector: defaults::paging_selector(),
            prev_label: defaults::prev_label(),
            metaline_selector: defaults::metaline_selector(),
            meta_tag_selector: defaults::meta_tag_selector(),
            meta_value_selector: defaults::meta_value_selector(),
            skip_tags: defaults::skip_tags(),
        }
    }
}

/// Output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Parent of the per-board data directories
    #[serde(default = "defaults::output_root")]
    pub output_root: PathBuf,
}

impl PathsConfig {
    /// `{output_root}/ptt_{board}_data`
    pub fn board_dir(&self, board: &str) -> PathBuf {
        self.output_root.join(format!("ptt_{board}_data"))
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            output_root: defaults::output_root(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn request_delay() -> u64 {
        2000
    }
    pub fn cookies() -> Vec<String> {
        vec!["over18=1".into()]
    }

    // Board defaults
    pub fn board_name() -> String {
        "Drama-Ticket".into()
    }
    pub fn base_url() -> String {
        "https://www.ptt.cc".into()
    }
    pub fn max_pages() -> usize {
        50
    }

    // Notify defaults
    pub fn batch_size() -> usize {
        5
    }
    pub fn endpoint() -> String {
        "https://api.line.me/v2/bot/message/push".into()
    }
    pub fn token_env() -> String {
        "LINE_TOKEN".into()
    }
    pub fn recipient_env() -> String {
        "LINE_USER_ID".into()
    }
    pub fn time_field() -> String {
        "時間".into()
    }
    pub fn author_field() -> String {
        "作者".into()
    }
    pub fn header() -> String {
        "\u{1F4E2} 發現新文章".into()
    }
    pub fn failure_message() -> String {
        "\u{1F6A8} 爬蟲失敗".into()
    }

    // Parser defaults
    pub fn row_selector() -> String {
        "div.r-ent".into()
    }
    pub fn title_selector() -> String {
        "div.title a".into()
    }
    pub fn paging_selector() -> String {
        "div.btn-group-paging a".into()
    }
    pub fn prev_label() -> String {
        "上頁".into()
    }
    pub fn metaline_selector() -> String {
        "div#main-content div.article-metaline".into()
    }
    pub fn meta_tag_selector() -> String {
        "span.article-meta-tag".into()
    }
    pub fn meta_value_selector() -> String {
        "span.article-meta-value".into()
    }
    pub fn skip_tags() -> Vec<String> {
        vec!["標題".into()]
    }

    // Path defaults
    pub fn output_root() -> PathBuf {
        PathBuf::from(".")
    }
}
