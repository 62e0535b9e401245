/// Service configuration, read once at startup and injected explicitly into
/// the store and client constructors. Nothing reads the environment after
/// this point.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Bot access token for the platform Web API.
    pub bot_token: String,
    /// Public base URL of this service, no trailing slash. Bookmark links
    /// (and the results page they point to) live under it.
    pub endpoint: String,
    /// Exact bookmark title the store matches on.
    pub bookmark_title: String,
    /// Platform Web API root; overridable for tests and mirrors.
    pub api_root: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let bot_token =
            std::env::var("PICKER_BOT_TOKEN").expect("PICKER_BOT_TOKEN must be set");
        let endpoint = std::env::var("PICKER_ENDPOINT")
            .expect("PICKER_ENDPOINT must be set")
            .trim_end_matches('/')
            .to_string();
        let bookmark_title = std::env::var("PICKER_BOOKMARK_TITLE")
            .unwrap_or_else(|_| "Restaurant Picker".to_string());
        let api_root = std::env::var("PICKER_API_ROOT")
            .unwrap_or_else(|_| "https://slack.com/api".to_string());
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        Self {
            bot_token,
            endpoint,
            bookmark_title,
            api_root,
            port,
        }
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            bot_token: "xoxb-test".to_string(),
            endpoint: "https://picker.example.com".to_string(),
            bookmark_title: "Restaurant Picker".to_string(),
            api_root: "https://slack.invalid/api".to_string(),
            port: 0,
        }
    }
}
