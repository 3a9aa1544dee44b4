// Import necessary crates and modules
use crate::error::{GradingError, Result};
use dialoguer::{Confirm, Input, Password};
use keyring::Entry;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Name of the cookie holding the double-submit CSRF token.
pub const CSRF_COOKIE: &str = "csrftoken";

/// Name of the session cookie issued on login.
pub const SESSION_COOKIE: &str = "sessionid";

static COOKIE_PAIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|;)\s*([^=;\s]+)\s*=\s*([^;]*)").expect("valid cookie regex"));

/// Structure to hold the grading API credentials.
///
/// Fields:
/// - `url_grading`: Base URL of the grading API, e.g. `https://school.example.com/api/grading`.
/// - `csrf_token`: Value of the `csrftoken` cookie, echoed on every mutating request.
/// - `session_cookie`: Value of the `sessionid` cookie, sent with every request.
///
/// Example usage:
/// ```
/// use assessment_grading_connector::AssessmentCredentials;
///
/// let credentials = AssessmentCredentials::from_cookie_header(
///     "https://school.example.com/api/grading",
///     "csrftoken=abc123; sessionid=xyz",
/// );
/// assert_eq!(credentials.csrf_token.as_deref(), Some("abc123"));
/// ```
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct AssessmentCredentials {
    pub url_grading: String,
    pub csrf_token: Option<String>,
    pub session_cookie: Option<String>,
}

/// Transport settings for the HTTP client.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Upper bound for a whole request/response exchange. `None` waits forever.
    pub timeout: Option<Duration>,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            timeout: Some(Duration::from_secs(30)),
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

// Where the credentials came from.
enum CredentialSource {
    None,
    EnvVariables(AssessmentCredentials),
    SystemKeyring(AssessmentCredentials),
}

impl AssessmentCredentials {
    pub fn new(url_grading: &str) -> Self {
        AssessmentCredentials {
            url_grading: url_grading.trim_end_matches('/').to_string(),
            csrf_token: None,
            session_cookie: None,
        }
    }

    /// Builds credentials from a browser `Cookie` header string.
    ///
    /// Cookie values are URL-decoded, matching what the browser client reads from
    /// `document.cookie`. Unknown cookies are ignored.
    pub fn from_cookie_header(url_grading: &str, cookies: &str) -> Self {
        let mut credentials = AssessmentCredentials::new(url_grading);
        for pair in COOKIE_PAIR.captures_iter(cookies) {
            let value = urlencoding::decode(pair[2].trim())
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| pair[2].trim().to_string());
            match &pair[1] {
                CSRF_COOKIE => credentials.csrf_token = Some(value),
                SESSION_COOKIE => credentials.session_cookie = Some(value),
                _ => {}
            }
        }
        credentials
    }

    /// `Cookie` header to send along with a request, if any cookie is known.
    pub fn cookie_header(&self) -> Option<String> {
        let mut cookies = Vec::new();
        if let Some(session) = &self.session_cookie {
            cookies.push(format!("{}={}", SESSION_COOKIE, session));
        }
        if let Some(csrf) = &self.csrf_token {
            cookies.push(format!("{}={}", CSRF_COOKIE, urlencoding::encode(csrf)));
        }
        if cookies.is_empty() {
            None
        } else {
            Some(cookies.join("; "))
        }
    }

    /// Loads the credentials from `GRADING_URL`, `GRADING_CSRF_TOKEN` and
    /// `GRADING_SESSION_COOKIE`. Only available with the `use_env_credentials` feature.
    pub fn load_credentials_from_env() -> Result<AssessmentCredentials> {
        #[cfg(not(feature = "use_env_credentials"))]
        {
            Err(GradingError::Credentials("Feature not enabled".to_string()))
        }

        #[cfg(feature = "use_env_credentials")]
        {
            let url = std::env::var("GRADING_URL").map_err(|_| {
                GradingError::Credentials("Error retrieving URL from environment".to_string())
            })?;
            let mut credentials = AssessmentCredentials::new(&url);
            credentials.csrf_token = std::env::var("GRADING_CSRF_TOKEN").ok();
            credentials.session_cookie = std::env::var("GRADING_SESSION_COOKIE").ok();
            if credentials.session_cookie.is_none() {
                return Err(GradingError::Credentials(
                    "Error retrieving session cookie from environment".to_string(),
                ));
            }
            log::debug!("Credentials loaded from environment -> {}", credentials.url_grading);
            Ok(credentials)
        }
    }

    fn keyring_entry(key: &str) -> Result<Entry> {
        Entry::new(env!("CARGO_PKG_NAME"), key)
            .map_err(|e| GradingError::Credentials(format!("Error opening keyring: {}", e)))
    }

    fn keyring_get(key: &str) -> Result<String> {
        Self::keyring_entry(key)?.get_password().map_err(|_| {
            GradingError::Credentials(format!("Error retrieving {} from system", key))
        })
    }

    fn keyring_set(key: &str, value: &str) -> Result<()> {
        Self::keyring_entry(key)?
            .set_password(value)
            .map_err(|e| GradingError::Credentials(format!("Error saving {}: {}", key, e)))
    }

    /// Loads the credentials from the system keyring.
    pub fn load_credentials_from_system() -> Result<AssessmentCredentials> {
        let url = Self::keyring_get("URL_GRADING")?;
        let mut credentials = AssessmentCredentials::new(&url);
        credentials.session_cookie = Some(Self::keyring_get("SESSION_GRADING")?);
        credentials.csrf_token = Self::keyring_get("CSRF_GRADING").ok();
        Ok(credentials)
    }

    /// Stores the credentials in the system keyring.
    pub fn save_to_system(&self) -> Result<()> {
        Self::keyring_set("URL_GRADING", &self.url_grading)?;
        if let Some(session) = &self.session_cookie {
            Self::keyring_set("SESSION_GRADING", session)?;
        }
        if let Some(csrf) = &self.csrf_token {
            Self::keyring_set("CSRF_GRADING", csrf)?;
        }
        Ok(())
    }

    fn load_credentials() -> CredentialSource {
        match Self::load_credentials_from_env() {
            Ok(credentials) => CredentialSource::EnvVariables(credentials),
            Err(_) => match Self::load_credentials_from_system() {
                Ok(credentials) => CredentialSource::SystemKeyring(credentials),
                Err(_) => CredentialSource::None,
            },
        }
    }

    /// Asks the user for the credentials on the terminal and stores them in the keyring.
    fn prompt_system_credentials() -> Result<AssessmentCredentials> {
        let prompt_err = |e: dialoguer::Error| GradingError::Credentials(e.to_string());

        let register = Confirm::new()
            .with_prompt("Do you wish to register the grading API credentials?")
            .default(true)
            .interact()
            .map_err(prompt_err)?;
        if !register {
            return Err(GradingError::Credentials(
                "No credentials registered".to_string(),
            ));
        }

        let url: String = Input::new()
            .with_prompt("Grading API URL")
            .interact_text()
            .map_err(prompt_err)?;
        let cookies: String = Password::new()
            .with_prompt("Cookie header (csrftoken=...; sessionid=...)")
            .interact()
            .map_err(prompt_err)?;

        let credentials = AssessmentCredentials::from_cookie_header(&url, &cookies);
        if credentials.session_cookie.is_none() {
            return Err(GradingError::Credentials(
                "The cookie header has no sessionid".to_string(),
            ));
        }
        credentials.save_to_system()?;
        Ok(credentials)
    }

    /// Returns the credentials from the environment or the keyring, prompting for them
    /// when neither has any.
    pub fn credentials() -> Result<AssessmentCredentials> {
        match Self::load_credentials() {
            CredentialSource::EnvVariables(credentials)
            | CredentialSource::SystemKeyring(credentials) => Ok(credentials),
            CredentialSource::None => Self::prompt_system_credentials(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cookie_header() {
        let credentials = AssessmentCredentials::from_cookie_header(
            "https://example.com/api/grading/",
            "theme=dark; csrftoken=a%2Bb%3Dc;sessionid=s3ss10n ; other=1",
        );
        assert_eq!(credentials.url_grading, "https://example.com/api/grading");
        assert_eq!(credentials.csrf_token.as_deref(), Some("a+b=c"));
        assert_eq!(credentials.session_cookie.as_deref(), Some("s3ss10n"));
    }

    #[test]
    fn test_cookie_header_round_trip() {
        let mut credentials = AssessmentCredentials::new("https://example.com");
        assert_eq!(credentials.cookie_header(), None);

        credentials.session_cookie = Some("s".to_string());
        credentials.csrf_token = Some("a+b".to_string());
        let header = credentials.cookie_header().unwrap();
        assert_eq!(header, "sessionid=s; csrftoken=a%2Bb");

        let parsed = AssessmentCredentials::from_cookie_header("https://example.com", &header);
        assert_eq!(parsed, credentials);
    }

    #[test]
    fn test_default_config_has_timeout() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
        assert!(config.user_agent.starts_with("assessment_grading_connector/"));
        assert_eq!(config.with_timeout(None).timeout, None);
    }

    #[test]
    #[cfg(feature = "use_env_credentials")]
    fn test_load_credentials_from_env() {
        use std::env;

        env::set_var("GRADING_URL", "https://example.com/api/grading");
        env::set_var("GRADING_SESSION_COOKIE", "session");
        env::remove_var("GRADING_CSRF_TOKEN");
        let loaded = AssessmentCredentials::load_credentials_from_env();

        env::remove_var("GRADING_SESSION_COOKIE");
        let missing_session = AssessmentCredentials::load_credentials_from_env();

        env::remove_var("GRADING_URL");
        let missing_url = AssessmentCredentials::load_credentials_from_env();

        let loaded = loaded.unwrap();
        assert_eq!(loaded.session_cookie.as_deref(), Some("session"));
        assert_eq!(loaded.csrf_token, None);
        assert!(missing_session.is_err());
        assert!(missing_url.is_err());
    }
}
