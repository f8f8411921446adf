use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ClearwayError, Result};

/// Browser family an agent impersonates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    Firefox,
    #[default]
    Chrome,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Firefox => "firefox",
            Browser::Chrome => "chrome",
        }
    }
}

impl std::fmt::Display for Browser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Operating system an agent impersonates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    Windows,
    Darwin,
    Android,
    Ios,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::Windows => "windows",
            Platform::Darwin => "darwin",
            Platform::Android => "android",
            Platform::Ios => "ios",
        }
    }

    pub fn is_mobile(&self) -> bool {
        matches!(self, Platform::Android | Platform::Ios)
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Javascript interpreter used by the challenge solver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpreter {
    Native,
    Nodejs,
    Js2py,
}

impl Interpreter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interpreter::Native => "native",
            Interpreter::Nodejs => "nodejs",
            Interpreter::Js2py => "js2py",
        }
    }
}

impl std::fmt::Display for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Browser impersonation profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrowserOptions {
    pub browser: Browser,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desktop: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_ua: Option<String>,
}

impl BrowserOptions {
    /// Whether mobile user agents may be picked (defaults to true)
    pub fn allows_mobile(&self) -> bool {
        self.mobile.unwrap_or(true)
    }

    /// Whether desktop user agents may be picked (defaults to true)
    pub fn allows_desktop(&self) -> bool {
        self.desktop.unwrap_or(true)
    }

    fn validate(&self) -> Result<()> {
        if !self.allows_mobile() && !self.allows_desktop() {
            return Err(ClearwayError::InvalidRequest(
                "browser: mobile and desktop can't both be disabled".to_string(),
            ));
        }

        if let Some(platform) = self.platform {
            if platform.is_mobile() && !self.allows_mobile() {
                return Err(ClearwayError::InvalidRequest(format!(
                    "browser: platform {} requires mobile user agents",
                    platform
                )));
            }
            if !platform.is_mobile() && !self.allows_desktop() {
                return Err(ClearwayError::InvalidRequest(format!(
                    "browser: platform {} requires desktop user agents",
                    platform
                )));
            }
        }

        if matches!(&self.custom_ua, Some(ua) if ua.trim().is_empty()) {
            return Err(ClearwayError::InvalidRequest(
                "browser: custom_ua must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration options an agent is created with.
///
/// Known fields are validated; anything else lands in `extra` and is handed to
/// the agent factory untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser: Option<BrowserOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_brotli: Option<bool>,
    /// Challenge delay in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<Interpreter>,
    #[serde(
        default,
        rename = "cipherSuite",
        skip_serializing_if = "Option::is_none"
    )]
    pub cipher_suite: Option<String>,
    #[serde(default, rename = "ecdhCurve", skip_serializing_if = "Option::is_none")]
    pub ecdh_curve: Option<String>,
    #[serde(
        default,
        rename = "disableCloudflareV1",
        skip_serializing_if = "Option::is_none"
    )]
    pub disable_cloudflare_v1: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AgentOptions {
    /// Overlay these options on top of `defaults`, field by field.
    pub fn merged_over(&self, defaults: &AgentOptions) -> AgentOptions {
        let mut extra = defaults.extra.clone();
        extra.extend(self.extra.clone());

        AgentOptions {
            browser: self.browser.clone().or_else(|| defaults.browser.clone()),
            allow_brotli: self.allow_brotli.or(defaults.allow_brotli),
            delay: self.delay.or(defaults.delay),
            interpreter: self.interpreter.or(defaults.interpreter),
            cipher_suite: self
                .cipher_suite
                .clone()
                .or_else(|| defaults.cipher_suite.clone()),
            ecdh_curve: self
                .ecdh_curve
                .clone()
                .or_else(|| defaults.ecdh_curve.clone()),
            disable_cloudflare_v1: self.disable_cloudflare_v1.or(defaults.disable_cloudflare_v1),
            extra,
        }
    }

    /// Reject option combinations no agent can be built from
    pub fn validate(&self) -> Result<()> {
        if let Some(browser) = &self.browser {
            browser.validate()?;
        }
        if matches!(&self.cipher_suite, Some(s) if s.trim().is_empty()) {
            return Err(ClearwayError::InvalidRequest(
                "cipherSuite must not be empty".to_string(),
            ));
        }
        if matches!(&self.ecdh_curve, Some(s) if s.trim().is_empty()) {
            return Err(ClearwayError::InvalidRequest(
                "ecdhCurve must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn browser_options(&self) -> BrowserOptions {
        self.browser.clone().unwrap_or_default()
    }
}

/// Identity an agent presents to destination sites
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentIdentity {
    pub user_agent: String,
    pub cf_clearance: String,
}

/// Response carrying only an agent id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentIdResponse {
    pub id: u64,
}

/// Response carrying a human readable message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}
