//! Deployment configuration models

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Supported deployment platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Netlify,
    Vercel,
    CloudflarePages,
    GithubPages,
    Surge,
    Ssh,
    Ftp,
    Custom,
}

impl Platform {
    /// All built-in platforms
    pub fn all() -> &'static [Platform] {
        &[
            Platform::Netlify,
            Platform::Vercel,
            Platform::CloudflarePages,
            Platform::GithubPages,
            Platform::Surge,
            Platform::Ssh,
            Platform::Ftp,
            Platform::Custom,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Netlify => "netlify",
            Platform::Vercel => "vercel",
            Platform::CloudflarePages => "cloudflare_pages",
            Platform::GithubPages => "github_pages",
            Platform::Surge => "surge",
            Platform::Ssh => "ssh",
            Platform::Ftp => "ftp",
            Platform::Custom => "custom",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "netlify" => Ok(Platform::Netlify),
            "vercel" => Ok(Platform::Vercel),
            "cloudflare_pages" | "cloudflare" => Ok(Platform::CloudflarePages),
            "github_pages" | "gh-pages" => Ok(Platform::GithubPages),
            "surge" => Ok(Platform::Surge),
            "ssh" => Ok(Platform::Ssh),
            "ftp" => Ok(Platform::Ftp),
            "custom" => Ok(Platform::Custom),
            _ => Err(format!("Unknown platform: {}", s)),
        }
    }
}

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Preview,
    Development,
}

/// A deployment configuration, discriminated by `platform`.
///
/// Platform-specific fields live in the flattened `options` map and are
/// checked against the platform's declarative field schema by the adapter's
/// validate step, since configs routinely come from untyped user input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployConfig {
    /// Target platform
    pub platform: Platform,

    /// Built-artifact directory
    #[serde(default = "default_dist_dir")]
    pub dist_dir: String,

    /// Run the project build step before the transfer
    #[serde(default = "default_true")]
    pub build_before_deploy: bool,

    /// Override for the project build command
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_command: Option<String>,

    /// Target environment
    #[serde(default)]
    pub environment: Environment,

    /// Per-deployment timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Per-file retry attempts for adapters that support them
    #[serde(default)]
    pub retries: u32,

    /// Open the deployed URL after a successful deploy
    #[serde(default)]
    pub open_after_deploy: bool,

    /// Include glob filters for file enumeration
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,

    /// Exclude glob filters for file enumeration
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,

    /// Platform-specific fields
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

fn default_dist_dir() -> String {
    "dist".to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> u64 {
    600
}

impl DeployConfig {
    /// Create a config for a platform with defaults
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            dist_dir: default_dist_dir(),
            build_before_deploy: true,
            build_command: None,
            environment: Environment::default(),
            timeout_secs: default_timeout(),
            retries: 0,
            open_after_deploy: false,
            include: Vec::new(),
            exclude: Vec::new(),
            options: Map::new(),
        }
    }

    /// Get a platform-specific option as a string slice
    pub fn option_str(&self, name: &str) -> Option<&str> {
        self.options.get(name).and_then(|v| v.as_str())
    }

    /// Get a platform-specific option as an integer
    pub fn option_u64(&self, name: &str) -> Option<u64> {
        match self.options.get(name) {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.parse().ok(),
            _ => None,
        }
    }

    /// Get a platform-specific option as a boolean
    pub fn option_bool(&self, name: &str) -> Option<bool> {
        match self.options.get(name) {
            Some(Value::Bool(b)) => Some(*b),
            Some(Value::String(s)) => s.parse().ok(),
            _ => None,
        }
    }

    /// Set a platform-specific option
    pub fn set_option(&mut self, name: &str, value: impl Into<Value>) {
        self.options.insert(name.to_string(), value.into());
    }

    /// Copy of the config with the given secret fields replaced by a mask
    /// token, safe for display and history.
    pub fn sanitized(&self, secret_fields: &[&str]) -> DeployConfig {
        let mut copy = self.clone();
        for field in secret_fields {
            if let Some(value) = copy.options.get_mut(*field) {
                if !value.is_null() {
                    *value = Value::String(crate::models::history::SECRET_MASK.to_string());
                }
            }
        }
        copy
    }
}
