//! Deployment-time web server configuration.
//!
//! Renders `nginx.conf` from a template whose actions use the `$((` / `))`
//! delimiters, leaving the server's own `{{ ... }}` runtime placeholders
//! untouched.

pub mod error;
pub mod template;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use error::{ConfigError, TemplateError};
pub use template::{NginxConfig, Template};

/// Placeholder resolved by the server at start-up.
pub const APP_ROOT: &str = r#"{{ env "APP_ROOT" }}"#;

/// Build-time settings that influence the generated configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildEnvironment {
    /// Server root; absolute, or relative to the application root. Empty
    /// means `<app root>/public`.
    #[serde(default)]
    pub web_server_root: String,

    /// Route unknown paths to `/` for single-page applications.
    #[serde(default)]
    pub web_server_push_state_enabled: bool,
}

impl BuildEnvironment {
    /// Template values for this environment.
    pub fn nginx_config(&self) -> NginxConfig {
        let root = if self.web_server_root.is_empty() {
            format!("{APP_ROOT}/public")
        } else if self.web_server_root.starts_with('/') {
            self.web_server_root.clone()
        } else {
            join_relative(APP_ROOT, &self.web_server_root)
        };

        NginxConfig {
            root,
            push_state: self.web_server_push_state_enabled,
        }
    }
}

/// Join `relative` onto `base` and clean `.`, `..` and duplicate separators.
fn join_relative(base: &str, relative: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in relative.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            _ => parts.push(part),
        }
    }

    if parts.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{}", parts.join("/"))
    }
}

/// Writes the rendered configuration file.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigGenerator;

impl ConfigGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Render `template_source` for `env` into `destination` (created or truncated).
    pub fn generate(
        &self,
        template_source: &Path,
        destination: &Path,
        env: &BuildEnvironment,
    ) -> Result<(), ConfigError> {
        let source =
            std::fs::read_to_string(template_source).map_err(|e| ConfigError::TemplateNotFound {
                path: template_source.to_path_buf(),
                source: e,
            })?;

        let template = Template::parse(&source).map_err(|e| ConfigError::Parse {
            path: template_source.to_path_buf(),
            source: e,
        })?;

        let data = env.nginx_config();
        debug!(root = %data.root, push_state = data.push_state, "rendering configuration");

        std::fs::write(destination, template.render(&data)).map_err(|e| ConfigError::Write {
            path: PathBuf::from(destination),
            source: e,
        })
    }
}
