use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

/// Project-level settings from `.tally/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub fetch: FetchConfig,
}

/// Where linked items come from when a batch references foreign ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// GraphQL endpoint for live lookups.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// File holding pre-fetched linked items.
    #[serde(default)]
    pub linked_items: Option<PathBuf>,
    /// Name of the environment variable holding the API token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            linked_items: None,
            token_env: default_token_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub resolved_output: String,
}

/// Load `.tally/config.toml` under `project_root`, or defaults when absent.
///
/// # Errors
///
/// Fails when the file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(".tally/config.toml");
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load the per-user config from the platform config directory.
///
/// # Errors
///
/// Fails when the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("tally/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load both config layers and settle the output mode.
///
/// # Errors
///
/// Fails when either config file exists but is unreadable or invalid.
pub fn resolve_config(project_root: &Path, cli_json: bool) -> Result<EffectiveConfig> {
    let project = load_project_config(project_root)?;
    let user = load_user_config()?;

    let env_format = env::var("FORMAT").ok();
    let resolved_output = resolve_output(
        cli_json,
        user.output.clone(),
        env_format,
        std::io::stdout().is_terminal(),
    );

    Ok(EffectiveConfig {
        project,
        resolved_output,
    })
}

/// Canonical output mode name for a configured value, if recognized.
#[must_use]
pub fn normalize_output_mode(raw: &str) -> Option<&'static str> {
    match raw.trim().to_ascii_lowercase().as_str() {
        // canonical values
        "pretty" => Some("pretty"),
        "text" => Some("text"),
        "json" => Some("json"),
        // legacy compatibility
        "human" => Some("pretty"),
        "table" => Some("text"),
        _ => None,
    }
}

fn resolve_output(
    cli_json: bool,
    user_output: Option<String>,
    env_format: Option<String>,
    is_tty: bool,
) -> String {
    if cli_json {
        return "json".to_string();
    }

    if let Some(mode) = env_format.as_deref().and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if let Some(mode) = user_output.as_deref().and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if is_tty {
        "pretty".to_string()
    } else {
        "text".to_string()
    }
}

fn default_token_env() -> String {
    "TALLY_API_TOKEN".to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn make_temp_dir(label: &str) -> std::path::PathBuf {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir().join(format!(
            "tally-config-test-{label}-{}-{id}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).expect("temp dir must be created");
        dir
    }

    #[test]
    fn missing_project_config_uses_defaults() {
        let root = make_temp_dir("project-default");
        let cfg = load_project_config(&root).expect("load should succeed");
        assert_eq!(cfg.fetch.endpoint, None);
        assert_eq!(cfg.fetch.linked_items, None);
        assert_eq!(cfg.fetch.token_env, "TALLY_API_TOKEN");
        assert_eq!(cfg.fetch.timeout_secs, 30);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn project_config_parses_fetch_section() {
        let root = make_temp_dir("project-fetch");
        std::fs::create_dir_all(root.join(".tally")).expect("create .tally");
        std::fs::write(
            root.join(".tally/config.toml"),
            r#"
[fetch]
endpoint = "https://api.example.com/v2"
token_env = "BOARD_TOKEN"
"#,
        )
        .expect("write config");

        let cfg = load_project_config(&root).expect("load should succeed");
        assert_eq!(
            cfg.fetch.endpoint.as_deref(),
            Some("https://api.example.com/v2")
        );
        assert_eq!(cfg.fetch.token_env, "BOARD_TOKEN");
        assert_eq!(cfg.fetch.timeout_secs, 30);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn invalid_project_config_is_an_error() {
        let root = make_temp_dir("project-invalid");
        std::fs::create_dir_all(root.join(".tally")).expect("create .tally");
        std::fs::write(root.join(".tally/config.toml"), "[fetch\n").expect("write config");
        assert!(load_project_config(&root).is_err());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn cli_json_overrides_env_and_config() {
        let output = resolve_output(
            true,
            Some("pretty".to_string()),
            Some("text".to_string()),
            true,
        );
        assert_eq!(output, "json");
    }

    #[test]
    fn env_beats_user_config() {
        let output = resolve_output(false, Some("json".to_string()), Some("text".to_string()), true);
        assert_eq!(output, "text");
    }

    #[test]
    fn legacy_aliases_are_normalized() {
        let pretty = resolve_output(false, Some("table".to_string()), Some("human".to_string()), false);
        assert_eq!(pretty, "pretty");

        let text = resolve_output(false, Some("table".to_string()), None, true);
        assert_eq!(text, "text");
    }

    #[test]
    fn tty_decides_when_nothing_is_configured() {
        assert_eq!(resolve_output(false, None, None, true), "pretty");
        assert_eq!(resolve_output(false, None, Some("fancy".into()), false), "text");
    }
}
