use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use test_orchestrator::{Category, EngineConfig};

/// Runner command lines per category (split with shell quoting rules).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerCommands {
    pub unit: Option<String>,
    pub integration: Option<String>,
    pub e2e: Option<String>,
}

impl RunnerCommands {
    pub fn get(&self, category: Category) -> Option<&str> {
        match category {
            Category::Unit => self.unit.as_deref(),
            Category::Integration => self.integration.as_deref(),
            Category::E2e => self.e2e.as_deref(),
        }
    }
}

/// Front-end configuration file (`testgate.toml` / `testgate.yaml`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Engine options live at the top level of the file.
    #[serde(flatten)]
    pub engine: EngineConfig,
    pub runners: RunnerCommands,
    /// Working directory for runner commands.
    pub workdir: Option<PathBuf>,
    pub project: Option<String>,
    pub state_dir: PathBuf,
    pub webhook_url: Option<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            runners: RunnerCommands::default(),
            workdir: None,
            project: None,
            state_dir: PathBuf::from(".testgate/state"),
            webhook_url: None,
        }
    }
}

impl CliConfig {
    /// Explicit path, else `testgate.toml` / `testgate.yaml` in the current
    /// directory, else defaults. Environment overrides apply in every case.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let found = match path {
            Some(p) => Some(p.to_path_buf()),
            None => ["testgate.toml", "testgate.yaml", "testgate.yml"]
                .iter()
                .map(PathBuf::from)
                .find(|p| p.exists()),
        };

        let mut config = match found {
            Some(path) => Self::load(&path)?,
            None => Self::default(),
        };
        config.engine.apply_env()?;
        if let Ok(url) = std::env::var("TESTGATE_WEBHOOK_URL") {
            config.webhook_url = Some(url);
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = Self::parse(path, &raw)?;
        tracing::debug!(path = %path.display(), "Loaded testgate config");
        Ok(config)
    }

    fn parse(path: &Path, raw: &str) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(raw)
                .with_context(|| format!("Invalid YAML in {}", path.display())),
            _ => toml::from_str(raw).with_context(|| format!("Invalid TOML in {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flattened_engine_options() {
        let raw = r#"
            flake_window = 8
            state_dir = "/var/lib/testgate"

            [thresholds.lines]
            target = 90.0
            minimum = 75.0

            [runners]
            unit = "npx vitest run --reporter=json"
            e2e = "npx playwright test --reporter=json"
        "#;
        let config = CliConfig::parse(Path::new("testgate.toml"), raw).unwrap();
        assert_eq!(config.engine.flake_window, 8);
        assert_eq!(config.engine.thresholds.lines.minimum, 75.0);
        assert_eq!(config.state_dir, PathBuf::from("/var/lib/testgate"));
        assert_eq!(
            config.runners.get(Category::Unit),
            Some("npx vitest run --reporter=json")
        );
        assert!(config.runners.get(Category::Integration).is_none());
        assert!(config.engine.validate().is_ok());
    }

    #[test]
    fn test_parse_yaml() {
        let raw = "timeout_ms: 900000\nrunners:\n  integration: npm run test:int\n";
        let config = CliConfig::parse(Path::new("testgate.yml"), raw).unwrap();
        assert_eq!(config.engine.timeout_ms, 900_000);
        assert_eq!(
            config.runners.get(Category::Integration),
            Some("npm run test:int")
        );
    }

    #[test]
    fn test_load_reports_path() {
        let err = CliConfig::load(Path::new("/nonexistent/testgate.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/testgate.toml"));
    }
}
