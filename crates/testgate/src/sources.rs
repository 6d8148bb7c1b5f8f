//! Runner sources: where raw runner JSON comes from.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use test_orchestrator::{Category, CollectionError, RunnerOutput, RunnerSource};
use tokio::process::Command;

/// Reads previously written runner JSON, one file per category.
pub struct FileSource {
    files: BTreeMap<Category, PathBuf>,
}

impl FileSource {
    pub fn new(files: BTreeMap<Category, PathBuf>) -> Self {
        Self { files }
    }

    pub fn categories(&self) -> Vec<Category> {
        self.files.keys().copied().collect()
    }
}

#[async_trait]
impl RunnerSource for FileSource {
    async fn run(&self, category: Category) -> Result<RunnerOutput, CollectionError> {
        let path = self
            .files
            .get(&category)
            .ok_or_else(|| CollectionError::Runner {
                category,
                message: "no results file given".to_string(),
            })?;
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CollectionError::Runner {
                category,
                message: format!("cannot read {}: {e}", path.display()),
            })?;
        RunnerOutput::from_json(category, &json)
    }
}

/// Spawns the configured runner command and parses its stdout.
///
/// A non-zero exit status is expected when tests fail; only unparsable
/// output is an error.
pub struct CommandSource {
    commands: BTreeMap<Category, Vec<String>>,
    workdir: Option<PathBuf>,
}

impl CommandSource {
    /// Split each command line with shell quoting rules.
    pub fn new(
        lines: BTreeMap<Category, String>,
        workdir: Option<PathBuf>,
    ) -> anyhow::Result<Self> {
        let mut commands = BTreeMap::new();
        for (category, line) in lines {
            let argv = shlex::split(&line)
                .filter(|argv| !argv.is_empty())
                .ok_or_else(|| anyhow::anyhow!("invalid {category} runner command: {line}"))?;
            commands.insert(category, argv);
        }
        Ok(Self { commands, workdir })
    }

    pub fn categories(&self) -> Vec<Category> {
        self.commands.keys().copied().collect()
    }
}

#[async_trait]
impl RunnerSource for CommandSource {
    async fn run(&self, category: Category) -> Result<RunnerOutput, CollectionError> {
        let argv = self
            .commands
            .get(&category)
            .ok_or_else(|| CollectionError::Runner {
                category,
                message: "no runner command configured".to_string(),
            })?;

        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropped on category timeout; the runner must not outlive it
            .kill_on_drop(true);
        if let Some(dir) = &self.workdir {
            cmd.current_dir(dir);
        }

        tracing::info!(%category, command = %argv.join(" "), "Starting runner");
        let output = cmd.output().await.map_err(|e| CollectionError::Runner {
            category,
            message: format!("failed to spawn {}: {e}", argv[0]),
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            tracing::debug!(
                %category,
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr),
                "Runner exited non-zero"
            );
        }
        RunnerOutput::from_json(category, &stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_lines_are_split() {
        let mut lines = BTreeMap::new();
        lines.insert(
            Category::E2e,
            r#"npx playwright test --grep "@smoke tests""#.to_string(),
        );
        let source = CommandSource::new(lines, None).unwrap();
        assert_eq!(
            source.commands[&Category::E2e],
            vec!["npx", "playwright", "test", "--grep", "@smoke tests"]
        );
        assert_eq!(source.categories(), vec![Category::E2e]);
    }

    #[test]
    fn test_unbalanced_quotes_rejected() {
        let mut lines = BTreeMap::new();
        lines.insert(Category::Unit, r#"npm test "oops"#.to_string());
        assert!(CommandSource::new(lines, None).is_err());
    }

    #[tokio::test]
    async fn test_file_source_reads_runner_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unit.json");
        std::fs::write(
            &path,
            r#"{"category": "unit", "duration_ms": 10, "tests": [
                {"file": "a.test.ts", "name": "works", "status": "ok"}
            ]}"#,
        )
        .unwrap();

        let source = FileSource::new(BTreeMap::from([(Category::Unit, path)]));
        let output = source.run(Category::Unit).await.unwrap();
        assert_eq!(output.tests.len(), 1);

        let missing = source.run(Category::E2e).await.unwrap_err();
        assert!(matches!(missing, CollectionError::Runner { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_source_parses_stdout_despite_failure_exit() {
        let mut lines = BTreeMap::new();
        lines.insert(
            Category::Unit,
            r#"sh -c 'echo "{\"category\":\"unit\",\"duration_ms\":5,\"tests\":[]}"; exit 1'"#
                .to_string(),
        );
        let source = CommandSource::new(lines, None).unwrap();
        let output = source.run(Category::Unit).await.unwrap();
        assert_eq!(output.category, Category::Unit);
        assert!(output.tests.is_empty());
    }
}
