//! Renderer contract for successful attempts.
//!
//! Rendering runs only after a session succeeded and never changes its
//! status. [`CommandRenderer`] stages the implementation into a persistent
//! output directory, runs a command template and hands back the newest file
//! it produced.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant, SystemTime};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info};

use crate::domain::ErrorKind;

/// Location of a rendered artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub path: PathBuf,
    pub entry_point: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("render command is empty")]
    EmptyCommand,

    #[error("failed to stage implementation at {path}: {source}")]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn render command `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("render command timed out after {0:?}")]
    TimedOut(Duration),

    #[error("render command exited with {code:?}: {stderr}")]
    CommandFailed { code: Option<i32>, stderr: String },

    #[error("no .{extension} artifact produced under {dir}")]
    NoArtifact { extension: String, dir: PathBuf },
}

impl RenderError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Render
    }
}

/// Turns a successful implementation into a visible artifact.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(
        &self,
        implementation_text: &str,
        entry_point: &str,
    ) -> Result<ArtifactRef, RenderError>;
}

/// Runs an external command over the staged implementation.
///
/// Each argument of `command` may contain `{file}` (the staged source path)
/// and `{entry}` (the entry point). The command runs inside `output_dir`.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    command: Vec<String>,
    output_dir: PathBuf,
    extension: String,
    preamble: String,
    timeout: Duration,
}

impl CommandRenderer {
    pub fn new(command: Vec<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            command,
            output_dir: output_dir.into(),
            extension: "mp4".to_string(),
            preamble: String::new(),
            timeout: Duration::from_secs(300),
        }
    }

    /// `manim -ql {file} {entry}` writing into `output_dir`.
    pub fn manim(output_dir: impl Into<PathBuf>) -> Self {
        Self::new(
            ["manim", "-ql", "{file}", "{entry}"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            output_dir,
        )
        .with_preamble("from manim import *\nimport numpy as np\n\n")
    }

    /// Split a whitespace-separated template into arguments.
    pub fn from_template(template: &str, output_dir: impl Into<PathBuf>) -> Self {
        Self::new(
            template.split_whitespace().map(str::to_string).collect(),
            output_dir,
        )
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = preamble.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn expand(&self, file: &Path, entry_point: &str) -> Vec<String> {
        let file = file.display().to_string();
        self.command
            .iter()
            .map(|arg| arg.replace("{file}", &file).replace("{entry}", entry_point))
            .collect()
    }
}

#[async_trait]
impl Renderer for CommandRenderer {
    async fn render(
        &self,
        implementation_text: &str,
        entry_point: &str,
    ) -> Result<ArtifactRef, RenderError> {
        if self.command.is_empty() {
            return Err(RenderError::EmptyCommand);
        }

        let source = self.output_dir.join(format!("{entry_point}.py"));
        let staging = |source_err| RenderError::Staging {
            path: source.clone(),
            source: source_err,
        };
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(staging)?;
        let contents = if implementation_text.starts_with(&self.preamble) {
            implementation_text.to_string()
        } else {
            format!("{}{}", self.preamble, implementation_text)
        };
        tokio::fs::write(&source, contents).await.map_err(staging)?;

        let argv = self.expand(&source, entry_point);
        let (program, args) = argv.split_first().ok_or(RenderError::EmptyCommand)?;
        debug!(program = %program, entry_point, "spawning renderer");

        let started = Instant::now();
        let child = Command::new(program)
            .args(args)
            .current_dir(&self.output_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RenderError::Spawn {
                program: program.clone(),
                source,
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| RenderError::TimedOut(self.timeout))?
            .map_err(|source| RenderError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(RenderError::CommandFailed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let path = newest_with_extension(&self.output_dir, &self.extension).ok_or_else(
            || RenderError::NoArtifact {
                extension: self.extension.clone(),
                dir: self.output_dir.clone(),
            },
        )?;
        info!(
            path = %path.display(),
            entry_point,
            duration_ms = started.elapsed().as_millis() as u64,
            "render.finished"
        );
        Ok(ArtifactRef {
            path,
            entry_point: entry_point.to_string(),
        })
    }
}

/// Most recently modified file under `dir` with `extension`.
fn newest_with_extension(dir: &Path, extension: &str) -> Option<PathBuf> {
    let mut newest: Option<(SystemTime, PathBuf)> = None;
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&current) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            if meta.is_dir() {
                pending.push(path);
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(extension) {
                continue;
            }
            let Ok(modified) = meta.modified() else {
                continue;
            };
            if newest.as_ref().map_or(true, |(t, _)| modified > *t) {
                newest = Some((modified, path));
            }
        }
    }
    newest.map(|(_, path)| path)
}
