//! Configuration for the Python sandbox.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// PATH handed to sandboxed processes when none is configured.
pub const DEFAULT_PATH_ENV: &str = "/usr/local/bin:/usr/bin:/bin";

/// Name the staged suite binds the candidate module to.
const CANDIDATE_ALIAS: &str = "_synthloop_candidate";

/// Configuration for [`super::PythonSandbox`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Interpreter used for the syntax check and the pytest run.
    pub interpreter: PathBuf,
    /// Parent directory for per-call staging areas (system temp dir if unset).
    #[serde(default)]
    pub staging_root: Option<PathBuf>,
    /// Module name the candidate is staged under; the suite star-imports it.
    pub candidate_module: String,
    /// Lines prepended to the staged candidate.
    #[serde(default)]
    pub candidate_preamble: String,
    /// Lines prepended to the staged suite, before the candidate import.
    #[serde(default)]
    pub test_preamble: String,
    /// Failure lines containing any of these are surfaced as domain errors.
    #[serde(default)]
    pub domain_keywords: Vec<String>,
    /// PATH visible to the child process. The rest of the environment is cleared.
    #[serde(default)]
    pub path_env: Option<String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            interpreter: PathBuf::from("python3"),
            staging_root: None,
            candidate_module: "candidate".to_string(),
            candidate_preamble: String::new(),
            test_preamble: "import pytest\n".to_string(),
            domain_keywords: Vec::new(),
            path_env: None,
        }
    }
}

impl SandboxConfig {
    /// Preset for animation scenes: star-imports manim in both units and
    /// surfaces scene/mobject errors.
    pub fn manim() -> Self {
        Self {
            candidate_preamble: "from manim import *\nimport numpy as np\n".to_string(),
            test_preamble: "import pytest\nfrom manim import *\n".to_string(),
            domain_keywords: ["VMobject", "Camera", "Scene", "Animation", "Transform"]
                .into_iter()
                .map(String::from)
                .collect(),
            ..Self::default()
        }
    }

    pub fn with_interpreter(mut self, interpreter: impl Into<PathBuf>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    pub fn with_staging_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.staging_root = Some(root.into());
        self
    }

    pub fn with_path_env(mut self, path: impl Into<String>) -> Self {
        self.path_env = Some(path.into());
        self
    }

    pub fn candidate_file(&self) -> String {
        format!("{}.py", self.candidate_module)
    }

    pub fn test_file(&self) -> String {
        format!("test_{}.py", self.candidate_module)
    }

    /// PATH for the child process.
    pub fn child_path(&self) -> &str {
        self.path_env.as_deref().unwrap_or(DEFAULT_PATH_ENV)
    }

    /// Full text of the staged candidate module.
    pub fn stage_candidate(&self, attempt_text: &str) -> String {
        format!("{}{}\n", self.candidate_preamble, attempt_text)
    }

    /// Full text of the staged suite.
    ///
    /// The star import is followed by a copy of the candidate's whole module
    /// namespace (dunder names aside), so underscore-prefixed helpers and
    /// names left out of `__all__` stay reachable from the tests.
    pub fn stage_suite(&self, test_text: &str) -> String {
        let module = &self.candidate_module;
        format!(
            "{preamble}from {module} import *\n\
             import {module} as {alias}\n\
             globals().update({{k: v for k, v in vars({alias}).items() if not k.startswith(\"__\")}})\n\n\
             {test_text}\n",
            preamble = self.test_preamble,
            alias = CANDIDATE_ALIAS,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stages_star_import_of_candidate() {
        let cfg = SandboxConfig::default();
        assert_eq!(cfg.candidate_file(), "candidate.py");
        assert_eq!(cfg.test_file(), "test_candidate.py");
        let suite = cfg.stage_suite("def test_x():\n    assert f() == 1");
        assert!(suite.starts_with("import pytest\nfrom candidate import *\n"));
        assert!(suite.contains("def test_x()"));
    }

    #[test]
    fn suite_exposes_private_candidate_names() {
        let suite =
            SandboxConfig::default().stage_suite("def test_h():\n    assert _helper(2) == 4");
        let lines: Vec<&str> = suite.lines().collect();
        assert_eq!(lines[1], "from candidate import *");
        assert_eq!(lines[2], "import candidate as _synthloop_candidate");
        assert_eq!(
            lines[3],
            "globals().update({k: v for k, v in vars(_synthloop_candidate).items() if not k.startswith(\"__\")})"
        );
        assert_eq!(lines[4], "");
        assert_eq!(lines[5], "def test_h():");
    }

    #[test]
    fn manim_preset_carries_domain_keywords() {
        let cfg = SandboxConfig::manim();
        assert!(cfg.stage_candidate("class A(Scene): pass").starts_with("from manim import *"));
        assert!(cfg.domain_keywords.iter().any(|k| k == "VMobject"));
        assert_eq!(cfg.domain_keywords.len(), 5);
    }

    #[test]
    fn child_path_falls_back_to_default() {
        assert_eq!(SandboxConfig::default().child_path(), DEFAULT_PATH_ENV);
        let cfg = SandboxConfig::default().with_path_env("/opt/py/bin");
        assert_eq!(cfg.child_path(), "/opt/py/bin");
    }
}
