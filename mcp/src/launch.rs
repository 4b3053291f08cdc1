//! Launch profiles: which interpreter runs a tool-server script.

use std::path::{Path, PathBuf};

use crate::error::McpError;

/// Script extension to interpreter command. Anything else is rejected.
pub const LAUNCH_PROFILES: &[(&str, &str)] = &[("py", "python"), ("js", "node")];

/// Interpreter selected for a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchProfile {
    pub extension: &'static str,
    pub interpreter: &'static str,
}

impl LaunchProfile {
    pub fn for_script(script: &Path) -> Result<Self, McpError> {
        let extension = script.extension().and_then(|ext| ext.to_str());

        LAUNCH_PROFILES
            .iter()
            .find(|(ext, _)| Some(*ext) == extension)
            .map(|&(extension, interpreter)| LaunchProfile {
                extension,
                interpreter,
            })
            .ok_or_else(|| McpError::UnsupportedLaunchProfile {
                script: script.display().to_string(),
                supported: supported_extensions(),
            })
    }
}

fn supported_extensions() -> String {
    LAUNCH_PROFILES
        .iter()
        .map(|(ext, _)| format!(".{}", ext))
        .collect::<Vec<_>>()
        .join(", ")
}

/// How to start one tool server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub script: PathBuf,
    pub args: Vec<String>,
}

impl LaunchSpec {
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn profile(&self) -> Result<LaunchProfile, McpError> {
        LaunchProfile::for_script(&self.script)
    }
}
