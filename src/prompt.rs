//! Builds the instruction text sent to the model.

use std::path::Path;

/// Target context the generated commands must run in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptBuilder {
    shell: String,
    platform: String,
    termux: bool,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new("bash", std::env::consts::OS)
    }
}

impl PromptBuilder {
    pub fn new(shell: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
            platform: platform.into(),
            termux: false,
        }
    }

    /// Targets Termux on Android, where packages come from `pkg`.
    pub fn termux(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
            platform: "Termux on Android".to_string(),
            termux: true,
        }
    }

    /// Picks the builder matching the running environment. Termux exports a
    /// `PREFIX` under `com.termux`.
    pub fn detect(shell: &str) -> Self {
        let in_termux = std::env::var("PREFIX")
            .map(|prefix| prefix.contains("com.termux"))
            .unwrap_or(false);
        if in_termux {
            Self::termux(shell)
        } else {
            Self::new(shell, std::env::consts::OS)
        }
    }

    /// Produces the prompt for `task` run from `cwd`. Same inputs, same text.
    pub fn build(&self, task: &str, cwd: &Path) -> String {
        let mut prompt = format!(
            "You are a terminal command expert for {shell} on {platform}. \
Given the following task, provide a list of commands to execute in sequence.\n\
Each command must be a single line that can be executed by {shell}.\n\
Task: {task}\n\
Current directory: {cwd}\n\
Return only the commands, one per line, without any explanations, comments or markdown formatting.",
            shell = self.shell,
            platform = self.platform,
            task = task,
            cwd = cwd.display(),
        );
        if self.termux {
            prompt.push_str(
                "\nUse Termux-specific commands where appropriate (e.g., pkg instead of apt).",
            );
        }
        prompt
    }
}

/// Builds a prompt with the default target context.
pub fn build_prompt(task: &str, cwd: &Path) -> String {
    PromptBuilder::default().build(task, cwd)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_task_and_cwd_verbatim() {
        let prompt = build_prompt("list files", Path::new("/home/u"));
        assert!(prompt.contains("list files"));
        assert!(prompt.contains("/home/u"));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let a = build_prompt("list files", Path::new("/home/u"));
        let b = build_prompt("list files", Path::new("/home/u"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_prompt_forbids_prose_and_fences() {
        let prompt = build_prompt("anything", Path::new("/"));
        assert!(prompt.contains("one per line"));
        assert!(prompt.contains("without any explanations"));
        assert!(prompt.contains("markdown"));
    }

    #[test]
    fn test_prompt_names_shell_and_platform() {
        let prompt = PromptBuilder::new("zsh", "macos").build("x", Path::new("/tmp"));
        assert!(prompt.contains("zsh on macos"));
        assert!(!prompt.contains("pkg instead of apt"));
    }

    #[test]
    fn test_termux_prompt_asks_for_pkg() {
        let prompt = PromptBuilder::termux("bash").build("update packages", Path::new("/data"));
        assert!(prompt.contains("Termux on Android"));
        assert!(prompt.contains("pkg instead of apt"));
    }

    #[test]
    fn test_task_with_quotes_and_newlines_is_kept_verbatim() {
        let task = "find \"big files\"\nand sort them";
        let prompt = build_prompt(task, Path::new("/srv"));
        assert!(prompt.contains(task));
    }
}
