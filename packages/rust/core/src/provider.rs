//! AI provider capability.
//!
//! Everything the pipeline knows about the AI is the [`AiProvider`] trait:
//! send a prompt with optional model selection, get text back or a
//! classified [`ProviderError`]. [`CommandProvider`] implements it by running
//! an external CLI per request, prompt on stdin, answer on stdout.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use contentcurator_shared::{
    ModelOption, OperationCostInfo, OperationKind, ProviderConfig, ProviderError,
    ProviderErrorKind,
};

use crate::classify::{classify_provider_error, provider_error};
use crate::pricing::{estimate_tokens, operation_cost};

// ---------------------------------------------------------------------------
// Capability
// ---------------------------------------------------------------------------

/// Model selection for one request. Unset fields use the provider's defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptOptions {
    pub provider: Option<String>,
    pub model: Option<String>,
}

impl PromptOptions {
    pub fn for_model(model: &ModelOption) -> Self {
        Self {
            provider: Some(model.provider.clone()),
            model: Some(model.model.clone()),
        }
    }
}

/// A successful answer.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResponse {
    pub content: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// USD, when the provider reported it.
    pub cost_usd: Option<f64>,
}

impl ProviderResponse {
    /// Plain text answer with estimated token counts.
    pub fn from_text(prompt: &str, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            input_tokens: estimate_tokens(prompt),
            output_tokens: estimate_tokens(&content),
            content,
            cost_usd: None,
        }
    }

    /// Cost record for this answer, priced from the table when the provider
    /// did not report a cost.
    pub fn cost_info(&self, operation: OperationKind, model: &ModelOption) -> OperationCostInfo {
        operation_cost(
            operation,
            model,
            self.input_tokens,
            self.output_tokens,
            self.cost_usd,
        )
    }
}

/// Text-completion capability used by scoring and improvement.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Send a prompt, selecting the model through `options`.
    async fn prompt(
        &self,
        text: &str,
        options: &PromptOptions,
    ) -> std::result::Result<ProviderResponse, ProviderError>;

    /// Send a prompt to the default model and return only the text.
    async fn prompt_text(&self, text: &str) -> std::result::Result<String, ProviderError> {
        Ok(self.prompt(text, &PromptOptions::default()).await?.content)
    }
}

// ---------------------------------------------------------------------------
// Command provider
// ---------------------------------------------------------------------------

/// Runs the configured command once per prompt.
#[derive(Debug, Clone)]
pub struct CommandProvider {
    config: ProviderConfig,
}

/// JSON shape printed by CLIs run with a JSON output format.
#[derive(Debug, Deserialize)]
struct CommandOutput {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    is_error: bool,
    #[serde(default)]
    total_cost_usd: Option<f64>,
    #[serde(default)]
    usage: Option<CommandUsage>,
}

#[derive(Debug, Deserialize)]
struct CommandUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

/// Stdout of a finished command, interpreted.
#[derive(Debug, PartialEq)]
enum ParsedOutput {
    Answer(ProviderResponse),
    /// The command reported an error in-band.
    Error(String),
}

impl CommandProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self { config }
    }

    fn target(&self, options: &PromptOptions) -> ModelOption {
        ModelOption::new(
            options
                .provider
                .clone()
                .unwrap_or_else(|| self.config.name.clone()),
            options.model.clone().unwrap_or_else(|| "default".into()),
        )
    }

    fn failure(&self, target: &ModelOption, kind: ProviderErrorKind, message: String) -> ProviderError {
        ProviderError {
            kind,
            provider: target.provider.clone(),
            model: target.model.clone(),
            message,
        }
    }
}

#[async_trait]
impl AiProvider for CommandProvider {
    async fn prompt(
        &self,
        text: &str,
        options: &PromptOptions,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let target = self.target(options);
        let started = Instant::now();

        let mut command = Command::new(&self.config.command);
        command.args(&self.config.args);
        if let Some(model) = &options.model {
            command.arg(&self.config.model_flag).arg(model);
        }
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| {
            self.failure(
                &target,
                ProviderErrorKind::Unknown,
                format!("failed to spawn `{}`: {e}", self.config.command),
            )
        })?;

        let mut stdin = child.stdin.take().ok_or_else(|| {
            self.failure(
                &target,
                ProviderErrorKind::Server,
                "failed to capture provider stdin".into(),
            )
        })?;
        let prompt = text.to_owned();
        let writer = tokio::spawn(async move {
            if let Err(e) = stdin.write_all(prompt.as_bytes()).await {
                debug!(error = %e, "provider closed stdin early");
            }
            let _ = stdin.shutdown().await;
        });

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(self.failure(
                    &target,
                    ProviderErrorKind::Server,
                    format!("failed to read provider output: {e}"),
                ));
            }
            Err(_) => {
                warn!(model = %target, timeout_secs = self.config.timeout_secs, "provider request timed out");
                return Err(self.failure(
                    &target,
                    ProviderErrorKind::Server,
                    format!("request timed out after {}s", self.config.timeout_secs),
                ));
            }
        };
        let _ = writer.await;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".into());
            let detail = if stderr.trim().is_empty() {
                stdout.trim()
            } else {
                stderr.trim()
            };
            let message = format!(
                "{} process exited with code {code}: {detail}",
                target.provider
            );
            return Err(provider_error(&target, message));
        }

        debug!(
            model = %target,
            elapsed_ms = started.elapsed().as_millis() as u64,
            bytes = stdout.len(),
            "provider answered"
        );

        match parse_output(text, &stdout) {
            ParsedOutput::Answer(response) => Ok(response),
            ParsedOutput::Error(message) => Err(ProviderError {
                kind: classify_provider_error(&message),
                provider: target.provider,
                model: target.model,
                message,
            }),
        }
    }
}

/// Interpret command stdout: the JSON result format when it parses, plain
/// text otherwise.
fn parse_output(prompt: &str, stdout: &str) -> ParsedOutput {
    let trimmed = stdout.trim();
    let Ok(parsed) = serde_json::from_str::<CommandOutput>(trimmed) else {
        return ParsedOutput::Answer(ProviderResponse::from_text(prompt, trimmed));
    };

    let Some(content) = parsed.result.or(parsed.text) else {
        return ParsedOutput::Answer(ProviderResponse::from_text(prompt, trimmed));
    };

    if parsed.is_error {
        return ParsedOutput::Error(content);
    }

    let (input_tokens, output_tokens) = match parsed.usage {
        Some(usage) => (usage.input_tokens, usage.output_tokens),
        None => (estimate_tokens(prompt), estimate_tokens(&content)),
    };

    ParsedOutput::Answer(ProviderResponse {
        content,
        input_tokens,
        output_tokens,
        cost_usd: parsed.total_cost_usd,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_result() {
        let out = r#"{"type":"result","result":"SCORE: 8","is_error":false,
            "total_cost_usd":0.0123,"usage":{"input_tokens":900,"output_tokens":40}}"#;
        let ParsedOutput::Answer(resp) = parse_output("prompt", out) else {
            panic!("expected answer");
        };
        assert_eq!(resp.content, "SCORE: 8");
        assert_eq!(resp.input_tokens, 900);
        assert_eq!(resp.output_tokens, 40);
        assert_eq!(resp.cost_usd, Some(0.0123));
    }

    #[test]
    fn in_band_error_is_reported() {
        let out = r#"{"result":"Claude AI usage limit reached|1760000000","is_error":true}"#;
        assert_eq!(
            parse_output("p", out),
            ParsedOutput::Error("Claude AI usage limit reached|1760000000".into())
        );
    }

    #[test]
    fn plain_text_output() {
        let ParsedOutput::Answer(resp) = parse_output("12345678", "  # Title\n\nBody\n") else {
            panic!("expected answer");
        };
        assert_eq!(resp.content, "# Title\n\nBody");
        assert_eq!(resp.input_tokens, 2);
        assert_eq!(resp.cost_usd, None);
    }

    #[test]
    fn json_without_text_is_plain_text() {
        let ParsedOutput::Answer(resp) = parse_output("p", r#"{"title":"x"}"#) else {
            panic!("expected answer");
        };
        assert_eq!(resp.content, r#"{"title":"x"}"#);
    }

    #[cfg(unix)]
    fn shell(script: &str, timeout_secs: u64) -> CommandProvider {
        CommandProvider::new(ProviderConfig {
            name: "shell".into(),
            command: "sh".into(),
            args: vec!["-c".into(), script.into()],
            model_flag: "--model".into(),
            timeout_secs,
        })
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn echoes_prompt_through_command() {
        let provider = shell("cat", 10);
        let options = PromptOptions::for_model(&ModelOption::new("shell", "echo-1"));
        let resp = provider.prompt("hello world", &options).await.unwrap();
        assert_eq!(resp.content, "hello world");
        assert_eq!(provider.prompt_text("again").await.unwrap(), "again");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_classified() {
        let provider = shell("echo 'Invalid API key' >&2; exit 1", 10);
        let err = provider
            .prompt("x", &PromptOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Auth);
        assert!(err.message.contains("process exited with code 1"));
        assert_eq!(err.provider, "shell");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_is_a_server_error() {
        let provider = shell("sleep 5", 1);
        let err = provider
            .prompt("x", &PromptOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Server);
    }

    #[tokio::test]
    async fn missing_command_is_not_recoverable() {
        let provider = CommandProvider::new(ProviderConfig {
            command: "contentcurator-no-such-binary".into(),
            ..ProviderConfig::default()
        });
        let err = provider
            .prompt("x", &PromptOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Unknown);
        assert!(!err.kind.is_recoverable());
    }
}
