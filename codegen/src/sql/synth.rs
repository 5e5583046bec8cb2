use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::catalog::{Introspector, TableDescriptor};
use crate::error::{CodegenError, Result};

/// A candidate statement. Never executed on the way out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesizedSql {
    pub sql: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A natural-language completion backend.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<SynthesizedSql>;
}

#[derive(Debug, Deserialize)]
struct CompletionEnvelope {
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<SynthesizedSql>,
}

/// Talks to a completion service returning `{code, message, data: {sql, description?}}`.
pub struct HttpCompletionClient {
    http: reqwest::Client,
    url: String,
}

impl HttpCompletionClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(unavailable)?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

fn unavailable(e: reqwest::Error) -> CodegenError {
    CodegenError::SynthesisUnavailable(e.to_string())
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<SynthesizedSql> {
        let resp = self
            .http
            .post(&self.url)
            .json(&serde_json::json!({ "prompt": prompt }))
            .send()
            .await
            .map_err(unavailable)?;

        if !resp.status().is_success() {
            return Err(CodegenError::SynthesisUnavailable(format!(
                "completion service returned HTTP {}",
                resp.status().as_u16()
            )));
        }

        let envelope: CompletionEnvelope = resp.json().await.map_err(unavailable)?;
        if envelope.code != 0 {
            return Err(CodegenError::SynthesisUnavailable(envelope.message));
        }
        envelope
            .data
            .ok_or_else(|| CodegenError::SynthesisUnavailable("response carried no data".into()))
    }
}

/// Removes a surrounding markdown code fence, if any.
fn strip_fences(sql: &str) -> String {
    let trimmed = sql.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    // Drop the info string (```sql) along with the opening fence.
    let body = rest.split_once('\n').map_or(rest, |(_, body)| body);
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
        .to_string()
}

fn describe_for_prompt(table: &TableDescriptor) -> String {
    let mut out = format!("\n\nTable `{}`", table.name);
    if !table.comment.is_empty() {
        let _ = write!(out, " ({})", table.comment);
    }
    out.push_str(" has columns:");
    for c in &table.columns {
        let _ = write!(out, "\n- {} {}", c.name, c.column_type);
        if c.is_primary_key() {
            out.push_str(" primary key");
        }
        if !c.nullable {
            out.push_str(" not null");
        }
        if !c.comment.is_empty() {
            let _ = write!(out, " -- {}", c.comment);
        }
    }
    out
}

/// Turns a prompt into candidate SQL. One attempt per call.
pub struct Synthesizer {
    client: Arc<dyn CompletionClient>,
    introspector: Arc<Introspector>,
    timeout: Duration,
}

impl Synthesizer {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        introspector: Arc<Introspector>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            introspector,
            timeout,
        }
    }

    pub async fn synthesize(&self, prompt: &str, table: Option<&str>) -> Result<SynthesizedSql> {
        let mut full_prompt = prompt.trim().to_string();
        if let Some(name) = table {
            let table = self.introspector.describe_table(name).await?;
            full_prompt.push_str(&describe_for_prompt(&table));
        }

        let reply = tokio::time::timeout(self.timeout, self.client.complete(&full_prompt))
            .await
            .map_err(|_| {
                tracing::warn!(timeout_secs = self.timeout.as_secs(), "SQL synthesis timed out");
                CodegenError::SynthesisUnavailable(format!(
                    "no answer within {}s",
                    self.timeout.as_secs()
                ))
            })?
            .inspect_err(|e| tracing::warn!(error = %e, "SQL synthesis failed"))?;

        let sql = strip_fences(&reply.sql);
        if sql.is_empty() {
            return Err(CodegenError::SynthesisUnavailable(
                "completion returned no SQL".into(),
            ));
        }
        Ok(SynthesizedSql {
            sql,
            description: reply.description.filter(|d| !d.trim().is_empty()),
        })
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::sync::Mutex;

    use super::*;

    /// Replies with a fixed answer and remembers every prompt.
    #[derive(Clone)]
    pub struct FakeCompletion {
        reply: std::result::Result<SynthesizedSql, String>,
        delay: Duration,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    impl FakeCompletion {
        pub fn answering(sql: &str) -> Self {
            Self {
                reply: Ok(SynthesizedSql {
                    sql: sql.to_string(),
                    description: Some("generated".into()),
                }),
                delay: Duration::ZERO,
                prompts: Arc::default(),
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                reply: Err(message.to_string()),
                ..Self::answering("")
            }
        }

        pub fn slow(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionClient for FakeCompletion {
        async fn complete(&self, prompt: &str) -> Result<SynthesizedSql> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            tokio::time::sleep(self.delay).await;
            self.reply
                .clone()
                .map_err(CodegenError::SynthesisUnavailable)
        }
    }
}
