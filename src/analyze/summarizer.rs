//! Report summarization via an LLM.
//!
//! The summarizer never fails past its own boundary: missing credentials and
//! call failures both come back as visible placeholder text, so a report can
//! still be posted when the model is unavailable.

use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::AiConfig;

pub const MOCK_SUMMARY: &str = "[MOCK SUMMARY] No API key found.";
const FAILURE_PREFIX: &str = "[요약 실패] OpenAI API 오류";

const SYSTEM_PROMPT: &str = "너는 주식 투자 리포트를 분석하고 요약하는 전문가야. \
기관 투자자와 개인 투자자들이 빠르게 핵심 내용을 파악할 수 있도록 \
투자 의견, 목표가, 핵심 논리, 리스크 요인 등을 간결하고 명확하게 정리해. \
한국어로 작성하고, 실제 투자 판단에 도움이 되도록 작성해.";

/// What the model gets to see about one report.
#[derive(Debug, Clone, Copy)]
pub struct SummaryRequest<'a> {
    pub text: &'a str,
    pub company: &'a str,
    pub title: &'a str,
    pub issuer: &'a str,
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, req: SummaryRequest<'_>) -> String;
    fn provider_name(&self) -> &'static str;
}

/// Placeholder text embedding the error.
pub fn failure_summary(err: &anyhow::Error) -> String {
    format!("{FAILURE_PREFIX}: {err:#}")
}

pub fn is_placeholder(summary: &str) -> bool {
    summary == MOCK_SUMMARY || summary.starts_with(FAILURE_PREFIX)
}

pub fn user_prompt(req: &SummaryRequest<'_>) -> String {
    format!(
        "다음은 {company}에 대한 {issuer}의 투자 리포트 내용이야. 제목: {title}\n\n\
         PDF 첫 페이지 내용:\n{text}\n\n\
         이 내용을 투자 관점에서 핵심만 요약해줘. \
         투자 의견, 목표가, 핵심 논리, 주요 리스크 등을 포함해서 작성해.",
        company = req.company,
        issuer = req.issuer,
        title = req.title,
        text = req.text,
    )
}

/// OpenAI Chat Completions.
pub struct OpenAiSummarizer {
    http: reqwest::Client,
    cfg: AiConfig,
}

impl OpenAiSummarizer {
    pub fn new(cfg: AiConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("analyst-report-digest/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("building openai http client")?;
        Ok(Self { http, cfg })
    }

    async fn call(&self, req: SummaryRequest<'_>) -> anyhow::Result<String> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            max_tokens: u32,
            temperature: f32,
            top_p: f32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: Option<String>,
        }

        let user = user_prompt(&req);
        let body = Req {
            model: &self.cfg.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                Msg {
                    role: "user",
                    content: &user,
                },
            ],
            max_tokens: self.cfg.max_tokens,
            temperature: self.cfg.temperature,
            top_p: 1.0,
        };

        let resp = self
            .http
            .post(&self.cfg.endpoint)
            .bearer_auth(&self.cfg.api_key)
            .json(&body)
            .send()
            .await
            .context("openai request")?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(anyhow!("HTTP {status}: {}", detail.trim()));
        }

        let parsed: Resp = resp.json().await.context("openai response body")?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default();
        if content.is_empty() {
            return Err(anyhow!("empty completion"));
        }
        Ok(content)
    }
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    async fn summarize(&self, req: SummaryRequest<'_>) -> String {
        if !self.cfg.has_credentials() {
            tracing::warn!("no OpenAI key configured; returning mock summary");
            return MOCK_SUMMARY.to_string();
        }

        tracing::info!(company = req.company, issuer = req.issuer, "summarizing report");
        match self.call(req).await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, company = req.company, "summarization failed");
                failure_summary(&e)
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

/// Deterministic summarizer for tests and dry runs.
#[derive(Debug, Clone)]
pub struct FixedSummarizer {
    pub fixed: String,
}

#[async_trait]
impl Summarizer for FixedSummarizer {
    async fn summarize(&self, _req: SummaryRequest<'_>) -> String {
        self.fixed.clone()
    }

    fn provider_name(&self) -> &'static str {
        "fixed"
    }
}
