use anyhow::anyhow;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;

use super::{ChannelHandle, MessagingTransport, TransportError};

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Telegram Bot API client. Messages use legacy Markdown.
#[derive(Clone)]
pub struct TelegramTransport {
    client: Client,
    api_base: String,
    token: String,
}

impl TelegramTransport {
    pub fn new(token: String) -> anyhow::Result<Self> {
        Self::with_base(TELEGRAM_API_BASE, token)
    }

    /// Optional builder for tests/tools
    pub fn with_base(api_base: &str, token: String) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.token)
    }

    async fn call<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<T, TransportError> {
        let resp = self
            .client
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::Failed(format!("telegram {method}: {}", e.without_url())))?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| TransportError::Failed(format!("telegram {method} body: {e}")))?;
        let parsed: Option<ApiResponse<T>> = serde_json::from_slice(&bytes).ok();

        match parsed {
            Some(ApiResponse {
                ok: true,
                result: Some(result),
                ..
            }) => Ok(result),
            Some(r) => Err(classify(method, status, r.error_code, r.description, r.parameters)),
            None => Err(classify(method, status, None, None, None)),
        }
    }
}

fn classify(
    method: &str,
    status: StatusCode,
    error_code: Option<u16>,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
) -> TransportError {
    let code = error_code.unwrap_or(status.as_u16());
    let desc = description.unwrap_or_else(|| status.to_string());

    if code == 429 || status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = parameters.and_then(|p| p.retry_after).unwrap_or(1);
        return TransportError::RateLimited { retry_after_secs };
    }
    if code == 401 {
        return TransportError::Unexpected(anyhow!("telegram rejected the bot token ({method}): {desc}"));
    }
    // An unknown chat will not start existing on retry.
    if code == 404 && method == "getChat" {
        return TransportError::Unexpected(anyhow!("telegram chat not found: {desc}"));
    }
    TransportError::Failed(format!("telegram {method} failed ({code}): {desc}"))
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<u16>,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
    title: Option<String>,
    username: Option<String>,
}

#[derive(Serialize)]
struct GetChat<'a> {
    chat_id: &'a str,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

#[async_trait::async_trait]
impl MessagingTransport for TelegramTransport {
    async fn resolve(&self, channel_id: &str) -> Result<ChannelHandle, TransportError> {
        let chat: Chat = self.call("getChat", &GetChat { chat_id: channel_id }).await?;
        Ok(ChannelHandle {
            chat_id: chat.id.to_string(),
            title: chat.title.or(chat.username),
        })
    }

    async fn send(&self, channel: &ChannelHandle, text: &str) -> Result<(), TransportError> {
        let body = SendMessage {
            chat_id: &channel.chat_id,
            text,
            parse_mode: "Markdown",
            disable_web_page_preview: true,
        };
        let _: serde_json::Value = self.call("sendMessage", &body).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}
