//! Доставка результата клиенту через Telegram Bot API (`sendAudio`).

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};

use crate::error::ServiceError;

/// Ответ платформы доставки
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryReceipt {
    pub status: u16,
    pub body: Value,
}

impl DeliveryReceipt {
    /// HTTP 200 и `"ok": true` в теле
    pub fn is_ok(&self) -> bool {
        self.status == 200 && self.body.get("ok").and_then(Value::as_bool) == Some(true)
    }
}

/// Отправка готового аудио клиенту
#[async_trait]
pub trait AudioDelivery: Send + Sync {
    async fn send_audio(
        &self,
        chat_id: &str,
        caption: &str,
        file: &Path,
        file_name: &str,
    ) -> Result<DeliveryReceipt, ServiceError>;
}

/// Подпись к аудио
pub fn caption_for(name: Option<&str>) -> String {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => format!("{}, аффирмация готова", name),
        None => "Аффирмация готова".to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    bot_url: String,
    timeout: Duration,
}

impl TelegramClient {
    pub fn new(http: reqwest::Client, api_url: &str, bot_token: &str, timeout: Duration) -> Self {
        Self {
            http,
            bot_url: format!("{}/bot{}", api_url.trim_end_matches('/'), bot_token),
            timeout,
        }
    }
}

fn mime_for(file_name: &str) -> &'static str {
    if file_name.ends_with(".wav") {
        "audio/wav"
    } else {
        "audio/mpeg"
    }
}

#[async_trait]
impl AudioDelivery for TelegramClient {
    async fn send_audio(
        &self,
        chat_id: &str,
        caption: &str,
        file: &Path,
        file_name: &str,
    ) -> Result<DeliveryReceipt, ServiceError> {
        let data = tokio::fs::read(file).await?;
        debug!("Uploading {} ({} bytes) to chat {}", file_name, data.len(), chat_id);

        let part = Part::bytes(data)
            .file_name(file_name.to_string())
            .mime_str(mime_for(file_name))?;
        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .part("audio", part);

        let response = self
            .http
            .post(format!("{}/sendAudio", self.bot_url))
            .multipart(form)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status().as_u16();
        let text = response.text().await?;
        let body = serde_json::from_str(&text)
            .unwrap_or_else(|_| json!({ "ok": false, "description": text }));

        Ok(DeliveryReceipt { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caption_uses_name_when_present() {
        assert_eq!(caption_for(Some("Анна")), "Анна, аффирмация готова");
        assert_eq!(caption_for(Some("  ")), "Аффирмация готова");
        assert_eq!(caption_for(None), "Аффирмация готова");
    }

    #[test]
    fn receipt_requires_status_and_ok_flag() {
        let ok = DeliveryReceipt {
            status: 200,
            body: json!({"ok": true, "result": {}}),
        };
        assert!(ok.is_ok());

        let api_error = DeliveryReceipt {
            status: 200,
            body: json!({"ok": false, "description": "chat not found"}),
        };
        assert!(!api_error.is_ok());

        let http_error = DeliveryReceipt {
            status: 400,
            body: json!({"ok": true}),
        };
        assert!(!http_error.is_ok());
    }

    #[test]
    fn bot_url_has_no_double_slash() {
        let client = TelegramClient::new(
            reqwest::Client::new(),
            "https://api.telegram.org/",
            "123:abc",
            Duration::from_secs(1),
        );
        assert_eq!(client.bot_url, "https://api.telegram.org/bot123:abc");
    }
}
