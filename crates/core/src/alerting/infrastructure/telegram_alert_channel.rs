use std::time::Duration;

use reqwest::blocking::multipart;

use crate::alerting::domain::event_sink::{AlertChannel, DispatchError};
use crate::shared::constants::TELEGRAM_API_URL;
use crate::shared::settings::TelegramSettings;

const UNKNOWN_CAPTION: &str = "⚠️ <b>Unknown person detected!</b>";

/// Sends alerts through the Telegram Bot API using HTML parse mode.
pub struct TelegramAlertChannel {
    client: reqwest::blocking::Client,
    api_base: String,
    chat_id: String,
}

impl TelegramAlertChannel {
    pub fn new(settings: &TelegramSettings, timeout: Duration) -> Result<Self, DispatchError> {
        Self::with_api_url(TELEGRAM_API_URL, &settings.bot_token, &settings.chat_id, timeout)
    }

    pub fn with_api_url(
        api_url: &str,
        bot_token: &str,
        chat_id: &str,
        timeout: Duration,
    ) -> Result<Self, DispatchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(DispatchError::Client)?;
        Ok(Self {
            client,
            api_base: format!("{}/bot{bot_token}", api_url.trim_end_matches('/')),
            chat_id: chat_id.to_string(),
        })
    }

    fn send_message(&self, text: &str) -> Result<(), DispatchError> {
        let request = self
            .client
            .post(format!("{}/sendMessage", self.api_base))
            .form(&message_form(&self.chat_id, text));
        self.send("sendMessage", request)
    }

    fn send_photo(&self, caption: &str, jpeg: &[u8]) -> Result<(), DispatchError> {
        let photo = multipart::Part::bytes(jpeg.to_vec())
            .file_name("detection.jpg")
            .mime_str("image/jpeg")
            .map_err(|source| request_error("sendPhoto", source))?;
        let form = multipart::Form::new()
            .text("chat_id", self.chat_id.clone())
            .text("caption", caption.to_string())
            .text("parse_mode", "HTML")
            .part("photo", photo);
        let request = self
            .client
            .post(format!("{}/sendPhoto", self.api_base))
            .multipart(form);
        self.send("sendPhoto", request)
    }

    fn send(
        &self,
        method: &'static str,
        request: reqwest::blocking::RequestBuilder,
    ) -> Result<(), DispatchError> {
        let response = request
            .send()
            .map_err(|source| request_error(method, source))?;
        if !response.status().is_success() {
            return Err(DispatchError::Status {
                target: format!("telegram {method}"),
                status: response.status().as_u16(),
            });
        }
        log::debug!("Telegram {method} sent to chat {}", self.chat_id);
        Ok(())
    }
}

impl AlertChannel for TelegramAlertChannel {
    fn alert_unknown(&self, jpeg: &[u8]) -> Result<(), DispatchError> {
        self.send_photo(UNKNOWN_CAPTION, jpeg)
    }

    fn alert_category(&self, category: &str) -> Result<(), DispatchError> {
        self.send_message(&category_arrival_text(category))
    }

    fn send_text(&self, text: &str) -> Result<(), DispatchError> {
        self.send_message(text)
    }
}

// Request URLs embed the bot token, so it is stripped from reported errors.
fn request_error(method: &'static str, source: reqwest::Error) -> DispatchError {
    DispatchError::Request {
        target: format!("telegram {method}"),
        source: source.without_url(),
    }
}

fn message_form(chat_id: &str, text: &str) -> [(&'static str, String); 3] {
    [
        ("chat_id", chat_id.to_string()),
        ("text", text.to_string()),
        ("parse_mode", "HTML".to_string()),
    ]
}

pub fn category_arrival_text(category: &str) -> String {
    format!("🔔 <b>{}</b> arrived", escape_html(category))
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
