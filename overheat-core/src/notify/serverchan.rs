use super::{NotifyMessage, Notifier};
use crate::error::NotifyError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const BASE_URL: &str = "https://sctapi.ftqq.com";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServerChanConfig {
    pub send_key: String,
}

/// ServerChan push. The body is sent as a fenced code block so it keeps its
/// layout on mobile.
#[derive(Debug, Clone)]
pub struct ServerChanNotifier {
    client: Client,
    url: String,
}

impl ServerChanNotifier {
    pub fn new(config: ServerChanConfig, timeout: Duration) -> Result<Self, NotifyError> {
        Self::with_base_url(BASE_URL, config, timeout)
    }

    pub fn with_base_url(
        base_url: &str,
        config: ServerChanConfig,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: format!("{}/{}.send", base_url, config.send_key),
        })
    }
}

pub fn fenced(body: &str) -> String {
    format!("```\n{body}\n```")
}

#[async_trait]
impl Notifier for ServerChanNotifier {
    async fn send(&self, message: &NotifyMessage) -> Result<(), NotifyError> {
        let desp = fenced(&message.body);
        let response = self
            .client
            .post(&self.url)
            .form(&[("title", message.title.as_str()), ("desp", desp.as_str())])
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }

    fn name(&self) -> &str {
        "serverchan"
    }
}
