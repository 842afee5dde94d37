//! Target-platform bridge client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, info};
use wsr_protocol::{ABOUT_PATH, AboutResponse, BridgeErrorBody, RegisterRequest, SEND_PATH, SendMessageRequest, SendMessageResponse, register_path};

use crate::error::{RelayError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Confirmation returned by the bridge for a sent message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
	pub timestamp: String,
}

/// Send capability of the target platform.
#[async_trait]
pub trait BridgeClient: Send + Sync {
	/// Starts registration of `identity` with the target platform.
	async fn register(&self, identity: &str) -> Result<()>;

	/// Sends `text` from `identity` to `recipients`.
	///
	/// `Ok` means the bridge confirmed the message; failures are reported as
	/// [`RelayError::TransientForward`].
	async fn send(&self, identity: &str, recipients: &[String], text: &str) -> Result<Delivery>;
}

#[async_trait]
impl<T: BridgeClient + ?Sized> BridgeClient for Arc<T> {
	async fn register(&self, identity: &str) -> Result<()> {
		(**self).register(identity).await
	}

	async fn send(&self, identity: &str, recipients: &[String], text: &str) -> Result<Delivery> {
		(**self).send(identity, recipients, text).await
	}
}

/// [`BridgeClient`] over the bridge's local REST API.
#[derive(Debug, Clone)]
pub struct RestBridge {
	http: reqwest::Client,
	base_url: String,
}

impl RestBridge {
	pub fn new(base_url: impl Into<String>) -> Result<Self> {
		let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
		Ok(Self {
			http,
			base_url: base_url.into().trim_end_matches('/').to_string(),
		})
	}

	pub fn base_url(&self) -> &str {
		&self.base_url
	}

	/// Version/health probe.
	pub async fn about(&self) -> Result<AboutResponse> {
		let response = self.http.get(format!("{}{ABOUT_PATH}", self.base_url)).send().await?;
		let response = check_status(response).await.map_err(RelayError::Context)?;
		Ok(response.json().await?)
	}
}

#[async_trait]
impl BridgeClient for RestBridge {
	async fn register(&self, identity: &str) -> Result<()> {
		let url = format!("{}{}", self.base_url, register_path(identity));
		let response = self.http.post(url).json(&RegisterRequest::default()).send().await?;
		check_status(response)
			.await
			.map_err(|msg| RelayError::Context(format!("registration of {identity} failed: {msg}")))?;

		info!(target: "wsr.bridge", "registration requested; confirm with the verification code sent by the target platform");
		Ok(())
	}

	async fn send(&self, identity: &str, recipients: &[String], text: &str) -> Result<Delivery> {
		let body = SendMessageRequest {
			message: text.to_string(),
			number: identity.to_string(),
			recipients: recipients.to_vec(),
		};

		let response = self
			.http
			.post(format!("{}{SEND_PATH}", self.base_url))
			.json(&body)
			.send()
			.await
			.map_err(|e| RelayError::TransientForward(e.to_string()))?;
		let response = check_status(response).await.map_err(RelayError::TransientForward)?;
		let confirmed: SendMessageResponse = response
			.json()
			.await
			.map_err(|e| RelayError::TransientForward(format!("unconfirmed delivery: {e}")))?;

		debug!(target: "wsr.bridge", timestamp = %confirmed.timestamp, recipients = recipients.len(), "message delivered");
		Ok(Delivery {
			timestamp: confirmed.timestamp,
		})
	}
}

async fn check_status(response: reqwest::Response) -> std::result::Result<reqwest::Response, String> {
	let status = response.status();
	if status.is_success() {
		return Ok(response);
	}

	let body = response.text().await.unwrap_or_default();
	let detail = serde_json::from_str::<BridgeErrorBody>(&body).map(|b| b.error).unwrap_or(body);
	Err(describe_status(status, detail.trim()))
}

fn describe_status(status: StatusCode, detail: &str) -> String {
	if detail.is_empty() {
		format!("bridge returned {status}")
	} else {
		format!("bridge returned {status}: {detail}")
	}
}
