//! Source client driving the chat web page through the DevTools protocol.
//!
//! The browser is launched (or discovered) with remote debugging enabled; this
//! client attaches to the chat page's target and issues `Runtime.evaluate`
//! calls. Chat and message queries go through the page-side `WAPI` helper
//! object, which is injected from `bootstrap_script` when one is configured.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};
use wsr_protocol::{ChatRef, DataUrl, SourceMessage, UnreadBatch};

use super::SourceClient;
use crate::error::{RelayError, Result};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound on waiting for the reply to a single `Runtime.evaluate`.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(30);

const IS_LOGGED_IN: &str = "Boolean(document.querySelector('#pane-side'))";

const QR_DATA_URL: &str = r#"(() => {
	const canvas = document.querySelector('canvas[aria-label]') || document.querySelector('div[data-ref] canvas');
	return canvas ? canvas.toDataURL('image/png') : null;
})()"#;

const LIST_CHATS: &str = r#"(() => window.WAPI.getAllChats().map(c => ({
	id: (c.id && c.id._serialized) || String(c.id),
	name: c.name || c.formattedTitle || ''
})))()"#;

fn unread_script(chat_id: &str) -> String {
	let id = Value::String(chat_id.to_string());
	format!(
		r#"(() => {{
	const loggedIn = Boolean(document.querySelector('#pane-side'));
	if (!loggedIn) return {{ loggedIn, messages: [] }};
	const id = {id};
	const unread = window.WAPI.getUnreadMessagesInChat(id, true, false) || [];
	return {{
		loggedIn,
		messages: unread.map(m => ({{
			id: String((m.id && m.id._serialized) || m.id),
			chatId: id,
			sender: (m.sender && (m.sender.pushname || m.sender.formattedName)) || null,
			body: m.body || m.content || '',
			timestamp: m.timestamp || m.t || 0
		}}))
	}};
}})()"#
	)
}

/// Connection settings for [`CdpSourceClient`].
#[derive(Debug, Clone)]
pub struct CdpSourceOptions {
	/// Remote debugging port of the browser.
	pub cdp_port: u16,
	/// URL of the chat web app; the first page target starting with it is used.
	pub page_url: String,
	/// Directory pairing QR images are written to before being persisted.
	pub pairing_dir: PathBuf,
	/// JavaScript evaluated once after attaching (e.g. the `WAPI` helper).
	pub bootstrap_script: Option<String>,
	/// How long an evaluation may go unanswered before it fails.
	pub reply_timeout: Duration,
}

/// DevTools `/json/list` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CdpTarget {
	pub id: String,
	#[serde(rename = "type")]
	pub kind: String,
	#[serde(default)]
	pub url: String,
	#[serde(default)]
	pub web_socket_debugger_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CdpReply {
	id: Option<u64>,
	#[serde(default)]
	result: Option<Value>,
	#[serde(default)]
	error: Option<CdpReplyError>,
}

#[derive(Debug, Deserialize)]
struct CdpReplyError {
	message: String,
}

/// [`SourceClient`] backed by a DevTools websocket to the chat page.
pub struct CdpSourceClient {
	socket: Mutex<Socket>,
	next_id: AtomicU64,
	pairing_dir: PathBuf,
	reply_timeout: Duration,
}

impl CdpSourceClient {
	/// Finds (or opens) the chat page on the debugging browser and attaches to it.
	pub async fn connect(options: CdpSourceOptions) -> Result<Self> {
		let http = reqwest::Client::builder().timeout(Duration::from_secs(2)).build()?;
		let base = format!("http://127.0.0.1:{}", options.cdp_port);

		let targets: Vec<CdpTarget> = http.get(format!("{base}/json/list")).send().await?.error_for_status()?.json().await?;
		let target = match find_page(&targets, &options.page_url) {
			Some(target) => target.clone(),
			None => {
				debug!(target: "wsr.session", url = %options.page_url, "no chat page open; creating one");
				http.put(format!("{base}/json/new?{}", options.page_url))
					.send()
					.await?
					.error_for_status()?
					.json()
					.await?
			}
		};

		let ws_url = target
			.web_socket_debugger_url
			.ok_or_else(|| RelayError::Cdp(format!("page {} exposes no debugger URL; is another client attached?", target.id)))?;
		Self::attach_with_timeout(&ws_url, options.pairing_dir, options.bootstrap_script.as_deref(), options.reply_timeout).await
	}

	/// Attaches to a page target's websocket debugger URL directly.
	pub async fn attach(ws_url: &str, pairing_dir: PathBuf, bootstrap_script: Option<&str>) -> Result<Self> {
		Self::attach_with_timeout(ws_url, pairing_dir, bootstrap_script, DEFAULT_REPLY_TIMEOUT).await
	}

	pub async fn attach_with_timeout(ws_url: &str, pairing_dir: PathBuf, bootstrap_script: Option<&str>, reply_timeout: Duration) -> Result<Self> {
		let (socket, _) = tokio_tungstenite::connect_async(ws_url)
			.await
			.map_err(|e| RelayError::Cdp(format!("failed to attach to {ws_url}: {e}")))?;
		debug!(target: "wsr.session", %ws_url, "attached to chat page");

		let client = Self {
			socket: Mutex::new(socket),
			next_id: AtomicU64::new(1),
			pairing_dir,
			reply_timeout,
		};
		if let Some(script) = bootstrap_script {
			client.evaluate(script).await?;
		}
		Ok(client)
	}

	/// Evaluates `expression` in the page and returns its JSON value.
	pub async fn evaluate(&self, expression: &str) -> Result<Value> {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let request = json!({
			"id": id,
			"method": "Runtime.evaluate",
			"params": {
				"expression": expression,
				"returnByValue": true,
				"awaitPromise": true,
			}
		});

		let mut socket = self.socket.lock().await;
		socket.send(Message::Text(request.to_string().into())).await.map_err(session_lost)?;

		match tokio::time::timeout(self.reply_timeout, read_reply(&mut socket, id)).await {
			Ok(reply) => reply,
			Err(_) => Err(RelayError::Cdp(format!(
				"page did not answer evaluation {id} within {}ms",
				self.reply_timeout.as_millis()
			))),
		}
	}
}

/// Reads frames until the reply for `id` arrives, skipping events and stale replies.
async fn read_reply(socket: &mut Socket, id: u64) -> Result<Value> {
	while let Some(frame) = socket.next().await {
		let text = match frame.map_err(session_lost)? {
			Message::Text(text) => text,
			Message::Close(_) => break,
			_ => continue,
		};

		let reply: CdpReply = serde_json::from_str(text.as_ref())?;
		if reply.id != Some(id) {
			trace!(target: "wsr.session", "skipping devtools event");
			continue;
		}
		if let Some(error) = reply.error {
			return Err(RelayError::Cdp(error.message));
		}
		return evaluation_value(reply.result.unwrap_or(Value::Null));
	}

	Err(RelayError::FatalSession("devtools connection closed".to_string()))
}

#[async_trait]
impl SourceClient for CdpSourceClient {
	async fn request_pairing_artifact(&self) -> Result<PathBuf> {
		let Value::String(data_url) = self.evaluate(QR_DATA_URL).await? else {
			return Err(RelayError::Cdp("pairing QR is not rendered yet".to_string()));
		};
		let image = DataUrl::parse(&data_url).map_err(|e| RelayError::Cdp(format!("pairing QR: {e}")))?;

		tokio::fs::create_dir_all(&self.pairing_dir)
			.await
			.map_err(|e| RelayError::from_io(&self.pairing_dir, "write", e))?;
		let path = self.pairing_dir.join(format!("qr.{}", image.extension()));
		tokio::fs::write(&path, &image.bytes).await.map_err(|e| RelayError::from_io(&path, "write", e))?;
		Ok(path)
	}

	async fn is_logged_in(&self) -> Result<bool> {
		Ok(self.evaluate(IS_LOGGED_IN).await?.as_bool().unwrap_or(false))
	}

	async fn list_chats(&self) -> Result<Vec<ChatRef>> {
		let value = self.evaluate(LIST_CHATS).await?;
		Ok(serde_json::from_value(value)?)
	}

	async fn fetch_unread(&self, chat: &ChatRef) -> Result<Vec<SourceMessage>> {
		let value = self.evaluate(&unread_script(&chat.id)).await.map_err(|err| match err {
			RelayError::FatalSession(_) => err,
			other => RelayError::TransientFetch(other.to_string()),
		})?;
		let batch: UnreadBatch = serde_json::from_value(value).map_err(|e| RelayError::TransientFetch(e.to_string()))?;

		if !batch.logged_in {
			return Err(RelayError::FatalSession("chat page is logged out".to_string()));
		}
		Ok(batch.messages)
	}
}

/// Picks the first page target whose URL starts with `page_url`.
pub fn find_page<'a>(targets: &'a [CdpTarget], page_url: &str) -> Option<&'a CdpTarget> {
	let prefix = page_url.trim_end_matches('/');
	targets.iter().find(|t| t.kind == "page" && t.url.starts_with(prefix))
}

fn evaluation_value(result: Value) -> Result<Value> {
	if let Some(details) = result.get("exceptionDetails") {
		let message = details
			.pointer("/exception/description")
			.or_else(|| details.get("text"))
			.and_then(Value::as_str)
			.unwrap_or("uncaught exception");
		return Err(RelayError::Cdp(message.to_string()));
	}

	Ok(result.pointer("/result/value").cloned().unwrap_or(Value::Null))
}

fn session_lost(err: tokio_tungstenite::tungstenite::Error) -> RelayError {
	RelayError::FatalSession(format!("devtools connection lost: {err}"))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn target(kind: &str, url: &str) -> CdpTarget {
		CdpTarget {
			id: url.to_string(),
			kind: kind.to_string(),
			url: url.to_string(),
			web_socket_debugger_url: Some(format!("ws://127.0.0.1:9222/devtools/page/{url}")),
		}
	}

	#[test]
	fn find_page_matches_page_targets_by_prefix() {
		let targets = vec![
			target("service_worker", "https://web.whatsapp.com/sw.js"),
			target("page", "https://example.com/"),
			target("page", "https://web.whatsapp.com/"),
		];
		let found = find_page(&targets, "https://web.whatsapp.com/").unwrap();
		assert_eq!(found.url, "https://web.whatsapp.com/");
		assert!(find_page(&targets, "https://signal.org").is_none());
	}

	#[test]
	fn evaluation_value_unwraps_result_or_reports_exception() {
		let ok = json!({ "result": { "type": "boolean", "value": true } });
		assert_eq!(evaluation_value(ok).unwrap(), json!(true));

		let undefined = json!({ "result": { "type": "undefined" } });
		assert_eq!(evaluation_value(undefined).unwrap(), Value::Null);

		let thrown = json!({
			"result": { "type": "object" },
			"exceptionDetails": { "text": "Uncaught", "exception": { "description": "TypeError: WAPI is undefined" } }
		});
		let err = evaluation_value(thrown).unwrap_err();
		assert_eq!(err.to_string(), "devtools protocol error: TypeError: WAPI is undefined");
	}

	#[test]
	fn unread_script_quotes_chat_id() {
		let script = unread_script("123@c.us\"');");
		assert!(script.contains(r#"const id = "123@c.us\"');";"#));
	}
}
