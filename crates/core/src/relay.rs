//! Steady-state forwarding of unread source messages to the bridge.
//!
//! Each tick fetches the tracked chat's unread messages, queues the ones not
//! seen before, and forwards the queue in order. The cursor moves past a
//! message only after the bridge confirmed it; a failed forward stops the
//! tick and the same message is retried first on the next one, so there is
//! at most one outstanding attempt per chat.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wsr_protocol::{ChatRef, SourceMessage};

use crate::bridge::BridgeClient;
use crate::error::Result;
use crate::session::SessionHandle;
use crate::source::SourceClient;

pub const DEFAULT_RELAY_INTERVAL: Duration = Duration::from_secs(2);

/// Number of confirmed message ids remembered for deduplication.
const CONFIRMED_ID_HISTORY: usize = 256;

/// Per-chat relay progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayCursor {
	chat: ChatRef,
	last_seen_marker: Option<String>,
	last_seen_timestamp: i64,
	confirmed: VecDeque<String>,
	forwarded: u64,
}

impl RelayCursor {
	pub fn new(chat: ChatRef) -> Self {
		Self {
			chat,
			last_seen_marker: None,
			last_seen_timestamp: i64::MIN,
			confirmed: VecDeque::new(),
			forwarded: 0,
		}
	}

	pub fn chat(&self) -> &ChatRef {
		&self.chat
	}

	/// Id of the last message the bridge confirmed.
	pub fn last_seen_marker(&self) -> Option<&str> {
		self.last_seen_marker.as_deref()
	}

	pub fn forwarded(&self) -> u64 {
		self.forwarded
	}

	/// Whether the bridge confirmed `id` recently.
	pub fn is_confirmed(&self, id: &str) -> bool {
		self.confirmed.iter().any(|seen| seen == id)
	}

	fn advance(&mut self, message: &SourceMessage) {
		self.last_seen_marker = Some(message.id.clone());
		self.last_seen_timestamp = self.last_seen_timestamp.max(message.timestamp);
		if self.confirmed.len() == CONFIRMED_ID_HISTORY {
			self.confirmed.pop_front();
		}
		self.confirmed.push_back(message.id.clone());
		self.forwarded += 1;
	}
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
	Idle,
	Forwarded(usize),
	/// A transient error cut the tick short after forwarding `forwarded` messages.
	Deferred { forwarded: usize },
}

/// Renders a source message as the text sent to the target.
pub fn format_forward(chat: &ChatRef, message: &SourceMessage) -> String {
	match message.sender.as_deref().filter(|s| !s.is_empty()) {
		Some(sender) => format!("[{}] {sender}: {}", chat.name, message.body),
		None => format!("[{}] {}", chat.name, message.body),
	}
}

/// Forwards one chat from a source session to a bridge.
pub struct RelayLoop<S, B> {
	source: Arc<S>,
	bridge: B,
	identity: String,
	recipients: Vec<String>,
	cursor: RelayCursor,
	pending: VecDeque<SourceMessage>,
	interval: Duration,
}

impl<S: SourceClient, B: BridgeClient> RelayLoop<S, B> {
	/// Relays `chat` to `identity`, which is both the sending account and the recipient.
	pub fn new(session: &SessionHandle<S>, bridge: B, identity: impl Into<String>, chat: ChatRef) -> Self {
		Self::resume(session, bridge, identity, RelayCursor::new(chat))
	}

	/// Continues from `cursor`, typically kept from a session that was lost and bootstrapped again.
	pub fn resume(session: &SessionHandle<S>, bridge: B, identity: impl Into<String>, cursor: RelayCursor) -> Self {
		let identity = identity.into();
		Self {
			source: Arc::clone(session.client()),
			bridge,
			recipients: vec![identity.clone()],
			identity,
			cursor,
			pending: VecDeque::new(),
			interval: DEFAULT_RELAY_INTERVAL,
		}
	}

	pub fn with_interval(mut self, interval: Duration) -> Self {
		self.interval = interval;
		self
	}

	pub fn cursor(&self) -> &RelayCursor {
		&self.cursor
	}

	/// Messages fetched but not yet confirmed by the bridge.
	pub fn pending(&self) -> usize {
		self.pending.len()
	}

	/// Runs one fetch-and-forward round.
	///
	/// Transient errors are logged and reported through the outcome; only a
	/// fatal session error is returned as `Err`.
	pub async fn tick(&mut self) -> Result<TickOutcome> {
		let chat = self.cursor.chat.clone();
		match self.source.fetch_unread(&chat).await {
			Ok(messages) => self.enqueue(messages),
			Err(err) if err.is_fatal_session() => return Err(err),
			Err(err) => {
				warn!(target: "wsr.relay", chat = %chat.name, error = %err, "fetch failed; retrying next tick");
				return Ok(TickOutcome::Deferred { forwarded: 0 });
			}
		}

		if self.pending.is_empty() {
			return Ok(TickOutcome::Idle);
		}

		let mut forwarded = 0;
		while let Some(message) = self.pending.front() {
			let text = format_forward(&chat, message);
			match self.bridge.send(&self.identity, &self.recipients, &text).await {
				Ok(delivery) => {
					debug!(target: "wsr.relay", id = %message.id, timestamp = %delivery.timestamp, "forwarded");
					self.cursor.advance(message);
					self.pending.pop_front();
					forwarded += 1;
				}
				Err(err) if err.is_fatal_session() => return Err(err),
				Err(err) => {
					warn!(
						target: "wsr.relay",
						id = %message.id,
						pending = self.pending.len(),
						error = %err,
						"forward failed; retrying next tick"
					);
					return Ok(TickOutcome::Deferred { forwarded });
				}
			}
		}

		info!(target: "wsr.relay", chat = %chat.name, count = forwarded, total = self.cursor.forwarded, "relayed messages");
		Ok(TickOutcome::Forwarded(forwarded))
	}

	pub fn into_cursor(self) -> RelayCursor {
		self.cursor
	}

	/// Ticks every `interval` until `cancel` fires or the session is lost.
	///
	/// Cancellation is checked between ticks; a forward in flight completes
	/// first. The cursor stays available through [`cursor`](Self::cursor)
	/// when a fatal session error ends the run.
	pub async fn run(&mut self, cancel: CancellationToken) -> Result<()> {
		info!(
			target: "wsr.relay",
			chat = %self.cursor.chat.name,
			interval_ms = self.interval.as_millis() as u64,
			"relay started"
		);

		while !cancel.is_cancelled() {
			self.tick().await?;

			tokio::select! {
				biased;
				_ = cancel.cancelled() => break,
				_ = tokio::time::sleep(self.interval) => {}
			}
		}

		info!(target: "wsr.relay", forwarded = self.cursor.forwarded, pending = self.pending.len(), "relay stopped");
		Ok(())
	}

	/// Queues messages that are neither confirmed nor already queued.
	///
	/// Messages up to the cursor marker are dropped. When the marker is no
	/// longer in the unread list (read elsewhere), messages older than the
	/// last confirmed timestamp are dropped instead; the boundary second and
	/// messages without a timestamp are deduplicated by id.
	fn enqueue(&mut self, messages: Vec<SourceMessage>) {
		let cursor = &self.cursor;
		let fresh: Vec<SourceMessage> = match cursor.last_seen_marker() {
			Some(marker) => match messages.iter().position(|m| m.id == marker) {
				Some(index) => messages.into_iter().skip(index + 1).collect(),
				None => {
					let after = cursor.last_seen_timestamp;
					messages
						.into_iter()
						.filter(|m| m.timestamp == 0 || m.timestamp >= after)
						.collect()
				}
			},
			None => messages,
		};

		for message in fresh {
			if self.cursor.is_confirmed(&message.id) {
				continue;
			}
			if !self.pending.iter().any(|queued| queued.id == message.id) {
				self.pending.push_back(message);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use std::path::PathBuf;

	use async_trait::async_trait;
	use parking_lot::Mutex;

	use super::*;
	use crate::bridge::Delivery;
	use crate::error::RelayError;
	use crate::qr::QrArtifactStore;
	use crate::session::{BootstrapOptions, SessionBootstrap};

	#[derive(Default)]
	struct ScriptedSource {
		batches: Mutex<VecDeque<Result<Vec<SourceMessage>>>>,
	}

	#[async_trait]
	impl SourceClient for ScriptedSource {
		async fn request_pairing_artifact(&self) -> Result<PathBuf> {
			Err(RelayError::Cdp("not needed".to_string()))
		}

		async fn is_logged_in(&self) -> Result<bool> {
			Ok(true)
		}

		async fn list_chats(&self) -> Result<Vec<ChatRef>> {
			Ok(Vec::new())
		}

		async fn fetch_unread(&self, _chat: &ChatRef) -> Result<Vec<SourceMessage>> {
			self.batches.lock().pop_front().unwrap_or_else(|| Ok(Vec::new()))
		}
	}

	#[derive(Default)]
	struct RecordingBridge {
		sent: Mutex<Vec<String>>,
		fail_next: Mutex<usize>,
	}

	#[async_trait]
	impl BridgeClient for RecordingBridge {
		async fn register(&self, _identity: &str) -> Result<()> {
			Ok(())
		}

		async fn send(&self, _identity: &str, _recipients: &[String], text: &str) -> Result<Delivery> {
			let mut fail = self.fail_next.lock();
			if *fail > 0 {
				*fail -= 1;
				return Err(RelayError::TransientForward("bridge busy".to_string()));
			}
			self.sent.lock().push(text.to_string());
			Ok(Delivery {
				timestamp: "1".to_string(),
			})
		}
	}

	fn chat() -> ChatRef {
		ChatRef {
			id: "c1".to_string(),
			name: "RelayTestWapp".to_string(),
		}
	}

	fn message(id: &str, body: &str) -> SourceMessage {
		SourceMessage {
			id: id.to_string(),
			chat_id: "c1".to_string(),
			sender: Some("Ann".to_string()),
			body: body.to_string(),
			timestamp: id.trim_start_matches('m').parse().unwrap_or(0),
		}
	}

	fn stamped(id: &str, timestamp: i64) -> SourceMessage {
		SourceMessage {
			timestamp,
			..message(id, id)
		}
	}

	async fn session(source: ScriptedSource) -> SessionHandle<ScriptedSource> {
		let tmp = std::env::temp_dir().join("wsr-relay-tests");
		SessionBootstrap::new(Arc::new(source), QrArtifactStore::new(tmp), BootstrapOptions::default())
			.establish()
			.await
			.unwrap()
	}

	#[tokio::test]
	async fn unread_messages_are_forwarded_once_in_order() {
		let source = ScriptedSource::default();
		let batch = vec![message("m1", "one"), message("m2", "two"), message("m3", "three")];
		source.batches.lock().push_back(Ok(batch.clone()));
		source.batches.lock().push_back(Ok(batch));
		let session = session(source).await;
		let bridge = Arc::new(RecordingBridge::default());
		let mut relay = RelayLoop::new(&session, Arc::clone(&bridge), "+31612345678", chat());

		assert_eq!(relay.tick().await.unwrap(), TickOutcome::Forwarded(3));
		assert_eq!(relay.tick().await.unwrap(), TickOutcome::Idle);
		assert_eq!(*bridge.sent.lock(), vec!["[RelayTestWapp] Ann: one", "[RelayTestWapp] Ann: two", "[RelayTestWapp] Ann: three"]);
		assert_eq!(relay.cursor().forwarded(), 3);
		assert_eq!(relay.pending(), 0);
	}

	#[tokio::test]
	async fn marker_read_elsewhere_falls_back_to_timestamp() {
		let source = ScriptedSource::default();
		source.batches.lock().push_back(Ok(vec![message("m1", "one"), message("m2", "two")]));
		source.batches.lock().push_back(Ok(vec![message("m1", "one"), message("m3", "three")]));
		let session = session(source).await;
		let bridge = Arc::new(RecordingBridge::default());
		let mut relay = RelayLoop::new(&session, Arc::clone(&bridge), "+31612345678", chat());

		relay.tick().await.unwrap();
		assert_eq!(relay.tick().await.unwrap(), TickOutcome::Forwarded(1));
		assert_eq!(bridge.sent.lock().last().map(String::as_str), Some("[RelayTestWapp] Ann: three"));
	}

	#[tokio::test]
	async fn failed_forward_is_retried_first_without_advancing() {
		let source = ScriptedSource::default();
		source.batches.lock().push_back(Ok(vec![message("m1", "one"), message("m2", "two")]));
		source.batches.lock().push_back(Ok(vec![message("m2", "two"), message("m3", "three")]));
		let session = session(source).await;

		let bridge = Arc::new(RecordingBridge::default());
		*bridge.fail_next.lock() = 1;
		let mut relay = RelayLoop::new(&session, Arc::clone(&bridge), "+31612345678", chat());

		assert_eq!(relay.tick().await.unwrap(), TickOutcome::Deferred { forwarded: 0 });
		assert_eq!(relay.cursor().last_seen_marker(), None);
		assert_eq!(relay.pending(), 2);

		assert_eq!(relay.tick().await.unwrap(), TickOutcome::Forwarded(3));
		assert_eq!(relay.cursor().last_seen_marker(), Some("m3"));
		assert_eq!(*bridge.sent.lock(), vec!["[RelayTestWapp] Ann: one", "[RelayTestWapp] Ann: two", "[RelayTestWapp] Ann: three"]);
	}

	#[tokio::test]
	async fn transient_fetch_error_skips_tick_and_fatal_error_propagates() {
		let source = ScriptedSource::default();
		source.batches.lock().push_back(Err(RelayError::TransientFetch("timeout".to_string())));
		source.batches.lock().push_back(Err(RelayError::FatalSession("logged out".to_string())));
		let session = session(source).await;
		let bridge = Arc::new(RecordingBridge::default());
		let mut relay = RelayLoop::new(&session, Arc::clone(&bridge), "+31612345678", chat());

		assert_eq!(relay.tick().await.unwrap(), TickOutcome::Deferred { forwarded: 0 });
		assert!(matches!(relay.tick().await, Err(RelayError::FatalSession(_))));
		assert!(bridge.sent.lock().is_empty());
	}

	#[tokio::test]
	async fn already_confirmed_messages_are_not_resent() {
		let source = ScriptedSource::default();
		source.batches.lock().push_back(Ok(vec![message("m1", "one")]));
		source.batches.lock().push_back(Ok(vec![message("m1", "one"), message("m2", "two")]));
		let session = session(source).await;
		let bridge = Arc::new(RecordingBridge::default());
		let mut relay = RelayLoop::new(&session, Arc::clone(&bridge), "+31612345678", chat());

		relay.tick().await.unwrap();
		relay.tick().await.unwrap();
		assert_eq!(bridge.sent.lock().len(), 2);
		assert_eq!(relay.cursor().forwarded(), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn run_stops_on_cancellation() {
		let session = session(ScriptedSource::default()).await;
		let bridge = Arc::new(RecordingBridge::default());
		let mut relay = RelayLoop::new(&session, Arc::clone(&bridge), "+31612345678", chat()).with_interval(Duration::from_secs(2));

		let cancel = CancellationToken::new();
		let trigger = cancel.clone();
		tokio::spawn(async move {
			tokio::time::sleep(Duration::from_secs(7)).await;
			trigger.cancel();
		});

		relay.run(cancel).await.unwrap();
		let cursor = relay.into_cursor();
		assert_eq!(cursor.forwarded(), 0);
		assert_eq!(cursor.chat(), &chat());
	}

	#[tokio::test]
	async fn same_second_message_after_marker_read_elsewhere_is_forwarded() {
		let source = ScriptedSource::default();
		source.batches.lock().push_back(Ok(vec![stamped("a", 100)]));
		source.batches.lock().push_back(Ok(vec![stamped("b", 100)]));
		source.batches.lock().push_back(Ok(vec![stamped("a", 100), stamped("b", 100)]));
		let session = session(source).await;
		let bridge = Arc::new(RecordingBridge::default());
		let mut relay = RelayLoop::new(&session, Arc::clone(&bridge), "+31612345678", chat());

		assert_eq!(relay.tick().await.unwrap(), TickOutcome::Forwarded(1));
		assert_eq!(relay.tick().await.unwrap(), TickOutcome::Forwarded(1));
		assert_eq!(relay.tick().await.unwrap(), TickOutcome::Idle);
		assert_eq!(*bridge.sent.lock(), vec!["[RelayTestWapp] Ann: a", "[RelayTestWapp] Ann: b"]);
	}

	#[tokio::test]
	async fn messages_without_timestamps_are_deduplicated_by_id() {
		let source = ScriptedSource::default();
		source.batches.lock().push_back(Ok(vec![stamped("x", 0), stamped("y", 0)]));
		source.batches.lock().push_back(Ok(vec![stamped("y", 0), stamped("z", 0)]));
		source.batches.lock().push_back(Ok(vec![stamped("w", 0)]));
		let session = session(source).await;
		let bridge = Arc::new(RecordingBridge::default());
		let mut relay = RelayLoop::new(&session, Arc::clone(&bridge), "+31612345678", chat());

		assert_eq!(relay.tick().await.unwrap(), TickOutcome::Forwarded(2));
		assert_eq!(relay.tick().await.unwrap(), TickOutcome::Forwarded(1));
		assert_eq!(relay.tick().await.unwrap(), TickOutcome::Forwarded(1));
		assert_eq!(relay.cursor().forwarded(), 4);
		assert_eq!(bridge.sent.lock().last().map(String::as_str), Some("[RelayTestWapp] Ann: w"));
	}

	#[tokio::test]
	async fn resumed_cursor_does_not_resend_after_session_loss() {
		let first = ScriptedSource::default();
		first.batches.lock().push_back(Ok(vec![message("m1", "one"), message("m2", "two")]));
		first.batches.lock().push_back(Err(RelayError::FatalSession("logged out".to_string())));
		let session_one = session(first).await;
		let bridge = Arc::new(RecordingBridge::default());
		let mut relay = RelayLoop::new(&session_one, Arc::clone(&bridge), "+31612345678", chat());

		assert_eq!(relay.tick().await.unwrap(), TickOutcome::Forwarded(2));
		assert!(relay.tick().await.unwrap_err().is_fatal_session());
		let cursor = relay.into_cursor();

		let second = ScriptedSource::default();
		second.batches.lock().push_back(Ok(vec![message("m1", "one"), message("m2", "two"), message("m3", "three")]));
		let session_two = session(second).await;
		let mut relay = RelayLoop::resume(&session_two, Arc::clone(&bridge), "+31612345678", cursor);

		assert_eq!(relay.tick().await.unwrap(), TickOutcome::Forwarded(1));
		assert_eq!(bridge.sent.lock().len(), 3);
		assert_eq!(relay.cursor().forwarded(), 3);
	}

	#[test]
	fn format_forward_omits_missing_sender() {
		let mut msg = message("m1", "hello");
		assert_eq!(format_forward(&chat(), &msg), "[RelayTestWapp] Ann: hello");
		msg.sender = None;
		assert_eq!(format_forward(&chat(), &msg), "[RelayTestWapp] hello");
	}
}
