//! Long-poll synchronization for one conversation.
//!
//! [`spawn`] starts a background task that owns the conversation's message
//! sequence and is its *only* writer: new batches arrive from the gateway's
//! poll endpoint, local echoes arrive through the handle's mailbox, and
//! after every change the subscriber receives a fresh snapshot of the full
//! sequence. Poll failures are swallowed (the loop keeps going); the pause
//! between iterations comes from the configured [`PollPolicy`].
//!
//! Cancellation is token-based and prompt: the loop checks the token at the
//! top of each iteration *and* races it against the in-flight poll, so an
//! outstanding long-poll is aborted instead of running out its 30 s hold.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::retry::PollPolicy;
use crate::types::ChatMessage;
use crate::Client;

// ─── Cursor ───────────────────────────────────────────────────────────────────

/// The synchronization cursor: the highest gateway-assigned id in the held
/// sequence, 0 when it is empty. Locally-echoed entries hold id 0 and so
/// never move the cursor past a real id.
pub fn cursor_after(messages: &[ChatMessage]) -> i64 {
    messages.iter().map(|m| m.id).max().unwrap_or(0)
}

// ─── Feed ─────────────────────────────────────────────────────────────────────

/// Subscriber side: receives a snapshot of the full message sequence after
/// every change (poll merge or local echo).
pub struct MessageFeed {
    rx: mpsc::UnboundedReceiver<Vec<ChatMessage>>,
}

impl MessageFeed {
    /// Wait for the next snapshot. Returns `None` once the synchronizer has
    /// been cancelled and its task has exited.
    pub async fn next(&mut self) -> Option<Vec<ChatMessage>> {
        self.rx.recv().await
    }
}

// ─── Handle ───────────────────────────────────────────────────────────────────

/// Control handle for a running synchronizer. At most one synchronizer per
/// conversation should be alive; cancel the old one before starting anew.
pub struct SyncHandle {
    cancel: CancellationToken,
    echo_tx: mpsc::UnboundedSender<ChatMessage>,
    task: Option<JoinHandle<()>>,
}

impl SyncHandle {
    /// Append a locally-echoed message to the held sequence.
    ///
    /// Routed through the synchronizer's mailbox so the sequence has a
    /// single writer; call this after (and only after) a successful
    /// [`Client::send_message`].
    pub fn echo(&self, message: ChatMessage) {
        let _ = self.echo_tx.send(message);
    }

    /// Stop the loop. An in-flight poll is aborted; no further feed
    /// notifications are delivered after this returns.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// `true` until the background task has exited.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Cancel and wait for the background task to exit.
    pub async fn join(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        // Dropping the handle must not leave an orphan loop polling forever.
        self.cancel.cancel();
    }
}

// ─── Spawn ────────────────────────────────────────────────────────────────────

/// Start synchronizing `conversation_id`, seeded with the already-fetched
/// history (may be empty). Returns the control handle and the subscriber
/// feed.
pub fn spawn(
    client: Client,
    conversation_id: impl Into<String>,
    seed: Vec<ChatMessage>,
    policy: Arc<dyn PollPolicy>,
) -> (SyncHandle, MessageFeed) {
    let conversation_id = conversation_id.into();
    let cancel = CancellationToken::new();
    let (echo_tx, echo_rx) = mpsc::unbounded_channel();
    let (feed_tx, feed_rx) = mpsc::unbounded_channel();

    let task = tokio::spawn(run_loop(
        client,
        conversation_id,
        seed,
        policy,
        cancel.clone(),
        echo_rx,
        feed_tx,
    ));

    (SyncHandle { cancel, echo_tx, task: Some(task) }, MessageFeed { rx: feed_rx })
}

async fn run_loop(
    client: Client,
    conversation_id: String,
    mut messages: Vec<ChatMessage>,
    policy: Arc<dyn PollPolicy>,
    cancel: CancellationToken,
    mut echo_rx: mpsc::UnboundedReceiver<ChatMessage>,
    feed_tx: mpsc::UnboundedSender<Vec<ChatMessage>>,
) {
    let mut failures = 0u32;

    log::debug!("[wicket] sync loop started for {conversation_id}");
    loop {
        if cancel.is_cancelled() {
            break;
        }

        tokio::select! {
            _ = cancel.cancelled() => break,

            // A local echo arrived mid-poll: merge it and re-issue the poll.
            // The cursor is unchanged, so the aborted poll loses nothing.
            Some(echo) = echo_rx.recv() => {
                messages.push(echo);
                let _ = feed_tx.send(messages.clone());
                continue;
            }

            result = client.poll(&conversation_id, cursor_after(&messages)) => {
                match result {
                    Ok(batch) if batch.has_new && !batch.messages.is_empty() => {
                        failures = 0;
                        // Server-provided order, never re-sorted.
                        messages.extend(batch.messages);
                        let _ = feed_tx.send(messages.clone());
                    }
                    Ok(_) => failures = 0,
                    Err(e) => {
                        // Transient poll failures never reach the subscriber.
                        failures += 1;
                        log::debug!(
                            "[wicket] poll failed for {conversation_id} \
                             ({failures} in a row): {e}"
                        );
                    }
                }
            }
        }

        // Pause between iterations, still draining echoes and honoring
        // cancellation.
        let pause = tokio::time::sleep(policy.next_delay(failures));
        tokio::pin!(pause);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                Some(echo) = echo_rx.recv() => {
                    messages.push(echo);
                    let _ = feed_tx.send(messages.clone());
                }
                _ = &mut pause => break,
            }
        }
    }
    log::debug!("[wicket] sync loop stopped for {conversation_id}");
}

// ─── Tests ────────────────────────────────────────────────────────────────────
