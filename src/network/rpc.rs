use std::{collections::HashMap, time::Duration};

use tokio::{
    sync::{mpsc::UnboundedSender, oneshot},
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::{
    common::{NodeError, Result},
    protocol::Envelope,
};

/*
    The outbox is fire-and-forget: a message handed to it may never arrive.
    Requests this node originates go through the RpcEngine instead, which
    keeps them in a pending table keyed by msg_id and re-sends the same
    envelope every `timeout` until a reply with a matching in_reply_to
    shows up. There is no attempt limit and no backoff.

    Timers never touch the table. They post the expired msg_id back to the
    owning task, which checks the table again before re-sending, so a reply
    processed first always wins.
*/

pub type Outbox = UnboundedSender<Envelope>;
pub type TimeoutSender = UnboundedSender<u64>;

struct PendingRpc {
    envelope: Envelope,
    reply_tx: oneshot::Sender<Envelope>,
    timer: JoinHandle<()>,
    attempts: u32,
}

pub struct RpcEngine {
    timeout: Duration,
    outbox: Outbox,
    timeout_tx: TimeoutSender,
    pending: HashMap<u64, PendingRpc>,
}

impl RpcEngine {
    pub fn new(timeout: Duration, outbox: Outbox, timeout_tx: TimeoutSender) -> Self {
        RpcEngine {
            timeout,
            outbox,
            timeout_tx,
            pending: HashMap::new(),
        }
    }

    /// Sends without tracking. Used for replies.
    pub fn send(&self, envelope: Envelope) {
        if self.outbox.send(envelope).is_err() {
            warn!("Outbox closed, dropping envelope");
        }
    }

    /// Sends `envelope` and keeps re-sending it until answered. The returned
    /// receiver yields the reply.
    pub fn issue_request(&mut self, envelope: Envelope) -> Result<oneshot::Receiver<Envelope>> {
        let msg_id = envelope.body.msg_id.ok_or_else(|| NodeError::MissingMsgId {
            dest: envelope.dest.clone(),
        })?;

        let (reply_tx, reply_rx) = oneshot::channel();
        let timer = spawn_timer(self.timeout, msg_id, self.timeout_tx.clone());
        self.send(envelope.clone());

        if let Some(stale) = self.pending.insert(
            msg_id,
            PendingRpc {
                envelope,
                reply_tx,
                timer,
                attempts: 1,
            },
        ) {
            // msg_ids are never reused, so this only happens on a caller bug
            stale.timer.abort();
            warn!(msg_id, "Replaced pending request with the same msg_id");
        }

        Ok(reply_rx)
    }

    /// Called by the owner when a timer posted `msg_id`.
    pub fn on_timeout(&mut self, msg_id: u64) {
        let Some(entry) = self.pending.get_mut(&msg_id) else {
            return;
        };

        entry.attempts += 1;
        debug!(
            msg_id,
            dest = %entry.envelope.dest,
            attempt = entry.attempts,
            "No reply, re-sending"
        );

        let envelope = entry.envelope.clone();
        entry.timer = spawn_timer(self.timeout, msg_id, self.timeout_tx.clone());
        self.send(envelope);
    }

    /// Matches a reply to its pending request. Returns false for replies
    /// nobody is waiting on: late duplicates or ids never issued.
    pub fn resolve(&mut self, response: Envelope) -> bool {
        let Some(in_reply_to) = response.body.in_reply_to else {
            debug!(from = %response.src, "Response without in_reply_to");
            return false;
        };

        let Some(entry) = self.pending.remove(&in_reply_to) else {
            debug!(in_reply_to, from = %response.src, "Unmatched response");
            return false;
        };

        entry.timer.abort();
        debug!(
            in_reply_to,
            from = %response.src,
            attempts = entry.attempts,
            "Request answered"
        );
        // The caller may have stopped listening; that is fine.
        let _ = entry.reply_tx.send(response);
        true
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

impl Drop for RpcEngine {
    fn drop(&mut self) {
        for entry in self.pending.values() {
            entry.timer.abort();
        }
    }
}

fn spawn_timer(timeout: Duration, msg_id: u64, timeout_tx: TimeoutSender) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        let _ = timeout_tx.send(msg_id);
    })
}
