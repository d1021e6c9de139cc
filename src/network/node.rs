use tokio::sync::mpsc::{self, Receiver, UnboundedReceiver};
use tracing::{debug, error, info};

use super::rpc::{Outbox, RpcEngine};
use crate::{
    common::{Config, Result},
    protocol::{Envelope, MessageProcessor},
};

/// Owns the node's state and pending requests. Inbound envelopes and timer
/// expiries are handled one at a time by `run`, so neither ever sees the
/// other half-done.
pub struct Node {
    pub processor: MessageProcessor,
    pub rpc: RpcEngine,
    msg_rx: Receiver<Envelope>,
    timeout_rx: UnboundedReceiver<u64>,
}

impl Node {
    pub fn new(config: &Config, msg_rx: Receiver<Envelope>, outbox: Outbox) -> Self {
        let (timeout_tx, timeout_rx) = mpsc::unbounded_channel();

        Node {
            processor: MessageProcessor::new(),
            rpc: RpcEngine::new(config.rpc_timeout(), outbox, timeout_tx),
            msg_rx,
            timeout_rx,
        }
    }

    /// Runs until the inbound channel closes.
    pub async fn run(&mut self) -> Result<()> {
        info!("Running node");
        loop {
            tokio::select! {
                message = self.msg_rx.recv() => match message {
                    Some(envelope) => {
                        self.on_message(envelope);
                        self.drain_timeouts();
                    }
                    None => break,
                },
                Some(msg_id) = self.timeout_rx.recv() => self.rpc.on_timeout(msg_id),
            }
        }

        info!(
            node_id = %self.processor.state.id,
            unanswered = self.rpc.pending_len(),
            "Inbound closed, stopping"
        );
        Ok(())
    }

    /// Expired timers are served between inbound messages so a backlog of
    /// input cannot hold retries back.
    fn drain_timeouts(&mut self) {
        while let Ok(msg_id) = self.timeout_rx.try_recv() {
            self.rpc.on_timeout(msg_id);
        }
    }

    /// Routes responses to the RPC engine and everything else through
    /// dispatch. Replies are sent once. Requests are issued through the RPC
    /// engine; the task spawned per request only waits on its completion
    /// handle to log the reply, retries stay with the engine.
    pub fn on_message(&mut self, envelope: Envelope) {
        debug!(
            from = %envelope.src,
            kind = envelope.body.payload.kind(),
            msg_id = ?envelope.body.msg_id,
            "Received"
        );

        if envelope.is_response() {
            self.rpc.resolve(envelope);
            return;
        }

        for outbound in self.processor.handle(envelope) {
            if outbound.is_response() {
                self.rpc.send(outbound);
                continue;
            }

            let dest = outbound.dest.clone();
            match self.rpc.issue_request(outbound) {
                Ok(reply_rx) => {
                    tokio::spawn(async move {
                        if let Ok(reply) = reply_rx.await {
                            debug!(
                                from = %reply.src,
                                kind = reply.body.payload.kind(),
                                "Request completed"
                            );
                        }
                    });
                }
                Err(err) => error!(dest = %dest, "Could not issue request: {}", err),
            }
        }
    }
}
