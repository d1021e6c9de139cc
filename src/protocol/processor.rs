use serde_json::Value;
use tracing::{debug, info, warn};

use super::{
    gossip,
    message::{Body, Envelope, Payload},
    state::NodeState,
    topology::Topology,
};

/*
    Dispatch is a pure state machine. One inbound request goes in, the
    ordered list of envelopes it causes comes out: gossip requests first,
    the reply to the caller last. Every envelope produced here takes the
    next msg_id from the node's counter.

    Responses never get here. The runtime hands them to the RPC engine, and
    if one slips through anyway it is dropped without touching the counter.
*/

pub struct MessageProcessor {
    pub state: NodeState,
}

impl MessageProcessor {
    pub fn new() -> Self {
        MessageProcessor {
            state: NodeState::new(),
        }
    }

    pub fn handle(&mut self, request: Envelope) -> Vec<Envelope> {
        let Envelope { src, body, .. } = request;
        let Body {
            payload, msg_id, ..
        } = body;

        match payload {
            Payload::Init { node_id, node_ids } => {
                vec![self.handle_init(&src, msg_id, node_id, node_ids)]
            }
            Payload::Echo { echo } => vec![self.handle_echo(&src, msg_id, echo)],
            Payload::Generate => vec![self.handle_generate(&src, msg_id)],
            Payload::Broadcast { message } => self.handle_broadcast(&src, msg_id, message),
            Payload::Read => vec![self.handle_read(&src, msg_id)],
            Payload::Topology { topology } => vec![self.handle_topology(&src, msg_id, topology)],
            Payload::Unknown => {
                warn!(from = %src, ?msg_id, "Unsupported request type");
                vec![self.reply(&src, msg_id, Payload::not_supported())]
            }
            response @ (Payload::InitOk
            | Payload::EchoOk { .. }
            | Payload::GenerateOk { .. }
            | Payload::BroadcastOk
            | Payload::ReadOk { .. }
            | Payload::TopologyOk
            | Payload::Error { .. }) => {
                debug!(from = %src, kind = response.kind(), "Ignoring response in dispatch");
                Vec::new()
            }
        }
    }

    fn handle_init(
        &mut self,
        src: &str,
        msg_id: Option<u64>,
        node_id: String,
        node_ids: Vec<String>,
    ) -> Envelope {
        info!(node_id = %node_id, peers = node_ids.len(), "Initialised");
        self.state.init(node_id, node_ids);
        self.reply(src, msg_id, Payload::InitOk)
    }

    fn handle_echo(&mut self, src: &str, msg_id: Option<u64>, echo: Value) -> Envelope {
        self.reply(src, msg_id, Payload::EchoOk { echo })
    }

    fn handle_generate(&mut self, src: &str, msg_id: Option<u64>) -> Envelope {
        // The id embeds the msg_id this very reply is stamped with.
        let id = format!("{}-{}", self.state.id, self.state.peek_msg_id());
        self.reply(src, msg_id, Payload::GenerateOk { id })
    }

    fn handle_broadcast(&mut self, src: &str, msg_id: Option<u64>, message: i64) -> Vec<Envelope> {
        let targets = gossip::fanout(
            &mut self.state.log,
            &self.state.topology,
            &self.state.id,
            src,
            message,
        );

        if targets.is_empty() {
            debug!(message, from = %src, "No fanout for broadcast");
        } else {
            debug!(message, from = %src, targets = ?targets, "Gossiping broadcast");
        }

        let mut outbound: Vec<Envelope> = targets
            .into_iter()
            .map(|target| self.request(target, Payload::Broadcast { message }))
            .collect();
        outbound.push(self.reply(src, msg_id, Payload::BroadcastOk));
        outbound
    }

    fn handle_read(&mut self, src: &str, msg_id: Option<u64>) -> Envelope {
        let messages = self.state.log.messages();
        self.reply(src, msg_id, Payload::ReadOk { messages })
    }

    fn handle_topology(&mut self, src: &str, msg_id: Option<u64>, topology: Topology) -> Envelope {
        info!(nodes = topology.neighbors.len(), "Topology replaced");
        self.state.topology = topology;
        self.reply(src, msg_id, Payload::TopologyOk)
    }

    fn reply(&mut self, dest: &str, in_reply_to: Option<u64>, payload: Payload) -> Envelope {
        let body = Body::new(payload)
            .with_msg_id(self.state.take_msg_id())
            .with_in_reply_to(in_reply_to);
        Envelope::new(self.state.id.clone(), dest, body)
    }

    fn request(&mut self, dest: String, payload: Payload) -> Envelope {
        let body = Body::new(payload).with_msg_id(self.state.take_msg_id());
        Envelope::new(self.state.id.clone(), dest, body)
    }
}

impl Default for MessageProcessor {
    fn default() -> Self {
        MessageProcessor::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use serde_json::json;

    use super::*;

    fn envelope(src: &str, dest: &str, msg_id: Option<u64>, payload: Payload) -> Envelope {
        let mut body = Body::new(payload);
        body.msg_id = msg_id;
        Envelope::new(src, dest, body)
    }

    fn initialised(node_id: &str) -> MessageProcessor {
        let mut processor = MessageProcessor::new();
        let init = Payload::Init {
            node_id: node_id.to_string(),
            node_ids: vec!["a".to_string(), "b".to_string(), "c".to_string()],
        };
        processor.handle(envelope("c0", node_id, Some(1), init));
        processor
    }

    fn broadcast_to(
        processor: &mut MessageProcessor,
        src: &str,
        msg_id: u64,
        message: i64,
    ) -> Vec<Envelope> {
        let dest = processor.state.id.clone();
        processor.handle(envelope(src, &dest, Some(msg_id), Payload::Broadcast { message }))
    }

    #[test]
    fn test_handle_init() {
        // Arrange
        let mut processor = MessageProcessor::new();
        let request = envelope(
            "c0",
            "n1",
            Some(4),
            Payload::Init {
                node_id: "n1".to_string(),
                node_ids: vec!["n1".to_string(), "n2".to_string()],
            },
        );

        // Act
        let out = processor.handle(request);

        // Assert
        assert_eq!(processor.state.id, "n1");
        assert_eq!(processor.state.peers, vec!["n1", "n2"]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].src, "n1");
        assert_eq!(out[0].dest, "c0");
        assert_eq!(out[0].body.payload, Payload::InitOk);
        assert_eq!(out[0].body.msg_id, Some(0));
        assert_eq!(out[0].body.in_reply_to, Some(4));
    }

    #[test]
    fn test_handle_init_without_msg_id() {
        let mut processor = MessageProcessor::new();
        let request = envelope(
            "c0",
            "n1",
            None,
            Payload::Init {
                node_id: "n1".to_string(),
                node_ids: vec![],
            },
        );

        let out = processor.handle(request);

        assert_eq!(out[0].body.in_reply_to, None);
        assert_eq!(out[0].body.msg_id, Some(0));
    }

    #[test]
    fn test_handle_echo_wire() {
        let mut processor = MessageProcessor::new();
        processor.state.init("n1".to_string(), vec!["n1".to_string()]);

        let request = Envelope::from_line(
            r#"{"src":"c1","dest":"n1","body":{"type":"echo","msg_id":1,"echo":"hi"}}"#,
        )
        .unwrap();
        let out = processor.handle(request);

        assert_eq!(out.len(), 1);
        assert_eq!(
            serde_json::to_value(&out[0]).unwrap(),
            json!({
                "src": "n1",
                "dest": "c1",
                "body": {"type": "echo_ok", "msg_id": 0, "in_reply_to": 1, "echo": "hi"}
            })
        );
    }

    #[test]
    fn test_handle_echo_structured_payload() {
        let mut processor = initialised("a");
        let echo = json!({"nested": [1, 2, {"x": null}]});

        let request = envelope("c1", "a", Some(2), Payload::Echo { echo: echo.clone() });
        let out = processor.handle(request);

        assert_eq!(out[0].body.payload, Payload::EchoOk { echo });
    }

    #[test]
    fn test_handle_generate_unique() {
        let mut processor = initialised("a");
        let mut ids = HashSet::new();

        for msg_id in 0..100 {
            let out = processor.handle(envelope("c1", "a", Some(msg_id), Payload::Generate));
            match &out[0].body.payload {
                Payload::GenerateOk { id } => {
                    assert!(ids.insert(id.clone()), "duplicate id {}", id);
                }
                other => panic!("Wrong Payload Type: {:?}", other),
            }
        }

        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn test_handle_generate_embeds_msg_id() {
        let mut processor = initialised("a");

        let out = processor.handle(envelope("c1", "a", Some(9), Payload::Generate));

        assert_eq!(out[0].body.msg_id, Some(1));
        assert_eq!(out[0].body.payload, Payload::GenerateOk { id: "a-1".to_string() });
    }

    #[test]
    fn test_handle_topology_replaces() {
        let mut processor = initialised("a");

        let first = Topology::from([("a", &["b"][..]), ("b", &["a"][..])]);
        let second = Topology::from([("a", &["c"][..])]);
        processor.handle(envelope("c1", "a", Some(2), Payload::Topology { topology: first }));
        let request = envelope("c1", "a", Some(3), Payload::Topology { topology: second.clone() });
        let out = processor.handle(request);

        assert_eq!(out[0].body.payload, Payload::TopologyOk);
        assert_eq!(out[0].body.in_reply_to, Some(3));
        assert_eq!(processor.state.topology, second);
    }

    #[test]
    fn test_handle_broadcast_fanout() {
        // Arrange: topology {a: [b, c]}, value arrives at a from c
        let mut processor = initialised("a");
        processor.state.topology = Topology::from([("a", &["b", "c"][..])]);
        let counter = processor.state.peek_msg_id();

        // Act
        let out = broadcast_to(&mut processor, "c", 11, 5);

        // Assert: one copy to b, then the ack to c
        assert_eq!(out.len(), 2);

        assert_eq!(out[0].src, "a");
        assert_eq!(out[0].dest, "b");
        assert_eq!(out[0].body.payload, Payload::Broadcast { message: 5 });
        assert_eq!(out[0].body.msg_id, Some(counter));
        assert_eq!(out[0].body.in_reply_to, None);

        assert_eq!(out[1].dest, "c");
        assert_eq!(out[1].body.payload, Payload::BroadcastOk);
        assert_eq!(out[1].body.msg_id, Some(counter + 1));
        assert_eq!(out[1].body.in_reply_to, Some(11));

        assert_eq!(processor.state.peek_msg_id(), counter + 2);
    }

    #[test]
    fn test_handle_broadcast_idempotent() {
        let mut processor = initialised("a");
        processor.state.topology = Topology::from([("a", &["b", "c"][..])]);

        let first = broadcast_to(&mut processor, "client", 2, 8);
        let second = broadcast_to(&mut processor, "client", 3, 8);

        assert_eq!(first.len(), 3);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].body.payload, Payload::BroadcastOk);
        assert_eq!(second[0].body.in_reply_to, Some(3));

        let read = processor.handle(envelope("client", "a", Some(4), Payload::Read));
        assert_eq!(read[0].body.payload, Payload::ReadOk { messages: vec![8] });
    }

    #[test]
    fn test_handle_read_in_arrival_order() {
        let mut processor = initialised("a");
        for (msg_id, message) in [(2, 30), (3, 10), (4, 20)] {
            broadcast_to(&mut processor, "client", msg_id, message);
        }

        let out = processor.handle(envelope("client", "a", Some(5), Payload::Read));

        assert_eq!(out[0].body.payload, Payload::ReadOk { messages: vec![30, 10, 20] });
    }

    #[test]
    fn test_handle_unknown() {
        let mut processor = initialised("a");

        let out = processor.handle(envelope("c1", "a", Some(6), Payload::Unknown));

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].body.payload, Payload::not_supported());
        assert_eq!(out[0].body.in_reply_to, Some(6));
    }

    #[test]
    fn test_handle_response_is_silent() {
        let mut processor = initialised("a");
        let counter = processor.state.peek_msg_id();

        let mut response = envelope("b", "a", Some(3), Payload::BroadcastOk);
        response.body.in_reply_to = Some(0);
        let out = processor.handle(response);

        assert!(out.is_empty());
        assert_eq!(processor.state.peek_msg_id(), counter);
    }
}
