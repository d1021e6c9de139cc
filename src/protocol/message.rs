use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::topology::Topology;
use crate::common::Result;

/*
    Every message on the wire is an envelope {src, dest, body}. The body is
    tagged by its "type" field and may carry a msg_id. Replies also carry
    in_reply_to, the msg_id of the request they answer.

    A known type whose fields fail to decode is a parse failure and never
    reaches dispatch. A well-formed envelope with a type nobody recognises
    decodes to Payload::Unknown so the sender gets an error reply.
*/

/// Error code sent back for request types this node does not implement.
pub const ERROR_NOT_SUPPORTED: u32 = 10;
pub const ERROR_NOT_SUPPORTED_TEXT: &str = "Unsupported request message";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub src: String,
    pub dest: String,
    pub body: Body,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Body {
    #[serde(flatten)]
    pub payload: Payload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Init { node_id: String, node_ids: Vec<String> },
    InitOk,
    Echo { echo: Value },
    EchoOk { echo: Value },
    Generate,
    GenerateOk { id: String },
    Broadcast { message: i64 },
    BroadcastOk,
    Read,
    ReadOk { messages: Vec<i64> },
    Topology { topology: Topology },
    TopologyOk,
    Error { code: u32, text: String },
    #[serde(other)]
    Unknown,
}

impl Envelope {
    pub fn new(src: impl Into<String>, dest: impl Into<String>, body: Body) -> Self {
        Envelope {
            src: src.into(),
            dest: dest.into(),
            body,
        }
    }

    pub fn from_line(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line)?)
    }

    pub fn from_slice(line: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(line)?)
    }

    pub fn to_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn is_response(&self) -> bool {
        self.body.payload.is_response()
    }
}

impl Body {
    pub fn new(payload: Payload) -> Self {
        Body {
            payload,
            msg_id: None,
            in_reply_to: None,
        }
    }

    pub fn with_msg_id(mut self, msg_id: u64) -> Self {
        self.msg_id = Some(msg_id);
        self
    }

    pub fn with_in_reply_to(mut self, in_reply_to: Option<u64>) -> Self {
        self.in_reply_to = in_reply_to;
        self
    }
}

impl Payload {
    pub fn is_response(&self) -> bool {
        matches!(
            self,
            Payload::InitOk
                | Payload::EchoOk { .. }
                | Payload::GenerateOk { .. }
                | Payload::BroadcastOk
                | Payload::ReadOk { .. }
                | Payload::TopologyOk
                | Payload::Error { .. }
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Init { .. } => "init",
            Payload::InitOk => "init_ok",
            Payload::Echo { .. } => "echo",
            Payload::EchoOk { .. } => "echo_ok",
            Payload::Generate => "generate",
            Payload::GenerateOk { .. } => "generate_ok",
            Payload::Broadcast { .. } => "broadcast",
            Payload::BroadcastOk => "broadcast_ok",
            Payload::Read => "read",
            Payload::ReadOk { .. } => "read_ok",
            Payload::Topology { .. } => "topology",
            Payload::TopologyOk => "topology_ok",
            Payload::Error { .. } => "error",
            Payload::Unknown => "unknown",
        }
    }

    pub fn not_supported() -> Self {
        Payload::Error {
            code: ERROR_NOT_SUPPORTED,
            text: ERROR_NOT_SUPPORTED_TEXT.to_string(),
        }
    }
}
