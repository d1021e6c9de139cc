use super::{gossip::MessageLog, topology::Topology};

/// Everything a node remembers. Lives for the whole process; nothing is
/// persisted.
#[derive(Debug, Default)]
pub struct NodeState {
    pub id: String,
    pub peers: Vec<String>,
    pub topology: Topology,
    pub log: MessageLog,
    next_msg_id: u64,
}

impl NodeState {
    pub fn new() -> Self {
        NodeState::default()
    }

    pub fn init(&mut self, id: String, peers: Vec<String>) {
        self.id = id;
        self.peers = peers;
    }

    /// Id the next outbound envelope will carry.
    pub fn peek_msg_id(&self) -> u64 {
        self.next_msg_id
    }

    /// Hands out the current id and advances the counter. Ids are never
    /// reused.
    pub fn take_msg_id(&mut self) -> u64 {
        let msg_id = self.next_msg_id;
        self.next_msg_id += 1;
        msg_id
    }
}
