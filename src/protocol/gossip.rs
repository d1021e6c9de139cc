use indexmap::IndexSet;

use super::topology::Topology;

/*
    Broadcast values spread by flooding. A node that sees a value for the
    first time records it and forwards it to every neighbor except the one
    it came from. A value already recorded is acknowledged but not
    forwarded again, which is what makes the flood terminate.

    Nothing here bounds propagation latency or orders concurrent values.
*/

/// Every broadcast value this node has accepted, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    seen: IndexSet<i64>,
}

impl MessageLog {
    /// Returns false when the value was already recorded.
    pub fn record(&mut self, message: i64) -> bool {
        self.seen.insert(message)
    }

    pub fn messages(&self) -> Vec<i64> {
        self.seen.iter().copied().collect()
    }
}

/// Records `message` and returns the neighbors that should receive a copy.
/// Empty when the value is a duplicate.
pub fn fanout(
    log: &mut MessageLog,
    topology: &Topology,
    self_id: &str,
    sender: &str,
    message: i64,
) -> Vec<String> {
    if !log.record(message) {
        return Vec::new();
    }

    topology
        .neighbors_of(self_id)
        .iter()
        .filter(|neighbor| neighbor.as_str() != sender)
        .cloned()
        .collect()
}
