use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Neighbor lists keyed by node id, as handed out by the harness.
/// Trusted as given: no symmetry or connectivity checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topology {
    pub neighbors: HashMap<String, Vec<String>>,
}

impl Topology {
    pub fn neighbors_of(&self, node_id: &str) -> &[String] {
        self.neighbors
            .get(node_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl<const N: usize> From<[(&str, &[&str]); N]> for Topology {
    fn from(entries: [(&str, &[&str]); N]) -> Self {
        let neighbors = entries
            .into_iter()
            .map(|(node, peers)| {
                (node.to_string(), peers.iter().map(|peer| peer.to_string()).collect())
            })
            .collect();
        Topology { neighbors }
    }
}
