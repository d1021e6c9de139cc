pub mod node;
pub mod rpc;
pub mod transport;

pub use node::*;
pub use rpc::*;
pub use transport::*;

/*
    The channel between nodes is unreliable: a message may be dropped,
    delayed or delivered twice, and nothing is ordered across senders.
    Each node reads one JSON envelope per line on stdin and writes its
    replies and its own requests to stdout, one per line.

    Inside a node everything runs on a single owner task. Replies are
    written once and forgotten. Requests the node originates go through
    the RpcEngine, which re-sends them until answered, so delivery is at
    least once and the receivers dedupe.
*/
