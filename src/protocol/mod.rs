pub mod gossip;
pub mod message;
pub mod processor;
pub mod state;
pub mod topology;

pub use gossip::*;
pub use message::*;
pub use processor::*;
pub use state::*;
pub use topology::*;
