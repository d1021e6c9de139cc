/*
    A node in a gossip test cluster. The harness starts one process per node
    and talks to it over stdin/stdout, one JSON envelope per line. After init
    and topology messages the node answers echo, generate and read requests
    and spreads broadcast values to its neighbors by flooding.

    Forwarded broadcasts are requests in their own right. The node keeps
    re-sending each one until the neighbor acknowledges it, so a value
    reaches every connected node even when the network drops messages.
*/

mod common;
mod network;
mod protocol;

use clap::Parser;
use tokio::{
    io::{stdin, stdout, BufReader},
    sync::mpsc,
};
use tracing::info;

use common::{Config, Result};
use network::{read_envelopes, write_envelopes, Node};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    config.init_tracing();
    info!(rpc_timeout_ms = config.rpc_timeout_ms, "Starting gossip node");

    let (msg_tx, msg_rx) = mpsc::channel(config.inbound_capacity);
    let (outbox, outbound) = mpsc::unbounded_channel();

    let reader = tokio::spawn(read_envelopes(BufReader::new(stdin()), msg_tx));
    let writer = tokio::spawn(async move { write_envelopes(&mut stdout(), outbound).await });

    let mut node = Node::new(&config, msg_rx, outbox);
    node.run().await?;
    // Dropping the node closes the outbox and lets the writer drain.
    drop(node);

    writer.await??;
    reader.await??;
    Ok(())
}
