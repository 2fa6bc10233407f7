// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Outbound TCP connector (single renderer).

use tokio::net::TcpStream;
use tracing::info;

use crate::{client, OwnerTx, TransportError, TransportHandle};

/// Connect to a renderer at `host:port`.
pub async fn connect(
    host: &str,
    port: u16,
    owner: OwnerTx,
) -> Result<TransportHandle, TransportError> {
    let endpoint = format!("{host}:{port}");
    let stream = TcpStream::connect(&endpoint)
        .await
        .map_err(|source| TransportError::Connect {
            endpoint: endpoint.clone(),
            source,
        })?;
    let _ = stream.set_nodelay(true);
    info!(%endpoint, "connected to renderer");
    let (reader, writer) = stream.into_split();
    Ok(client::spawn(reader, writer, owner))
}
