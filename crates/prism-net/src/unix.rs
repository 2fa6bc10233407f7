// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Outbound Unix-domain-socket connector (single renderer).

use std::path::Path;

use tokio::net::UnixStream;
use tracing::info;

use crate::{client, OwnerTx, TransportError, TransportHandle};

/// Connect to a renderer listening on a filesystem socket path.
pub async fn connect(
    path: &Path,
    owner: OwnerTx,
) -> Result<TransportHandle, TransportError> {
    let stream = UnixStream::connect(path)
        .await
        .map_err(|source| TransportError::Connect {
            endpoint: path.display().to_string(),
            source,
        })?;
    info!(path = %path.display(), "connected to renderer");
    let (reader, writer) = stream.into_split();
    Ok(client::spawn(reader, writer, owner))
}
