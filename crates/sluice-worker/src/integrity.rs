//! Verified delivery of an output payload
//!
//! The inbound file is deleted only after the payload has been written next
//! to its checksum and read back with the same digest. Deleting the inbound
//! file is the one signal downstream consumers treat as completion.
//!
//! If any step fails, the outbound payload and checksum are removed again so
//! the file stays pending and the next run starts over.

use sluice_common::checksum::{checksum_file_name, sha256_hex, verify_checksum};
use sluice_common::SluiceError;
use tracing::{debug, error, info, warn};

use crate::error::{Result, SyncError};
use crate::store::{RemoteStore, SluicePaths};

/// A payload that was written, verified and whose source was removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub file_name: String,
    pub checksum: String,
    pub bytes: usize,
}

/// Write `payload` and its checksum to the outbound directory, verify, then
/// delete the inbound file
///
/// Any error aborts before the inbound file is touched and rolls back the
/// outbound pair, leaving the inbound file pending for the next run.
pub async fn deliver_and_verify(
    store: &mut dyn RemoteStore,
    paths: &SluicePaths,
    file_name: &str,
    payload: &str,
) -> Result<Delivery> {
    let expected = sha256_hex(payload.as_bytes());

    match write_and_commit(store, paths, file_name, payload, &expected).await {
        Ok(()) => {
            info!(file = %file_name, bytes = payload.len(), "Delivered and verified");
            Ok(Delivery {
                file_name: file_name.to_string(),
                checksum: expected,
                bytes: payload.len(),
            })
        },
        Err(e) => {
            discard_output(store, paths, file_name).await;
            Err(e)
        },
    }
}

async fn write_and_commit(
    store: &mut dyn RemoteStore,
    paths: &SluicePaths,
    file_name: &str,
    payload: &str,
    expected: &str,
) -> Result<()> {
    let outbound = paths.outbound(file_name);
    let sidecar = paths.outbound(&checksum_file_name(file_name));

    debug!(file = %file_name, checksum = %expected, "Writing payload");
    store.write(&outbound, payload.as_bytes()).await?;
    store.write(&sidecar, expected.as_bytes()).await?;

    let readback = store.read(&outbound).await?;

    if let Err(SluiceError::ChecksumMismatch { expected, actual }) =
        verify_checksum(&readback, expected)
    {
        error!(
            file = %file_name,
            expected = %expected,
            actual = %actual,
            "INTEGRITY MISMATCH: payload read back from the store does not match what was written, inbound file kept"
        );
        return Err(SyncError::Integrity { expected, actual });
    }

    store.delete(&paths.inbound(file_name)).await?;
    Ok(())
}

/// Best-effort removal of a failed delivery's outbound pair
///
/// The payload goes first: its name is what marks a file as no longer pending.
async fn discard_output(store: &mut dyn RemoteStore, paths: &SluicePaths, file_name: &str) {
    for path in [
        paths.outbound(file_name),
        paths.outbound(&checksum_file_name(file_name)),
    ] {
        if let Err(e) = store.delete(&path).await {
            warn!(path = %path, "Could not remove outbound file after failed delivery: {:#}", e);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::store::memory::{Fault, MemoryConnector};
    use crate::store::StoreConnector;
    use tracing_test::traced_test;

    const PAYLOAD: &str = "fødselsnummer,fom,tom,grad\n12345678901,2024-01-01,2024-01-31,100.0";

    async fn setup(faults: &[Fault]) -> (MemoryConnector, Box<dyn RemoteStore>) {
        let connector = MemoryConnector::new();
        connector.put("alice", "inbound/a.csv", "header\n12345678901");
        for fault in faults {
            connector.inject("alice", fault.clone());
        }
        let store = connector.connect("alice").await.unwrap();
        (connector, store)
    }

    #[tokio::test]
    async fn test_verified_delivery_deletes_inbound() {
        let (connector, mut store) = setup(&[]).await;

        let delivery = deliver_and_verify(store.as_mut(), &SluicePaths::default(), "a.csv", PAYLOAD)
            .await
            .unwrap();

        assert_eq!(delivery.checksum, sha256_hex(PAYLOAD.as_bytes()));
        assert_eq!(connector.get("alice", "outbound/a.csv").unwrap(), PAYLOAD.as_bytes());
        assert_eq!(
            connector.get("alice", "outbound/a.csv.sha256").unwrap(),
            delivery.checksum.as_bytes()
        );
        assert!(!connector.exists("alice", "inbound/a.csv"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_corrupt_write_keeps_inbound() {
        let (connector, mut store) =
            setup(&[Fault::CorruptWrite("outbound/a.csv".to_string())]).await;

        let err = deliver_and_verify(store.as_mut(), &SluicePaths::default(), "a.csv", PAYLOAD)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), FailureKind::Integrity);
        assert!(connector.exists("alice", "inbound/a.csv"));
        assert!(connector.names("alice", "outbound").is_empty());
        assert!(logs_contain("INTEGRITY MISMATCH"));
    }

    #[tokio::test]
    async fn test_failed_sidecar_write_keeps_inbound() {
        let (connector, mut store) =
            setup(&[Fault::FailWrite("outbound/a.csv.sha256".to_string())]).await;

        let err = deliver_and_verify(store.as_mut(), &SluicePaths::default(), "a.csv", PAYLOAD)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), FailureKind::Store);
        assert!(connector.exists("alice", "inbound/a.csv"));
        assert!(connector.names("alice", "outbound").is_empty());
    }

    #[tokio::test]
    async fn test_failed_readback_keeps_inbound() {
        let (connector, mut store) = setup(&[Fault::FailRead("outbound/a.csv".to_string())]).await;

        assert!(
            deliver_and_verify(store.as_mut(), &SluicePaths::default(), "a.csv", PAYLOAD)
                .await
                .is_err()
        );
        assert!(connector.exists("alice", "inbound/a.csv"));
        assert!(connector.names("alice", "outbound").is_empty());
    }

    #[tokio::test]
    async fn test_failed_inbound_delete_rolls_back_output() {
        let (connector, mut store) = setup(&[Fault::FailDelete("inbound/a.csv".to_string())]).await;

        let err = deliver_and_verify(store.as_mut(), &SluicePaths::default(), "a.csv", PAYLOAD)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), FailureKind::Store);
        assert!(connector.exists("alice", "inbound/a.csv"));
        assert!(connector.names("alice", "outbound").is_empty());
    }

    #[tokio::test]
    async fn test_retry_overwrites_stale_output() {
        let (connector, mut store) = setup(&[]).await;
        connector.put("alice", "outbound/a.csv", "partial");

        deliver_and_verify(store.as_mut(), &SluicePaths::default(), "a.csv", PAYLOAD)
            .await
            .unwrap();

        assert_eq!(connector.get("alice", "outbound/a.csv").unwrap(), PAYLOAD.as_bytes());
    }
}
