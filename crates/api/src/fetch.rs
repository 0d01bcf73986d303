// Path: crates/api/src/fetch.rs

//! Asynchronous object fetching and DHT announcement seams.

use async_trait::async_trait;
use gitmesh_types::error::PushError;
use gitmesh_types::push::PushNote;
use gitmesh_types::Hash32;
use std::io::{Read, Seek};
use std::sync::Arc;

/// A seekable reader over a received packfile.
pub trait PackReader: Read + Seek + Send {}

impl<T: Read + Seek + Send> PackReader for T {}

/// Handler invoked once per received packfile.
pub type PackHandler =
    Arc<dyn Fn(&mut dyn PackReader) -> Result<(), PushError> + Send + Sync>;

/// Completion callback for an asynchronous fetch. Invoked exactly once, on a
/// worker task, never while any pool lock is held.
pub type FetchDone = Box<dyn FnOnce(Result<(), PushError>) + Send>;

/// Fetches the objects a push note references that are missing locally.
///
/// Implementations must coalesce duplicate requests for the same note onto a
/// shared in-flight entry, retry internally up to a bound before surfacing
/// `FetchFailed`, and announce successfully fetched commits and tags to the
/// DHT.
pub trait ObjectFetcher: Send + Sync {
    /// Starts fetching in the background and returns immediately. `done`
    /// fires exactly once with the final outcome.
    fn fetch_async(&self, note: Arc<PushNote>, done: FetchDone);

    /// Installs the handler invoked for every received packfile, before any
    /// fetch is started.
    fn set_pack_handler(&self, handler: PackHandler);

    /// Cancels an in-flight fetch. The completion callback fires with
    /// [`PushError::Cancelled`]; partially received packs are discarded.
    fn cancel(&self, note_id: &Hash32);
}

/// A single hop to the content-addressed object transport: fetch a packfile
/// covering the requested objects from some peer.
#[async_trait]
pub trait ObjectSource: Send + Sync {
    /// Returns a packfile containing the requested objects for `repo`.
    async fn fetch_pack(&self, repo: &str, objects: &[String]) -> Result<Vec<u8>, PushError>;
}

/// Announces locally available objects to the DHT so other peers can find
/// them.
#[async_trait]
pub trait DhtAnnouncer: Send + Sync {
    /// Announces a commit or tag object by hash.
    async fn announce_object(&self, repo: &str, hash: &str);
}
