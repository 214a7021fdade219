use anyhow::{anyhow, Result};
use arrow_array::{Array, Float32Array, RecordBatch, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::runtime::{Handle, Runtime};

use polrag_core::config::VectorSettings;
use polrag_core::traits::CandidateSource;
use polrag_core::types::{Candidate, Meta};
use polrag_core::Error;

use crate::schema::SNAPSHOT_COLUMNS;
use crate::table::{open_db, table_exists};

/// Per-call budget until [`LanceCandidateSource::with_timeout`] says otherwise.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// LanceDB-backed candidate source.
///
/// Owns a small runtime so the async client can be driven from the
/// synchronous retrieval pipeline. Every call is bounded by `timeout`, and
/// callers may sit on a thread that is already running a tokio runtime.
pub struct LanceCandidateSource {
    runtime: Option<Runtime>,
    db: Connection,
    table_name: String,
    distance: DistanceType,
    timeout: Duration,
}

impl LanceCandidateSource {
    pub fn open(settings: &VectorSettings) -> polrag_core::Result<Self> {
        let distance = parse_distance(&settings.distance)?;
        let uri = polrag_core::config::expand_path(&settings.uri);
        let source = Self::open_with(&uri.to_string_lossy(), &settings.table, distance, Duration::from_millis(settings.connect_timeout_ms))?;
        Ok(source.with_timeout(Duration::from_millis(settings.timeout_ms)))
    }

    /// Connect within `connect_timeout`. Calls get [`DEFAULT_CALL_TIMEOUT`].
    pub fn open_with(uri: &str, table_name: &str, distance: DistanceType, connect_timeout: Duration) -> polrag_core::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("polrag-lance")
            .enable_all()
            .build()
            .map_err(|e| Error::CandidateSourceUnavailable(format!("runtime: {e}")))?;
        let db = match bounded(&runtime, connect_timeout, &format!("connect to {uri}"), || open_db(uri)) {
            Ok(db) => db,
            Err(e) => {
                runtime.shutdown_background();
                return Err(e);
            }
        };
        Ok(Self { runtime: Some(runtime), db, table_name: table_name.to_string(), distance, timeout: DEFAULT_CALL_TIMEOUT })
    }

    /// Budget for each fetch and ping.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn runtime(&self) -> polrag_core::Result<&Runtime> {
        self.runtime.as_ref().ok_or_else(|| Error::CandidateSourceUnavailable("vector runtime is shut down".into()))
    }

    async fn search(&self, query_vec: &[f32], k: usize) -> Result<Vec<Candidate>> {
        let table = self.db.open_table(&self.table_name).execute().await?;
        if table.count_rows(None).await? == 0 { return Ok(Vec::new()); }
        let mut stream = table
            .vector_search(query_vec.to_vec())?
            .distance_type(self.distance)
            .limit(k)
            .execute()
            .await?;
        let mut candidates = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            read_candidates(&batch, &mut candidates)?;
        }
        Ok(candidates)
    }
}

impl CandidateSource for LanceCandidateSource {
    fn fetch_candidates(&self, query_vec: &[f32], k: usize) -> polrag_core::Result<Vec<Candidate>> {
        if k == 0 { return Ok(Vec::new()); }
        let start = Instant::now();
        let candidates = bounded(self.runtime()?, self.timeout, "vector search", || self.search(query_vec, k))?;
        tracing::debug!(k, returned = candidates.len(), elapsed_ms = start.elapsed().as_millis() as u64, "vector candidates");
        Ok(candidates)
    }

    fn ping(&self) -> polrag_core::Result<()> {
        let exists = bounded(self.runtime()?, self.timeout, "ping", || table_exists(&self.db, &self.table_name))?;
        if exists { Ok(()) } else { Err(Error::CandidateSourceUnavailable(format!("table '{}' not found", self.table_name))) }
    }
}

impl Drop for LanceCandidateSource {
    fn drop(&mut self) {
        // A blocking shutdown panics inside an async context.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Drive `make()` on `runtime` under `timeout`.
///
/// A result that arrives after the deadline is reported as a timeout too.
/// When the calling thread is itself inside a tokio runtime the future is
/// driven from a scoped helper thread, since `block_on` cannot nest.
fn bounded<T, F, Fut>(runtime: &Runtime, timeout: Duration, what: &str, make: F) -> polrag_core::Result<T>
where
    F: FnOnce() -> Fut + Send,
    Fut: Future<Output = Result<T>>,
    T: Send,
{
    let run = move || {
        let start = Instant::now();
        match runtime.block_on(async { tokio::time::timeout(timeout, make()).await }) {
            Err(_) => Err(timed_out(what, timeout)),
            Ok(_) if start.elapsed() > timeout => Err(timed_out(what, timeout)),
            Ok(Err(e)) => Err(Error::CandidateSourceUnavailable(format!("{what}: {e:#}"))),
            Ok(Ok(value)) => Ok(value),
        }
    };
    if Handle::try_current().is_err() { return run(); }
    std::thread::scope(|s| s.spawn(run).join())
        .unwrap_or_else(|_| Err(Error::CandidateSourceUnavailable(format!("{what}: worker thread panicked"))))
}

fn timed_out(what: &str, timeout: Duration) -> Error {
    Error::CandidateSourceUnavailable(format!("{what} timed out after {timeout:?}"))
}

pub fn parse_distance(name: &str) -> polrag_core::Result<DistanceType> {
    match name.trim().to_ascii_lowercase().as_str() {
        "cosine" => Ok(DistanceType::Cosine),
        "l2" | "euclidean" => Ok(DistanceType::L2),
        "dot" => Ok(DistanceType::Dot),
        other => Err(Error::InvalidConfig(format!("unknown vector distance '{other}'"))),
    }
}

/// Append the rows of one result batch, keeping the index order.
fn read_candidates(batch: &RecordBatch, out: &mut Vec<Candidate>) -> Result<()> {
    let ids = string_column(batch, "id")?;
    let distances = batch
        .column_by_name("_distance")
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
        .ok_or_else(|| anyhow!("result batch has no _distance column"))?;
    let snapshot: Vec<(&str, &StringArray)> = SNAPSHOT_COLUMNS
        .iter()
        .filter_map(|name| batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<StringArray>()).map(|col| (*name, col)))
        .collect();
    for i in 0..batch.num_rows() {
        let metadata = if snapshot.is_empty() {
            None
        } else {
            let mut meta = Meta::with_capacity(snapshot.len());
            for (name, col) in &snapshot {
                if col.is_valid(i) { meta.insert((*name).to_string(), col.value(i).to_string()); }
            }
            Some(meta)
        };
        out.push(Candidate { id: ids.value(i).to_string(), distance: distances.value(i), metadata });
    }
    Ok(())
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow!("result batch has no string column '{name}'"))
}
