//! Decode cache with in-flight deduplication.
//!
//! `resolve` never blocks. The first request for a sound hands the fetch and
//! decode to a worker thread and reports `Pending`; every request made while
//! that work is in flight shares it. Completions come back over a channel and
//! are folded in by `poll` (or `wait_for` at startup).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use audio_graph::AudioBuffer;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use tracing::{debug, warn};

use crate::catalog::SoundCatalog;
use crate::decode::decode_to_buffer;
use crate::source::AssetSource;
use crate::util::{AssetError, Result};

#[derive(Debug, Clone)]
pub enum Resolve {
    Ready(Arc<AudioBuffer>),
    Pending,
    Unavailable,
}

impl Resolve {
    pub fn is_ready(&self) -> bool {
        matches!(self, Resolve::Ready(_))
    }
}

/// One finished decode, reported by `poll`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeEvent {
    pub id: String,
    pub ok: bool,
}

struct Completion {
    generation: u64,
    id: String,
    result: Result<AudioBuffer>,
}

pub struct DecodeCache {
    catalog: Arc<SoundCatalog>,
    source: Arc<dyn AssetSource>,
    target_rate: u32,
    ready: HashMap<String, Arc<AudioBuffer>>,
    in_flight: HashSet<String>,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
    generation: u64,
    decodes_started: usize,
}

impl DecodeCache {
    pub fn new(catalog: Arc<SoundCatalog>, source: Arc<dyn AssetSource>, target_rate: u32) -> Self {
        let (tx, rx) = unbounded();
        Self {
            catalog,
            source,
            target_rate,
            ready: HashMap::new(),
            in_flight: HashSet::new(),
            tx,
            rx,
            generation: 0,
            decodes_started: 0,
        }
    }

    pub fn catalog(&self) -> &Arc<SoundCatalog> {
        &self.catalog
    }

    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    pub fn resolve(&mut self, id: &str) -> Resolve {
        if let Some(buf) = self.ready.get(id) {
            return Resolve::Ready(buf.clone());
        }
        if self.in_flight.contains(id) {
            return Resolve::Pending;
        }
        let Some(desc) = self.catalog.get(id) else {
            warn!(error = %AssetError::UnknownSound(id.to_string()), "cannot resolve sound");
            return Resolve::Unavailable;
        };

        let path = desc.path.clone();
        let job_id = id.to_string();
        let source = self.source.clone();
        let tx = self.tx.clone();
        let generation = self.generation;
        let rate = self.target_rate;
        let spawned = std::thread::Builder::new()
            .name(format!("decode-{id}"))
            .spawn(move || {
                let result = source.fetch(&path).and_then(|bytes| decode_to_buffer(&path, bytes, rate));
                // the cache may be gone by now
                let _ = tx.send(Completion { generation, id: job_id, result });
            });
        match spawned {
            Ok(_) => {
                self.in_flight.insert(id.to_string());
                self.decodes_started += 1;
                debug!(sound = id, path = %desc.path, "decode started");
                Resolve::Pending
            }
            Err(e) => {
                warn!(sound = id, error = %e, "could not spawn decode worker");
                Resolve::Unavailable
            }
        }
    }

    /// Folds finished decodes into the cache and reports them.
    pub fn poll(&mut self) -> Vec<DecodeEvent> {
        let mut events = Vec::new();
        while let Ok(done) = self.rx.try_recv() {
            if let Some(ev) = self.complete(done) {
                events.push(ev);
            }
        }
        events
    }

    /// Blocks until none of `ids` is in flight or `timeout` passes.
    pub fn wait_for(&mut self, ids: &[&str], timeout: Duration) -> Vec<DecodeEvent> {
        let deadline = Instant::now() + timeout;
        let mut events = self.poll();
        while ids.iter().any(|id| self.in_flight.contains(*id)) {
            let left = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(left) {
                Ok(done) => events.extend(self.complete(done)),
                Err(RecvTimeoutError::Timeout) => {
                    warn!(timeout_ms = timeout.as_millis() as u64, "preload did not finish in time");
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        events
    }

    fn complete(&mut self, done: Completion) -> Option<DecodeEvent> {
        if done.generation != self.generation {
            return None;
        }
        self.in_flight.remove(&done.id);
        let ok = match done.result {
            Ok(buf) => {
                debug!(sound = %done.id, frames = buf.frames(), "decode finished");
                self.ready.insert(done.id.clone(), Arc::new(buf));
                true
            }
            Err(e) => {
                warn!(sound = %done.id, error = %e, "sound unavailable");
                false
            }
        };
        Some(DecodeEvent { id: done.id, ok })
    }

    pub fn get(&self, id: &str) -> Option<Arc<AudioBuffer>> {
        self.ready.get(id).cloned()
    }

    pub fn is_ready(&self, id: &str) -> bool {
        self.ready.contains_key(id)
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.in_flight.contains(id)
    }

    pub fn ready_count(&self) -> usize {
        self.ready.len()
    }

    /// Decodes started since construction, retries included.
    pub fn decode_count(&self) -> usize {
        self.decodes_started
    }

    /// Releases every buffer. Decodes still running are discarded when they land.
    pub fn clear(&mut self) {
        self.ready.clear();
        self.in_flight.clear();
        self.generation += 1;
    }
}
