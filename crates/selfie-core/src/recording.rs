//! Recording session state machine
//!
//! A session is `Idle` or `Recording`. Every `start` opens a new interval;
//! the encoder stamps each segment with its arrival index inside that
//! interval, so the session can restore arrival order even when segment
//! payloads become readable out of order. `stop` returns the session to
//! `Idle` at once, while the interval itself stays open for finalization
//! until the encoder reports how many segments it emitted. Only then is the
//! artifact assembled and handed to the [`ArtifactRegistry`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::CaptureConfig;
use crate::error::CaptureError;

/// Externally visible recording state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingState {
    #[default]
    Idle,
    Recording,
}

impl std::fmt::Display for RecordingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Recording => write!(f, "recording"),
        }
    }
}

/// Whether the chunk sequence is reset when a new interval starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkRetention {
    /// Every `start` begins with an empty chunk sequence
    #[default]
    PerInterval,
    /// Chunks accumulate across intervals; each artifact contains all of them
    Cumulative,
}

/// Identifies one Idle -> Recording -> Idle cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntervalId {
    /// Monotonic per-session sequence number, starting at 1
    pub seq: u64,
    /// Random id for log correlation
    pub uuid: Uuid,
}

impl std::fmt::Display for IntervalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{} ({})", self.seq, self.uuid)
    }
}

/// One encoded segment, shared cheaply between the chunk list and artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk(Arc<[u8]>);

impl Chunk {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Chunk {
    fn from(data: Vec<u8>) -> Self {
        Self(Arc::from(data))
    }
}

/// A segment as delivered by an encoder backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub interval: IntervalId,
    /// Arrival index inside the interval, assigned when the encoder emitted it
    pub index: u64,
    pub data: Vec<u8>,
}

/// What happened to a delivered segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentOutcome {
    /// The segment and any queued successors were delivered in order;
    /// `appended` counts the non-empty ones
    Delivered { appended: usize },
    /// An earlier segment is still outstanding; held back
    Queued,
    /// The index was already received
    Duplicate,
    /// The interval is neither recording nor finalizing
    Stale,
}

/// A published recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Fetchable reference handed out by the registry
    pub url: String,
    pub interval: IntervalId,
    pub chunk_count: usize,
    pub byte_len: usize,
    pub mime_type: String,
    pub file_name: String,
    pub started_at: DateTime<Utc>,
    pub stopped_at: DateTime<Utc>,
}

impl Artifact {
    pub fn duration(&self) -> Duration {
        self.stopped_at - self.started_at
    }
}

/// Turns finished recordings into fetchable references
pub trait ArtifactRegistry {
    /// Register `bytes` and return a URL for them
    fn publish(&mut self, bytes: &[u8], mime_type: &str) -> Result<String, CaptureError>;

    /// Release a URL returned by `publish`
    fn revoke(&mut self, url: &str);

    /// Offer `url` to the user as a file download
    fn download(&mut self, url: &str, file_name: &str) -> Result<(), CaptureError>;
}

/// In-memory registry, used natively and in tests
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    next_id: u64,
    pub published: BTreeMap<String, Vec<u8>>,
    pub revoked: Vec<String>,
    pub downloads: Vec<(String, String)>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, url: &str) -> Option<&[u8]> {
        self.published.get(url).map(Vec::as_slice)
    }
}

impl ArtifactRegistry for MemoryRegistry {
    fn publish(&mut self, bytes: &[u8], _mime_type: &str) -> Result<String, CaptureError> {
        self.next_id += 1;
        let url = format!("memory://artifact/{}", self.next_id);
        self.published.insert(url.clone(), bytes.to_vec());
        Ok(url)
    }

    fn revoke(&mut self, url: &str) {
        self.published.remove(url);
        self.revoked.push(url.to_string());
    }

    fn download(&mut self, url: &str, file_name: &str) -> Result<(), CaptureError> {
        if !self.published.contains_key(url) {
            return Err(CaptureError::Publish(format!("unknown artifact {}", url)));
        }
        self.downloads.push((url.to_string(), file_name.to_string()));
        Ok(())
    }
}

/// Bookkeeping for one interval
#[derive(Debug)]
struct IntervalLog {
    id: IntervalId,
    started_at: DateTime<Utc>,
    stopped_at: Option<DateTime<Utc>>,
    /// Next arrival index to deliver
    next_index: u64,
    /// Segments that arrived ahead of an outstanding earlier index
    pending: BTreeMap<u64, Vec<u8>>,
    /// Total segments emitted, known once the encoder completes
    expected_total: Option<u64>,
    /// Chunks the artifact starts from, captured at stop
    base: Vec<Chunk>,
    /// Chunks delivered after stop, merged at completion
    tail: Vec<Chunk>,
}

enum Receive {
    Ready(Vec<Chunk>),
    Queued,
    Duplicate,
}

impl IntervalLog {
    fn new(id: IntervalId, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            started_at,
            stopped_at: None,
            next_index: 0,
            pending: BTreeMap::new(),
            expected_total: None,
            base: Vec::new(),
            tail: Vec::new(),
        }
    }

    fn receive(&mut self, index: u64, data: Vec<u8>) -> Receive {
        if index < self.next_index || self.pending.contains_key(&index) {
            return Receive::Duplicate;
        }
        self.pending.insert(index, data);
        if index != self.next_index {
            return Receive::Queued;
        }

        let mut ready = Vec::new();
        while let Some(data) = self.pending.remove(&self.next_index) {
            self.next_index += 1;
            // Zero-size segments only advance the cursor
            if !data.is_empty() {
                ready.push(Chunk::from(data));
            }
        }
        Receive::Ready(ready)
    }

    fn is_complete(&self) -> bool {
        self.expected_total
            .map(|total| self.next_index >= total)
            .unwrap_or(false)
    }
}

/// Explicit recording state: chunks, intervals, and the published artifact
#[derive(Debug)]
pub struct RecordingSession {
    retention: ChunkRetention,
    mime_type: String,
    file_name: String,
    next_seq: u64,
    chunks: Vec<Chunk>,
    current: Option<IntervalLog>,
    finalizing: Vec<IntervalLog>,
    artifact: Option<Artifact>,
    last_error: Option<CaptureError>,
}

impl Default for RecordingSession {
    fn default() -> Self {
        Self::new(&CaptureConfig::default())
    }
}

impl RecordingSession {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            retention: config.retention,
            mime_type: config.mime_type.clone(),
            file_name: config.file_name.clone(),
            next_seq: 1,
            chunks: Vec::new(),
            current: None,
            finalizing: Vec::new(),
            artifact: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> RecordingState {
        if self.current.is_some() {
            RecordingState::Recording
        } else {
            RecordingState::Idle
        }
    }

    pub fn is_recording(&self) -> bool {
        self.current.is_some()
    }

    /// Chunks captured so far, in arrival order
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    pub fn artifact_url(&self) -> Option<&str> {
        self.artifact.as_ref().map(|a| a.url.as_str())
    }

    pub fn retention(&self) -> ChunkRetention {
        self.retention
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn current_interval(&self) -> Option<IntervalId> {
        self.current.as_ref().map(|log| log.id)
    }

    /// Whether any stopped interval is still waiting for the encoder
    pub fn is_finalizing(&self) -> bool {
        !self.finalizing.is_empty()
    }

    pub fn last_error(&self) -> Option<&CaptureError> {
        self.last_error.as_ref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Time spent in the current interval
    pub fn elapsed(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.current.as_ref().map(|log| now - log.started_at)
    }

    /// Idle -> Recording
    pub fn start(
        &mut self,
        surface_ready: bool,
        now: DateTime<Utc>,
    ) -> Result<IntervalId, CaptureError> {
        if self.current.is_some() {
            return Err(CaptureError::AlreadyRecording);
        }
        if !surface_ready {
            warn!("Start requested without a render surface");
            self.last_error = Some(CaptureError::NoSurface);
            return Err(CaptureError::NoSurface);
        }

        let id = IntervalId {
            seq: self.next_seq,
            uuid: Uuid::new_v4(),
        };
        self.next_seq += 1;

        if self.retention == ChunkRetention::PerInterval {
            self.chunks.clear();
        }
        self.last_error = None;
        self.current = Some(IntervalLog::new(id, now));

        info!(interval = %id, retention = ?self.retention, "Recording started");
        Ok(id)
    }

    /// Roll back a `start` whose encoder could not be opened
    pub fn abort_start(&mut self, interval: IntervalId, error: CaptureError) {
        if self.current_interval() == Some(interval) {
            self.current = None;
            error!(interval = %interval, error = %error, "Recording could not start");
            self.last_error = Some(error);
        }
    }

    /// Recording -> Idle. The artifact follows once the encoder completes.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Result<IntervalId, CaptureError> {
        let mut log = self.current.take().ok_or(CaptureError::NotRecording)?;
        log.stopped_at = Some(now);
        log.base = self.chunks.clone();

        let id = log.id;
        info!(interval = %id, chunks = self.chunks.len(), "Recording stopped, awaiting encoder");
        self.finalizing.push(log);
        Ok(id)
    }

    /// Deliver one encoder segment
    pub fn accept(&mut self, segment: Segment) -> SegmentOutcome {
        let Segment {
            interval,
            index,
            data,
        } = segment;

        if let Some(log) = self.current.as_mut().filter(|log| log.id == interval) {
            return match log.receive(index, data) {
                Receive::Ready(ready) => {
                    let appended = ready.len();
                    self.chunks.extend(ready);
                    debug!(interval = %interval, index, appended, "Segment delivered");
                    SegmentOutcome::Delivered { appended }
                }
                Receive::Queued => SegmentOutcome::Queued,
                Receive::Duplicate => SegmentOutcome::Duplicate,
            };
        }

        if let Some(log) = self.finalizing.iter_mut().find(|log| log.id == interval) {
            return match log.receive(index, data) {
                Receive::Ready(ready) => {
                    let appended = ready.len();
                    log.tail.extend(ready);
                    debug!(interval = %interval, index, appended, "Tail segment delivered");
                    SegmentOutcome::Delivered { appended }
                }
                Receive::Queued => SegmentOutcome::Queued,
                Receive::Duplicate => SegmentOutcome::Duplicate,
            };
        }

        debug!(interval = %interval, index, "Dropping segment for unknown interval");
        SegmentOutcome::Stale
    }

    /// The encoder emitted its last segment; `total` counts every segment,
    /// empty ones included
    pub fn encoder_finished(&mut self, interval: IntervalId, total: u64, now: DateTime<Utc>) -> bool {
        // Encoder stopped on its own: treat as an implicit stop
        if self.current_interval() == Some(interval) {
            warn!(interval = %interval, "Encoder finished while recording");
            let _ = self.stop(now);
        }

        match self.finalizing.iter_mut().find(|log| log.id == interval) {
            Some(log) => {
                log.expected_total = Some(total);
                debug!(interval = %interval, total, "Encoder finished");
                true
            }
            None => {
                debug!(interval = %interval, "Ignoring completion for unknown interval");
                false
            }
        }
    }

    /// The encoder failed; the interval is abandoned without an artifact
    pub fn encoder_failed(&mut self, interval: IntervalId, reason: &str) {
        let error = CaptureError::Encoder(reason.to_string());

        if self.current_interval() == Some(interval) {
            self.current = None;
        } else if let Some(pos) = self.finalizing.iter().position(|log| log.id == interval) {
            self.finalizing.remove(pos);
        } else {
            debug!(interval = %interval, "Ignoring failure for unknown interval");
            return;
        }

        error!(interval = %interval, error = %error, "Recording failed");
        self.last_error = Some(error);
    }

    fn is_latest_interval(&self, id: IntervalId) -> bool {
        id.seq + 1 == self.next_seq
    }

    /// Publish every interval whose segments have all arrived.
    ///
    /// Returns the newest artifact when one was published.
    pub fn publish_ready<R>(&mut self, registry: &mut R) -> Result<Option<&Artifact>, CaptureError>
    where
        R: ArtifactRegistry + ?Sized,
    {
        let mut published = false;

        while let Some(pos) = self.finalizing.iter().position(IntervalLog::is_complete) {
            let log = self.finalizing.remove(pos);

            // An older interval finishing late never replaces a newer artifact
            if let Some(newer) = self
                .artifact
                .as_ref()
                .filter(|artifact| artifact.interval.seq > log.id.seq)
            {
                info!(
                    interval = %log.id,
                    published = %newer.interval,
                    "Discarding recording superseded by a newer one"
                );
                continue;
            }

            // The tail only belongs in the chunk sequence when no later
            // interval has started since
            if self.is_latest_interval(log.id) {
                self.chunks.extend(log.tail.iter().cloned());
            }

            let chunks: Vec<&Chunk> = log.base.iter().chain(log.tail.iter()).collect();
            let byte_len: usize = chunks.iter().map(|c| c.len()).sum();
            let mut bytes = Vec::with_capacity(byte_len);
            for chunk in &chunks {
                bytes.extend_from_slice(chunk.as_bytes());
            }

            let url = match registry.publish(&bytes, &self.mime_type) {
                Ok(url) => url,
                Err(e) => {
                    error!(interval = %log.id, error = %e, "Failed to publish recording");
                    self.last_error = Some(e.clone());
                    return Err(e);
                }
            };

            if let Some(previous) = self.artifact.take() {
                registry.revoke(&previous.url);
            }

            info!(
                interval = %log.id,
                chunks = chunks.len(),
                bytes = byte_len,
                url = %url,
                "Recording published"
            );

            self.artifact = Some(Artifact {
                url,
                interval: log.id,
                chunk_count: chunks.len(),
                byte_len,
                mime_type: self.mime_type.clone(),
                file_name: self.file_name.clone(),
                started_at: log.started_at,
                stopped_at: log.stopped_at.unwrap_or(log.started_at),
            });
            published = true;
        }

        Ok(if published { self.artifact.as_ref() } else { None })
    }

    /// Offer the current artifact for download
    pub fn download<R>(&mut self, registry: &mut R) -> Result<(), CaptureError>
    where
        R: ArtifactRegistry + ?Sized,
    {
        let result = match self.artifact.as_ref() {
            Some(artifact) => registry.download(&artifact.url, &artifact.file_name),
            None => Err(CaptureError::Publish("no recording available".to_string())),
        };
        if let Err(err) = &result {
            self.report(err.clone());
        }
        result
    }

    /// Record a failure so the UI can show it
    pub fn report(&mut self, error: CaptureError) {
        warn!(error = %error, "Recording error");
        self.last_error = Some(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(retention: ChunkRetention) -> RecordingSession {
        let config = CaptureConfig {
            retention,
            ..CaptureConfig::default()
        };
        RecordingSession::new(&config)
    }

    fn seg(interval: IntervalId, index: u64, len: usize, fill: u8) -> Segment {
        Segment {
            interval,
            index,
            data: vec![fill; len],
        }
    }

    fn lens(session: &RecordingSession) -> Vec<usize> {
        session.chunks().iter().map(Chunk::len).collect()
    }

    #[test]
    fn test_start_stop_scenario_excludes_empty_segments() {
        let mut s = session(ChunkRetention::PerInterval);
        let mut registry = MemoryRegistry::new();
        let now = Utc::now();

        let id = s.start(true, now).unwrap();
        assert_eq!(s.state(), RecordingState::Recording);

        s.accept(seg(id, 0, 10, 1));
        s.accept(seg(id, 1, 0, 0));
        s.accept(seg(id, 2, 20, 2));
        s.stop(now).unwrap();

        assert_eq!(s.state(), RecordingState::Idle);
        assert_eq!(lens(&s), vec![10, 20]);
        assert!(s.artifact_url().is_none());

        s.encoder_finished(id, 3, now);
        let artifact = s.publish_ready(&mut registry).unwrap().unwrap().clone();
        assert_eq!(artifact.chunk_count, 2);
        assert_eq!(artifact.byte_len, 30);
        assert_eq!(artifact.file_name, "filtered_video.webm");
        assert!(!artifact.url.is_empty());
        assert_eq!(registry.get(&artifact.url).unwrap().len(), 30);
    }

    #[test]
    fn test_out_of_order_payloads_keep_arrival_order() {
        let mut s = session(ChunkRetention::PerInterval);
        let id = s.start(true, Utc::now()).unwrap();

        assert_eq!(s.accept(seg(id, 2, 3, 3)), SegmentOutcome::Queued);
        assert_eq!(s.accept(seg(id, 1, 2, 2)), SegmentOutcome::Queued);
        assert!(s.chunks().is_empty());
        assert_eq!(
            s.accept(seg(id, 0, 1, 1)),
            SegmentOutcome::Delivered { appended: 3 }
        );

        let fills: Vec<u8> = s.chunks().iter().map(|c| c.as_bytes()[0]).collect();
        assert_eq!(fills, vec![1, 2, 3]);
        assert_eq!(s.accept(seg(id, 1, 2, 2)), SegmentOutcome::Duplicate);
    }

    #[test]
    fn test_start_without_surface_is_reported() {
        let mut s = session(ChunkRetention::PerInterval);
        assert_eq!(s.start(false, Utc::now()), Err(CaptureError::NoSurface));
        assert_eq!(s.state(), RecordingState::Idle);
        assert_eq!(s.last_error(), Some(&CaptureError::NoSurface));
    }

    #[test]
    fn test_invalid_transitions() {
        let mut s = session(ChunkRetention::PerInterval);
        assert_eq!(s.stop(Utc::now()), Err(CaptureError::NotRecording));
        s.start(true, Utc::now()).unwrap();
        assert_eq!(s.start(true, Utc::now()), Err(CaptureError::AlreadyRecording));
    }

    #[test]
    fn test_idle_ignores_segments_and_never_sets_artifact_on_start() {
        let mut s = session(ChunkRetention::PerInterval);
        let mut registry = MemoryRegistry::new();
        let now = Utc::now();

        let id = s.start(true, now).unwrap();
        assert!(s.artifact_url().is_none());
        s.accept(seg(id, 0, 5, 1));
        s.stop(now).unwrap();
        s.encoder_finished(id, 1, now);
        s.publish_ready(&mut registry).unwrap();
        let snapshot = lens(&s);

        // A segment for a closed interval must not touch the chunks
        assert_eq!(s.accept(seg(id, 1, 7, 1)), SegmentOutcome::Stale);
        assert_eq!(lens(&s), snapshot);

        // Starting again does not publish anything by itself
        let url = s.artifact_url().map(str::to_string);
        s.start(true, now).unwrap();
        assert_eq!(s.artifact_url().map(str::to_string), url);
    }

    #[test]
    fn test_tail_segment_after_stop_is_part_of_artifact() {
        let mut s = session(ChunkRetention::PerInterval);
        let mut registry = MemoryRegistry::new();
        let now = Utc::now();

        let id = s.start(true, now).unwrap();
        s.accept(seg(id, 0, 4, 1));
        s.stop(now).unwrap();

        // Encoder flushes its tail after stop was requested
        s.accept(seg(id, 1, 6, 2));
        assert_eq!(lens(&s), vec![4], "chunks untouched while idle");

        s.encoder_finished(id, 2, now);
        let artifact = s.publish_ready(&mut registry).unwrap().unwrap().clone();
        assert_eq!(artifact.byte_len, 10);
        assert_eq!(lens(&s), vec![4, 6]);
    }

    #[test]
    fn test_completion_waits_for_outstanding_segments() {
        let mut s = session(ChunkRetention::PerInterval);
        let mut registry = MemoryRegistry::new();
        let now = Utc::now();

        let id = s.start(true, now).unwrap();
        s.stop(now).unwrap();
        s.encoder_finished(id, 1, now);
        assert!(s.publish_ready(&mut registry).unwrap().is_none());
        assert!(s.is_finalizing());

        s.accept(seg(id, 0, 8, 1));
        assert!(s.publish_ready(&mut registry).unwrap().is_some());
        assert!(!s.is_finalizing());
    }

    #[test]
    fn test_per_interval_resets_chunks() {
        let mut s = session(ChunkRetention::PerInterval);
        let mut registry = MemoryRegistry::new();
        let now = Utc::now();

        let first = s.start(true, now).unwrap();
        s.accept(seg(first, 0, 10, 1));
        s.stop(now).unwrap();
        s.encoder_finished(first, 1, now);
        let first_url = s.publish_ready(&mut registry).unwrap().unwrap().url.clone();

        let second = s.start(true, now).unwrap();
        assert!(s.chunks().is_empty());
        s.accept(seg(second, 0, 20, 2));
        s.stop(now).unwrap();
        s.encoder_finished(second, 1, now);
        let artifact = s.publish_ready(&mut registry).unwrap().unwrap().clone();

        assert_eq!(artifact.byte_len, 20);
        assert_eq!(registry.revoked, vec![first_url]);
    }

    #[test]
    fn test_cumulative_keeps_previous_intervals() {
        let mut s = session(ChunkRetention::Cumulative);
        let mut registry = MemoryRegistry::new();
        let now = Utc::now();

        let first = s.start(true, now).unwrap();
        s.accept(seg(first, 0, 10, 1));
        s.stop(now).unwrap();
        s.encoder_finished(first, 1, now);
        s.publish_ready(&mut registry).unwrap();

        let second = s.start(true, now).unwrap();
        s.accept(seg(second, 0, 20, 2));
        s.stop(now).unwrap();
        s.encoder_finished(second, 1, now);
        let artifact = s.publish_ready(&mut registry).unwrap().unwrap().clone();

        assert_eq!(artifact.byte_len, 30);
        assert_eq!(lens(&s), vec![10, 20]);
    }

    #[test]
    fn test_finalization_overlapping_next_start() {
        let mut s = session(ChunkRetention::PerInterval);
        let mut registry = MemoryRegistry::new();
        let now = Utc::now();

        let first = s.start(true, now).unwrap();
        s.accept(seg(first, 0, 10, 1));
        s.stop(now).unwrap();

        // New interval begins before the first one completes
        let second = s.start(true, now).unwrap();
        s.accept(seg(second, 0, 3, 9));
        s.accept(seg(first, 1, 5, 1));
        s.encoder_finished(first, 2, now);

        let artifact = s.publish_ready(&mut registry).unwrap().unwrap().clone();
        assert_eq!(artifact.interval, first);
        assert_eq!(artifact.byte_len, 15);
        // The old tail does not leak into the new interval
        assert_eq!(lens(&s), vec![3]);
        assert_eq!(s.current_interval(), Some(second));
    }

    #[test]
    fn test_late_older_interval_keeps_newer_artifact() {
        let mut s = session(ChunkRetention::PerInterval);
        let mut registry = MemoryRegistry::new();
        let now = Utc::now();

        let first = s.start(true, now).unwrap();
        s.accept(seg(first, 0, 10, 1));
        s.stop(now).unwrap();

        let second = s.start(true, now).unwrap();
        s.accept(seg(second, 0, 20, 2));
        s.stop(now).unwrap();
        s.encoder_finished(second, 1, now);
        let newer = s.publish_ready(&mut registry).unwrap().unwrap().clone();
        assert_eq!(newer.interval, second);

        // The first encoder flushes its tail and completes last
        s.accept(seg(first, 1, 5, 1));
        s.encoder_finished(first, 2, now);
        assert!(s.publish_ready(&mut registry).unwrap().is_none());

        let artifact = s.artifact().unwrap();
        assert_eq!(artifact.interval, second);
        assert_eq!(artifact.byte_len, 20);
        assert_eq!(lens(&s), vec![20]);
        assert!(registry.revoked.is_empty());
        assert!(registry.get(&newer.url).is_some());
        assert!(!s.is_finalizing());
    }

    #[test]
    fn test_older_tail_stays_out_of_newer_chunks() {
        let mut s = session(ChunkRetention::Cumulative);
        let mut registry = MemoryRegistry::new();
        let now = Utc::now();

        let first = s.start(true, now).unwrap();
        s.accept(seg(first, 0, 10, 1));
        s.stop(now).unwrap();

        let second = s.start(true, now).unwrap();
        s.accept(seg(second, 0, 3, 2));
        s.accept(seg(first, 1, 5, 1));
        s.encoder_finished(first, 2, now);

        // First interval is still the most recently completed one
        let artifact = s.publish_ready(&mut registry).unwrap().unwrap().clone();
        assert_eq!(artifact.interval, first);
        assert_eq!(artifact.byte_len, 15);
        assert_eq!(lens(&s), vec![10, 3]);
    }

    #[test]
    fn test_encoder_failure_is_not_silent() {
        let mut s = session(ChunkRetention::PerInterval);
        let id = s.start(true, Utc::now()).unwrap();
        s.encoder_failed(id, "codec lost");

        assert_eq!(s.state(), RecordingState::Idle);
        assert_eq!(
            s.last_error(),
            Some(&CaptureError::Encoder("codec lost".to_string()))
        );
        assert!(!s.is_finalizing());
    }

    #[test]
    fn test_abort_start_returns_to_idle() {
        let mut s = session(ChunkRetention::PerInterval);
        let id = s.start(true, Utc::now()).unwrap();
        s.abort_start(id, CaptureError::UnsupportedMime("video/webm".to_string()));
        assert_eq!(s.state(), RecordingState::Idle);
        assert!(matches!(s.last_error(), Some(CaptureError::UnsupportedMime(_))));
    }

    #[test]
    fn test_encoder_finishing_on_its_own_stops_recording() {
        let mut s = session(ChunkRetention::PerInterval);
        let mut registry = MemoryRegistry::new();
        let now = Utc::now();

        let id = s.start(true, now).unwrap();
        s.accept(seg(id, 0, 2, 1));
        assert!(s.encoder_finished(id, 1, now));
        assert_eq!(s.state(), RecordingState::Idle);
        assert!(s.publish_ready(&mut registry).unwrap().is_some());
    }

    #[test]
    fn test_download_uses_configured_file_name() {
        let mut s = session(ChunkRetention::PerInterval);
        let mut registry = MemoryRegistry::new();
        let now = Utc::now();

        assert!(s.download(&mut registry).is_err());
        assert!(matches!(s.last_error(), Some(CaptureError::Publish(_))));

        let id = s.start(true, now).unwrap();
        s.accept(seg(id, 0, 1, 1));
        s.stop(now).unwrap();
        s.encoder_finished(id, 1, now);
        s.publish_ready(&mut registry).unwrap();

        s.download(&mut registry).unwrap();
        assert_eq!(registry.downloads[0].1, "filtered_video.webm");
    }

    #[test]
    fn test_elapsed_only_while_recording() {
        let mut s = session(ChunkRetention::PerInterval);
        let start = Utc::now();
        assert!(s.elapsed(start).is_none());
        s.start(true, start).unwrap();
        let later = start + Duration::seconds(3);
        assert_eq!(s.elapsed(later), Some(Duration::seconds(3)));
    }
}
