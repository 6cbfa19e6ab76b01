//! 内存实现的事件存储与快照存储
//!
//! 以 `DashMap` 的 entry 锁保证单条流上的比较并追加是原子的，
//! 适合测试与单进程场景；同时统计读写次数便于断言存储交互。
//!
use crate::{
    error::{DomainError, DomainResult as Result},
    identity::Identity,
    persist::{
        EventStore, SerializedEventRecord, SerializedEventStream, SerializedSnapshot,
        SnapshotStore,
    },
    value_object::Version,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, mapref::entry::Entry};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Debug, Clone)]
struct StoredStream {
    version: Version,
    created_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
    events: Vec<SerializedEventRecord>,
}

impl StoredStream {
    fn ensure_follows(
        identity: &Identity,
        version: Version,
        events: &[SerializedEventRecord],
    ) -> Result<()> {
        let mut expected = version;
        for event in events {
            expected = expected.next();
            if event.sequence() != expected {
                return Err(DomainError::CorruptedStream {
                    identity: identity.clone(),
                    expected: expected.value(),
                    found: event.sequence().value(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: DashMap<Identity, StoredStream>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前保存的流数量
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// 流头版本
    pub fn version_of(&self, identity: &Identity) -> Option<Version> {
        self.streams.get(identity).map(|s| s.version)
    }

    /// 累计的读操作次数
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// 累计的成功写操作次数
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn written(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, stream: SerializedEventStream) -> Result<()> {
        let identity = stream.identity().clone();
        StoredStream::ensure_follows(&identity, Version::new(), stream.events())?;

        match self.streams.entry(identity) {
            Entry::Occupied(entry) => Err(DomainError::NonUniqueStreamId {
                identity: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                let version = stream.last_sequence().unwrap_or_default();
                entry.insert(StoredStream {
                    version,
                    created_at: stream.created_at(),
                    closed_at: stream.closed_at(),
                    events: stream.into_events(),
                });
                self.written();
                Ok(())
            }
        }
    }

    async fn append_events(
        &self,
        stream: SerializedEventStream,
        expected_version: Version,
    ) -> Result<()> {
        let identity = stream.identity().clone();
        let Some(mut stored) = self.streams.get_mut(&identity) else {
            return Err(DomainError::StreamNotFound { identity });
        };

        if stored.version != expected_version {
            return Err(DomainError::ConcurrentModification {
                identity,
                expected: expected_version.value(),
            });
        }
        if stored.closed_at.is_some() {
            return Err(DomainError::ClosedStream { identity });
        }
        StoredStream::ensure_follows(&identity, stored.version, stream.events())?;

        if let Some(last) = stream.last_sequence() {
            stored.version = last;
        }
        stored.closed_at = stream.closed_at();
        stored.events.extend(stream.into_events());
        self.written();
        Ok(())
    }

    async fn load(
        &self,
        identity: &Identity,
        from_version: Version,
    ) -> Result<SerializedEventStream> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let stored = self
            .streams
            .get(identity)
            .ok_or_else(|| DomainError::StreamNotFound {
                identity: identity.clone(),
            })?;

        let events = stored
            .events
            .iter()
            .filter(|e| e.sequence() > from_version)
            .cloned()
            .collect();

        Ok(SerializedEventStream::new(
            identity.clone(),
            stored.created_at,
            stored.closed_at,
            events,
        ))
    }

    async fn delete(&self, identity: &Identity) -> Result<()> {
        if self.streams.remove(identity).is_some() {
            self.written();
        }
        Ok(())
    }

    async fn revert(&self, identity: &Identity, to_version: Version) -> Result<()> {
        let Some(mut stored) = self.streams.get_mut(identity) else {
            return Err(DomainError::StreamNotFound {
                identity: identity.clone(),
            });
        };

        if to_version >= stored.version {
            return Ok(());
        }
        stored.events.retain(|e| e.sequence() <= to_version);
        stored.version = to_version;
        stored.closed_at = None;
        self.written();
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    snapshots: DashMap<Identity, SerializedSnapshot>,
    fail_writes: AtomicBool,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, identity: &Identity) -> Option<SerializedSnapshot> {
        self.snapshots.get(identity).map(|s| s.clone())
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// 让后续写入失败，用于验证快照故障不影响保存
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn save(&self, snapshot: SerializedSnapshot) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DomainError::StorageInteractingFailed {
                reason: "snapshot store is unavailable".to_string(),
            });
        }
        self.snapshots.insert(snapshot.identity().clone(), snapshot);
        Ok(())
    }

    async fn load(&self, identity: &Identity) -> Result<Option<SerializedSnapshot>> {
        Ok(self.get(identity))
    }

    async fn remove(&self, identity: &Identity) -> Result<()> {
        self.snapshots.remove(identity);
        Ok(())
    }
}
