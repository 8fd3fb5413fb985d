use std::collections::VecDeque;

use log::debug;
use ticklog_shared::{Event, EventKind, StorageKey, StorageRecord};

use crate::error::DriverError;
use crate::log_service::{LogError, LogService, StorageRequestId};

enum JoinState {
    Resolved,
    WaitingStorage(StorageRequestId),
}

struct JoinLeaveRequest {
    event: Event,
    state: JoinState,
}

/// Holds join/leave events until any per-player storage they need has been
/// fetched, releasing them strictly in submission order.
///
/// A leave, or a join when no `keys_for_join` are configured, resolves
/// immediately but still waits its turn behind earlier unresolved joins.
pub struct JoinResolver {
    keys_for_join: Option<Vec<StorageKey>>,
    requests: VecDeque<JoinLeaveRequest>,
    errors: Vec<DriverError>,
}

impl JoinResolver {
    pub fn new(keys_for_join: Option<Vec<StorageKey>>) -> Self {
        Self {
            keys_for_join,
            requests: VecDeque::new(),
            errors: Vec::new(),
        }
    }

    pub fn request<L: LogService>(&mut self, event: Event, log: &mut L) {
        let state = match (&event.kind, &self.keys_for_join) {
            (EventKind::Join { .. }, Some(keys)) => {
                JoinState::WaitingStorage(log.request_storage(keys))
            }
            _ => JoinState::Resolved,
        };
        self.requests.push_back(JoinLeaveRequest { event, state });
    }

    /// Routes one storage completion. Returns false when the id belongs to
    /// no pending join (the caller may then try other owners).
    pub fn on_storage_response(
        &mut self,
        id: StorageRequestId,
        result: Result<Vec<StorageRecord>, LogError>,
    ) -> bool {
        let request = self
            .requests
            .iter_mut()
            .find(|r| matches!(r.state, JoinState::WaitingStorage(waiting) if waiting == id));
        let Some(request) = request else {
            return false;
        };
        match result {
            Ok(records) => {
                if let EventKind::Join { storage, .. } = &mut request.event.kind {
                    *storage = Some(records);
                }
            }
            Err(e) => {
                // the join still resolves, just without its storage
                self.errors.push(DriverError::Log(e));
            }
        }
        request.state = JoinState::Resolved;
        true
    }

    /// Drains the resolved prefix of the queue, preserving submission
    /// order. `None` while the oldest request is still waiting.
    pub fn read_resolved(&mut self) -> Option<Vec<Event>> {
        let mut resolved = Vec::new();
        while matches!(
            self.requests.front(),
            Some(JoinLeaveRequest {
                state: JoinState::Resolved,
                ..
            })
        ) {
            let request = self.requests.pop_front().unwrap();
            resolved.push(request.event);
        }
        if resolved.is_empty() {
            None
        } else {
            Some(resolved)
        }
    }

    /// Drops all pending requests; used when the execution role changes.
    pub fn clear(&mut self) {
        if !self.requests.is_empty() {
            debug!("discarding {} pending join/leave requests", self.requests.len());
        }
        self.requests.clear();
    }

    pub fn take_errors(&mut self) -> Vec<DriverError> {
        std::mem::take(&mut self.errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_log::MemoryLog;

    fn join(player: &str) -> Event {
        Event::new(
            EventKind::Join {
                name: Some(player.to_owned()),
                storage: None,
            },
            player,
        )
    }

    #[test]
    fn joins_without_keys_resolve_immediately() {
        let mut log = MemoryLog::new(0.0);
        let mut resolver = JoinResolver::new(None);
        resolver.request(join("p1"), &mut log);
        resolver.request(Event::new(EventKind::Leave, "p2"), &mut log);
        let resolved = resolver.read_resolved().unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].player_id, "p1");
        assert!(resolver.read_resolved().is_none());
    }

    #[test]
    fn submission_order_survives_out_of_order_completion() {
        let mut log = MemoryLog::new(0.0);
        let keys = vec![StorageKey::new("score")];
        let mut resolver = JoinResolver::new(Some(keys));
        resolver.request(join("p1"), &mut log);
        resolver.request(join("p2"), &mut log);
        let ids = log.pending_storage_request_ids();
        assert_eq!(ids.len(), 2);

        // second join's storage arrives first
        assert!(resolver.on_storage_response(ids[1], Ok(Vec::new())));
        assert!(resolver.read_resolved().is_none());

        assert!(resolver.on_storage_response(ids[0], Ok(Vec::new())));
        let resolved = resolver.read_resolved().unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].player_id, "p1");
        assert_eq!(resolved[1].player_id, "p2");
    }

    #[test]
    fn fetch_errors_resolve_the_join_without_storage() {
        let mut log = MemoryLog::new(0.0);
        let mut resolver = JoinResolver::new(Some(vec![StorageKey::new("score")]));
        resolver.request(join("p1"), &mut log);
        let ids = log.pending_storage_request_ids();
        assert!(resolver.on_storage_response(ids[0], Err(LogError::Failed("boom".into()))));
        let resolved = resolver.read_resolved().unwrap();
        assert!(matches!(
            &resolved[0].kind,
            EventKind::Join { storage: None, .. }
        ));
        assert_eq!(resolver.take_errors().len(), 1);
    }

    #[test]
    fn stale_completions_are_reported_unhandled() {
        let mut resolver = JoinResolver::new(None);
        assert!(!resolver.on_storage_response(StorageRequestId(99), Ok(Vec::new())));
    }
}
