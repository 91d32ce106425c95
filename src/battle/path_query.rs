//! Speculative path searches off the main thread
//!
//! A hover preview asks for a path every time the cursor crosses a tile.
//! At most one search runs at a time; requests arriving meanwhile only
//! replace the wanted target, and a finished search whose target is stale
//! is thrown away and the latest target searched instead.
//!
//! Searches read an `Arc` snapshot of the grid so the orchestrator can keep
//! mutating its own copy while a worker runs.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::oneshot::{self, error::TryRecvError};

use crate::battle::grid_index::GridIndex;
use crate::battle::grid_store::GridStore;
use crate::battle::pathfinding::{find_path, PathParams, PathfindingResult};

#[derive(Debug, Clone)]
struct QueryRequest {
    grid: Arc<GridStore>,
    origin: GridIndex,
    target: GridIndex,
    params: PathParams,
}

impl QueryRequest {
    fn key(&self) -> QueryKey {
        QueryKey {
            origin: self.origin,
            target: self.target,
            generation: self.grid.generation(),
        }
    }
}

/// What a result answers: a search between two tiles on one grid generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QueryKey {
    origin: GridIndex,
    target: GridIndex,
    generation: u64,
}

#[derive(Debug)]
struct InFlight {
    key: QueryKey,
    receiver: oneshot::Receiver<PathfindingResult>,
}

#[derive(Debug)]
pub struct PathQuery {
    handle: Handle,
    latest: Option<QueryRequest>,
    in_flight: Option<InFlight>,
    dispatched: u64,
}

impl PathQuery {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            latest: None,
            in_flight: None,
            dispatched: 0,
        }
    }

    /// Use the runtime the caller is running on
    ///
    /// Panics outside a tokio runtime, like [`Handle::current`].
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    pub fn is_searching(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Number of searches handed to workers so far
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// Target of the newest request not yet answered
    pub fn wanted_target(&self) -> Option<GridIndex> {
        self.latest.as_ref().map(|request| request.target)
    }

    /// Ask for a path; starts a search only if none is running
    pub fn request(
        &mut self,
        grid: Arc<GridStore>,
        origin: GridIndex,
        target: GridIndex,
        params: PathParams,
    ) {
        self.latest = Some(QueryRequest {
            grid,
            origin,
            target,
            params,
        });
        if self.in_flight.is_none() {
            self.dispatch_latest();
        }
    }

    /// Forget the wanted target; a running search finishes and is discarded
    pub fn cancel(&mut self) {
        self.latest = None;
    }

    fn dispatch_latest(&mut self) {
        let Some(request) = self.latest.clone() else {
            return;
        };
        let (sender, receiver) = oneshot::channel();
        let key = request.key();
        self.handle.spawn_blocking(move || {
            let result = find_path(&request.grid, request.origin, request.target, &request.params);
            // Receiver may be gone if the query was dropped
            let _ = sender.send(result);
        });
        self.dispatched += 1;
        tracing::trace!("Path search dispatched {} -> {}", key.origin, key.target);
        self.in_flight = Some(InFlight { key, receiver });
    }

    /// Settle a finished search
    ///
    /// Returns the result if it answers the newest request. A stale result
    /// is dropped and a search for the newest target started.
    fn accept(&mut self, key: QueryKey, result: PathfindingResult) -> Option<PathfindingResult> {
        match &self.latest {
            Some(latest) if latest.key() == key => {
                self.latest = None;
                Some(result)
            }
            Some(_) => {
                tracing::trace!("Discarding stale path to {}", key.target);
                self.dispatch_latest();
                None
            }
            None => None,
        }
    }

    /// Non-blocking check for a finished search
    pub fn poll(&mut self) -> Option<PathfindingResult> {
        let in_flight = self.in_flight.as_mut()?;
        let key = in_flight.key;
        match in_flight.receiver.try_recv() {
            Ok(result) => {
                self.in_flight = None;
                self.accept(key, result)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => {
                tracing::warn!(
                    "Path search worker for {} -> {} stopped without a result",
                    key.origin,
                    key.target
                );
                self.in_flight = None;
                self.accept(key, PathfindingResult::fail())
            }
        }
    }

    /// Wait until the newest request is answered
    ///
    /// Returns `None` if nothing was requested or the request was cancelled.
    pub async fn wait(&mut self) -> Option<PathfindingResult> {
        loop {
            let in_flight = self.in_flight.take()?;
            let result = match in_flight.receiver.await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!("Path search worker stopped without a result");
                    PathfindingResult::fail()
                }
            };
            if let Some(result) = self.accept(in_flight.key, result) {
                return Some(result);
            }
        }
    }
}
