//! ---
//! inv_section: "11-test-harness"
//! inv_subsection: "module"
//! inv_type: "source"
//! inv_scope: "code"
//! inv_description: "In-memory inventory service for exercising the call primitive."
//! inv_version: "v0.0.0-prealpha"
//! inv_owner: "tbd"
//! ---
//! In-memory inventory service speaking the R-INV call primitive.
//!
//! [`InventoryService`] keeps objects and their attributes, evaluates
//! retrieval queries with selection rules, hosts private collectors with
//! filters, and serves scripted change rounds through a blocking
//! `WaitForUpdates`. Every call is journalled so tests can assert on what
//! the client sent.

pub mod selection;

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use parking_lot::{Condvar, Mutex};
use r_inv_transport::{CallError, CancelToken, Invoke, Result};
use r_inv_types::{
    ChangeRecord, ObjectReference, ObjectUpdate, PropertyFilterUpdate, QueryBatch, Request,
    Response, ServerFault, UpdateKind, UpdateSet, VersionCursor,
};
use serde_json::Value as JsonValue;
use tracing::debug;
use uuid::Uuid;

use crate::selection::Store;

pub use selection::GENERIC_KIND;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// One journalled call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    /// Wire method name.
    pub method: &'static str,
    /// Object the call addressed.
    pub this: ObjectReference,
    /// Cursor sent with `WaitForUpdates`.
    pub version: Option<VersionCursor>,
}

/// Order in which retrieval results are returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultOrder {
    /// Discovery order.
    #[default]
    Natural,
    /// Discovery order reversed.
    Reversed,
}

struct Session {
    filters: Vec<(ObjectReference, QueryBatch)>,
    pending: VecDeque<Vec<ObjectUpdate>>,
    version: u64,
}

impl Session {
    fn cursor(&self) -> VersionCursor {
        if self.version == 0 {
            VersionCursor::initial()
        } else {
            VersionCursor::from(self.version.to_string())
        }
    }
}

#[derive(Default)]
struct State {
    objects: Store,
    sessions: HashMap<String, Session>,
    backlog: VecDeque<Vec<ObjectUpdate>>,
    faults: HashMap<&'static str, VecDeque<CallError>>,
    journal: Vec<CallRecord>,
    order: ResultOrder,
}

/// In-memory stand-in for a remote inventory service.
#[derive(Default)]
pub struct InventoryService {
    state: Mutex<State>,
    changed: Condvar,
}

impl InventoryService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object with its attributes, replacing any previous version.
    pub fn insert<I, K>(&self, obj: ObjectReference, attributes: I)
    where
        I: IntoIterator<Item = (K, JsonValue)>,
        K: Into<String>,
    {
        let attributes = attributes
            .into_iter()
            .map(|(path, value)| (path.into(), value))
            .collect::<IndexMap<_, _>>();
        self.state.lock().objects.insert(obj, attributes);
    }

    /// Store an entity with a `name` and, unless it is a root, a `parent`.
    pub fn insert_entity(&self, obj: ObjectReference, name: &str, parent: Option<&ObjectReference>) {
        let mut attributes = vec![("name", JsonValue::String(name.to_owned()))];
        if let Some(parent) = parent {
            attributes.push(("parent", reference_value(parent)));
        }
        self.insert(obj, attributes);
    }

    /// Return retrieval results in `order`.
    pub fn set_result_order(&self, order: ResultOrder) {
        self.state.lock().order = order;
    }

    /// Change one attribute and queue the change for every collector whose
    /// filters cover it.
    pub fn set_attribute(&self, obj: &ObjectReference, path: &str, value: JsonValue) {
        let mut state = self.state.lock();
        if let Some(attributes) = state.objects.get_mut(obj) {
            attributes.insert(path.to_owned(), value.clone());
        }
        let change = ChangeRecord::assign(path, value);
        for session in state.sessions.values_mut() {
            let interested = session.filters.iter().any(|(_, spec)| {
                spec.queries.iter().any(|q| q.obj == *obj)
                    && selection::wants(&spec.attributes, path)
            });
            if interested {
                session.pending.push_back(vec![ObjectUpdate {
                    obj: obj.clone(),
                    kind: UpdateKind::Modify,
                    changes: vec![change.clone()],
                }]);
            }
        }
        drop(state);
        self.changed.notify_all();
    }

    /// Queue `updates` as one round for every active collector, unfiltered.
    ///
    /// With no collector alive the round is kept for the next one created.
    pub fn push_round(&self, updates: Vec<ObjectUpdate>) {
        let mut state = self.state.lock();
        if state.sessions.is_empty() {
            state.backlog.push_back(updates);
        } else {
            for session in state.sessions.values_mut() {
                session.pending.push_back(updates.clone());
            }
        }
        drop(state);
        self.changed.notify_all();
    }

    /// Fail the next call of `method` with `error`.
    pub fn inject_fault(&self, method: &'static str, error: CallError) {
        self.state
            .lock()
            .faults
            .entry(method)
            .or_default()
            .push_back(error);
    }

    /// Every call received so far.
    pub fn calls(&self) -> Vec<CallRecord> {
        self.state.lock().journal.clone()
    }

    /// Number of calls of `method` received so far.
    pub fn count(&self, method: &str) -> usize {
        self.state
            .lock()
            .journal
            .iter()
            .filter(|call| call.method == method)
            .count()
    }

    /// Cursors sent with `WaitForUpdates`, in call order.
    pub fn cursors_seen(&self) -> Vec<VersionCursor> {
        self.state
            .lock()
            .journal
            .iter()
            .filter_map(|call| call.version.clone())
            .collect()
    }

    /// Collectors created and not yet destroyed.
    pub fn active_collectors(&self) -> usize {
        self.state.lock().sessions.len()
    }

    /// Block until `n` calls of `method` have been received or `timeout`
    /// passes.
    pub fn await_calls(&self, method: &str, n: usize, timeout: Duration) -> bool {
        let count = |state: &State| -> usize {
            state.journal.iter().filter(|call| call.method == method).count()
        };
        let mut state = self.state.lock();
        let deadline = Instant::now() + timeout;
        while count(&*state) < n {
            if self.changed.wait_until(&mut state, deadline).timed_out() {
                return count(&*state) >= n;
            }
        }
        true
    }

    fn handle(&self, request: Request, cancel: &CancelToken) -> Result<Response> {
        let mut state = self.state.lock();
        state.journal.push(CallRecord {
            method: request.method(),
            this: request.this().clone(),
            version: match &request {
                Request::WaitForUpdates { version, .. } => Some(version.clone()),
                _ => None,
            },
        });
        self.changed.notify_all();
        if let Some(error) = state
            .faults
            .get_mut(request.method())
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }
        cancel.check()?;

        match request {
            Request::RetrieveProperties { spec_set, .. } => {
                let mut contents = Vec::new();
                for batch in &spec_set {
                    for query in &batch.queries {
                        if !state.objects.contains_key(&query.obj) {
                            return Err(not_found(&query.obj));
                        }
                        let selected = selection::select(&state.objects, query)
                            .map_err(|err| fault("InvalidArgument", err.to_string()))?;
                        contents.extend(selected.iter().filter_map(|obj| {
                            selection::content(&state.objects, obj, &batch.attributes)
                        }));
                    }
                }
                if state.order == ResultOrder::Reversed {
                    contents.reverse();
                }
                Ok(Response::ObjectContents(contents))
            }
            Request::CreatePropertyCollector { .. } => {
                let id = format!("session[{}]", Uuid::new_v4());
                let pending = std::mem::take(&mut state.backlog);
                state.sessions.insert(
                    id.clone(),
                    Session {
                        filters: Vec::new(),
                        pending,
                        version: 0,
                    },
                );
                debug!(collector = %id, "collector created");
                drop(state);
                self.changed.notify_all();
                Ok(Response::Collector(ObjectReference::new(
                    "PropertyCollector",
                    id,
                )))
            }
            Request::CreateFilter { this, spec, .. } => {
                let session = state
                    .sessions
                    .get_mut(&this.id)
                    .ok_or_else(|| not_found(&this))?;
                let filter = ObjectReference::new(
                    "PropertyFilter",
                    format!("{}/filter-{}", this.id, session.filters.len() + 1),
                );
                session.filters.push((filter.clone(), spec));
                Ok(Response::Filter(filter))
            }
            Request::WaitForUpdates { this, version } => {
                loop {
                    let State {
                        objects, sessions, ..
                    } = &mut *state;
                    let session = sessions.get_mut(&this.id).ok_or_else(|| not_found(&this))?;
                    if version != session.cursor() {
                        return Err(fault(
                            "InvalidCollectorVersion",
                            format!("expected '{}', got '{}'", session.cursor(), version),
                        ));
                    }
                    if version.is_initial() {
                        let filter_set = session
                            .filters
                            .iter()
                            .map(|(filter, spec)| initial_update(objects, filter, spec))
                            .collect();
                        session.version += 1;
                        return Ok(Response::Updates(UpdateSet {
                            version: session.cursor(),
                            filter_set,
                        }));
                    }
                    if let Some(object_set) = session.pending.pop_front() {
                        session.version += 1;
                        let filter = session
                            .filters
                            .first()
                            .map(|(filter, _)| filter.clone())
                            .unwrap_or_else(|| this.clone());
                        return Ok(Response::Updates(UpdateSet {
                            version: session.cursor(),
                            filter_set: vec![PropertyFilterUpdate { filter, object_set }],
                        }));
                    }
                    cancel.check()?;
                    self.changed.wait_for(&mut state, POLL_INTERVAL);
                }
            }
            Request::DestroyPropertyCollector { this } => {
                state
                    .sessions
                    .remove(&this.id)
                    .ok_or_else(|| not_found(&this))?;
                debug!(collector = %this.id, "collector destroyed");
                drop(state);
                self.changed.notify_all();
                Ok(Response::Empty)
            }
        }
    }
}

impl Invoke for InventoryService {
    fn invoke(&self, request: Request) -> Result<Response> {
        self.handle(request, &CancelToken::new())
    }

    fn invoke_cancellable(&self, request: Request, cancel: &CancelToken) -> Result<Response> {
        self.handle(request, cancel)
    }

    fn name(&self) -> &'static str {
        "in-memory"
    }
}

fn initial_update(store: &Store, filter: &ObjectReference, spec: &QueryBatch) -> PropertyFilterUpdate {
    let object_set = spec
        .queries
        .iter()
        .filter(|query| store.contains_key(&query.obj))
        .map(|query| ObjectUpdate {
            obj: query.obj.clone(),
            kind: UpdateKind::Enter,
            changes: selection::snapshot(store, &query.obj, &spec.attributes),
        })
        .collect();
    PropertyFilterUpdate {
        filter: filter.clone(),
        object_set,
    }
}

/// JSON form of a reference as stored in reference-valued attributes.
pub fn reference_value(obj: &ObjectReference) -> JsonValue {
    serde_json::json!({ "type": obj.kind, "value": obj.id })
}

fn fault(code: &str, message: impl Into<String>) -> CallError {
    CallError::Fault(ServerFault::new(code, message))
}

fn not_found(obj: &ObjectReference) -> CallError {
    fault("ManagedObjectNotFound", format!("{obj} does not exist"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use r_inv_types::{AttributeSpec, ObjectQuery};
    use serde_json::json;

    fn vm() -> ObjectReference {
        ObjectReference::new("VirtualMachine", "vm-1")
    }

    #[test]
    fn injected_fault_is_consumed_once() {
        let service = InventoryService::new();
        service.insert(vm(), [("name", json!("db-01"))]);
        service.inject_fault(
            "RetrieveProperties",
            CallError::Transport("connection reset".into()),
        );
        let request = Request::RetrieveProperties {
            this: ObjectReference::new("PropertyCollector", "propertyCollector"),
            spec_set: vec![QueryBatch {
                queries: vec![ObjectQuery::new(vm())],
                attributes: AttributeSpec::all("VirtualMachine"),
            }],
        };
        assert!(service.invoke(request.clone()).is_err());
        assert!(matches!(
            service.invoke(request),
            Ok(Response::ObjectContents(contents)) if contents.len() == 1
        ));
        assert_eq!(service.count("RetrieveProperties"), 2);
    }

    #[test]
    fn stale_cursor_is_rejected() {
        let service = InventoryService::new();
        let Ok(Response::Collector(collector)) = service.invoke(Request::CreatePropertyCollector {
            this: ObjectReference::new("PropertyCollector", "propertyCollector"),
        }) else {
            panic!("collector expected");
        };
        let err = service
            .invoke(Request::WaitForUpdates {
                this: collector,
                version: VersionCursor::from("9"),
            })
            .expect_err("unknown version");
        assert!(matches!(err, CallError::Fault(ref f) if f.code == "InvalidCollectorVersion"));
    }

    #[test]
    fn blocked_wait_observes_cancellation() {
        let service = InventoryService::new();
        let Ok(Response::Collector(collector)) = service.invoke(Request::CreatePropertyCollector {
            this: ObjectReference::new("PropertyCollector", "propertyCollector"),
        }) else {
            panic!("collector expected");
        };
        let first = service
            .invoke(Request::WaitForUpdates {
                this: collector.clone(),
                version: VersionCursor::initial(),
            })
            .expect("initial round");
        let Response::Updates(set) = first else {
            panic!("updates expected");
        };

        let cancel = CancelToken::new();
        let remote = cancel.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            remote.cancel();
        });
        let err = service
            .invoke_cancellable(
                Request::WaitForUpdates {
                    this: collector,
                    version: set.version,
                },
                &cancel,
            )
            .expect_err("cancelled");
        handle.join().expect("cancel thread");
        assert_eq!(err, CallError::Cancelled);
    }
}
