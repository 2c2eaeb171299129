//! Watch event classification.
//!
//! `kube-runtime` watchers are level based: they report that an object was
//! applied or deleted, and periodically relist everything. Handlers are
//! registered per lifecycle phase, so this module remembers which objects
//! have been seen and turns watcher events into create, update and delete
//! notifications.
//!
//! Objects listed during a relist (`InitApply`) are only classified once the
//! relist completes (`InitDone`). Until then the reflector keeps them out of
//! its cache, so a cycle scheduled earlier could not find them.

use crate::resource::ObjectKey;
use kube::api::DynamicObject;
use kube_runtime::watcher;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// A classified watch notification.
#[derive(Debug, Clone)]
pub enum Notification {
    /// The object was seen for the first time.
    Create {
        /// Object as observed
        object: DynamicObject,
    },
    /// A known object was observed again.
    Update {
        /// Previously observed state
        old: DynamicObject,
        /// Newly observed state
        new: DynamicObject,
    },
    /// The object is gone.
    Delete {
        /// Last observed state
        object: DynamicObject,
        /// True when the deletion was inferred from a relist rather than
        /// observed directly, so the final state is unknown.
        state_unknown: bool,
    },
}

impl Notification {
    /// The object this notification is about (the new state for updates).
    pub fn object(&self) -> &DynamicObject {
        match self {
            Notification::Create { object } | Notification::Delete { object, .. } => object,
            Notification::Update { new, .. } => new,
        }
    }
}

/// Tracks observed objects for one watch and classifies its events.
#[derive(Debug, Default)]
pub struct NotificationTracker {
    known: HashMap<ObjectKey, DynamicObject>,
    // Objects listed since the last `Init`, while a relist is in progress
    relist: Option<Vec<DynamicObject>>,
}

impl NotificationTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects currently known.
    pub fn len(&self) -> usize {
        self.known.len()
    }

    /// Whether no objects are known.
    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Classifies one watcher event.
    pub fn observe(&mut self, event: watcher::Event<DynamicObject>) -> Vec<Notification> {
        match event {
            // A restarted relist drops whatever the aborted one buffered
            watcher::Event::Init => {
                self.relist = Some(Vec::new());
                Vec::new()
            }
            watcher::Event::InitApply(obj) => {
                self.relist.get_or_insert_with(Vec::new).push(obj);
                Vec::new()
            }
            watcher::Event::InitDone => self.finish_relist(),
            watcher::Event::Apply(obj) => self.applied(obj).into_iter().collect(),
            watcher::Event::Delete(obj) => {
                let Some(key) = ObjectKey::from_object(&obj) else {
                    return Vec::new();
                };
                self.known.remove(&key);
                vec![Notification::Delete {
                    object: obj,
                    state_unknown: false,
                }]
            }
        }
    }

    fn applied(&mut self, obj: DynamicObject) -> Option<Notification> {
        let Some(key) = ObjectKey::from_object(&obj) else {
            debug!("Ignoring watch event for object without a name");
            return None;
        };
        match self.known.insert(key, obj.clone()) {
            Some(old) => Some(Notification::Update { old, new: obj }),
            None => Some(Notification::Create { object: obj }),
        }
    }

    fn finish_relist(&mut self) -> Vec<Notification> {
        let Some(listed) = self.relist.take() else {
            return Vec::new();
        };

        let mut seen = HashSet::with_capacity(listed.len());
        let mut notifications = Vec::with_capacity(listed.len());
        for obj in listed {
            if let Some(key) = ObjectKey::from_object(&obj) {
                seen.insert(key);
            }
            notifications.extend(self.applied(obj));
        }

        let vanished: Vec<ObjectKey> = self
            .known
            .keys()
            .filter(|key| !seen.contains(*key))
            .cloned()
            .collect();
        for key in vanished {
            if let Some(object) = self.known.remove(&key) {
                debug!("Object {} vanished during relist", key);
                notifications.push(Notification::Delete {
                    object,
                    state_unknown: true,
                });
            }
        }
        notifications
    }
}
