//! Draft autosave. Form values are captured on every edit, debounced, and
//! written as one JSON document under a fixed namespace key.

use crate::form::{Form, FormSnapshot};
use crate::storage::KeyValueStore;
use crate::util::Debouncer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const NAMESPACE_KEY: &str = "todoAutoSave";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AutoSaveStore {
    forms: BTreeMap<String, FormSnapshot>,
}

impl AutoSaveStore {
    /// Absent or unparseable data is an empty store.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some(raw) => serde_json::from_str(raw).unwrap_or_else(|err| {
                warn!(error = %err, "discarding malformed autosave data");
                AutoSaveStore::default()
            }),
            None => AutoSaveStore::default(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn get(&self, form_id: &str) -> Option<&FormSnapshot> {
        self.forms.get(form_id)
    }

    pub fn insert(&mut self, form_id: impl Into<String>, snapshot: FormSnapshot) {
        self.forms.insert(form_id.into(), snapshot);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FormSnapshot)> {
        self.forms.iter()
    }

    pub fn len(&self) -> usize {
        self.forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }
}

pub struct AutoSave<S: KeyValueStore> {
    storage: S,
    namespace: String,
    store: AutoSaveStore,
    debounce: Debouncer<(String, FormSnapshot)>,
}

impl<S: KeyValueStore> AutoSave<S> {
    pub fn load(storage: S, namespace: impl Into<String>, wait: Duration) -> Self {
        let namespace = namespace.into();
        let store = AutoSaveStore::parse(storage.get(&namespace).as_deref());
        debug!(forms = store.len(), namespace = %namespace, "autosave store loaded");
        AutoSave {
            storage,
            namespace,
            store,
            debounce: Debouncer::new(wait),
        }
    }

    pub fn store(&self) -> &AutoSaveStore {
        &self.store
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn is_pending(&self) -> bool {
        self.debounce.is_pending()
    }

    /// Records the form's current state and restarts the quiet window.
    pub fn on_input_change(&mut self, form: &Form, now: Instant) {
        self.debounce
            .trigger((form.storage_key().to_string(), form.snapshot()), now);
    }

    /// Writes the pending snapshot once the quiet window has elapsed.
    /// Returns true when something was written.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.debounce.fire(now) {
            Some((form_id, snapshot)) => self.write(form_id, snapshot),
            None => false,
        }
    }

    /// Writes any pending snapshot right away.
    pub fn flush(&mut self) -> bool {
        match self.debounce.take() {
            Some((form_id, snapshot)) => self.write(form_id, snapshot),
            None => false,
        }
    }

    fn write(&mut self, form_id: String, snapshot: FormSnapshot) -> bool {
        self.store.insert(form_id.clone(), snapshot);
        let serialized = match self.store.to_json() {
            Ok(s) => s,
            Err(err) => {
                warn!(error = %err, "could not serialize autosave store");
                return false;
            }
        };
        match self.storage.set(&self.namespace, serialized) {
            Ok(()) => {
                debug!(form = %form_id, "draft saved");
                true
            }
            Err(err) => {
                warn!(form = %form_id, error = %err, "could not persist draft");
                false
            }
        }
    }

    /// Puts saved drafts back into the forms. A draft whose form id matches
    /// no form lands in the first form.
    pub fn restore_on_load(&self, forms: &mut [Form]) -> usize {
        let mut restored = 0;
        for (form_id, snapshot) in self.store.iter() {
            let target = match forms.iter().position(|f| f.id() == Some(form_id.as_str())) {
                Some(idx) => idx,
                None if !forms.is_empty() => 0,
                None => continue,
            };
            let form = &mut forms[target];
            for (name, value) in snapshot {
                if form.set_value(name, value) {
                    restored += 1;
                }
            }
        }
        restored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::FieldSpec;
    use crate::storage::MemoryStore;

    fn form(id: Option<&str>) -> Form {
        Form::new(
            id,
            "Task",
            vec![
                FieldSpec::text("title", "Title").required(),
                FieldSpec::text("description", "Description"),
            ],
        )
    }

    #[test]
    fn burst_of_edits_writes_once_with_last_state() {
        let start = Instant::now();
        let mut autosave = AutoSave::load(MemoryStore::default(), NAMESPACE_KEY, Duration::from_millis(1000));
        let mut f = form(Some("addTaskForm"));
        for (i, text) in ["B", "Bu", "Buy", "Buy milk"].iter().enumerate() {
            f.set_value("title", text);
            autosave.on_input_change(&f, start + Duration::from_millis(200 * i as u64));
            assert!(!autosave.poll(start + Duration::from_millis(200 * i as u64 + 100)));
        }

        assert!(autosave.poll(start + Duration::from_millis(1600)));
        assert!(!autosave.poll(start + Duration::from_millis(5000)));
        assert_eq!(autosave.storage().writes, 1);

        let saved = AutoSaveStore::parse(autosave.storage().get(NAMESPACE_KEY).as_deref());
        assert_eq!(saved.get("addTaskForm").unwrap()["title"], "Buy milk");
    }

    #[test]
    fn malformed_store_loads_empty() {
        let mut storage = MemoryStore::default();
        storage.set(NAMESPACE_KEY, "{not json".into()).unwrap();
        let autosave = AutoSave::load(storage, NAMESPACE_KEY, Duration::from_millis(1000));
        assert!(autosave.store().is_empty());

        assert!(AutoSaveStore::parse(Some("[\"list\"]")).is_empty());
        assert!(AutoSaveStore::parse(None).is_empty());
    }

    #[test]
    fn anonymous_forms_save_under_default_key() {
        let start = Instant::now();
        let mut autosave = AutoSave::load(MemoryStore::default(), NAMESPACE_KEY, Duration::from_millis(10));
        let mut f = form(None);
        f.set_value("title", "x");
        autosave.on_input_change(&f, start);
        assert!(autosave.flush());
        assert!(autosave.store().get("default").is_some());
    }

    #[test]
    fn unmatched_draft_restores_into_first_form() {
        let mut store = AutoSaveStore::default();
        let mut snapshot = FormSnapshot::new();
        snapshot.insert("title".into(), "orphan".into());
        snapshot.insert("unknown".into(), "ignored".into());
        store.insert("gone", snapshot);
        let mut storage = MemoryStore::default();
        storage.set(NAMESPACE_KEY, store.to_json().unwrap()).unwrap();

        let autosave = AutoSave::load(storage, NAMESPACE_KEY, Duration::from_millis(1000));
        let mut forms = vec![form(Some("addTaskForm")), form(Some("editTaskForm"))];
        assert_eq!(autosave.restore_on_load(&mut forms), 1);
        assert_eq!(forms[0].value("title"), Some("orphan"));
        assert_eq!(forms[1].value("title"), Some(""));
    }
}
