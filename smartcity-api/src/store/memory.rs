use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::{mpsc, Mutex};

use super::{StateStore, StoreError, Watch, WatchId};

struct Watcher {
    path: Vec<String>,
    /// Wakes the task that re-reads `path` for the subscriber
    changed: mpsc::UnboundedSender<()>,
}

struct Tree {
    root: Value,
    watchers: BTreeMap<WatchId, Watcher>,
    next_watch: WatchId,
}

/// In-process JSON tree with the same path and watch semantics as the remote
/// store. Empty objects and nulls count as absent, like in Firebase.
///
/// A watch delivers one notification per related mutation, and each carries
/// the path as it reads when the notification is delivered.
pub struct MemoryStore {
    tree: Arc<Mutex<Tree>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tree: Arc::new(Mutex::new(Tree {
                root: Value::Object(Map::new()),
                watchers: BTreeMap::new(),
                next_watch: 1,
            })),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_empty(value: &Value) -> bool {
    value.is_null() || value.as_object().is_some_and(Map::is_empty)
}

fn lookup<'a>(root: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter()
        .try_fold(root, |node, segment| node.get(segment.as_str()))
        .filter(|value| !is_empty(value))
}

fn slot<'a>(root: &'a mut Value, path: &[String]) -> Option<&'a mut Value> {
    path.iter().try_fold(root, |node, segment| {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        node.as_object_mut()
            .map(|map| map.entry(segment.clone()).or_insert(Value::Null))
    })
}

fn delete(node: &mut Value, path: &[String]) {
    let Some((first, rest)) = path.split_first() else {
        *node = Value::Object(Map::new());
        return;
    };

    if let Value::Object(map) = node {
        if rest.is_empty() {
            map.remove(first);
        } else if let Some(child) = map.get_mut(first) {
            delete(child, rest);
            if is_empty(child) {
                map.remove(first);
            }
        }
    }
}

fn put(root: &mut Value, path: &[String], value: Value) {
    if is_empty(&value) {
        delete(root, path);
    } else if let Some(target) = slot(root, path) {
        *target = value;
    }
}

impl Tree {
    fn notify(&mut self, changed: &[String]) {
        self.watchers.retain(|_, watcher| {
            let related = watcher.path.starts_with(changed) || changed.starts_with(&watcher.path);
            !related || watcher.changed.send(()).is_ok()
        });
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn read(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let tree = self.tree.lock().await;

        Ok(lookup(&tree.root, &segments(path)).cloned())
    }

    async fn write_whole(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let path = segments(path);
        let mut tree = self.tree.lock().await;

        put(&mut tree.root, &path, value);
        tree.notify(&path);

        Ok(())
    }

    async fn write_field(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError> {
        let path = segments(path);
        let mut tree = self.tree.lock().await;

        for (field, value) in fields {
            let mut field_path = path.clone();
            field_path.extend(segments(&field));
            put(&mut tree.root, &field_path, value);
        }
        tree.notify(&path);

        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        let path = segments(path);
        let mut tree = self.tree.lock().await;

        delete(&mut tree.root, &path);
        tree.notify(&path);

        Ok(())
    }

    async fn watch(&self, path: &str) -> Result<Watch, StoreError> {
        let path = segments(path);
        let (sender, receiver) = mpsc::unbounded_channel();
        let (changed, mut wakeups) = mpsc::unbounded_channel();
        let _ = changed.send(());

        let mut tree = self.tree.lock().await;
        let id = tree.next_watch;
        tree.next_watch += 1;
        tree.watchers.insert(id, Watcher { path: path.clone(), changed });
        drop(tree);

        let weak = Arc::downgrade(&self.tree);
        tokio::spawn(async move {
            while wakeups.recv().await.is_some() {
                let Some(tree) = weak.upgrade() else { break };
                let value = lookup(&tree.lock().await.root, &path).cloned();
                if sender.send(value).is_err() {
                    break;
                }
            }
        });

        Ok(Watch { id, receiver })
    }

    async fn unwatch(&self, id: WatchId) {
        self.tree.lock().await.watchers.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_read_write_whole() {
        let store = MemoryStore::new();

        assert_eq!(store.read("smartcity/status").await.unwrap(), None);

        store
            .write_whole("smartcity/status", json!({ "online": 1, "lastUpdate": "now" }))
            .await
            .unwrap();

        assert_eq!(store.read("smartcity/status/online").await.unwrap(), Some(json!(1)));
        assert_eq!(
            store.read("/smartcity/").await.unwrap(),
            Some(json!({ "status": { "online": 1, "lastUpdate": "now" } }))
        );
    }

    #[tokio::test]
    async fn test_write_field_keeps_siblings() {
        let store = MemoryStore::new();
        store
            .write_whole("a/device", json!({ "name": "Ventilação", "status": "Desligado" }))
            .await
            .unwrap();

        store
            .write_field("a/device", fields(json!({ "status": "Ligado" })))
            .await
            .unwrap();

        assert_eq!(
            store.read("a/device").await.unwrap(),
            Some(json!({ "name": "Ventilação", "status": "Ligado" }))
        );
    }

    #[tokio::test]
    async fn test_remove_prunes_empty_parents() {
        let store = MemoryStore::new();
        store.write_whole("a/b/c", json!("value")).await.unwrap();
        store.write_whole("a/d", json!(1)).await.unwrap();

        store.remove("a/b/c").await.unwrap();

        assert_eq!(store.read("a/b").await.unwrap(), None);
        assert_eq!(store.read("a").await.unwrap(), Some(json!({ "d": 1 })));

        store.write_whole("a/d", Value::Null).await.unwrap();
        assert_eq!(store.read("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_watch_sees_own_writes() {
        let store = MemoryStore::new();
        let mut watch = store.watch("root/devices/actuators").await.unwrap();

        assert_eq!(watch.receiver.recv().await.unwrap(), None);

        store
            .write_field("root/devices/actuators/Rega_ParqueVerde", fields(json!({ "status": "Ligado" })))
            .await
            .unwrap();
        assert_eq!(
            watch.receiver.recv().await.unwrap(),
            Some(json!({ "Rega_ParqueVerde": { "status": "Ligado" } }))
        );

        store.write_whole("root/status", json!({ "online": 1 })).await.unwrap();
        assert!(watch.receiver.try_recv().is_err());

        store.write_whole("root", json!({})).await.unwrap();
        assert_eq!(watch.receiver.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_notification_reads_path_on_delivery() {
        let store = MemoryStore::new();
        let mut watch = store.watch("root/devices/actuators").await.unwrap();
        assert_eq!(watch.receiver.recv().await.unwrap(), None);

        store
            .write_field("root/devices/actuators/Ventilação_ZonaIndustrial", fields(json!({ "status": "Ligado" })))
            .await
            .unwrap();
        store
            .write_field("root/devices/actuators/AlertadePoluição_ZonaIndustrial", fields(json!({ "status": "Ligado" })))
            .await
            .unwrap();

        let latest = json!({
            "Ventilação_ZonaIndustrial": { "status": "Ligado" },
            "AlertadePoluição_ZonaIndustrial": { "status": "Ligado" }
        });
        assert_eq!(watch.receiver.recv().await.unwrap(), Some(latest.clone()));
        assert_eq!(watch.receiver.recv().await.unwrap(), Some(latest));
    }

    #[tokio::test]
    async fn test_unwatch_closes_receiver() {
        let store = MemoryStore::new();
        let mut watch = store.watch("root/rules").await.unwrap();
        let _ = watch.receiver.recv().await;

        store.unwatch(watch.id).await;
        store.write_whole("root/rules", json!({ "noise": {} })).await.unwrap();

        assert_eq!(watch.receiver.recv().await, None);
    }
}
