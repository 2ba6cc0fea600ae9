// Shader hot reload
//
// Watches the shader directory on a background thread. The render loop
// drains the collected paths between frames and rebuilds the pipeline.

use anyhow::Context;
use notify::{
    event::ModifyKind, recommended_watcher, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Compiled shader files touched by `event` with new contents
pub fn changed_shaders(event: &notify::Event) -> Vec<PathBuf> {
    match &event.kind {
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Name(_) | ModifyKind::Any) => {}
        _ => return Vec::new(),
    }

    event
        .paths
        .iter()
        .filter(|path| path.extension().is_some_and(|ext| ext == "spv"))
        .cloned()
        .collect()
}

pub struct ShaderWatcher {
    _watcher: RecommendedWatcher,
    pending: Arc<Mutex<BTreeSet<PathBuf>>>,
}

impl ShaderWatcher {
    pub fn new(directory: &Path) -> anyhow::Result<Self> {
        let pending = Arc::new(Mutex::new(BTreeSet::new()));
        let sink = Arc::clone(&pending);

        let mut watcher =
            recommended_watcher(move |event_res: Result<notify::Event, notify::Error>| {
                match event_res {
                    Ok(event) => {
                        let changed = changed_shaders(&event);
                        if !changed.is_empty() {
                            sink.lock().extend(changed);
                        }
                    }
                    Err(err) => log::error!("Shader watcher had an error: {err}"),
                }
            })
            .context("Failed to create file watcher")?;

        watcher
            .watch(directory, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch shader directory {}", directory.display()))?;

        log::info!("Watching {} for shader changes", directory.display());

        Ok(Self {
            _watcher: watcher,
            pending,
        })
    }

    /// Paths changed since the last call
    pub fn take_changes(&self) -> Vec<PathBuf> {
        std::mem::take(&mut *self.pending.lock()).into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind, RemoveKind};
    use notify::Event;

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |event, path| event.add_path(PathBuf::from(path)))
    }

    #[test]
    fn content_changes_to_spirv_count() {
        let modified = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["shaders/quad.vert.spv", "shaders/quad.vert"],
        );
        assert_eq!(changed_shaders(&modified), vec![PathBuf::from("shaders/quad.vert.spv")]);

        let created = event(EventKind::Create(CreateKind::File), &["shaders/color.frag.spv"]);
        assert_eq!(changed_shaders(&created).len(), 1);
    }

    #[test]
    fn reads_metadata_and_removals_are_ignored() {
        let kinds = [
            EventKind::Access(AccessKind::Any),
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::WriteTime)),
            EventKind::Remove(RemoveKind::File),
        ];
        for kind in kinds {
            assert!(changed_shaders(&event(kind, &["shaders/color.frag.spv"])).is_empty());
        }
    }

    #[test]
    fn watcher_collects_changes_once() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = ShaderWatcher::new(dir.path()).unwrap();

        watcher.pending.lock().insert(dir.path().join("a.spv"));
        watcher.pending.lock().insert(dir.path().join("a.spv"));

        assert_eq!(watcher.take_changes().len(), 1);
        assert!(watcher.take_changes().is_empty());
    }
}
