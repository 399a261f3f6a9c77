use anyhow::Context;
use chrono::NaiveDate;
use tracing::{debug, info};

use crate::datetime::parse_iso_date;
use crate::error::TaskError;
use crate::storage::Storage;
use crate::task::Task;

/// Storage key holding the serialized task array.
pub const TASKS_KEY: &str = "tasks";

/// Raw add-task input, as typed by the user.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub name: String,
    pub date: String,
    pub color: Option<String>,
}

/// Field updates for an existing task. `color: Some(None)` clears the color.
#[derive(Debug, Clone, Default)]
pub struct TaskEdit {
    pub name: Option<String>,
    pub date: Option<String>,
    pub color: Option<Option<String>>,
}

impl TaskEdit {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.date.is_none() && self.color.is_none()
    }
}

/// The ordered task list and the storage it is persisted to.
///
/// Every mutation re-serializes the whole list before returning, and the
/// in-memory list only changes once storage has accepted the write.
#[derive(Debug)]
pub struct TaskStore<S: Storage> {
    storage: S,
    tasks: Vec<Task>,
}

impl<S: Storage> TaskStore<S> {
    #[tracing::instrument(skip(storage))]
    pub fn load(storage: S) -> anyhow::Result<Self> {
        let tasks = match storage.get_item(TASKS_KEY)? {
            Some(raw) if !raw.trim().is_empty() => serde_json::from_str::<Vec<Task>>(&raw)
                .with_context(|| format!("failed parsing stored {TASKS_KEY:?} array"))?,
            _ => Vec::new(),
        };
        debug!(count = tasks.len(), "loaded tasks");
        Ok(Self { storage, tasks })
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, index: usize) -> Option<&Task> {
        self.tasks.get(index)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    #[tracing::instrument(skip(self, input), fields(name = %input.name, date = %input.date))]
    pub fn add(&mut self, input: NewTask) -> anyhow::Result<usize> {
        let name = input.name.trim();
        let date = input.date.trim();
        if name.is_empty() || date.is_empty() {
            return Err(TaskError::MissingFields.into());
        }

        let date = parse_iso_date(date)?;
        let color = normalize_color(input.color)?;
        let mut next = self.tasks.clone();
        next.push(Task::new(name.to_string(), date, color));
        let index = next.len() - 1;
        self.commit(next)?;

        info!(index, "task added");
        Ok(index)
    }

    #[tracing::instrument(skip(self))]
    pub fn delete(&mut self, index: usize) -> anyhow::Result<Task> {
        self.check_index(index)?;
        let mut next = self.tasks.clone();
        let removed = next.remove(index);
        self.commit(next)?;
        info!(index, name = %removed.name, "task deleted");
        Ok(removed)
    }

    #[tracing::instrument(skip(self))]
    pub fn toggle(&mut self, index: usize) -> anyhow::Result<bool> {
        self.check_index(index)?;
        let mut next = self.tasks.clone();
        let task = &mut next[index];
        task.completed = !task.completed;
        let completed = task.completed;
        self.commit(next)?;
        info!(index, completed, "task toggled");
        Ok(completed)
    }

    #[tracing::instrument(skip(self, edit))]
    pub fn edit(&mut self, index: usize, edit: TaskEdit) -> anyhow::Result<()> {
        self.check_index(index)?;

        let name = match edit.name {
            Some(raw) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    return Err(TaskError::EmptyName.into());
                }
                Some(trimmed.to_string())
            }
            None => None,
        };
        let date: Option<NaiveDate> = edit.date.as_deref().map(parse_iso_date).transpose()?;
        let color = edit.color.map(normalize_color).transpose()?;

        let mut next = self.tasks.clone();
        let task = &mut next[index];
        if let Some(name) = name {
            task.name = name;
        }
        if let Some(date) = date {
            task.date = date;
        }
        if let Some(color) = color {
            task.color = color;
        }

        self.commit(next)?;
        info!(index, "task edited");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub fn clear_completed(&mut self) -> anyhow::Result<usize> {
        let before = self.tasks.len();
        let next: Vec<Task> = self
            .tasks
            .iter()
            .filter(|task| !task.completed)
            .cloned()
            .collect();
        let removed = before - next.len();
        if removed > 0 {
            self.commit(next)?;
        }
        info!(before, after = self.tasks.len(), "cleared completed tasks");
        Ok(removed)
    }

    fn check_index(&self, index: usize) -> Result<(), TaskError> {
        if index < self.tasks.len() {
            Ok(())
        } else {
            Err(TaskError::IndexOutOfRange {
                index,
                len: self.tasks.len(),
            })
        }
    }

    /// Writes `next` to storage and only then makes it the in-memory list,
    /// so a failed save leaves the store as it was.
    #[tracing::instrument(skip(self, next), fields(count = next.len()))]
    fn commit(&mut self, next: Vec<Task>) -> anyhow::Result<()> {
        let serialized = serde_json::to_string(&next)?;
        self.storage
            .set_item(TASKS_KEY, &serialized)
            .with_context(|| format!("failed to save {TASKS_KEY:?}"))?;
        self.tasks = next;
        Ok(())
    }
}

/// Blank colors mean "use the default"; anything else must parse as CSS.
fn normalize_color(raw: Option<String>) -> Result<Option<String>, TaskError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    csscolorparser::parse(trimmed).map_err(|_| TaskError::InvalidColor(trimmed.to_string()))?;
    Ok(Some(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn new_task(name: &str, date: &str) -> NewTask {
        NewTask {
            name: name.to_string(),
            date: date.to_string(),
            color: None,
        }
    }

    fn empty_store() -> TaskStore<MemoryStorage> {
        TaskStore::load(MemoryStorage::new()).expect("load empty store")
    }

    fn task_error(err: &anyhow::Error) -> Option<&TaskError> {
        err.downcast_ref::<TaskError>()
    }

    #[test]
    fn add_appends_at_the_end() {
        let mut store = empty_store();
        store.add(new_task("first", "2026-10-20")).expect("add");
        let idx = store.add(new_task("second", "2026-10-21")).expect("add");

        assert_eq!(idx, 1);
        assert_eq!(store.len(), 2);
        assert_eq!(store.tasks()[1].name, "second");
        assert!(!store.tasks()[1].completed);
    }

    #[test]
    fn add_requires_name_and_date() {
        let mut store = empty_store();
        for (name, date) in [("", "2026-10-20"), ("x", ""), ("   ", "  ")] {
            let err = store.add(new_task(name, date)).expect_err("must reject");
            assert_eq!(task_error(&err), Some(&TaskError::MissingFields));
            assert_eq!(
                err.to_string(),
                "Please enter both task name and deadline date."
            );
        }
        assert!(store.is_empty());
        assert_eq!(store.storage().get_item(TASKS_KEY).expect("get"), None);
    }

    #[test]
    fn add_rejects_bad_dates_and_colors() {
        let mut store = empty_store();
        let err = store.add(new_task("x", "2026-02-30")).expect_err("bad date");
        assert!(matches!(task_error(&err), Some(TaskError::InvalidDate(_))));

        let mut input = new_task("x", "2026-10-20");
        input.color = Some("not-a-color".to_string());
        let err = store.add(input).expect_err("bad color");
        assert!(matches!(task_error(&err), Some(TaskError::InvalidColor(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn delete_shifts_later_indices_down() {
        let mut store = empty_store();
        for name in ["a", "b", "c", "d"] {
            store.add(new_task(name, "2026-10-20")).expect("add");
        }

        let removed = store.delete(1).expect("delete");
        assert_eq!(removed.name, "b");
        let names: Vec<_> = store.tasks().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c", "d"]);

        let err = store.delete(3).expect_err("out of range");
        assert_eq!(
            task_error(&err),
            Some(&TaskError::IndexOutOfRange { index: 3, len: 3 })
        );
    }

    #[test]
    fn toggle_flips_completion_in_place() {
        let mut store = empty_store();
        store.add(new_task("a", "2026-10-20")).expect("add");
        assert!(store.toggle(0).expect("toggle"));
        assert!(store.tasks()[0].completed);
        assert!(!store.toggle(0).expect("toggle"));
    }

    #[test]
    fn edit_updates_only_given_fields() {
        let mut store = empty_store();
        let mut input = new_task("draft", "2026-10-20");
        input.color = Some("#00ff00".to_string());
        store.add(input).expect("add");

        store
            .edit(
                0,
                TaskEdit {
                    date: Some("2026-11-02".to_string()),
                    ..TaskEdit::default()
                },
            )
            .expect("edit date");
        let task = &store.tasks()[0];
        assert_eq!(task.name, "draft");
        assert_eq!(task.date, parse_iso_date("2026-11-02").expect("date"));
        assert_eq!(task.color.as_deref(), Some("#00ff00"));

        store
            .edit(
                0,
                TaskEdit {
                    name: Some("final".to_string()),
                    color: Some(None),
                    ..TaskEdit::default()
                },
            )
            .expect("edit name and clear color");
        assert_eq!(store.tasks()[0].name, "final");
        assert_eq!(store.tasks()[0].color, None);

        let err = store
            .edit(
                0,
                TaskEdit {
                    name: Some(" ".to_string()),
                    ..TaskEdit::default()
                },
            )
            .expect_err("empty name");
        assert_eq!(task_error(&err), Some(&TaskError::EmptyName));
    }

    #[test]
    fn clear_completed_keeps_open_tasks_in_order() {
        let mut store = empty_store();
        for name in ["a", "b", "c"] {
            store.add(new_task(name, "2026-10-20")).expect("add");
        }
        store.toggle(0).expect("toggle");
        store.toggle(2).expect("toggle");

        assert_eq!(store.clear_completed().expect("clear"), 2);
        let names: Vec<_> = store.tasks().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["b"]);
    }

    /// Accepts a fixed number of writes, then refuses every later one.
    #[derive(Debug, Default)]
    struct ReadOnlyAfter {
        inner: MemoryStorage,
        writes_left: usize,
    }

    impl Storage for ReadOnlyAfter {
        fn get_item(&self, key: &str) -> anyhow::Result<Option<String>> {
            self.inner.get_item(key)
        }

        fn set_item(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
            if self.writes_left == 0 {
                anyhow::bail!("disk full");
            }
            self.writes_left -= 1;
            self.inner.set_item(key, value)
        }

        fn remove_item(&mut self, key: &str) -> anyhow::Result<()> {
            self.inner.remove_item(key)
        }
    }

    #[test]
    fn failed_save_leaves_tasks_untouched() {
        let storage = ReadOnlyAfter {
            writes_left: 2,
            ..ReadOnlyAfter::default()
        };
        let mut store = TaskStore::load(storage).expect("load");
        store.add(new_task("a", "2026-10-20")).expect("add");
        store.add(new_task("b", "2026-10-21")).expect("add");
        let saved = store.tasks().to_vec();

        let err = store.add(new_task("c", "2026-10-22")).expect_err("write refused");
        assert!(format!("{err:#}").contains("disk full"));
        assert!(store.delete(0).is_err());
        assert!(store.toggle(1).is_err());
        assert!(
            store
                .edit(
                    0,
                    TaskEdit {
                        name: Some("renamed".to_string()),
                        ..TaskEdit::default()
                    },
                )
                .is_err()
        );

        assert_eq!(store.tasks(), saved.as_slice());
        let stored = store
            .storage()
            .get_item(TASKS_KEY)
            .expect("get")
            .expect("stored array");
        assert_eq!(stored, serde_json::to_string(&saved).expect("serialize"));
    }

    #[test]
    fn every_mutation_is_persisted() {
        let mut store = empty_store();
        store.add(new_task("a", "2026-10-20")).expect("add");
        store.toggle(0).expect("toggle");

        let raw = store
            .storage()
            .get_item(TASKS_KEY)
            .expect("get")
            .expect("stored array");
        assert_eq!(raw, r#"[{"name":"a","date":"2026-10-20","completed":true}]"#);
    }
}
