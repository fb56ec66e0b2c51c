use std::collections::HashSet;

use shared::domain::{EntityId, EntitySchema, FieldValue};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditorMode {
    #[default]
    Creating,
    Editing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Created(EntityId),
    Updated(EntityId),
    /// The entity being edited left the collection before the commit. The
    /// draft is dropped and the collection is untouched.
    Discarded(EntityId),
    /// Required fields were blank; nothing changed.
    Rejected { missing: Vec<&'static str> },
}

impl CommitOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, CommitOutcome::Created(_) | CommitOutcome::Updated(_))
    }
}

/// Strictly increasing id source for one editing session.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    /// `None` once an id of `i64::MAX` has been handed out or reserved.
    next: Option<i64>,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self { next: Some(1) }
    }
}

impl IdAllocator {
    pub fn starting_at(first: i64) -> Self {
        Self { next: Some(first) }
    }

    /// Returns `None` when the counter is exhausted.
    pub fn allocate(&mut self) -> Option<EntityId> {
        let id = self.next?;
        self.next = id.checked_add(1);
        Some(EntityId(id))
    }

    /// Guarantees every later allocation is greater than `id`.
    pub fn reserve_past(&mut self, id: EntityId) {
        if let Some(next) = self.next {
            if id.0 >= next {
                self.next = id.0.checked_add(1);
            }
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.next.is_none()
    }
}

/// Draft, committed collection and mode for one entity type.
///
/// Invariants: every entity in the collection has a unique id, and the draft
/// carries an id exactly when the store is in [`EditorMode::Editing`].
#[derive(Debug, Clone)]
pub struct EntityEditorStore<T: EntitySchema> {
    draft: T,
    entities: Vec<T>,
    mode: EditorMode,
    ids: IdAllocator,
}

impl<T: EntitySchema> Default for EntityEditorStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: EntitySchema> EntityEditorStore<T> {
    pub fn new() -> Self {
        Self::with_allocator(IdAllocator::default())
    }

    pub fn with_allocator(ids: IdAllocator) -> Self {
        Self {
            draft: T::default(),
            entities: Vec::new(),
            mode: EditorMode::Creating,
            ids,
        }
    }

    /// Seeds the collection with already-committed entities, e.g. the list
    /// fetched from the server.
    pub fn with_entities(entities: Vec<T>) -> Self {
        let mut store = Self::new();
        store.replace_entities(entities);
        store
    }

    /// Swaps the collection for `entities`, keeping draft and mode. Entities
    /// without an id, or repeating an earlier id, get a fresh one.
    pub fn replace_entities(&mut self, entities: Vec<T>) {
        for id in entities.iter().filter_map(|entity| entity.id()) {
            self.ids.reserve_past(id);
        }

        let mut taken: HashSet<EntityId> =
            entities.iter().filter_map(|entity| entity.id()).collect();
        let mut seen = HashSet::with_capacity(entities.len());
        let mut kept = Vec::with_capacity(entities.len());
        for mut entity in entities {
            let unique = entity.id().is_some_and(|id| seen.insert(id));
            if !unique {
                let fresh = self
                    .ids
                    .allocate()
                    .unwrap_or_else(|| lowest_free_id(&taken));
                taken.insert(fresh);
                seen.insert(fresh);
                entity.set_id(Some(fresh));
            }
            kept.push(entity);
        }
        self.entities = kept;
    }

    pub fn draft(&self) -> &T {
        &self.draft
    }

    pub fn entities(&self) -> &[T] {
        &self.entities
    }

    pub fn mode(&self) -> EditorMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, id: EntityId) -> Option<&T> {
        self.entities.iter().find(|entity| entity.id() == Some(id))
    }

    /// Replaces one draft field. Returns `false` when `name` is not part of
    /// the schema, in which case the draft is left as it was.
    pub fn update_field(&mut self, name: &str, value: impl Into<FieldValue>) -> bool {
        let applied = self.draft.set_field(name, value.into());
        if !applied {
            debug!(kind = %T::KIND, field = name, "ignored update for unknown field");
        }
        applied
    }

    /// Loads a committed entity into the draft. On a miss the draft falls
    /// back to the blank sentinel and the store stays in creating mode.
    pub fn select_for_edit(&mut self, id: EntityId) -> bool {
        match self.get(id).cloned() {
            Some(entity) => {
                self.draft = entity;
                self.mode = EditorMode::Editing;
                true
            }
            None => {
                self.reset_draft();
                false
            }
        }
    }

    pub fn cancel_edit(&mut self) {
        self.reset_draft();
    }

    pub fn commit(&mut self) -> CommitOutcome {
        let missing: Vec<&'static str> = self
            .draft
            .missing_fields()
            .into_iter()
            .map(|spec| spec.name)
            .collect();
        if !missing.is_empty() {
            debug!(kind = %T::KIND, ?missing, "commit rejected");
            return CommitOutcome::Rejected { missing };
        }

        let draft = std::mem::take(&mut self.draft);
        let outcome = match (self.mode, draft.id()) {
            (EditorMode::Editing, Some(id)) => {
                match self
                    .entities
                    .iter_mut()
                    .find(|entity| entity.id() == Some(id))
                {
                    Some(slot) => {
                        *slot = draft;
                        CommitOutcome::Updated(id)
                    }
                    None => CommitOutcome::Discarded(id),
                }
            }
            _ => {
                let id = self.ids.allocate().unwrap_or_else(|| {
                    let taken = self.entities.iter().filter_map(|entity| entity.id()).collect();
                    lowest_free_id(&taken)
                });
                let mut entity = draft;
                entity.set_id(Some(id));
                self.entities.push(entity);
                CommitOutcome::Created(id)
            }
        };

        self.reset_draft();
        debug!(kind = %T::KIND, ?outcome, "commit applied");
        outcome
    }

    pub fn delete(&mut self, id: EntityId) -> Option<T> {
        let index = self
            .entities
            .iter()
            .position(|entity| entity.id() == Some(id))?;
        Some(self.entities.remove(index))
    }

    fn reset_draft(&mut self) {
        self.draft = T::default();
        self.mode = EditorMode::Creating;
    }
}

/// Fallback once the counter has run past `i64::MAX`.
fn lowest_free_id(taken: &HashSet<EntityId>) -> EntityId {
    let id = (1..=i64::MAX)
        .map(EntityId)
        .find(|id| !taken.contains(id))
        .unwrap_or(EntityId(0));
    debug!(%id, "id counter exhausted; reusing lowest free id");
    id
}

#[cfg(test)]
#[path = "tests/editor_tests.rs"]
mod tests;
