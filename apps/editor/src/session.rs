use anyhow::{bail, Context, Result};
use client_core::{load_image_data_url, CommitOutcome, EditorMode, EntityEditorStore, RacingClient};
use shared::domain::{Driver, EntityKind, EntitySchema, Race, Team};
use tracing::info;

use crate::commands::EntityAction;

/// One editor per entity kind, optionally mirrored to a racing server.
pub struct EditorSession {
    drivers: EntityEditorStore<Driver>,
    races: EntityEditorStore<Race>,
    teams: EntityEditorStore<Team>,
    remote: Option<RacingClient>,
}

impl EditorSession {
    pub fn offline() -> Self {
        Self {
            drivers: EntityEditorStore::new(),
            races: EntityEditorStore::new(),
            teams: EntityEditorStore::new(),
            remote: None,
        }
    }

    pub fn with_remote(client: RacingClient) -> Self {
        Self {
            remote: Some(client),
            ..Self::offline()
        }
    }

    /// Replaces every local collection with the server's copy.
    pub async fn load_remote(&mut self) -> Result<()> {
        let Some(client) = self.remote.as_ref() else {
            return Ok(());
        };
        reload(&mut self.drivers, client).await?;
        reload(&mut self.races, client).await?;
        reload(&mut self.teams, client).await?;
        info!(
            server = %client.base_url(),
            drivers = self.drivers.len(),
            races = self.races.len(),
            teams = self.teams.len(),
            "loaded collections from server"
        );
        Ok(())
    }

    pub async fn apply(&mut self, kind: EntityKind, action: EntityAction) -> Result<String> {
        let remote = self.remote.as_ref();
        match kind {
            EntityKind::Driver => apply_action(&mut self.drivers, remote, action).await,
            EntityKind::Race => apply_action(&mut self.races, remote, action).await,
            EntityKind::Team => apply_action(&mut self.teams, remote, action).await,
        }
    }

    pub fn drivers(&self) -> &EntityEditorStore<Driver> {
        &self.drivers
    }

    pub fn races(&self) -> &EntityEditorStore<Race> {
        &self.races
    }

    pub fn teams(&self) -> &EntityEditorStore<Team> {
        &self.teams
    }
}

async fn apply_action<T: EntitySchema>(
    store: &mut EntityEditorStore<T>,
    remote: Option<&RacingClient>,
    action: EntityAction,
) -> Result<String> {
    let kind = T::KIND;
    match action {
        EntityAction::Set { field, value } => {
            if !store.update_field(&field, value) {
                bail!("{kind} has no field '{field}'");
            }
            let shown = store
                .draft()
                .field(&field)
                .map(|value| serde_json::to_string(&value))
                .transpose()?
                .unwrap_or_default();
            Ok(format!("{kind}.{field} = {shown}"))
        }
        EntityAction::Image { path } => {
            if !T::FIELDS.iter().any(|spec| spec.name == "image") {
                bail!("{kind} has no image field");
            }
            let data_url = load_image_data_url(&path).await?;
            let size = data_url.len();
            store.update_field("image", data_url);
            Ok(format!(
                "{kind}.image loaded from {} ({size} chars)",
                path.display()
            ))
        }
        EntityAction::Commit => match remote {
            Some(client) => commit_remote(store, client).await,
            None => Ok(describe_commit(kind, &store.commit())),
        },
        EntityAction::Edit { id } => {
            if !store.select_for_edit(id) {
                bail!("{kind} {id} not found");
            }
            Ok(format!("editing {kind} {id}"))
        }
        EntityAction::Delete { id } => {
            if store.get(id).is_none() {
                bail!("{kind} {id} not found");
            }
            if let Some(client) = remote {
                client
                    .delete::<T>(id)
                    .await
                    .with_context(|| format!("server kept {kind} {id}"))?;
                store.delete(id);
                reload(store, client).await?;
            } else {
                store.delete(id);
            }
            Ok(format!("deleted {kind} {id}"))
        }
        EntityAction::Cancel => {
            store.cancel_edit();
            Ok(format!("{kind} draft cleared"))
        }
        EntityAction::List => {
            if store.is_empty() {
                return Ok(format!("no {} yet", kind.collection()));
            }
            let lines = store
                .entities()
                .iter()
                .map(serde_json::to_string)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(lines.join("\n"))
        }
        EntityAction::Show => {
            let mode = match store.mode() {
                EditorMode::Creating => "creating",
                EditorMode::Editing => "editing",
            };
            let mut out = format!(
                "{kind} draft ({mode}):\n{}",
                serde_json::to_string_pretty(store.draft())?
            );
            let missing: Vec<&str> = store
                .draft()
                .missing_fields()
                .into_iter()
                .map(|spec| spec.label)
                .collect();
            if !missing.is_empty() {
                out.push_str(&format!("\nstill required: {}", missing.join(", ")));
            }
            Ok(out)
        }
    }
}

fn describe_commit(kind: EntityKind, outcome: &CommitOutcome) -> String {
    match outcome {
        CommitOutcome::Rejected { missing } => {
            format!("{kind} not saved; missing {}", missing.join(", "))
        }
        CommitOutcome::Discarded(id) => format!("{kind} {id} no longer exists; draft discarded"),
        CommitOutcome::Created(id) => format!("created {kind} {id}"),
        CommitOutcome::Updated(id) => format!("updated {kind} {id}"),
    }
}

/// Saves the draft on the server first; the local store only commits once the
/// server has accepted it, then adopts the server's collection and ids.
async fn commit_remote<T: EntitySchema>(
    store: &mut EntityEditorStore<T>,
    client: &RacingClient,
) -> Result<String> {
    let kind = T::KIND;
    let editing = match (store.mode(), store.draft().id()) {
        (EditorMode::Editing, Some(id)) => Some(id),
        _ => None,
    };
    let edited_gone = editing.is_some_and(|id| store.get(id).is_none());
    if !store.draft().is_complete() || edited_gone {
        return Ok(describe_commit(kind, &store.commit()));
    }

    let message = match editing {
        Some(id) => {
            client
                .update(store.draft())
                .await
                .with_context(|| format!("server did not update {kind} {id}"))?;
            format!("updated {kind} {id} on server")
        }
        None => {
            let saved = client
                .create(store.draft())
                .await
                .with_context(|| format!("server did not save {kind}"))?;
            match saved.id() {
                Some(id) => format!("created {kind} {id} on server"),
                None => format!("created {kind} on server"),
            }
        }
    };
    store.commit();
    reload(store, client).await?;
    Ok(message)
}

async fn reload<T: EntitySchema>(
    store: &mut EntityEditorStore<T>,
    client: &RacingClient,
) -> Result<()> {
    let entities = client
        .list::<T>()
        .await
        .with_context(|| format!("failed to load {} from server", T::KIND.collection()))?;
    store.replace_entities(entities);
    Ok(())
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
