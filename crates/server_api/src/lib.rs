use std::sync::Arc;

use serde_json::{json, Value};
use shared::{
    domain::{EntityId, EntitySchema},
    error::{ClassifyFailure, WorkError},
    protocol::ResponseEnvelope,
};
use storage::{EntityRepository, StoredEntity};
use tracing::info;

pub mod response;

pub use response::{create_http_response, create_http_response_async, ModelState};

#[derive(Clone)]
pub struct ApiContext {
    pub repository: Arc<dyn EntityRepository>,
}

impl ApiContext {
    pub fn new(repository: Arc<dyn EntityRepository>) -> Self {
        Self { repository }
    }
}

pub async fn list_entities<T: EntitySchema>(ctx: &ApiContext) -> Result<ResponseEnvelope, WorkError> {
    let stored = ctx.repository.list_entities(T::KIND).await?;
    let records = stored
        .into_iter()
        .map(record_from_stored::<T>)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ResponseEnvelope::ok(serde_json::to_value(records)?))
}

pub async fn get_entity<T: EntitySchema>(
    ctx: &ApiContext,
    id: EntityId,
) -> Result<ResponseEnvelope, WorkError> {
    let stored = ctx
        .repository
        .load_entity(T::KIND, id)
        .await?
        .ok_or_else(|| not_found::<T>(id))?;
    let record: T = record_from_stored(stored)?;
    Ok(ResponseEnvelope::ok(serde_json::to_value(record)?))
}

pub async fn create_entity<T: EntitySchema>(
    ctx: &ApiContext,
    mut record: T,
) -> Result<ResponseEnvelope, WorkError> {
    let body = body_without_id(&record)?;
    let id = ctx
        .repository
        .insert_entity(T::KIND, &body)
        .await
        .persistence_fault()?;
    record.set_id(Some(id));
    info!(kind = %T::KIND, %id, "entity created");
    Ok(ResponseEnvelope::created(serde_json::to_value(record)?))
}

pub async fn update_entity<T: EntitySchema>(
    ctx: &ApiContext,
    id: EntityId,
    mut record: T,
) -> Result<ResponseEnvelope, WorkError> {
    if let Some(body_id) = record.id().filter(|body_id| *body_id != id) {
        return Err(WorkError::client(format!(
            "{} id {body_id} in body does not match {id} in path",
            T::KIND
        )));
    }
    let body = body_without_id(&record)?;
    let updated = ctx
        .repository
        .update_entity(T::KIND, id, &body)
        .await
        .persistence_fault()?;
    if !updated {
        return Err(not_found::<T>(id));
    }
    record.set_id(Some(id));
    info!(kind = %T::KIND, %id, "entity updated");
    Ok(ResponseEnvelope::ok(serde_json::to_value(record)?))
}

pub async fn delete_entity<T: EntitySchema>(
    ctx: &ApiContext,
    id: EntityId,
) -> Result<ResponseEnvelope, WorkError> {
    let deleted = ctx
        .repository
        .delete_entity(T::KIND, id)
        .await
        .persistence_fault()?;
    if !deleted {
        return Err(not_found::<T>(id));
    }
    info!(kind = %T::KIND, %id, "entity deleted");
    Ok(ResponseEnvelope::ok(json!({ "id": id })))
}

fn record_from_stored<T: EntitySchema>(stored: StoredEntity) -> Result<T, WorkError> {
    let mut record: T = serde_json::from_value(stored.body)?;
    record.set_id(Some(stored.id));
    Ok(record)
}

fn body_without_id<T: EntitySchema>(record: &T) -> Result<Value, WorkError> {
    let mut body = serde_json::to_value(record)?;
    if let Value::Object(fields) = &mut body {
        fields.remove("id");
    }
    Ok(body)
}

fn not_found<T: EntitySchema>(id: EntityId) -> WorkError {
    WorkError::client(format!("{} {id} not found", T::KIND))
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
