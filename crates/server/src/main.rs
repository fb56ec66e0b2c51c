use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        DefaultBodyLimit, Path, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use server_api::{
    create_entity, create_http_response_async, delete_entity, get_entity, list_entities,
    update_entity, ApiContext, ModelState,
};
use shared::{
    domain::{Driver, EntityId, EntitySchema, Race, Team},
    protocol::ResponseEnvelope,
};
use storage::Storage;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;

use app_state::AppState;
use config::load_settings;

type EnvelopeReply = (StatusCode, Json<ResponseEnvelope>);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings();
    let database_url = settings.database_url.clone();
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    let api = ApiContext::new(Arc::new(storage.clone()));

    let app = build_router(Arc::new(AppState { api, storage }), settings.max_body_bytes);

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, max_body_bytes = settings.max_body_bytes, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        error!(%error, "failed to listen for shutdown signal");
    }
}

fn build_router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    let router = Router::new().route("/healthz", get(healthz));
    let router = entity_routes::<Driver>(router);
    let router = entity_routes::<Race>(router);
    let router = entity_routes::<Team>(router);
    router
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

/// `/api/<collection>` and `/api/<collection>/:id` for one entity kind.
fn entity_routes<T: EntitySchema>(router: Router<Arc<AppState>>) -> Router<Arc<AppState>> {
    let collection = format!("/api/{}", T::KIND.collection());
    router
        .route(&collection, get(http_list::<T>).post(http_create::<T>))
        .route(
            &format!("{collection}/:id"),
            get(http_get::<T>)
                .put(http_update::<T>)
                .delete(http_delete::<T>),
        )
}

async fn healthz(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    match state.storage.health_check().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(error) => {
            error!(error = ?error, "health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    }
}

fn reply(envelope: ResponseEnvelope) -> EnvelopeReply {
    let status =
        StatusCode::from_u16(envelope.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(envelope))
}

fn record_or_default<T: EntitySchema>(
    payload: Result<Json<T>, JsonRejection>,
    model_state: &mut ModelState,
) -> T {
    match payload {
        Ok(Json(record)) => {
            for message in ModelState::for_entity(&record).errors() {
                model_state.add_error(message.clone());
            }
            record
        }
        Err(rejection) => {
            model_state.add_error(rejection.body_text());
            T::default()
        }
    }
}

fn path_id(path: Result<Path<i64>, PathRejection>, model_state: &mut ModelState) -> EntityId {
    match path {
        Ok(Path(id)) => EntityId(id),
        Err(rejection) => {
            model_state.add_error(rejection.body_text());
            EntityId(0)
        }
    }
}

async fn http_list<T: EntitySchema>(State(state): State<Arc<AppState>>) -> EnvelopeReply {
    let envelope =
        create_http_response_async(&ModelState::valid(), || list_entities::<T>(&state.api)).await;
    reply(envelope)
}

async fn http_get<T: EntitySchema>(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
) -> EnvelopeReply {
    let mut model_state = ModelState::valid();
    let id = path_id(path, &mut model_state);
    let envelope =
        create_http_response_async(&model_state, || get_entity::<T>(&state.api, id)).await;
    reply(envelope)
}

async fn http_create<T: EntitySchema>(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<T>, JsonRejection>,
) -> EnvelopeReply {
    let mut model_state = ModelState::valid();
    let record = record_or_default(payload, &mut model_state);
    let envelope =
        create_http_response_async(&model_state, || create_entity(&state.api, record)).await;
    reply(envelope)
}

async fn http_update<T: EntitySchema>(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<T>, JsonRejection>,
) -> EnvelopeReply {
    let mut model_state = ModelState::valid();
    let record = record_or_default(payload, &mut model_state);
    let id = path_id(path, &mut model_state);
    let envelope =
        create_http_response_async(&model_state, || update_entity(&state.api, id, record)).await;
    reply(envelope)
}

async fn http_delete<T: EntitySchema>(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
) -> EnvelopeReply {
    let mut model_state = ModelState::valid();
    let id = path_id(path, &mut model_state);
    let envelope =
        create_http_response_async(&model_state, || delete_entity::<T>(&state.api, id)).await;
    reply(envelope)
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
