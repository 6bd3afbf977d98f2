//! Eventide demo entry point.
//!
//! Connects to `PostgreSQL`, ensures the schema, then drives a user and a
//! todo through their lifecycles and checks that replaying each history
//! reproduces the persisted state.

use std::sync::Arc;
use std::time::Duration;

use eventide_core::{Aggregate, Runtime, RuntimeBuilder};
use eventide_event_store::schema::ensure_schema;
use eventide_event_store::{PgEventStore, PgStoreConfig};
use eventide_todo::application::projections::ActivityFeed;
use eventide_todo::application::{command_handlers as todo_commands, query_handlers as todo_queries};
use eventide_todo::domain::aggregates::Todo;
use eventide_todo::domain::commands as todo;
use eventide_user::application::notifications::{NameChange, NameChangeNotifier};
use eventide_user::application::{command_handlers as user_commands, query_handlers as user_queries};
use eventide_user::domain::aggregates::Address;
use eventide_user::domain::commands as user;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing_subscriber::EnvFilter;

mod error;

use error::AppError;

const MAX_TODO_REVISIONS: usize = 100;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting Eventide demo");

    // Read configuration from environment.
    let config = PgStoreConfig::from_env()?;

    // Create database connection pool.
    let pool = config.connect().await?;
    ensure_schema(&pool).await?;

    // Build the runtime.
    let (notifier, name_changes) = NameChangeNotifier::channel();
    let feed = Arc::new(ActivityFeed::new());
    let builder = RuntimeBuilder::new(Arc::new(PgEventStore::from_config(pool, &config)));
    let builder = eventide_user::application::install(builder, notifier);
    let runtime =
        eventide_todo::application::install(builder, Arc::clone(&feed), MAX_TODO_REVISIONS).build();
    tracing::info!(
        registered_event_types = runtime.registry().len(),
        "runtime ready"
    );

    run_user_walkthrough(&runtime).await?;
    run_todo_walkthrough(&runtime).await?;
    drain_name_changes(name_changes).await;

    tracing::info!(activity_entries = feed.entries().await.len(), "demo finished");
    Ok(())
}

async fn run_user_walkthrough(runtime: &Runtime) -> Result<(), AppError> {
    let created = user_commands::handle_create(
        runtime,
        &user::Create {
            first_name: "Sysy".into(),
            last_name: "42".into(),
            addresses: vec![Address {
                country: "FR".into(),
                region: "IDF".into(),
            }],
        },
    )
    .await?;
    let user_id = created.user.base.id;

    user_commands::handle_update_first_name(runtime, &user_id, "z0mbie").await?;
    user_commands::handle_add_address(
        runtime,
        &user_id,
        Address {
            country: "DE".into(),
            region: "BE".into(),
        },
    )
    .await?;
    let issued = user_commands::handle_issue_api_token(runtime, &user_id).await?;

    let persisted = user_queries::get_user_by_id(runtime, &user_id).await?;
    let replayed = user_queries::replay_user(runtime, &user_id).await?;
    if persisted != replayed {
        return Err(AppError::ReplayMismatch(format!("user {user_id}")));
    }

    let authenticated = user_queries::authenticate_api_token(runtime, &user_id, &issued.token).await?;
    tracing::info!(
        user_id = %user_id,
        version = persisted.version,
        token_id = ?authenticated,
        "user walkthrough replayed to persisted state"
    );
    Ok(())
}

async fn run_todo_walkthrough(runtime: &Runtime) -> Result<(), AppError> {
    let created = todo_commands::handle_create(
        runtime,
        &todo::Create {
            text: "buy milk".into(),
            author_name: "alice".into(),
        },
        Some("demo"),
    )
    .await?;
    let todo_id = created.todo.base.id.clone();

    todo_commands::handle_update_text(
        runtime,
        &todo_id,
        &todo::UpdateText {
            text: "buy bread".into(),
            expected_version: Some(created.todo.version()),
        },
        Some("demo"),
    )
    .await?;

    let view = todo_queries::get_todo_by_id(runtime, &todo_id).await?;
    let history = todo_queries::get_todo_history(runtime, &todo_id).await?;
    let replayed = runtime.replay::<Todo>(&todo_id).await?;
    if replayed.text != view.text || replayed.version() != view.version {
        return Err(AppError::ReplayMismatch(format!("todo {todo_id}")));
    }

    tracing::info!(todo_id = %todo_id, text = %view.text, revisions = history.len(), "todo walkthrough done");
    Ok(())
}

async fn drain_name_changes(mut changes: UnboundedReceiver<NameChange>) {
    while let Ok(Some(change)) = tokio::time::timeout(Duration::from_millis(200), changes.recv()).await {
        tracing::info!(user_id = %change.user_id, first_name = %change.first_name, "first name changed");
    }
}
