use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use shared::domain::{EntityId, EntityKind};
use storage::{EntityRepository, Storage, StoredEntity};

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/racing.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every stored entity of one kind, one JSON object per line.
    List { kind: EntityKind },
    Delete { kind: EntityKind, id: i64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::List { kind } => {
            let entities = storage.list_entities(kind).await?;
            if entities.is_empty() {
                println!("no {} stored", kind.collection());
            }
            for entity in &entities {
                println!("{}", render(entity));
            }
        }
        Command::Delete { kind, id } => {
            let id = EntityId(id);
            if !storage.delete_entity(kind, id).await? {
                bail!("{kind} {id} not found");
            }
            println!("deleted {kind} {id}");
        }
    }

    storage.close().await;
    Ok(())
}

fn render(entity: &StoredEntity) -> Value {
    let mut body = entity.body.clone();
    if let Value::Object(fields) = &mut body {
        fields.insert("id".into(), Value::from(entity.id.0));
    }
    body
}
