use std::{net::SocketAddr, sync::Arc};

use engine::{JwtGate, OpenAiCompatible};
use migration::{Migrator, MigratorTrait};
use settings::Database;

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "tally={level},server={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let db = parse_database(&settings.database).await?;
    let gate = JwtGate::new(
        &settings.auth.secret,
        chrono::Duration::hours(settings.auth.token_lifetime_hours),
    )?;
    tracing::info!(model = %settings.llm.model, "using text generation endpoint {}", settings.llm.base_url);
    let generator = OpenAiCompatible::new(settings.llm.into())?;

    let engine = engine::Engine::builder()
        .database(db)
        .generator(Arc::new(generator))
        .gate(gate)
        .build()
        .await?;

    let addr: SocketAddr = format!("{}:{}", settings.server.bind, settings.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    server::run_with_listener(engine, listener).await?;

    Ok(())
}

async fn parse_database(
    config: &settings::Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let database = sea_orm::Database::connect(database_url(config)).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}

fn database_url(config: &settings::Database) -> String {
    match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
    }
}
