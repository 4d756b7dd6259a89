use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use medico_core::{Database, NewUser};
use medico_server::config::{Cli, Command, CreateUserArgs};
use medico_server::{app, AppState};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "medico_server=info,medico_core=info,tower_http=info";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let Cli {
        database,
        bind,
        require_auth,
        command,
    } = Cli::parse();

    let db = Database::open(&database)
        .with_context(|| format!("failed to open database {}", database.display()))?;
    info!(path = %database.display(), "opened database");

    match command.unwrap_or(Command::Serve) {
        Command::Serve => serve(db, bind, require_auth).await,
        Command::CreateUser(args) => create_user(&db, args),
    }
}

async fn serve(db: Database, bind: SocketAddr, require_auth: bool) -> Result<()> {
    let state = AppState::new(db, require_auth);

    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {}", bind))?;
    info!(%bind, require_auth, "medico server listening");

    axum::serve(listener, app(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server stopped");
    Ok(())
}

fn create_user(db: &Database, args: CreateUserArgs) -> Result<()> {
    let new_user = NewUser {
        username: args.username,
        password: args.password,
        first_name: args.first_name,
        last_name: args.last_name,
        email: args.email,
    };
    let user = db.create_user(&new_user).context("failed to create user")?;
    println!("Created user {} (id {})", user.username, user.id);
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
