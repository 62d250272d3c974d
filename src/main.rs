use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use redis::aio::MultiplexedConnection;
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

use foodgram::{
    actions::{ingredients::import_ingredients, users::set_role},
    init_logging, invalidate_cache,
    routes::app,
    schema::{NewIngredient, UserRole},
    AppState, CacheLifetime, Config,
};

#[derive(Parser)]
#[clap(name = "foodgram", about = "Recipe sharing backend")]
struct Cli {
    #[clap(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs the HTTP server (default).
    Serve,
    /// Loads ingredients from a JSON file of `{name, measurement_unit}` objects.
    LoadIngredients { path: PathBuf },
    /// Grants the admin role to a user.
    Promote { email: String },
}

async fn connect_database(config: &Config) -> anyhow::Result<Pool<Postgres>> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to the database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    log::info!("Database ready");

    Ok(pool)
}

/// Without a reachable Redis the server keeps running uncached.
async fn connect_cache(config: &Config) -> Option<MultiplexedConnection> {
    let url = config.redis_url.as_ref()?;

    let connection = match redis::Client::open(url.as_str()) {
        Ok(client) => client.get_multiplexed_async_connection().await,
        Err(e) => Err(e),
    };

    match connection {
        Ok(connection) => {
            log::info!("Connected to cache at {url}");
            Some(connection)
        }
        Err(e) => {
            log::warn!("Cache unavailable, continuing without it: {e}");
            None
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let pool = connect_database(&config).await?;
    let cache = connect_cache(&config).await;
    let address = config.bind_address;

    let state = AppState::new(pool, cache, config);
    tokio::fs::create_dir_all(state.media.root())
        .await
        .with_context(|| format!("Failed to create {}", state.media.root().display()))?;

    log::info!("Listening on {address}");
    warp::serve(app(state)).run(address).await;

    Ok(())
}

async fn read_ingredients(path: &Path) -> anyhow::Result<Vec<NewIngredient>> {
    let data = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    serde_json::from_str(&data).with_context(|| format!("Malformed ingredients in {}", path.display()))
}

async fn load_ingredients(config: Config, path: PathBuf) -> anyhow::Result<()> {
    let ingredients = read_ingredients(&path).await?;

    let pool = connect_database(&config).await?;
    let inserted = import_ingredients(&ingredients, &pool)
        .await
        .map_err(|e| anyhow!("Failed to import ingredients: {e:?}"))?;

    invalidate_cache(
        CacheLifetime::BindIngredientCache,
        connect_cache(&config).await,
    )
    .await;

    log::info!(
        "Loaded {inserted} of {} ingredients from {}",
        ingredients.len(),
        path.display()
    );
    Ok(())
}

async fn promote(config: Config, email: String) -> anyhow::Result<()> {
    let pool = connect_database(&config).await?;

    let promoted = set_role(&email, UserRole::Admin, &pool)
        .await
        .map_err(|e| anyhow!("Failed to update {email}: {e:?}"))?;
    if !promoted {
        bail!("No user with email {email}");
    }

    log::info!("{email} is now an admin");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _logger = init_logging()?;
    let cli = Cli::parse();
    let config = Config::load().context("Invalid configuration")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::LoadIngredients { path } => load_ingredients(config, path).await,
        Commands::Promote { email } => promote(config, email).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    #[tokio::test]
    async fn reads_ingredient_fixtures() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"name": "flour", "measurement_unit": "g"}}, {{"name": "milk", "measurement_unit": "ml"}}]"#
        )
        .unwrap();

        let ingredients = read_ingredients(file.path()).await.unwrap();
        assert_eq!(ingredients.len(), 2);
        assert_eq!(ingredients[1].measurement_unit, "ml");
    }

    #[tokio::test]
    async fn ingredient_errors_name_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();

        let e = read_ingredients(file.path()).await.unwrap_err();
        assert!(e.to_string().starts_with("Malformed ingredients in"));
        assert_eq!(e.chain().count(), 2);

        let missing = file.path().with_extension("missing");
        let e = read_ingredients(&missing).await.unwrap_err();
        assert!(e.to_string().starts_with("Failed to read"));
    }
}
