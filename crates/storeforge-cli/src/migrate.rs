//! `storeforge-cli migrate` subcommands: drive a migration to completion
//! from the terminal, print its progress, or cancel it.

use clap::{Args, Subcommand};

use storeforge_core::{MigrationStatus, Platform};
use storeforge_etsy::{EtsyOAuthClient, PkcePair};
use storeforge_migrate::{run_for_migration, Outcome, PipelineOptions};
use storeforge_shopify::{oauth::random_state, ShopifyOAuthClient};

#[derive(Debug, Args)]
pub struct MigrateArgs {
    #[command(subcommand)]
    command: MigrateCommand,
}

#[derive(Debug, Subcommand)]
enum MigrateCommand {
    /// Run the pipeline, re-invoking while it pauses itself, until the
    /// migration completes, fails, or is cancelled.
    Run {
        #[arg(long)]
        migration_id: i64,
        /// Upper bound on pipeline invocations before giving up.
        #[arg(long, default_value_t = 50)]
        max_invocations: u32,
    },
    /// Print the current status, counters, and error log.
    Status {
        #[arg(long)]
        migration_id: i64,
    },
    /// Cancel a running or paused migration.
    Cancel {
        #[arg(long)]
        migration_id: i64,
    },
    /// Print the OAuth authorization URL for connecting a shop.
    ConnectUrl {
        #[arg(long)]
        platform: Platform,
        /// Shopify shop domain (e.g. acme.myshopify.com); unused for Etsy.
        #[arg(long)]
        shop: Option<String>,
    },
}

pub async fn run(args: MigrateArgs) -> anyhow::Result<()> {
    match args.command {
        MigrateCommand::Run {
            migration_id,
            max_invocations,
        } => run_to_completion(migration_id, max_invocations).await,
        MigrateCommand::Status { migration_id } => print_status(migration_id).await,
        MigrateCommand::Cancel { migration_id } => cancel(migration_id).await,
        MigrateCommand::ConnectUrl { platform, shop } => connect_url(platform, shop.as_deref()),
    }
}

async fn run_to_completion(migration_id: i64, max_invocations: u32) -> anyhow::Result<()> {
    let config = storeforge_core::load_app_config()?;
    let pool = storeforge_db::connect_pool(
        &config.database_url,
        storeforge_db::PoolConfig::from_app_config(&config),
    )
    .await?;
    storeforge_db::run_migrations(&pool).await?;

    let options = PipelineOptions {
        time_budget: std::time::Duration::from_secs(config.pipeline_budget_secs),
        ..PipelineOptions::default()
    };

    for invocation in 1..=max_invocations {
        tracing::info!(migration_id, invocation, "starting pipeline invocation");
        let outcome = run_for_migration(&pool, &config, migration_id, &options).await?;

        match outcome {
            Outcome::Completed => {
                println!("migration {migration_id} completed");
                print_counters(&pool, migration_id).await?;
                return Ok(());
            }
            Outcome::Paused { phase, cursor } => {
                tracing::info!(
                    migration_id,
                    %phase,
                    cursor = cursor.as_deref().unwrap_or("start"),
                    "pipeline paused — re-invoking"
                );
            }
            Outcome::Cancelled => {
                println!("migration {migration_id} was cancelled");
                return Ok(());
            }
            Outcome::Failed { message } => {
                anyhow::bail!("migration {migration_id} failed: {message}");
            }
        }
    }

    anyhow::bail!(
        "migration {migration_id} still paused after {max_invocations} invocations; \
         re-run to continue"
    )
}

async fn print_status(migration_id: i64) -> anyhow::Result<()> {
    let config = storeforge_core::load_app_config()?;
    let pool = storeforge_db::connect_pool(
        &config.database_url,
        storeforge_db::PoolConfig::from_app_config(&config),
    )
    .await?;

    let row = storeforge_db::get_migration(&pool, migration_id).await?;
    println!(
        "migration {} [{}] {} — shop {}",
        row.id,
        row.platform,
        row.status,
        row.source_shop_name.as_deref().unwrap_or(&row.source_shop_id)
    );
    print_counters(&pool, migration_id).await?;

    let errors = row.error_entries();
    if !errors.is_empty() {
        println!("last {} error(s):", errors.len().min(10));
        for entry in errors.iter().rev().take(10) {
            println!(
                "  [{}] {}{}",
                entry.occurred_at.format("%Y-%m-%d %H:%M:%S"),
                entry
                    .source_id
                    .as_deref()
                    .map(|id| format!("{id}: "))
                    .unwrap_or_default(),
                entry.message
            );
        }
    }

    Ok(())
}

async fn print_counters(pool: &sqlx::PgPool, migration_id: i64) -> anyhow::Result<()> {
    let row = storeforge_db::get_migration(pool, migration_id).await?;
    let c = row.counters();
    println!(
        "  products    {:>5} / {:<5} ({} failed)",
        c.migrated_products, c.total_products, c.failed_products
    );
    println!(
        "  collections {:>5} / {:<5} ({} failed)",
        c.migrated_collections, c.total_collections, c.failed_collections
    );
    println!(
        "  images      {:>5} / {:<5} ({} failed)",
        c.migrated_images, c.total_images, c.failed_images
    );
    println!(
        "  customers   {:>5} / {:<5} ({} failed)",
        c.migrated_customers, c.total_customers, c.failed_customers
    );
    println!(
        "  coupons     {:>5} / {:<5} ({} failed)",
        c.migrated_coupons, c.total_coupons, c.failed_coupons
    );
    println!(
        "  orders      {:>5} / {:<5} ({} failed)",
        c.migrated_orders, c.total_orders, c.failed_orders
    );
    Ok(())
}

async fn cancel(migration_id: i64) -> anyhow::Result<()> {
    let config = storeforge_core::load_app_config()?;
    let pool = storeforge_db::connect_pool(
        &config.database_url,
        storeforge_db::PoolConfig::from_app_config(&config),
    )
    .await?;

    storeforge_db::set_status(&pool, migration_id, MigrationStatus::Cancelled).await?;
    println!("migration {migration_id} cancelled; it can be resumed by starting again");
    Ok(())
}

fn connect_url(platform: Platform, shop: Option<&str>) -> anyhow::Result<()> {
    let config = storeforge_core::load_app_config()?;
    let state = random_state();

    match platform {
        Platform::Shopify => {
            let shop = shop
                .ok_or_else(|| anyhow::anyhow!("--shop is required for shopify connect URLs"))?;
            let (client_id, client_secret) = config.shopify_credentials()?;
            let oauth =
                ShopifyOAuthClient::new(client_id, client_secret, config.http_timeout_secs)?;
            let redirect_uri = format!("{}/api/migration/shopify/callback", config.app_url);
            println!("{}", oauth.authorize_url(shop, &redirect_uri, &state));
            println!("state: {state}");
        }
        Platform::Etsy => {
            let oauth = EtsyOAuthClient::new(config.etsy_client_id()?, config.http_timeout_secs)?;
            let pkce = PkcePair::generate();
            let redirect_uri = format!("{}/api/migration/etsy/callback", config.app_url);
            println!("{}", oauth.authorize_url(&redirect_uri, &state, &pkce));
            println!("state: {state}");
            println!("pkce verifier: {}", pkce.verifier);
        }
    }

    Ok(())
}
