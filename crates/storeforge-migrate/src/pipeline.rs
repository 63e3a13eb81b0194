//! The migration pipeline: a resumable, phase-ordered state machine.
//!
//! One invocation claims the migration (guarded status transition), walks the
//! phases products → collections → customers → coupons → orders, and returns
//! an [`Outcome`]. Before every page fetch it checks the wall-clock budget
//! and polls for external cancellation; rate-limited fetches retry the same
//! page with exponential backoff until a hard circuit breaker pauses the
//! whole migration. Progress (counters, ID maps, cursor) is persisted after
//! every unit of work, so a later invocation resumes exactly where this one
//! stopped.

use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};

use sqlx::PgPool;

use storeforge_core::{
    MigrationCollection, MigrationConfig, MigrationCounters, MigrationCoupon, MigrationCustomer,
    MigrationErrorEntry, MigrationErrorKind, MigrationOrder, MigrationPhase, MigrationProduct,
    MigrationStatus,
};
use storeforge_db::DbError;

use crate::catalog::StoreCatalog;
use crate::images::{download_product_images, ImageStore};
use crate::source::{MigrationSource, SourceError};

/// Tunables for one pipeline invocation. Defaults match production; tests
/// shrink the budget and backoff to keep runtimes sane.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Wall-clock budget before the run pauses itself — 270s keeps a 30s
    /// safety margin under a 300s host execution ceiling.
    pub time_budget: Duration,
    /// Consecutive rate-limited attempts tolerated per page before the whole
    /// migration pauses.
    pub max_rate_limit_retries: u32,
    /// Backoff base: the n-th retry sleeps `base × 2^(n-1)` ms.
    pub backoff_base_ms: u64,
    /// Backoff ceiling in ms.
    pub backoff_cap_ms: u64,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            time_budget: Duration::from_secs(270),
            max_rate_limit_retries: 10,
            backoff_base_ms: 1_000,
            backoff_cap_ms: 30_000,
        }
    }
}

/// How one pipeline invocation ended.
#[derive(Debug)]
pub enum Outcome {
    /// Every configured phase finished; the migration is `completed`.
    Completed,
    /// Budget or rate-limit pause; re-invoke later to resume from `cursor`.
    Paused {
        phase: MigrationPhase,
        cursor: Option<String>,
    },
    /// External cancellation was observed at a page boundary.
    Cancelled,
    /// An unexpected error was caught at the top level; the migration is
    /// `failed` (terminal).
    Failed { message: String },
}

#[derive(Debug, thiserror::Error)]
enum PipelineError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Source(#[from] SourceError),
}

enum PhaseFlow {
    Completed,
    Paused(Option<String>),
    Cancelled,
}

enum PageItems {
    Products(Vec<MigrationProduct>),
    Collections(Vec<MigrationCollection>),
    Customers(Vec<MigrationCustomer>),
    Coupons(Vec<MigrationCoupon>),
    Orders(Vec<MigrationOrder>),
}

impl PageItems {
    fn len(&self) -> usize {
        match self {
            PageItems::Products(items) => items.len(),
            PageItems::Collections(items) => items.len(),
            PageItems::Customers(items) => items.len(),
            PageItems::Coupons(items) => items.len(),
            PageItems::Orders(items) => items.len(),
        }
    }
}

/// Runs one pipeline invocation for `migration_id`.
///
/// Claims the migration, resumes from the persisted phase/cursor, and drives
/// phases until completion, pause, cancellation, or failure. Unexpected
/// errors are caught here: the migration is marked `failed` and the error is
/// appended to its log.
///
/// # Errors
///
/// Returns [`DbError`] only when the progress store itself is unusable — the
/// run could not be claimed ([`DbError::NotClaimable`] when another invocation
/// holds it or the status is terminal), or the failure could not be recorded.
pub async fn run_migration<S, C, I>(
    pool: &PgPool,
    source: &S,
    catalog: &C,
    images: &I,
    migration_id: i64,
    options: &PipelineOptions,
) -> Result<Outcome, DbError>
where
    S: MigrationSource + Sync,
    C: StoreCatalog + Sync,
    I: ImageStore + Sync,
{
    let row = storeforge_db::claim_for_run(pool, migration_id).await?;
    tracing::info!(
        migration_id,
        platform = %row.platform,
        last_phase = row.last_phase.as_deref().unwrap_or("-"),
        "migration claimed for pipeline run"
    );

    let resume_phase: Option<MigrationPhase> =
        row.last_phase.as_deref().and_then(|p| p.parse().ok());
    let resume_cursor = row.last_cursor.clone();

    let attempt = async {
        let config = row.parsed_config()?;
        let run = PipelineRun {
            pool,
            source,
            catalog,
            images,
            options,
            migration_id,
            store_id: row.store_id,
            config,
            counters: row.counters(),
            version: row.version,
            started: Instant::now(),
        };
        run.run(resume_phase, resume_cursor).await
    };

    match attempt.await {
        Ok(outcome) => Ok(outcome),
        Err(error) => {
            tracing::error!(migration_id, error = %error, "migration pipeline failed");
            let entry =
                MigrationErrorEntry::new(MigrationErrorKind::Pipeline, error.to_string());
            if let Err(append_err) =
                storeforge_db::append_error(pool, migration_id, &entry).await
            {
                tracing::warn!(
                    migration_id,
                    error = %append_err,
                    "failed to record pipeline error"
                );
            }
            storeforge_db::set_status(pool, migration_id, MigrationStatus::Failed).await?;
            Ok(Outcome::Failed {
                message: error.to_string(),
            })
        }
    }
}

struct PipelineRun<'a, S, C, I> {
    pool: &'a PgPool,
    source: &'a S,
    catalog: &'a C,
    images: &'a I,
    options: &'a PipelineOptions,
    migration_id: i64,
    store_id: i64,
    config: MigrationConfig,
    counters: MigrationCounters,
    version: i32,
    started: Instant,
}

impl<S, C, I> PipelineRun<'_, S, C, I>
where
    S: MigrationSource + Sync,
    C: StoreCatalog + Sync,
    I: ImageStore + Sync,
{
    async fn run(
        mut self,
        resume_phase: Option<MigrationPhase>,
        resume_cursor: Option<String>,
    ) -> Result<Outcome, PipelineError> {
        for phase in MigrationPhase::ORDER {
            if !self.config.phase_enabled(phase) || !self.source.supports(phase) {
                continue;
            }

            // The persisted cursor belongs to the phase it was written in;
            // earlier phases re-walk their pages and skip everything already
            // in the ID map.
            let cursor = if resume_phase == Some(phase) {
                resume_cursor.clone()
            } else {
                None
            };

            match self.run_phase(phase, cursor).await? {
                PhaseFlow::Completed => {}
                PhaseFlow::Paused(cursor) => return Ok(Outcome::Paused { phase, cursor }),
                PhaseFlow::Cancelled => return Ok(Outcome::Cancelled),
            }
        }

        self.flush(None, None).await?;
        storeforge_db::set_status(self.pool, self.migration_id, MigrationStatus::Completed)
            .await?;
        tracing::info!(migration_id = self.migration_id, "migration completed");
        Ok(Outcome::Completed)
    }

    async fn run_phase(
        &mut self,
        phase: MigrationPhase,
        mut cursor: Option<String>,
    ) -> Result<PhaseFlow, PipelineError> {
        tracing::info!(
            migration_id = self.migration_id,
            %phase,
            resuming_from = cursor.as_deref().unwrap_or("start"),
            "entering phase"
        );

        // Phases without a platform count report totals as records seen.
        let incremental_total = !self.source.has_total_count(phase);

        if self.counters.total_for(phase) == 0 && !incremental_total {
            let counted = fetch_with_backoff(self.options, || self.source.count(phase)).await?;
            match counted {
                Some(Some(total)) => {
                    self.counters.set_total(phase, clamp_count(total));
                    self.flush(Some(phase), cursor.as_deref()).await?;
                }
                Some(None) => {}
                None => return self.pause_for_rate_limit(phase, cursor).await,
            }
        }

        let mut id_map =
            storeforge_db::fetch_id_map(self.pool, self.migration_id, phase).await?;

        // Cross-entity linking reads the maps fresh from the store, not the
        // in-memory copies — earlier phases may have run in a previous
        // invocation.
        let product_map = match phase {
            MigrationPhase::Collections | MigrationPhase::Orders => {
                storeforge_db::fetch_id_map(self.pool, self.migration_id, MigrationPhase::Products)
                    .await?
            }
            _ => HashMap::new(),
        };
        let customer_map = match phase {
            MigrationPhase::Orders => {
                storeforge_db::fetch_id_map(
                    self.pool,
                    self.migration_id,
                    MigrationPhase::Customers,
                )
                .await?
            }
            _ => HashMap::new(),
        };

        let mut seed_checked = !matches!(phase, MigrationPhase::Products);

        loop {
            if self.started.elapsed() >= self.options.time_budget {
                tracing::info!(
                    migration_id = self.migration_id,
                    %phase,
                    "time budget reached — pausing"
                );
                self.flush(Some(phase), cursor.as_deref()).await?;
                storeforge_db::set_status(self.pool, self.migration_id, MigrationStatus::Paused)
                    .await?;
                return Ok(PhaseFlow::Paused(cursor));
            }

            let current = storeforge_db::get_migration(self.pool, self.migration_id).await?;
            if current.parsed_status()? == MigrationStatus::Cancelled {
                tracing::info!(
                    migration_id = self.migration_id,
                    %phase,
                    "cancellation observed — stopping"
                );
                self.flush(Some(phase), cursor.as_deref()).await?;
                return Ok(PhaseFlow::Cancelled);
            }

            let fetched =
                fetch_with_backoff(self.options, || self.fetch_page(phase, cursor.as_deref()))
                    .await?;
            let Some((items, next_cursor, page_total)) = fetched else {
                return self.pause_for_rate_limit(phase, cursor).await;
            };

            if let Some(total) = page_total {
                self.counters.set_total(phase, clamp_count(total));
            } else if incremental_total {
                let seen = self.counters.total_for(phase)
                    + i32::try_from(items.len()).unwrap_or(i32::MAX);
                self.counters.set_total(phase, seen);
            }

            self.process_page(
                items,
                &mut id_map,
                &product_map,
                &customer_map,
                &mut seed_checked,
                cursor.as_deref(),
            )
            .await?;

            cursor = next_cursor;
            if cursor.is_none() {
                break;
            }
        }

        // Phase done: clear the persisted cursor before the next phase.
        self.flush(None, None).await?;
        Ok(PhaseFlow::Completed)
    }

    async fn fetch_page(
        &self,
        phase: MigrationPhase,
        cursor: Option<&str>,
    ) -> Result<(PageItems, Option<String>, Option<i64>), SourceError> {
        match phase {
            MigrationPhase::Products => {
                let page = self.source.fetch_products(cursor).await?;
                Ok((PageItems::Products(page.items), page.next_cursor, page.total))
            }
            MigrationPhase::Collections => {
                let page = self.source.fetch_collections(cursor).await?;
                Ok((
                    PageItems::Collections(page.items),
                    page.next_cursor,
                    page.total,
                ))
            }
            MigrationPhase::Customers => {
                let page = self.source.fetch_customers(cursor).await?;
                Ok((
                    PageItems::Customers(page.items),
                    page.next_cursor,
                    page.total,
                ))
            }
            MigrationPhase::Coupons => {
                let page = self.source.fetch_coupons(cursor).await?;
                Ok((PageItems::Coupons(page.items), page.next_cursor, page.total))
            }
            MigrationPhase::Orders => {
                let page = self.source.fetch_orders(cursor).await?;
                Ok((PageItems::Orders(page.items), page.next_cursor, page.total))
            }
        }
    }

    async fn process_page(
        &mut self,
        items: PageItems,
        id_map: &mut HashMap<String, i64>,
        product_map: &HashMap<String, i64>,
        customer_map: &HashMap<String, i64>,
        seed_checked: &mut bool,
        page_cursor: Option<&str>,
    ) -> Result<(), PipelineError> {
        match items {
            PageItems::Products(products) => {
                for product in products {
                    self.migrate_product(product, id_map, seed_checked, page_cursor)
                        .await?;
                }
            }
            PageItems::Collections(collections) => {
                for collection in collections {
                    self.migrate_collection(collection, id_map, product_map, page_cursor)
                        .await?;
                }
            }
            PageItems::Customers(customers) => {
                for customer in customers {
                    self.migrate_customer(customer, id_map, page_cursor).await?;
                }
            }
            PageItems::Coupons(coupons) => {
                for coupon in coupons {
                    self.migrate_coupon(coupon, id_map, page_cursor).await?;
                }
            }
            PageItems::Orders(orders) => {
                for order in orders {
                    self.migrate_order(order, id_map, product_map, customer_map, page_cursor)
                        .await?;
                }
            }
        }
        Ok(())
    }

    async fn migrate_product(
        &mut self,
        product: MigrationProduct,
        id_map: &mut HashMap<String, i64>,
        seed_checked: &mut bool,
        page_cursor: Option<&str>,
    ) -> Result<(), PipelineError> {
        let phase = MigrationPhase::Products;
        if id_map.contains_key(&product.source_id) {
            tracing::debug!(source_id = %product.source_id, "product already migrated — skipping");
            return Ok(());
        }

        // One-time cleanup of demo products, gated on an empty ID map: a
        // resumed migration with prior imports must never wipe the catalog.
        if !*seed_checked {
            *seed_checked = true;
            if id_map.is_empty() {
                match self.catalog.delete_seed_products(self.store_id).await {
                    Ok(0) => {}
                    Ok(deleted) => {
                        tracing::info!(deleted, "removed seed products before first import");
                    }
                    Err(error) => {
                        tracing::warn!(error = %error, "seed product cleanup failed — continuing");
                    }
                }
            }
        }

        match self.catalog.create_product(self.store_id, &product).await {
            Ok(internal_id) => {
                storeforge_db::merge_id_map_entry(
                    self.pool,
                    self.migration_id,
                    phase,
                    &product.source_id,
                    internal_id,
                )
                .await?;
                id_map.insert(product.source_id.clone(), internal_id);
                self.counters.record_migrated(phase);

                self.counters.total_images +=
                    i32::try_from(product.images.len()).unwrap_or(i32::MAX);
                let outcomes = download_product_images(
                    self.images,
                    self.store_id,
                    internal_id,
                    &product.images,
                )
                .await;
                for outcome in outcomes {
                    if outcome.succeeded() {
                        self.counters.migrated_images += 1;
                    } else {
                        self.counters.failed_images += 1;
                        let entry = MigrationErrorEntry::new(
                            MigrationErrorKind::Image,
                            outcome.error.unwrap_or_default(),
                        )
                        .with_record(product.source_id.clone(), outcome.url);
                        storeforge_db::append_error(self.pool, self.migration_id, &entry)
                            .await?;
                    }
                }
            }
            Err(error) => {
                self.record_failure(phase, &product.source_id, &product.title, &error.0)
                    .await?;
            }
        }

        self.flush(Some(phase), page_cursor).await
    }

    async fn migrate_collection(
        &mut self,
        collection: MigrationCollection,
        id_map: &mut HashMap<String, i64>,
        product_map: &HashMap<String, i64>,
        page_cursor: Option<&str>,
    ) -> Result<(), PipelineError> {
        let phase = MigrationPhase::Collections;
        if id_map.contains_key(&collection.source_id) {
            return Ok(());
        }

        // Members that were skipped or failed during the product phase are
        // silently absent from the map and simply not linked.
        let product_ids: Vec<i64> = collection
            .product_source_ids
            .iter()
            .filter_map(|source_id| product_map.get(source_id).copied())
            .collect();

        match self
            .catalog
            .create_collection(
                self.store_id,
                &collection.name,
                collection.description.as_deref(),
                &product_ids,
            )
            .await
        {
            Ok(internal_id) => {
                storeforge_db::merge_id_map_entry(
                    self.pool,
                    self.migration_id,
                    phase,
                    &collection.source_id,
                    internal_id,
                )
                .await?;
                id_map.insert(collection.source_id.clone(), internal_id);
                self.counters.record_migrated(phase);
            }
            Err(error) => {
                self.record_failure(phase, &collection.source_id, &collection.name, &error.0)
                    .await?;
            }
        }

        self.flush(Some(phase), page_cursor).await
    }

    async fn migrate_customer(
        &mut self,
        customer: MigrationCustomer,
        id_map: &mut HashMap<String, i64>,
        page_cursor: Option<&str>,
    ) -> Result<(), PipelineError> {
        let phase = MigrationPhase::Customers;
        if id_map.contains_key(&customer.source_id) {
            return Ok(());
        }

        match self.catalog.create_customer(self.store_id, &customer).await {
            Ok(internal_id) => {
                storeforge_db::merge_id_map_entry(
                    self.pool,
                    self.migration_id,
                    phase,
                    &customer.source_id,
                    internal_id,
                )
                .await?;
                id_map.insert(customer.source_id.clone(), internal_id);
                self.counters.record_migrated(phase);
            }
            Err(error) => {
                self.record_failure(phase, &customer.source_id, &customer.email, &error.0)
                    .await?;
            }
        }

        self.flush(Some(phase), page_cursor).await
    }

    async fn migrate_coupon(
        &mut self,
        coupon: MigrationCoupon,
        id_map: &mut HashMap<String, i64>,
        page_cursor: Option<&str>,
    ) -> Result<(), PipelineError> {
        let phase = MigrationPhase::Coupons;
        if id_map.contains_key(&coupon.source_id) {
            return Ok(());
        }

        match self.catalog.create_coupon(self.store_id, &coupon).await {
            Ok(internal_id) => {
                storeforge_db::merge_id_map_entry(
                    self.pool,
                    self.migration_id,
                    phase,
                    &coupon.source_id,
                    internal_id,
                )
                .await?;
                id_map.insert(coupon.source_id.clone(), internal_id);
                self.counters.record_migrated(phase);
            }
            Err(error) => {
                self.record_failure(phase, &coupon.source_id, &coupon.code, &error.0)
                    .await?;
            }
        }

        self.flush(Some(phase), page_cursor).await
    }

    async fn migrate_order(
        &mut self,
        order: MigrationOrder,
        id_map: &mut HashMap<String, i64>,
        product_map: &HashMap<String, i64>,
        customer_map: &HashMap<String, i64>,
        page_cursor: Option<&str>,
    ) -> Result<(), PipelineError> {
        let phase = MigrationPhase::Orders;
        if id_map.contains_key(&order.source_id) {
            return Ok(());
        }

        let customer_id = order
            .customer_source_id
            .as_deref()
            .and_then(|source_id| customer_map.get(source_id).copied());
        let item_product_ids: Vec<Option<i64>> = order
            .items
            .iter()
            .map(|item| {
                item.product_source_id
                    .as_deref()
                    .and_then(|source_id| product_map.get(source_id).copied())
            })
            .collect();

        match self
            .catalog
            .create_order(self.store_id, &order, customer_id, &item_product_ids)
            .await
        {
            Ok(internal_id) => {
                storeforge_db::merge_id_map_entry(
                    self.pool,
                    self.migration_id,
                    phase,
                    &order.source_id,
                    internal_id,
                )
                .await?;
                id_map.insert(order.source_id.clone(), internal_id);
                self.counters.record_migrated(phase);
            }
            Err(error) => {
                self.record_failure(phase, &order.source_id, &order.order_number, &error.0)
                    .await?;
            }
        }

        self.flush(Some(phase), page_cursor).await
    }

    /// Logs a per-record failure and counts it; the phase continues.
    async fn record_failure(
        &mut self,
        phase: MigrationPhase,
        source_id: &str,
        title: &str,
        message: &str,
    ) -> Result<(), PipelineError> {
        tracing::warn!(
            migration_id = self.migration_id,
            %phase,
            source_id,
            error = message,
            "record migration failed — continuing"
        );
        let entry = MigrationErrorEntry::new(phase.error_kind(), message.to_string())
            .with_record(source_id.to_string(), title.to_string());
        storeforge_db::append_error(self.pool, self.migration_id, &entry).await?;
        self.counters.record_failed(phase);
        Ok(())
    }

    async fn pause_for_rate_limit(
        &mut self,
        phase: MigrationPhase,
        cursor: Option<String>,
    ) -> Result<PhaseFlow, PipelineError> {
        tracing::warn!(
            migration_id = self.migration_id,
            %phase,
            attempts = self.options.max_rate_limit_retries + 1,
            "rate limit circuit breaker tripped — pausing migration"
        );
        let entry = MigrationErrorEntry::new(
            MigrationErrorKind::RateLimit,
            format!(
                "rate limited on {} consecutive attempts during the {phase} phase",
                self.options.max_rate_limit_retries + 1
            ),
        );
        storeforge_db::append_error(self.pool, self.migration_id, &entry).await?;
        self.flush(Some(phase), cursor.as_deref()).await?;
        storeforge_db::set_status(self.pool, self.migration_id, MigrationStatus::Paused).await?;
        Ok(PhaseFlow::Paused(cursor))
    }

    /// Flushes the counter accumulator plus phase/cursor in one
    /// version-guarded update.
    async fn flush(
        &mut self,
        phase: Option<MigrationPhase>,
        cursor: Option<&str>,
    ) -> Result<(), PipelineError> {
        self.version = storeforge_db::flush_progress(
            self.pool,
            self.migration_id,
            &self.counters,
            phase,
            cursor,
            self.version,
        )
        .await?;
        Ok(())
    }
}

/// Retries `operation` on rate-limit errors with exponential backoff
/// (`base × 2^(n-1)` ms, capped), up to `max_rate_limit_retries` retries
/// after the first attempt.
///
/// Returns `Ok(None)` when every attempt was rate limited — the caller trips
/// the circuit breaker. Non-rate-limit errors propagate immediately.
async fn fetch_with_backoff<T, F, Fut>(
    options: &PipelineOptions,
    mut operation: F,
) -> Result<Option<T>, SourceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    let mut attempts = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(Some(value)),
            Err(SourceError::RateLimited { retry_after_secs }) => {
                attempts += 1;
                if attempts > options.max_rate_limit_retries {
                    return Ok(None);
                }
                let exponent = 1u64 << u64::from((attempts - 1).min(62));
                let delay_ms = options
                    .backoff_base_ms
                    .saturating_mul(exponent)
                    .min(options.backoff_cap_ms);
                tracing::warn!(
                    attempts,
                    delay_ms,
                    retry_after_secs,
                    "source rate limited — retrying after backoff"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            Err(other) => return Err(other),
        }
    }
}

fn clamp_count(total: i64) -> i32 {
    i32::try_from(total).unwrap_or(i32::MAX)
}
