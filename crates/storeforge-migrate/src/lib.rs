pub mod catalog;
pub mod images;
pub mod pipeline;
pub mod runner;
pub mod source;

pub use catalog::{CatalogError, PgCatalog, PgImageStore, StoreCatalog};
pub use images::{
    download_product_images, ImageOutcome, ImageStore, ImageUploadError, IMAGE_BATCH_SIZE,
};
pub use pipeline::{run_migration, Outcome, PipelineOptions};
pub use runner::{run_for_migration, RunnerError};
pub use source::{EtsySource, MigrationSource, ShopifySource, SourceError, SourcePage};
