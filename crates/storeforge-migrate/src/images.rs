//! Image downloader: re-uploads a product's external image URLs through the
//! image-processing capability in fixed-size concurrent batches.
//!
//! Fire-and-continue: every image is attempted independently, one failure
//! never aborts the batch or the product, and each outcome keeps the
//! position carried by the original record — positions are never inferred
//! after the fact.

use thiserror::Error;

use storeforge_core::MigrationImage;

/// Images fetched concurrently per batch.
pub const IMAGE_BATCH_SIZE: usize = 3;

/// Failure from the image-processing capability for one image.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ImageUploadError(pub String);

/// The external fetch+resize+store capability for product images.
pub trait ImageStore {
    fn upload_from_url(
        &self,
        store_id: i64,
        product_id: i64,
        url: &str,
        position: i32,
    ) -> impl std::future::Future<Output = Result<(), ImageUploadError>> + Send;
}

/// Result for one image: its original position, the source URL, and the
/// error message if the upload failed.
#[derive(Debug)]
pub struct ImageOutcome {
    pub position: i32,
    pub url: String,
    pub error: Option<String>,
}

impl ImageOutcome {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Processes one product's images in order, [`IMAGE_BATCH_SIZE`] at a time.
/// Returns one outcome per image, in input order.
pub async fn download_product_images<S: ImageStore + Sync>(
    store: &S,
    store_id: i64,
    product_id: i64,
    images: &[MigrationImage],
) -> Vec<ImageOutcome> {
    let mut outcomes = Vec::with_capacity(images.len());

    for batch in images.chunks(IMAGE_BATCH_SIZE) {
        let attempts = batch.iter().map(|image| async move {
            match store
                .upload_from_url(store_id, product_id, &image.url, image.position)
                .await
            {
                Ok(()) => ImageOutcome {
                    position: image.position,
                    url: image.url.clone(),
                    error: None,
                },
                Err(error) => {
                    tracing::warn!(
                        product_id,
                        url = %image.url,
                        position = image.position,
                        error = %error,
                        "image upload failed — continuing"
                    );
                    ImageOutcome {
                        position: image.position,
                        url: image.url.clone(),
                        error: Some(error.to_string()),
                    }
                }
            }
        });

        outcomes.extend(futures::future::join_all(attempts).await);
    }

    outcomes
}
