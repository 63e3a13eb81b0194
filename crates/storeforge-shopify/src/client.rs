//! HTTP client for the Shopify Admin GraphQL API.
//!
//! One page per call, no retries: rate limiting (HTTP 429 or GraphQL
//! `THROTTLED`) surfaces as a typed error carrying the platform-suggested
//! delay, and the pipeline owns the backoff policy. The client is a dumb
//! transport.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::error::ShopifyError;
use crate::types::{
    Connection, CountResult, ShopifyCollection, ShopifyCustomer, ShopifyDiscountNode,
    ShopifyOrder, ShopifyProduct,
};

/// Pinned Admin API version; queries are written against this schema.
pub const API_VERSION: &str = "2024-01";

/// Records requested per page across all resource types.
pub const PAGE_SIZE: i64 = 50;

/// Fallback delay when a 429 response omits `Retry-After`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 2;

const PRODUCTS_QUERY: &str = r"
query Products($first: Int!, $after: String) {
  products(first: $first, after: $after) {
    pageInfo { hasNextPage endCursor }
    edges {
      node {
        id
        title
        descriptionHtml
        status
        productType
        tags
        variants(first: 100) {
          edges {
            node {
              id
              title
              sku
              price
              compareAtPrice
              inventoryQuantity
              selectedOptions { name value }
              weight
              weightUnit
              requiresShipping
            }
          }
        }
        images(first: 50) {
          edges { node { url } }
        }
      }
    }
  }
}";

const COLLECTIONS_QUERY: &str = r"
query Collections($first: Int!, $after: String) {
  collections(first: $first, after: $after) {
    pageInfo { hasNextPage endCursor }
    edges {
      node {
        id
        title
        description
        products(first: 250) {
          edges { node { id } }
        }
      }
    }
  }
}";

const CUSTOMERS_QUERY: &str = r"
query Customers($first: Int!, $after: String) {
  customers(first: $first, after: $after) {
    pageInfo { hasNextPage endCursor }
    edges {
      node {
        id
        firstName
        lastName
        email
        phone
        emailMarketingConsent { marketingState }
        addresses { address1 address2 city province country zip phone }
        defaultAddress { address1 address2 city province country zip phone }
      }
    }
  }
}";

const ORDERS_QUERY: &str = r"
query Orders($first: Int!, $after: String) {
  orders(first: $first, after: $after) {
    pageInfo { hasNextPage endCursor }
    edges {
      node {
        id
        name
        email
        displayFinancialStatus
        displayFulfillmentStatus
        customer { id }
        paymentGatewayNames
        subtotalPriceSet { shopMoney { amount } }
        totalShippingPriceSet { shopMoney { amount } }
        totalPriceSet { shopMoney { amount } }
        processedAt
        lineItems(first: 100) {
          edges {
            node {
              title
              quantity
              product { id }
              originalUnitPriceSet { shopMoney { amount } }
            }
          }
        }
      }
    }
  }
}";

const DISCOUNTS_QUERY: &str = r"
query Discounts($first: Int!, $after: String) {
  codeDiscountNodes(first: $first, after: $after) {
    pageInfo { hasNextPage endCursor }
    edges {
      node {
        id
        codeDiscount {
          __typename
          ... on DiscountCodeBasic {
            codes(first: 1) { edges { node { code } } }
            customerGets {
              value {
                __typename
                ... on DiscountPercentage { percentage }
                ... on DiscountAmount { amount { amount } }
              }
            }
            minimumRequirement {
              __typename
              ... on DiscountMinimumSubtotal {
                greaterThanOrEqualToSubtotal { amount }
              }
            }
            usageLimit
            endsAt
          }
          ... on DiscountCodeFreeShipping {
            codes(first: 1) { edges { node { code } } }
            minimumRequirement {
              __typename
              ... on DiscountMinimumSubtotal {
                greaterThanOrEqualToSubtotal { amount }
              }
            }
            usageLimit
            endsAt
          }
        }
      }
    }
  }
}";

#[derive(Debug, Deserialize)]
struct GraphQlEnvelope {
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
    #[serde(default)]
    extensions: Option<GraphQlExtensions>,
}

#[derive(Debug, Deserialize)]
struct GraphQlExtensions {
    #[serde(default)]
    code: Option<String>,
}

/// Client for the Shopify Admin GraphQL API of a single shop.
pub struct ShopifyAdminClient {
    client: Client,
    endpoint: String,
    access_token: String,
}

impl ShopifyAdminClient {
    /// Creates a client for `{shop_domain}` (e.g. `acme.myshopify.com`) with
    /// the pinned [`API_VERSION`].
    ///
    /// # Errors
    ///
    /// Returns [`ShopifyError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        shop_domain: &str,
        access_token: &str,
        timeout_secs: u64,
    ) -> Result<Self, ShopifyError> {
        let endpoint = format!("https://{shop_domain}/admin/api/{API_VERSION}/graphql.json");
        Self::with_endpoint(&endpoint, access_token, timeout_secs)
    }

    /// Creates a client with an explicit endpoint (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`ShopifyError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn with_endpoint(
        endpoint: &str,
        access_token: &str,
        timeout_secs: u64,
    ) -> Result<Self, ShopifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("storeforge/0.1 (store-migration)")
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.to_owned(),
            access_token: access_token.to_owned(),
        })
    }

    /// Fetches one page of products.
    ///
    /// # Errors
    ///
    /// - [`ShopifyError::RateLimited`] — HTTP 429 or a GraphQL `THROTTLED`
    ///   error; carries the suggested retry delay.
    /// - [`ShopifyError::UnexpectedStatus`] — any other non-2xx status.
    /// - [`ShopifyError::Api`] — GraphQL-level errors.
    /// - [`ShopifyError::Deserialize`] — response shape mismatch.
    pub async fn fetch_products_page(
        &self,
        cursor: Option<&str>,
    ) -> Result<(Vec<ShopifyProduct>, Option<String>), ShopifyError> {
        self.fetch_connection_page(PRODUCTS_QUERY, "products", cursor)
            .await
    }

    /// Fetches one page of collections with member product ids.
    ///
    /// # Errors
    ///
    /// Same error surface as [`Self::fetch_products_page`].
    pub async fn fetch_collections_page(
        &self,
        cursor: Option<&str>,
    ) -> Result<(Vec<ShopifyCollection>, Option<String>), ShopifyError> {
        self.fetch_connection_page(COLLECTIONS_QUERY, "collections", cursor)
            .await
    }

    /// Fetches one page of customers.
    ///
    /// # Errors
    ///
    /// Same error surface as [`Self::fetch_products_page`].
    pub async fn fetch_customers_page(
        &self,
        cursor: Option<&str>,
    ) -> Result<(Vec<ShopifyCustomer>, Option<String>), ShopifyError> {
        self.fetch_connection_page(CUSTOMERS_QUERY, "customers", cursor)
            .await
    }

    /// Fetches one page of orders.
    ///
    /// # Errors
    ///
    /// Same error surface as [`Self::fetch_products_page`].
    pub async fn fetch_orders_page(
        &self,
        cursor: Option<&str>,
    ) -> Result<(Vec<ShopifyOrder>, Option<String>), ShopifyError> {
        self.fetch_connection_page(ORDERS_QUERY, "orders", cursor)
            .await
    }

    /// Fetches one page of code discount nodes.
    ///
    /// # Errors
    ///
    /// Same error surface as [`Self::fetch_products_page`].
    pub async fn fetch_discounts_page(
        &self,
        cursor: Option<&str>,
    ) -> Result<(Vec<ShopifyDiscountNode>, Option<String>), ShopifyError> {
        self.fetch_connection_page(DISCOUNTS_QUERY, "codeDiscountNodes", cursor)
            .await
    }

    /// Total product count for the shop.
    ///
    /// # Errors
    ///
    /// Same error surface as [`Self::fetch_products_page`].
    pub async fn count_products(&self) -> Result<i64, ShopifyError> {
        self.fetch_count("query { productsCount { count } }", "productsCount")
            .await
    }

    /// Total collection count for the shop.
    ///
    /// # Errors
    ///
    /// Same error surface as [`Self::fetch_products_page`].
    pub async fn count_collections(&self) -> Result<i64, ShopifyError> {
        self.fetch_count("query { collectionsCount { count } }", "collectionsCount")
            .await
    }

    /// Total customer count for the shop.
    ///
    /// # Errors
    ///
    /// Same error surface as [`Self::fetch_products_page`].
    pub async fn count_customers(&self) -> Result<i64, ShopifyError> {
        self.fetch_count("query { customersCount { count } }", "customersCount")
            .await
    }

    /// Total order count for the shop.
    ///
    /// # Errors
    ///
    /// Same error surface as [`Self::fetch_products_page`].
    pub async fn count_orders(&self) -> Result<i64, ShopifyError> {
        self.fetch_count("query { ordersCount { count } }", "ordersCount")
            .await
    }

    async fn fetch_connection_page<T: DeserializeOwned>(
        &self,
        query: &str,
        root_field: &str,
        cursor: Option<&str>,
    ) -> Result<(Vec<T>, Option<String>), ShopifyError> {
        let variables = json!({ "first": PAGE_SIZE, "after": cursor });
        let mut data = self.execute(query, variables).await?;

        let connection: Connection<T> = decode(data[root_field].take(), root_field)?;
        let next_cursor = if connection.page_info.has_next_page {
            connection.page_info.end_cursor.clone()
        } else {
            None
        };

        Ok((connection.into_nodes(), next_cursor))
    }

    async fn fetch_count(&self, query: &str, root_field: &str) -> Result<i64, ShopifyError> {
        let mut data = self.execute(query, json!({})).await?;
        let result: CountResult = decode(data[root_field].take(), root_field)?;
        Ok(result.count)
    }

    /// Executes one GraphQL request and unwraps the response envelope.
    async fn execute(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<serde_json::Value, ShopifyError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("X-Shopify-Access-Token", &self.access_token)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);

            tracing::warn!(retry_after_secs, "shopify returned 429");
            return Err(ShopifyError::RateLimited { retry_after_secs });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ShopifyError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let envelope: GraphQlEnvelope =
            serde_json::from_str(&body).map_err(|e| ShopifyError::Deserialize {
                context: "GraphQL response envelope".to_string(),
                source: e,
            })?;

        if let Some(errors) = envelope.errors.filter(|errors| !errors.is_empty()) {
            // Shopify signals cost-based throttling as a GraphQL error with
            // extensions.code = THROTTLED rather than HTTP 429.
            let throttled = errors.iter().any(|e| {
                e.extensions
                    .as_ref()
                    .and_then(|ext| ext.code.as_deref())
                    .is_some_and(|code| code == "THROTTLED")
            });
            if throttled {
                return Err(ShopifyError::RateLimited {
                    retry_after_secs: DEFAULT_RETRY_AFTER_SECS,
                });
            }

            let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
            return Err(ShopifyError::Api(messages.join("; ")));
        }

        envelope
            .data
            .ok_or_else(|| ShopifyError::Api("response contained no data".to_string()))
    }
}

fn decode<T: DeserializeOwned>(
    value: serde_json::Value,
    context: &str,
) -> Result<T, ShopifyError> {
    serde_json::from_value(value).map_err(|e| ShopifyError::Deserialize {
        context: context.to_string(),
        source: e,
    })
}
