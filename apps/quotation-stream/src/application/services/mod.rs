//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `MarketCatalog`: Owns and refreshes the set of exchange markets
//! - `SubscriptionManager`: Single writer of stream subscriptions
//! - `QuotationQueryService`: Resolves pairs and serves cached quotes

mod catalog;
mod quotation;
mod subscription;

pub use catalog::MarketCatalog;
pub use quotation::QuotationQueryService;
pub use subscription::SubscriptionManager;
