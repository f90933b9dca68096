//! Optional enrichment of ranked results.

pub mod enricher;
pub mod site_context;

pub use enricher::ResultEnricher;
pub use site_context::{SiteContext, SiteContextEnricher};
