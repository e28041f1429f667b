//! Inventory workflows
//!
//! Every service call resolves the acting employee first, runs inside one
//! unit of work and commits only when every step succeeded.

pub mod access;
pub mod bin_card;
pub mod catalog;
pub mod grn;
pub mod listing;
pub mod returns;
pub mod stock;
pub mod transfer;

pub use access::{require_actor, Access};
pub use bin_card::{append_entry, BinCardService, LedgerPosting};
pub use catalog::CatalogService;
pub use grn::GrnService;
pub use listing::{ListParams, Listing, ListingService};
pub use returns::ReturnService;
pub use stock::StockService;
pub use transfer::TransferService;
