//! Domain models for the Stockroom inventory platform

mod bin_card;
mod employee;
mod grn;
mod product;
mod returns;
mod stock;
mod supplier;

pub use bin_card::*;
pub use employee::*;
pub use grn::*;
pub use product::*;
pub use returns::*;
pub use stock::*;
pub use supplier::*;
