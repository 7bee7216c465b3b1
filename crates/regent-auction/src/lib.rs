//! Regent Auction - the weekly declining-price token sale.
//!
//! Each week a fixed allotment of the treasury token goes on sale against
//! native currency. The price per whole token decays as `time_left^8 /
//! 10^28`, opening near 1.79 and reaching zero at week end. Buyers are
//! credited a bonus-adjusted contribution (up to +50% for the earliest
//! purchase, linearly decaying), and once the week is finalized each buyer
//! claims tokens pro-rata to their contribution. All arithmetic is exact
//! 256-bit integer math with floor division; the protocol, never the
//! buyer, absorbs the rounding dust.

pub mod auction;
pub mod error;

pub use auction::{Auction, AuctionParams, BONUS_WINDOW, WEEK};
pub use error::AuctionError;
