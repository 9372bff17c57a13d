//! Domain entities: sessions and their cells.

pub mod cell;
pub mod session;

pub use cell::{Cell, CellStatus};
pub use session::Session;
