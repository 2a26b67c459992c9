//! The interactive data table: column and cell derivation, the id/position
//! adapter, the generic widget and the module tying them to the services.

pub mod cells;
pub mod columns;
pub mod index_map;
pub mod module;
pub mod widget;

pub use module::{DataTableModule, TableServices};
pub use widget::TableEvent;
