//! Shared application services the table module reads from and writes to.
//!
//! Every service carries a revision counter that is bumped only when its
//! state actually changes, so derived views can tell whether to recompute.

mod data;
mod focus;
mod selection;
mod slice;

use std::cell::RefCell;
use std::rc::Rc;

pub use data::{DataColumn, DataService};
pub use focus::FocusService;
pub use selection::SelectionService;
pub use slice::{STARRED_SLICE_NAME, SliceService};

pub type Shared<T> = Rc<RefCell<T>>;

pub fn shared<T>(value: T) -> Shared<T> {
    Rc::new(RefCell::new(value))
}
