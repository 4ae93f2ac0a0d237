//! Red-black tree backing the secondary indexes
//!
//! Arena-based, so rotations and parent-pointer fix-ups are plain index
//! arithmetic rather than `Rc<RefCell<_>>` juggling. See [`tree`] for the
//! implementation and [`errors`] for what can go wrong loading one back
//! from disk.

pub mod errors;
pub mod tree;

pub use errors::{RbTreeError, RbTreeResult};
pub use tree::{Color, Iter, RbTree};
