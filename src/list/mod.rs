//! Per-user show lists: the item model and the store that edits it.

pub mod item;
pub mod store;

pub use item::{generate_id, Item, ItemPatch, NewItem};
pub use store::{ListError, ListStore};
