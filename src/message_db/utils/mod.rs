pub mod parsing;

pub use parsing::{category, id, is_category};
