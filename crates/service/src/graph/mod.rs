pub mod edge;
pub mod store;

pub use edge::Edge;
pub use store::{GraphStore, GraphWrite};
