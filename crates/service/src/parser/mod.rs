pub mod document;
pub mod flex;

pub use document::{ContentGroup, ContentItem, Document, CONTENT_GROUP_LABEL};
pub use flex::{Asset, Checksum256, FlexError, FlexValue, Name};
