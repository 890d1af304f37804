pub mod index;
pub mod types;

pub use index::{ListId, MetaIndex, MetaVersion, VersionList};
pub use types::{IndexDocument, IndexEntryDocument, VersionListDocument, VersionRecordDocument};
