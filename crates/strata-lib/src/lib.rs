pub mod error;
pub mod game;

// Re-export commonly used types
pub use error::{Error, Result, TransferFailure};
pub use game::cache::{CacheEntry, ContentCache, EntryId};
pub use game::config::Endpoints;
pub use game::meta::{ListId, MetaIndex, MetaVersion, VersionList};
pub use game::profile::{
    reapply, reapply_safe, Library, LibraryHint, Patch, PatchDocument, RuntimeProfile,
    VersionPatchStack,
};
pub use game::update::{ProgressReporter, SilentProgressReporter, UpdatePipeline, UpdateSpec};
