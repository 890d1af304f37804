pub mod library;
pub mod patch;
pub mod profile;
pub mod stack;

pub use library::{Library, LibraryHint, LibraryVariant};
pub use patch::{JarMod, Patch, PatchDocument, PatchKind, PatchProblem, ProblemSeverity, Reference};
pub use profile::{reapply, reapply_safe, RuntimeProfile};
pub use stack::{MoveDirection, VersionPatchStack};
