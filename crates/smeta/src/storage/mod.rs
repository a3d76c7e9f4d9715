pub mod filesystem;
pub mod scratch;

pub use filesystem::FileStorage;
pub use scratch::{ScratchInputs, ScratchSpace, StagedFile};
