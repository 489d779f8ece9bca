// Suggestion Patch Engine
// Implements: dotted-path addressing, value normalization, the candidate/applied
// ledger, apply/undo state machine, and the streaming text accumulator.
// Everything here is synchronous and in-memory except StreamAccumulator::pull.

pub mod accumulator;
pub mod engine;
pub mod normalize;
pub mod path;
pub mod store;

// Re-export the public API consumed by sessions and generation.
pub use accumulator::{ChunkReader, StreamAccumulator, StreamChunk, StreamError};
pub use engine::{PatchEngine, UndoPolicy};
pub use path::{AddressError, FieldPath};
pub use store::{AppliedSuggestion, Suggestion, SuggestionStore};
