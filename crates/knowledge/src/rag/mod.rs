//! Question answering over the indexed materials.

pub mod ask;
pub mod prompt;
pub mod session;

pub use ask::{Retriever, Tutor, TutorAnswer, NOT_FOUND_ANSWER};
pub use session::MaterialSelection;
