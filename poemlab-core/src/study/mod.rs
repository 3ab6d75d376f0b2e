//! Scripted study engine
//!
//! Pure, deterministic pieces that decide what the participant sees:
//! - [`condition`] draws the between-subjects condition from a seed
//! - [`policy`] is the step-by-step conversation state machine
//! - [`poem`] produces the deliberately defective poems
//! - [`rhyme`] is the suffix heuristic used to pick test lines
//! - [`tone`] rewrites assistant text for the assigned condition
//!
//! None of these modules perform I/O; persistence lives in [`crate::db`].

pub mod condition;
pub mod poem;
pub mod policy;
pub mod rhyme;
pub mod tone;

pub use condition::{assign_condition, seed_from_time};
pub use poem::generate_poem;
pub use policy::respond;
pub use rhyme::{make_test_lines, rhymes};
pub use tone::wrap;
