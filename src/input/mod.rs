//! Controller input: pad samples, gesture classification and the
//! terminal key mapping that drives them.

pub mod gesture;
pub mod keymap;
pub mod pad;

pub use gesture::{Direction, GestureClassifier, GestureEvent, MessageStep, StickMode};
pub use keymap::KeyLatch;
pub use pad::{Buttons, PadSample};
