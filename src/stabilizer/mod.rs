mod debounce;
mod window;
#[cfg(test)]
mod tests;

pub use debounce::{GestureStabilizer, Rejection, StabilizerStats};
pub use window::VoteWindow;
