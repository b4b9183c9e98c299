//! Session timer and activation control

pub mod debounce;
pub mod machine;

pub use debounce::ActionDebouncer;
pub use machine::{PersistAction, SessionStateMachine, Transition};
