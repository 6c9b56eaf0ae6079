// Session workflow: upload → style → generating → result, held in memory.
// State transitions live in state_machine.rs; handlers only orchestrate.

pub mod handlers;
pub mod models;
pub mod state_machine;
pub mod store;
pub mod upload;

pub use store::SessionStore;
