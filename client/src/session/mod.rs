//! Research session state
//!
//! - `history`: merges status snapshots without regressing known data
//! - `view`: picks the panel to render
//! - `store`: the state container tying session, history, view and
//!   conversation together

pub mod history;
pub mod store;
pub mod view;

pub use history::{merge, History};
pub use store::{ApplyOutcome, Discard, FetchTicket, Phase, Session, SessionState, SessionStore};
pub use view::{Panel, PanelAvailability, ViewSelector};
