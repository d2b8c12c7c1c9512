//! MySQL-protocol planner session.
//!
//! Queries, explains and planner switches travel over the wire protocol;
//! profiles come from the frontend's HTTP endpoint.

mod profile;
mod session;

pub use profile::{extract_profile, ProfileClient};
pub use session::{column_data_type, is_syntax_state, map_driver_error, MysqlSession};
