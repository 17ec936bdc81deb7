//! Serializable event types for hosts that forward controller activity
//! (stdout JSON lines, dashboards, log shippers).

pub mod events;
