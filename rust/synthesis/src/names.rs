//! Identifier and channel naming shared by every generated template.

/// Round-robin log exchange
pub const PROPAGATE_LOG: &str = "propagate_log";
/// Raised by the first log that runs out of capacity
pub const OVERFLOW: &str = "chan_overflow";
/// Forces the addressed logs to propagate under the global delay policy
pub const FORCE_PROPAGATE: &str = "force_propagate";

/// Location identifier; names starting with a digit get an `l` prefix.
#[must_use]
pub fn location(name: &str) -> String {
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        format!("l{name}")
    } else {
        name.to_string()
    }
}

/// `<event>_ID`
#[must_use]
pub fn event_id(event: &str) -> String {
    format!("{event}_ID")
}

/// `NUMBER_OF_<role>`
#[must_use]
pub fn instance_count(role: &str) -> String {
    format!("NUMBER_OF_{role}")
}

/// `<role>_t`, the instance index range of a role
#[must_use]
pub fn instance_type(role: &str) -> String {
    format!("{role}_t")
}

#[must_use]
pub fn advance_channel(role: &str, event: &str) -> String {
    format!("advance_{role}_{event}")
}

#[must_use]
pub fn emit_channel(role: &str) -> String {
    format!("do_log_update_{role}")
}

#[must_use]
pub fn backtrack_channel(role: &str) -> String {
    format!("backtrack_{role}")
}

/// Delay threshold of a role's logs
#[must_use]
pub fn max_updates(role: &str) -> String {
    format!("maxUpdatesSincePropagation_{role}")
}

/// Template name of a role's log
#[must_use]
pub fn log_template(role: &str) -> String {
    format!("{role}_log")
}
