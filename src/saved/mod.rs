//! Reference items a user bookmarks: diseases, pregnancy weeks and baby names.
//! Every query is scoped by the caller's id.

mod baby_names;
mod diseases;
mod weeks;

use serde_json::Value;

pub use baby_names::router as baby_names_router;
pub use diseases::router as diseases_router;
pub use weeks::router as weeks_router;

/// Accepts identifiers sent either as JSON strings or numbers.
fn text_id(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
