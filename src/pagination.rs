use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use serde::{Deserialize, Serialize};

/// Opaque pagination token: the id of the last row the client has seen.
/// The next page strictly filters `id < last_id` under the same ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub last_id: i64,
}

impl Cursor {
    #[must_use]
    pub fn encode(self) -> String {
        // Serializing a plain integer payload cannot fail.
        let payload = serde_json::to_vec(&self).unwrap_or_default();
        URL_SAFE.encode(payload)
    }

    /// Decode a client-supplied cursor. Corrupt or unparseable tokens yield
    /// `None` — the query restarts from the beginning instead of failing,
    /// since only the pagination position is at stake.
    #[must_use]
    pub fn decode(token: Option<&str>) -> Option<Self> {
        let token = token?;
        let bytes = URL_SAFE.decode(token).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

/// Split a `limit + 1` fetch into the page window and, when the sentinel row
/// exists, the cursor for the next page.
#[must_use]
pub fn paginate_window<T>(mut rows: Vec<T>, limit: usize, id_of: impl Fn(&T) -> i64) -> (Vec<T>, Option<Cursor>) {
    let has_more = rows.len() > limit;
    rows.truncate(limit);
    let next = if has_more {
        rows.last().map(|row| Cursor { last_id: id_of(row) })
    } else {
        None
    };
    (rows, next)
}
