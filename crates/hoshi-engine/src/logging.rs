//! Log targets and line shortening for engine traffic.

use std::borrow::Cow;

/// Target for session lifecycle events.
pub(crate) const SESSION_TARGET: &str = "hoshi_engine::session";
/// Target for subprocess management.
pub(crate) const PROCESS_TARGET: &str = "hoshi_engine::process";
/// Target for command traffic and stream reactions.
pub(crate) const DISPATCH_TARGET: &str = "hoshi_engine::dispatch";

/// Shortens `text` to roughly `limit` characters by replacing its middle
/// with `{...N...}`, `N` being the number of characters removed.
///
/// A `limit` of zero disables shortening.
#[must_use]
pub fn snip(text: &str, limit: usize) -> Cow<'_, str> {
    let half = limit / 2;
    let length = text.chars().count();
    if limit == 0 || length <= half * 2 {
        return Cow::Borrowed(text);
    }
    let over = length - half * 2;
    let head: String = text.chars().take(half).collect();
    let tail: String = text.chars().skip(length - half).collect();
    Cow::Owned(format!("{head}{{...{over}...}}{tail}"))
}
