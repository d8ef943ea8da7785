use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavKind {
    First,
    Prev,
    Next,
    Last,
}

/// What a result page shows and where its navigation links point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageWindow {
    pub start_display: i64,
    pub end_display: i64,
    pub total: i64,
    pub first_url: String,
    pub prev_url: String,
    pub next_url: String,
    pub last_url: String,
}

/// A negative limit means one page holding everything.
fn effective_limit(limit: i64, total: i64) -> i64 {
    if limit < 0 { total } else { limit }
}

/// 1-based display range of the records shown at `offset`.
pub fn window(total: i64, offset: i64, limit: i64) -> (i64, i64) {
    let limit = effective_limit(limit, total);
    let start = if total > 0 { offset.saturating_add(1) } else { offset };
    let end = offset.saturating_add(limit).min(total);
    (start, end)
}

/// Offset a navigation link should jump to.
///
/// `Next` is not clamped: past the end it yields an empty page, not an error.
pub fn nav_target(kind: NavKind, offset: i64, limit: i64, total: i64) -> i64 {
    let limit = effective_limit(limit, total);
    match kind {
        NavKind::First => 0,
        NavKind::Prev => offset.saturating_sub(limit).max(0),
        NavKind::Next => offset.saturating_add(limit),
        NavKind::Last => {
            if total <= 0 || limit <= 0 {
                0
            } else {
                ((total - 1) / limit) * limit
            }
        }
    }
}

pub fn build_url(base: &str, target: i64, limit: i64) -> String {
    let sep = if !base.contains('?') {
        "?"
    } else if base.ends_with('?') || base.ends_with('&') {
        ""
    } else {
        "&"
    };
    format!("{base}{sep}idx={target}&limit={limit}")
}

impl PageWindow {
    pub fn new(base: &str, total: i64, offset: i64, limit: i64) -> Self {
        let (start_display, end_display) = window(total, offset, limit);
        let link_limit = effective_limit(limit, total);
        let url = |kind| build_url(base, nav_target(kind, offset, limit, total), link_limit);
        Self {
            start_display,
            end_display,
            total,
            first_url: url(NavKind::First),
            prev_url: url(NavKind::Prev),
            next_url: url(NavKind::Next),
            last_url: url(NavKind::Last),
        }
    }
}
