//! Pure size arithmetic for the resize modes.

/// Largest proportional size, at scale at most 1, that fits inside `box_w x box_h`.
pub fn contain_fit(src_w: u32, src_h: u32, box_w: u32, box_h: u32) -> (u32, u32) {
    let scale = (box_w as f64 / src_w.max(1) as f64)
        .min(box_h as f64 / src_h.max(1) as f64)
        .min(1.0);
    (
        scaled(src_w, scale).min(box_w),
        scaled(src_h, scale).min(box_h),
    )
}

/// Proportional size whose long edge is `min(max_long_edge, source long edge)`.
pub fn long_edge_fit(src_w: u32, src_h: u32, max_long_edge: u32) -> (u32, u32) {
    let long = src_w.max(src_h).max(1);
    if long <= max_long_edge {
        return (src_w.max(1), src_h.max(1));
    }
    let scale = max_long_edge as f64 / long as f64;
    if src_w >= src_h {
        (max_long_edge, scaled(src_h, scale))
    } else {
        (scaled(src_w, scale), max_long_edge)
    }
}

/// Pre-shrink divisor for a large source: `ceil(source long edge / target long edge)`.
/// Never below 1.
pub fn pre_shrink_ratio(src_long_edge: u32, target_long_edge: u32) -> u32 {
    if target_long_edge == 0 {
        return 1;
    }
    src_long_edge.div_ceil(target_long_edge).max(1)
}

/// Top-left offset that centers `inner` on `outer`.
pub fn centered_offset(outer: (u32, u32), inner: (u32, u32)) -> (i64, i64) {
    (
        (outer.0 as i64 - inner.0 as i64) / 2,
        (outer.1 as i64 - inner.1 as i64) / 2,
    )
}

fn scaled(edge: u32, scale: f64) -> u32 {
    ((edge as f64 * scale).round() as u32).max(1)
}
