// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Which scanned page is "in view" for a given scroll position.
//
// Pages are laid out in a vertical strip of equal-height images. Mapping
// scroll offset linearly onto pages leaves the last few unreachable, since
// the strip stops scrolling while several trailing pages are still visible.
// Two regimes fix that:
//
//   A. Up to the crossover, page k is in view from half an image before its
//      top edge until half an image before the next one.
//   B. From the crossover to the bottom, the remaining scroll range is split
//      evenly between the pages that are visible when fully scrolled down.

/// Largest scroll offset of a strip of `page_count` images in a viewport.
pub fn max_scroll_top(viewport_height: f64, image_height: f64, page_count: usize) -> f64 {
    (page_count as f64 * image_height - viewport_height).max(0.0)
}

/// Index of the page in view, `None` when there are no pages.
///
/// Assumes every page image has the same height. The result is always within
/// `0..page_count`; out-of-range scroll offsets are clamped first.
pub fn current_page_index(
    scroll_top: f64,
    viewport_height: f64,
    image_height: f64,
    page_count: usize,
) -> Option<usize> {
    if page_count == 0 {
        return None;
    }
    if page_count == 1 || image_height <= 0.0 {
        return Some(0);
    }

    let max_scroll = max_scroll_top(viewport_height, image_height, page_count);
    if max_scroll <= 0.0 {
        // Everything fits; there is no scrolling to map.
        return Some(0);
    }
    let scroll_top = scroll_top.clamp(0.0, max_scroll);
    let last = page_count - 1;

    let visible_at_end = ((viewport_height / image_height).ceil() as usize).clamp(1, page_count);
    let before_crossover = page_count - visible_at_end;
    let half_image = image_height / 2.0;

    let crossover = if before_crossover == 0 {
        0.0
    } else {
        half_image + (before_crossover - 1) as f64 * image_height
    };

    if scroll_top < crossover {
        let index = if scroll_top < half_image {
            0
        } else {
            1 + ((scroll_top - half_image) / image_height).floor() as usize
        };
        return Some(index.min(last));
    }

    let per_page_share = (max_scroll - crossover) / visible_at_end as f64;
    let offset = ((scroll_top - crossover) / per_page_share).floor().max(0.0) as usize;
    Some((before_crossover + offset).min(last))
}
