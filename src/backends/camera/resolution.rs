// SPDX-License-Identifier: GPL-3.0-only

//! Preview resolution selection
//!
//! Picks the smallest supported output size that still covers the viewport.
//! Camera sizes are reported in sensor orientation (landscape), so a portrait
//! viewport is compared rotated.

use super::types::{PreviewResolution, Size};
use crate::errors::ResolutionError;
use tracing::debug;

/// Select the preview resolution for a viewport
///
/// Candidates must strictly exceed the viewport in both dimensions. For a
/// landscape viewport (`width > height`) that means `cand.width > width` and
/// `cand.height > height`; otherwise the viewport is rotated and the test
/// becomes `cand.width > height` and `cand.height > width`. The candidate with
/// the smallest area wins, the first one on ties.
///
/// When nothing covers the viewport the first supported size is returned, not
/// the largest one.
pub fn select_optimal(
    supported: &[Size],
    viewport_width: u32,
    viewport_height: u32,
) -> Result<PreviewResolution, ResolutionError> {
    let first = *supported.first().ok_or(ResolutionError::EmptySizeList)?;

    let (min_width, min_height) = if viewport_width > viewport_height {
        (viewport_width, viewport_height)
    } else {
        (viewport_height, viewport_width)
    };

    let best = supported
        .iter()
        .filter(|size| size.width > min_width && size.height > min_height)
        .min_by_key(|size| size.area())
        .copied();

    match best {
        Some(size) => {
            debug!(
                selected = %size,
                viewport_width,
                viewport_height,
                "Selected smallest covering preview size"
            );
            Ok(size)
        }
        None => {
            debug!(
                fallback = %first,
                viewport_width,
                viewport_height,
                "No output size covers the viewport, using first size"
            );
            Ok(first)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizes(list: &[(u32, u32)]) -> Vec<Size> {
        list.iter().copied().map(Size::from).collect()
    }

    #[test]
    fn test_portrait_viewport_compares_rotated() {
        let supported = sizes(&[(100, 100), (2000, 3000), (1200, 1800), (4000, 6000)]);
        let selected = select_optimal(&supported, 1080, 1920).unwrap();
        assert_eq!(selected, Size::new(2000, 3000));
    }

    #[test]
    fn test_landscape_viewport() {
        let supported = sizes(&[(1280, 720), (1920, 1080), (2560, 1440), (1921, 1081)]);
        let selected = select_optimal(&supported, 1920, 1080).unwrap();
        assert_eq!(selected, Size::new(1921, 1081));
    }

    #[test]
    fn test_fallback_is_first_entry_not_smallest() {
        let supported = sizes(&[(640, 480), (320, 240)]);
        let selected = select_optimal(&supported, 1080, 1920).unwrap();
        assert_eq!(selected, Size::new(640, 480));
    }

    #[test]
    fn test_single_small_entry_falls_back() {
        let supported = sizes(&[(50, 50)]);
        assert_eq!(
            select_optimal(&supported, 1080, 1920),
            Ok(Size::new(50, 50))
        );
    }

    #[test]
    fn test_empty_list_fails() {
        assert_eq!(
            select_optimal(&[], 1080, 1920),
            Err(ResolutionError::EmptySizeList)
        );
        assert_eq!(select_optimal(&[], 0, 0), Err(ResolutionError::EmptySizeList));
    }

    #[test]
    fn test_equal_dimension_is_not_covering() {
        // 1920 is not strictly greater than 1920
        let supported = sizes(&[(1280, 720), (1920, 1440)]);
        let selected = select_optimal(&supported, 1080, 1920).unwrap();
        assert_eq!(selected, Size::new(1280, 720));
    }

    #[test]
    fn test_ties_keep_first_encountered() {
        let supported = sizes(&[(100, 10), (3000, 2000), (2000, 3000), (6000, 1000)]);
        let selected = select_optimal(&supported, 1080, 1920).unwrap();
        // Both 3000x2000 and 2000x3000 cover 1920x1080 with equal area
        assert_eq!(selected, Size::new(3000, 2000));
    }

    #[test]
    fn test_square_viewport_uses_rotated_comparison() {
        let supported = sizes(&[(500, 500), (1001, 1001), (2000, 2000)]);
        assert_eq!(
            select_optimal(&supported, 1000, 1000),
            Ok(Size::new(1001, 1001))
        );
    }

    #[test]
    fn test_result_is_always_a_member() {
        let lists = [
            sizes(&[(1, 1)]),
            sizes(&[(4000, 3000), (1920, 1080), (640, 480)]),
            sizes(&[(10, 5000), (5000, 10), (3000, 3000)]),
        ];
        let viewports = [(1, 1), (1080, 1920), (1920, 1080), (4096, 4096), (7, 3)];

        for list in &lists {
            for &(w, h) in &viewports {
                let selected = select_optimal(list, w, h).unwrap();
                assert!(list.contains(&selected), "{} not in {:?}", selected, list);
            }
        }
    }
}
