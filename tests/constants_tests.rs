// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for constants module

use camera_preview::backends::camera::select_optimal;
use camera_preview::backends::camera::types::Size;
use camera_preview::constants::{
    CLEAR_COLOR, DEFAULT_VIEWPORT_HEIGHT, DEFAULT_VIEWPORT_WIDTH, VIRTUAL_BACK_SIZES,
    VIRTUAL_FRONT_SIZES,
};

#[test]
fn test_clear_color_is_opaque_white() {
    assert_eq!(CLEAR_COLOR, [1.0, 1.0, 1.0, 1.0]);
}

#[test]
fn test_virtual_sizes_are_landscape() {
    // Sizes are reported in sensor orientation
    for &(w, h) in VIRTUAL_BACK_SIZES.iter().chain(VIRTUAL_FRONT_SIZES) {
        assert!(w >= h, "{}x{} is not landscape", w, h);
    }
}

#[test]
fn test_default_viewport_is_covered_by_virtual_cameras() {
    for sizes in [VIRTUAL_BACK_SIZES, VIRTUAL_FRONT_SIZES] {
        let sizes: Vec<Size> = sizes.iter().copied().map(Size::from).collect();
        let selected =
            select_optimal(&sizes, DEFAULT_VIEWPORT_WIDTH, DEFAULT_VIEWPORT_HEIGHT).unwrap();
        assert!(selected.width > DEFAULT_VIEWPORT_HEIGHT);
        assert!(selected.height > DEFAULT_VIEWPORT_WIDTH);
    }
}
