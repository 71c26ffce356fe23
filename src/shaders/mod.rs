// SPDX-License-Identifier: GPL-3.0-only
//! Shader sources
//!
//! WGSL is embedded at compile time; pipelines are built from these strings.

/// Preview quad shader (`vs_main` / `fs_main`)
///
/// Group 0 binds the frame texture at 0 and its sampler at 1. Vertex
/// locations are 0 for the position and 1 for the texture coordinate.
pub const PREVIEW_SHADER: &str = include_str!("preview.wgsl");

#[cfg(test)]
mod tests {
    use super::*;

    /// Validate that a WGSL shader compiles successfully using naga
    fn validate_shader(name: &str, source: &str) {
        let result = naga::front::wgsl::parse_str(source);
        match result {
            Ok(module) => {
                let info = naga::valid::Validator::new(
                    naga::valid::ValidationFlags::all(),
                    naga::valid::Capabilities::all(),
                )
                .validate(&module);

                if let Err(e) = info {
                    panic!("Shader '{}' validation failed: {:?}", name, e);
                }
            }
            Err(e) => {
                panic!("Shader '{}' parse failed: {:?}", name, e);
            }
        }
    }

    #[test]
    fn test_preview_shader_validates() {
        validate_shader("preview", PREVIEW_SHADER);
    }

    #[test]
    fn test_preview_shader_entry_points() {
        let module = naga::front::wgsl::parse_str(PREVIEW_SHADER).unwrap();
        let names: Vec<&str> = module
            .entry_points
            .iter()
            .map(|ep| ep.name.as_str())
            .collect();
        assert!(names.contains(&"vs_main"));
        assert!(names.contains(&"fs_main"));
    }
}
