//! Front-end validation of generated WGSL

use crate::error::{RendererError, RendererResult};

/// Parse and validate `source` with naga
pub fn validate_wgsl(label: &str, source: &str) -> RendererResult<()> {
    let error = |message: String| RendererError::ShaderTemplate {
        template: label.to_string(),
        message,
    };

    let module = naga::front::wgsl::parse_str(source).map_err(|e| error(format!("WGSL parse error: {e}")))?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator
        .validate(&module)
        .map_err(|e| error(format!("Validation error: {e}")))?;

    log::trace!("Validated WGSL module '{}'", label);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_module() {
        let source = "@fragment\nfn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }\n";
        assert!(validate_wgsl("ok", source).is_ok());
    }

    #[test]
    fn test_invalid_module_reports_label() {
        let err = validate_wgsl("broken", "fn f() -> f32 { return x; }").unwrap_err();
        assert!(matches!(err, RendererError::ShaderTemplate { ref template, .. } if template == "broken"));
    }
}
