//! Shader composition: `#include` resolution and `#if` expansion.
//!
//! Templates pull shared chunks in with `#include "name"` and gate code with
//! `#if FLAG`, `#if !FLAG`, `#else` and `#endif` (nestable). Conditions are
//! resolved while composing, so inactive branches never reach the GPU
//! compiler.

use super::library::ShaderLibrary;
use super::ShaderFeatures;
use crate::error::{RendererError, RendererResult};
use std::collections::HashSet;

/// Expand includes then conditionals of `source`
pub fn compose(
    template: &str,
    source: &str,
    library: &ShaderLibrary,
    features: ShaderFeatures,
) -> RendererResult<String> {
    let mut included = HashSet::new();
    let resolved = resolve_includes(template, source, library, &mut included)?;
    preprocess(template, &resolved, features)
}

fn resolve_includes(
    template: &str,
    source: &str,
    library: &ShaderLibrary,
    included: &mut HashSet<String>,
) -> RendererResult<String> {
    let mut result = String::with_capacity(source.len());

    for line in source.lines() {
        if let Some(path) = parse_include_directive(line.trim()) {
            if !included.insert(path.to_string()) {
                continue;
            }
            let chunk = library.chunk(path).ok_or_else(|| RendererError::ShaderTemplate {
                template: template.to_string(),
                message: format!("include not found: \"{path}\""),
            })?;
            result.push_str(&resolve_includes(template, chunk, library, included)?);
        } else {
            result.push_str(line);
            result.push('\n');
        }
    }

    Ok(result)
}

/// Parse a `#include "path"` directive, returning the path if found.
fn parse_include_directive(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("#include")?.trim();
    rest.strip_prefix('"')?.strip_suffix('"')
}

struct Frame {
    /// Whether the enclosing block emits
    parent_active: bool,
    condition: bool,
    in_else: bool,
}

impl Frame {
    fn active(&self) -> bool {
        self.parent_active && (self.condition != self.in_else)
    }
}

/// Expand `#if`/`#else`/`#endif` against `features`
pub fn preprocess(template: &str, source: &str, features: ShaderFeatures) -> RendererResult<String> {
    let error = |line: usize, message: String| RendererError::ShaderTemplate {
        template: template.to_string(),
        message: format!("line {}: {}", line + 1, message),
    };

    let mut output = String::with_capacity(source.len());
    let mut stack: Vec<Frame> = Vec::new();

    for (number, line) in source.lines().enumerate() {
        let trimmed = line.trim();
        let active = stack.last().map_or(true, Frame::active);

        if let Some(expr) = trimmed.strip_prefix("#if ") {
            let expr = expr.trim();
            let (negated, flag) = match expr.strip_prefix('!') {
                Some(flag) => (true, flag.trim()),
                None => (false, expr),
            };
            let value = ShaderFeatures::from_name(flag)
                .map(|f| features.contains(f))
                .ok_or_else(|| error(number, format!("unknown flag '{flag}'")))?;
            stack.push(Frame {
                parent_active: active,
                condition: value != negated,
                in_else: false,
            });
        } else if trimmed == "#else" {
            let frame = stack
                .last_mut()
                .ok_or_else(|| error(number, "#else without #if".into()))?;
            if frame.in_else {
                return Err(error(number, "second #else for one #if".into()));
            }
            frame.in_else = true;
        } else if trimmed == "#endif" {
            stack
                .pop()
                .ok_or_else(|| error(number, "#endif without #if".into()))?;
        } else if active {
            output.push_str(line);
            output.push('\n');
        }
    }

    if !stack.is_empty() {
        return Err(RendererError::ShaderTemplate {
            template: template.to_string(),
            message: format!("{} unterminated #if block(s)", stack.len()),
        });
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "a\n#if SKINNING\nb\n#if !TANGENT\nc\n#else\nd\n#endif\n#endif\ne\n";

    #[test]
    fn test_nested_blocks() {
        let out = preprocess("t", SOURCE, ShaderFeatures::SKINNING).unwrap();
        assert_eq!(out, "a\nb\nc\ne\n");

        let out = preprocess("t", SOURCE, ShaderFeatures::SKINNING | ShaderFeatures::TANGENT).unwrap();
        assert_eq!(out, "a\nb\nd\ne\n");

        let out = preprocess("t", SOURCE, ShaderFeatures::TANGENT).unwrap();
        assert_eq!(out, "a\ne\n");
    }

    #[test]
    fn test_unbalanced_blocks_fail() {
        assert!(preprocess("t", "#if SKINNING\nx\n", ShaderFeatures::empty()).is_err());
        assert!(preprocess("t", "x\n#endif\n", ShaderFeatures::empty()).is_err());
        assert!(preprocess("t", "#else\n", ShaderFeatures::empty()).is_err());
    }

    #[test]
    fn test_unknown_flag_fails() {
        let err = preprocess("mesh", "#if WOBBLE\n#endif\n", ShaderFeatures::empty()).unwrap_err();
        assert!(matches!(err, RendererError::ShaderTemplate { ref template, .. } if template == "mesh"));
    }

    #[test]
    fn test_includes_are_resolved_once() {
        let library = ShaderLibrary::standard();
        let source = "#include \"math\"\n#include \"math\"\nbody\n";
        let out = compose("t", source, &library, ShaderFeatures::empty()).unwrap();
        assert_eq!(out.matches("const PI").count(), 1);
        assert!(out.ends_with("body\n"));
    }

    #[test]
    fn test_missing_include_fails() {
        let library = ShaderLibrary::standard();
        assert!(compose("t", "#include \"nope\"\n", &library, ShaderFeatures::empty()).is_err());
    }
}
