// src/exec/diagnostics.rs

//! Turning raw build output into a short, readable error list.

use regex::Regex;

use crate::exec::dispatch::BuildOutput;
use crate::types::TargetDescriptor;

/// Default pattern for lines worth surfacing from a failed build.
pub const DEFAULT_ERROR_PATTERN: &str = r"(?i)\berror\b";

const MAX_ERROR_LINES: usize = 20;
const STDERR_TAIL_LINES: usize = 10;

/// Error messages for a build that exited unsuccessfully.
///
/// The first entry always states the exit reason. It is followed by lines
/// matching the target's `error_pattern` parameter (stderr first, then
/// stdout), or by the tail of stderr when nothing matched.
pub fn extract_errors(target: &TargetDescriptor, output: &BuildOutput) -> Vec<String> {
    let mut errors = vec![match output.exit_code {
        Some(code) => format!("build of '{}' exited with code {code}", target.name),
        None => format!("build of '{}' was terminated by a signal", target.name),
    }];

    let pattern = target
        .param("error_pattern")
        .and_then(|p| Regex::new(p).ok())
        .or_else(|| Regex::new(DEFAULT_ERROR_PATTERN).ok());

    let matched: Vec<String> = match &pattern {
        Some(re) => output
            .stderr
            .lines()
            .chain(output.stdout.lines())
            .map(str::trim)
            .filter(|line| !line.is_empty() && re.is_match(line))
            .take(MAX_ERROR_LINES)
            .map(str::to_string)
            .collect(),
        None => Vec::new(),
    };

    if matched.is_empty() {
        let tail: Vec<&str> = output
            .stderr
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        let start = tail.len().saturating_sub(STDERR_TAIL_LINES);
        errors.extend(tail[start..].iter().map(|s| s.to_string()));
    } else {
        errors.extend(matched);
    }

    errors
}
