//! CLI output formatting.
//!
//! Output is information-centric: each image leads with its positional index
//! and logical name, with the source path and per-artifact status as
//! indented context lines.
//!
//! # Output Format
//!
//! ## Process
//!
//! ```text
//! Processing 2 images
//! 001 logo (alpha)
//!     Source: brand/logo.png
//!     webp 300px: encoded
//!     png 300px: cached
//!     placeholder: encoded
//! 002 banner skipped
//!     Source: banner.jpg
//!     Reason: 1 of its artifacts failed: jpg/banner-600.jpg: ...
//!
//! 1 processed, 1 skipped
//! Cache: 3 cached, 6 encoded (9 total)
//! ```
//!
//! ## Check
//!
//! ```text
//! 001 logo
//!     Source: brand/logo.png
//! 002 hero (duplicate)
//!     Source: hero.jpg
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::process::{BatchReport, ProcessEvent, SourceFile, VariantStatus};
use crate::srcset::ResolvedSrcSet;
use std::collections::HashMap;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn status_str(status: VariantStatus) -> &'static str {
    match status {
        VariantStatus::Cached => "cached",
        VariantStatus::Copied => "copied",
        VariantStatus::Encoded => "encoded",
    }
}

// ============================================================================
// Process
// ============================================================================

/// Format a single process progress event as display lines.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::BatchStarted { image_count } => {
            let noun = if *image_count == 1 { "image" } else { "images" };
            vec![format!("Processing {} {}", image_count, noun)]
        }
        ProcessEvent::ImageProcessed {
            index,
            logical_name,
            source_path,
            has_alpha,
            variants,
        } => {
            let mut lines = Vec::with_capacity(variants.len() + 2);
            let alpha = if *has_alpha { " (alpha)" } else { "" };
            lines.push(format!("{} {}{}", format_index(*index), logical_name, alpha));
            lines.push(format!("{}Source: {}", indent(1), source_path));
            for variant in variants {
                lines.push(format!(
                    "{}{}: {}",
                    indent(1),
                    variant.label,
                    status_str(variant.status)
                ));
            }
            lines
        }
        ProcessEvent::ImageSkipped {
            index,
            logical_name,
            source_path,
            reason,
        } => vec![
            format!("{} {} skipped", format_index(*index), logical_name),
            format!("{}Source: {}", indent(1), source_path),
            format!("{}Reason: {}", indent(1), reason),
        ],
    }
}

/// Format the closing summary of a run.
pub fn format_batch_report(report: &BatchReport) -> Vec<String> {
    vec![
        String::new(),
        report.to_string(),
        format!("Cache: {}", report.cache_stats),
    ]
}

pub fn print_batch_report(report: &BatchReport) {
    for line in format_batch_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Check
// ============================================================================

/// Format the list of discovered sources, flagging logical name collisions.
pub fn format_check_output(sources: &[SourceFile]) -> Vec<String> {
    if sources.is_empty() {
        return vec!["No images found".to_string()];
    }
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for s in sources {
        *counts.entry(s.logical_name.as_str()).or_default() += 1;
    }

    let mut lines = Vec::with_capacity(sources.len() * 2);
    for (i, source) in sources.iter().enumerate() {
        let flag = if counts[source.logical_name.as_str()] > 1 {
            " (duplicate)"
        } else {
            ""
        };
        lines.push(format!(
            "{} {}{}",
            format_index(i + 1),
            source.logical_name,
            flag
        ));
        lines.push(format!("{}Source: {}", indent(1), source.relative));
    }
    lines
}

pub fn print_check_output(sources: &[SourceFile]) {
    for line in format_check_output(sources) {
        println!("{}", line);
    }
}

// ============================================================================
// Srcset
// ============================================================================

/// Format a resolved srcset as `src`, then one candidate per line.
pub fn format_srcset(resolved: &ResolvedSrcSet) -> Vec<String> {
    let mut lines = vec![format!("src: {}", resolved.src)];
    lines.push("srcset:".to_string());
    lines.extend(
        resolved
            .entries
            .iter()
            .map(|e| format!("{}{}", indent(1), e.candidate())),
    );
    lines
}

pub fn print_srcset(resolved: &ResolvedSrcSet) {
    for line in format_srcset(resolved) {
        println!("{}", line);
    }
}
