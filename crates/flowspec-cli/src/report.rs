// SPDX-License-Identifier: MIT OR Apache-2.0
//! Verdict rendering: human text and JSON.

use flowspec_align::{OperationStatus, Verdict};
use flowspec_core::Lang;
use std::fmt::Write as _;

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

/// Rendering knobs.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    /// Emit ANSI colors.
    pub color: bool,
    /// Include wall-clock timing. Disabled in CI so reports are
    /// byte-identical across runs.
    pub include_timing: bool,
    /// Report language.
    pub lang: Lang,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            color: true,
            include_timing: true,
            lang: Lang::English,
        }
    }
}

fn heading(lang: Lang) -> &'static str {
    match lang {
        Lang::English => "Verification report",
        Lang::Chinese => "验证报告",
    }
}

/// Render the report as human-readable text.
#[must_use]
pub fn render_human(service: &str, verdict: &Verdict, options: RenderOptions) -> String {
    let paint = |code: &str, text: &str| {
        if options.color {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    };

    let mut out = String::new();
    let _ = writeln!(out, "{} — {service}", heading(options.lang));
    let _ = writeln!(out);

    for result in &verdict.results {
        let (tag, color) = match result.status {
            OperationStatus::Success => ("[ok]  ", GREEN),
            OperationStatus::Failed => ("[fail]", RED),
            OperationStatus::Skipped => ("[skip]", DIM),
        };
        let mut line = format!("{tag} {}", result.display_name());
        if result.matched_spans > 0 {
            let _ = write!(
                line,
                " ({} span{})",
                result.matched_spans,
                if result.matched_spans == 1 { "" } else { "s" }
            );
        }
        if let Some(note) = &result.note {
            let _ = write!(line, " — {note}");
        }
        let _ = writeln!(out, "{}", paint(color, &line));

        for assertion in &result.assertions {
            if assertion.passed {
                let _ = writeln!(out, "        pass  {}", assertion.name);
            } else {
                let reason = assertion.failure_reason.as_deref().unwrap_or("failed");
                let mut detail = format!("        FAIL  {}: {reason}", assertion.name);
                if !assertion.observed_values.is_empty() {
                    let observed: Vec<String> = assertion
                        .observed_values
                        .iter()
                        .map(|(k, v)| format!("{k}={v}"))
                        .collect();
                    let _ = write!(detail, " (observed {})", observed.join(", "));
                }
                let _ = writeln!(out, "{}", paint(RED, &detail));
            }
        }
    }

    let s = &verdict.summary;
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "summary: {} operations — {} success, {} failed, {} skipped; \
         assertions: {} total, {} failed",
        s.total, s.success, s.failed, s.skipped, s.total_assertions, s.failed_assertions
    );
    if options.include_timing {
        let _ = writeln!(
            out,
            "time: {} ms ({} workers)",
            verdict.performance.duration_ms, verdict.performance.workers
        );
    }
    out
}

/// Render the report as pretty-printed JSON.
///
/// Timing is stripped when `include_timing` is off so two runs over the same
/// inputs produce byte-identical output.
#[must_use]
pub fn render_json(service: &str, verdict: &Verdict, options: RenderOptions) -> String {
    let mut value = serde_json::to_value(verdict).expect("verdict serializes");
    if let Some(obj) = value.as_object_mut() {
        obj.insert("service".to_string(), serde_json::Value::from(service));
        if !options.include_timing {
            obj.remove("performance");
        }
    }
    let mut rendered = serde_json::to_string_pretty(&value).expect("verdict serializes");
    rendered.push('\n');
    rendered
}
