use crate::models::JobResult;
use std::fmt::Write;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━";

/// Render a job result as a Markdown message.
pub fn render_summary(result: &JobResult) -> String {
    let mut out = String::new();

    let headline = if !result.has_failures() {
        "✅ *BACKUP JOB - SUCCESS*"
    } else if result.successes.is_empty() {
        "🔴 *BACKUP JOB - FAILED*"
    } else {
        "🔴 *BACKUP JOB - PARTIAL FAILURE*"
    };
    let _ = writeln!(out, "{headline}");
    let _ = writeln!(out, "{RULE}");

    let _ = writeln!(out, "📊 *Summary*");
    let _ = writeln!(out, "• Devices: `{}`", result.attempted);
    let _ = writeln!(out, "• Succeeded: `{}`", result.successes.len());
    let _ = writeln!(out, "• Failed: `{}`", result.failures.len());
    let _ = writeln!(out, "• Total duration: `{:.2}s`", result.total_duration.as_secs_f64());
    let _ = writeln!(out, "• Finished: `{}`", result.finished_at.format("%d/%m/%Y %H:%M:%S"));

    if !result.successes.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "✅ *Backups*");
        let _ = writeln!(out, "{RULE}");
        for record in &result.successes {
            let _ = writeln!(out, "🖥 *{}*", escape(&record.identity));
            let _ = writeln!(out, "  • File: `{}`", code(&record.filename));
            let _ = writeln!(out, "  • Size: `{:.2} KB`", record.size_kb());
            let _ = writeln!(out, "  • Time: `{:.2}s`", record.duration.as_secs_f64());
        }
    }

    if !result.failures.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "❌ *Failures*");
        let _ = writeln!(out, "{RULE}");
        for failure in &result.failures {
            let _ = writeln!(out, "🖥 Address: `{}`", code(&failure.address));
            let _ = writeln!(out, "  • Error: `{}`", code(&failure.error));
        }
    }

    out.trim_end().to_string()
}

/// Inside code spans only the backtick is special.
fn code(text: &str) -> String {
    text.replace('`', "'")
}

fn escape(text: &str) -> String {
    text.chars()
        .flat_map(|c| match c {
            '_' | '*' | '`' | '[' => vec!['\\', c],
            _ => vec![c],
        })
        .collect()
}
