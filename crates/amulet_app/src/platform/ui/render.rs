use std::fmt::{Display, Write as _};

use amulet_core::{AppViewModel, PersistenceStatus};
use chrono::{DateTime, TimeZone, Utc};

/// Render one frame: a stats header followed by the visible entries.
///
/// Entry times are shown in `tz`; the binary passes `chrono::Local`.
pub fn render<Tz>(view: &AppViewModel, now: DateTime<Utc>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut frame = header(view, now);
    frame.push('\n');
    for entry in &view.entries {
        let _ = writeln!(
            frame,
            "{} {} {}",
            entry.observed_at.with_timezone(tz).format("%H:%M:%S"),
            entry.rarity.label(),
            entry.text
        );
    }
    frame
}

pub fn header(view: &AppViewModel, now: DateTime<Utc>) -> String {
    let stats = &view.stats;
    let mut line = format!(
        "SPS: {:.2} │ Skeets: {} │ New: {} │ Total: {} │ {}",
        stats.rate_per_second,
        format_with_commas(stats.posts_seen),
        format_with_commas(stats.matches_this_session),
        format_with_commas(stats.matches_total),
        format_runtime(now, view.started_at),
    );
    if stats.classifier_failures > 0 {
        let _ = write!(line, " │ Failed: {}", stats.classifier_failures);
    }
    if stats.persistence == PersistenceStatus::MemoryOnly {
        line.push_str(" │ MEMORY ONLY");
    }
    line
}

fn format_runtime(now: DateTime<Utc>, started_at: DateTime<Utc>) -> String {
    let secs = (now - started_at).num_seconds().max(0);
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

fn format_with_commas(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
