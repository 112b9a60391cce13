//! Progress rendering for status messages
//!
//! Pure functions only; the per-transfer reporter task that feeds them
//! lives in the relay. Keeping rendering free of IO makes the cadence
//! and formatting rules unit-testable.

use std::time::Duration;

/// Number of cells in the progress bar
const BAR_CELLS: usize = 12;

const FILLED: char = '▰';
const EMPTY: char = '▱';

/// Humanize a byte count in powers of 1024
///
/// Prefixes run `Ki`/`Mi`/`Gi`/`Ti`, values are rounded to two
/// decimals, and zero renders as `0B`. Counts beyond tebibytes stay in
/// `TiB` rather than falling off the prefix table.
///
/// # Examples
///
/// ```
/// use media_dl::progress::human_bytes;
///
/// assert_eq!(human_bytes(0), "0B");
/// assert_eq!(human_bytes(2048), "2.00 KiB");
/// ```
#[must_use]
pub fn human_bytes(size: u64) -> String {
    if size == 0 {
        return "0B".to_string();
    }

    const PREFIXES: [&str; 5] = ["", "Ki", "Mi", "Gi", "Ti"];
    let mut value = size as f64;
    let mut n = 0;
    while value > 1024.0 && n < PREFIXES.len() - 1 {
        value /= 1024.0;
        n += 1;
    }
    format!("{:.2} {}B", value, PREFIXES[n])
}

/// Whether a visible update is due
///
/// Updates are rate-limited to roughly one per five seconds of elapsed
/// transfer time; a completed transfer always renders so the final
/// state is never dropped.
#[must_use]
pub fn should_render(current: u64, total: u64, elapsed: Duration) -> bool {
    if current == total {
        return true;
    }
    (elapsed.as_secs_f64() % 5.0).round() == 0.0
}

/// Render one status message for a transfer in flight
///
/// Produces the label, a 12-cell bar, the percentage to one decimal,
/// humanized byte counts, and (when computable) average speed and ETA.
/// Never divides by zero: an unknown total renders as 0% and a
/// zero-length elapsed window omits the speed line.
#[must_use]
pub fn render(current: u64, total: u64, elapsed: Duration, label: &str) -> String {
    let percent = if total == 0 {
        0.0
    } else {
        (current as f64 * 100.0 / total as f64).clamp(0.0, 100.0)
    };

    let filled = ((percent / 100.0 * BAR_CELLS as f64) as usize).min(BAR_CELLS);
    let mut bar = String::with_capacity(BAR_CELLS * FILLED.len_utf8());
    for _ in 0..filled {
        bar.push(FILLED);
    }
    for _ in filled..BAR_CELLS {
        bar.push(EMPTY);
    }

    let mut text = format!(
        "{label}\n\n{bar} {percent:.1}%\n{} / {}",
        human_bytes(current),
        human_bytes(total),
    );

    let elapsed_secs = elapsed.as_secs_f64();
    if elapsed_secs > 0.0 {
        let speed = current as f64 / elapsed_secs;
        if speed > 0.0 {
            text.push_str(&format!("\nSpeed: {}/s", human_bytes(speed as u64)));
            if total > current {
                let eta = ((total - current) as f64 / speed) as u64;
                text.push_str(&format!("\nETA: {}", format_eta(eta)));
            }
        }
    }

    text
}

fn format_eta(secs: u64) -> String {
    if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}
