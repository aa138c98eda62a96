//! Human-readable track time formatting
//!
//! Provides consistent time display for queue views and now-playing cards.

use std::time::Duration;

/// Width of the now-playing progress slider, in cells
pub const SLIDER_WIDTH: usize = 30;

const SLIDER_DASH: char = '▬';
const SLIDER_MARKER: &str = "🔘";

/// Format a track time as `MM:SS`, or `HH:MM:SS` once it reaches an hour.
///
/// # Examples
///
/// ```
/// use packa_common::human_time::format_track_time;
/// use std::time::Duration;
///
/// assert_eq!(format_track_time(Duration::from_secs(75)), "01:15");
/// assert_eq!(format_track_time(Duration::from_secs(3661)), "01:01:01");
/// ```
pub fn format_track_time(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// Format `position / length` using the length's magnitude for both sides,
/// so `05:00 / 01:10:00` renders as `00:05:00 / 01:10:00`.
pub fn format_position(position: Duration, length: Duration) -> String {
    if length.as_secs() >= 3600 {
        let pos = position.as_secs();
        format!(
            "{:02}:{:02}:{:02} / {}",
            pos / 3600,
            (pos % 3600) / 60,
            pos % 60,
            format_track_time(length)
        )
    } else {
        format!("{} / {}", format_track_time(position), format_track_time(length))
    }
}

/// Render a progress slider of `width` dashes with a marker at the position.
///
/// A zero length (live streams) puts the marker at the end.
///
/// ```
/// use packa_common::human_time::progress_slider;
/// use std::time::Duration;
///
/// let slider = progress_slider(Duration::from_secs(5), Duration::from_secs(10), 4);
/// assert_eq!(slider, "`▬▬🔘▬▬`");
/// ```
pub fn progress_slider(position: Duration, length: Duration, width: usize) -> String {
    let marker = if length.is_zero() {
        width
    } else {
        let ratio = position.as_secs_f64() / length.as_secs_f64();
        ((ratio * width as f64).round() as usize).min(width)
    };

    let mut slider = String::with_capacity(width * 3 + 8);
    slider.push('`');
    slider.extend(std::iter::repeat(SLIDER_DASH).take(marker));
    slider.push_str(SLIDER_MARKER);
    slider.extend(std::iter::repeat(SLIDER_DASH).take(width - marker));
    slider.push('`');
    slider
}
