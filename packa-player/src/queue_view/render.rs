//! Queue view rendering
//!
//! Turns a [`QueueSnapshot`] into platform-neutral pages. The messaging
//! gateway maps a [`RenderedPage`] onto whatever rich message format it
//! supports; [`Display`](std::fmt::Display) gives a plain-text fallback.

use crate::playback::session::{NowPlaying, QueueSnapshot};
use crate::track::TrackRef;
use packa_common::human_time::{format_position, format_track_time, progress_slider, SLIDER_WIDTH};
use serde::Serialize;
use std::fmt;

pub const NOT_ACTIVE_TEXT: &str = "Currently not playing anything.";
pub const EMPTY_QUEUE_TEXT: &str = "Queue is currently empty.";

/// One page of a queue view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedPage {
    pub title: Option<String>,
    /// Standalone text for the not-active and empty views
    pub description: Option<String>,
    /// Now-playing line; page 0 only
    pub now_playing: Option<String>,
    pub entries: Vec<String>,
    /// "`n` songs in queue | `total` total length"
    pub summary: Option<String>,
    /// "Page i/N"
    pub footer: Option<String>,
}

impl RenderedPage {
    fn message(text: &str) -> Self {
        Self {
            title: None,
            description: Some(text.to_string()),
            now_playing: None,
            entries: Vec::new(),
            summary: None,
            footer: None,
        }
    }
}

impl fmt::Display for RenderedPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(title) = &self.title {
            writeln!(f, "{}", title)?;
        }
        if let Some(description) = &self.description {
            writeln!(f, "{}", description)?;
        }
        if let Some(now_playing) = &self.now_playing {
            writeln!(f, "__Now Playing:__ {}", now_playing)?;
        }
        for (i, entry) in self.entries.iter().enumerate() {
            if i == 0 {
                writeln!(f, "__Up next:__")?;
            }
            writeln!(f, "{}", entry)?;
        }
        if let Some(summary) = &self.summary {
            writeln!(f, "{}", summary)?;
        }
        if let Some(footer) = &self.footer {
            write!(f, "{}", footer)?;
        }
        Ok(())
    }
}

/// Single page shown when nothing is playing
pub fn not_active_page() -> RenderedPage {
    RenderedPage::message(NOT_ACTIVE_TEXT)
}

/// Single page shown when the queue is empty
pub fn empty_queue_page() -> RenderedPage {
    RenderedPage::message(EMPTY_QUEUE_TEXT)
}

/// Number of pages for `len` entries; at least one
pub fn page_count(len: usize, page_size: usize) -> usize {
    len.div_ceil(page_size.max(1)).max(1)
}

/// Render every page of a snapshot.
///
/// Falls back to the single not-active or empty page when there is nothing
/// to list.
pub fn render_pages(snapshot: &QueueSnapshot, page_size: usize) -> Vec<RenderedPage> {
    let Some(now_playing) = &snapshot.now_playing else {
        return vec![not_active_page()];
    };
    if snapshot.queue.is_empty() {
        return vec![empty_queue_page()];
    }

    let page_size = page_size.max(1);
    let pages = page_count(snapshot.queue.len(), page_size);
    let summary = format!(
        "`{}` songs in queue | `{}` total length",
        snapshot.queue.len(),
        format_track_time(snapshot.queue_duration)
    );

    snapshot
        .queue
        .chunks(page_size)
        .enumerate()
        .map(|(page, tracks)| RenderedPage {
            title: Some(format!("Queue for group {}", snapshot.group_id)),
            description: None,
            now_playing: (page == 0).then(|| now_playing_line(now_playing)),
            entries: tracks
                .iter()
                .enumerate()
                .map(|(i, track)| entry_line(page * page_size + i + 1, track))
                .collect(),
            summary: Some(summary.clone()),
            footer: Some(format!("Page {}/{}", page + 1, pages)),
        })
        .collect()
}

fn link(track: &TrackRef) -> String {
    let info = track.info();
    if info.uri.is_empty() {
        info.title.clone()
    } else {
        format!("[{}]({})", info.title, info.uri)
    }
}

fn requester_suffix(track: &TrackRef) -> String {
    match &track.info().requested_by {
        Some(user) => format!(" Requested by: {}", user),
        None => String::new(),
    }
}

/// "`n.` [title](uri) | `MM:SS` Requested by: user"
pub fn entry_line(number: usize, track: &TrackRef) -> String {
    let length = if track.info().is_stream {
        "LIVE".to_string()
    } else {
        format_track_time(track.length())
    };
    format!(
        "`{}.` {} | `{}`{}",
        number,
        link(track),
        length,
        requester_suffix(track)
    )
}

/// "[title](uri) | `position`"
pub fn now_playing_line(now_playing: &NowPlaying) -> String {
    format!(
        "{} | `{}`{}",
        link(&now_playing.track),
        format_track_time(now_playing.position),
        requester_suffix(&now_playing.track)
    )
}

/// Rich now-playing card
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NowPlayingCard {
    pub author: String,
    pub title: String,
    pub uri: String,
    pub slider: String,
    pub time: String,
    pub requested_by: Option<String>,
    pub thumbnail_url: Option<String>,
    pub paused: bool,
}

impl fmt::Display for NowPlayingCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.author.is_empty() {
            writeln!(f, "{}", self.author)?;
        }
        writeln!(f, "{}{}", self.title, if self.paused { " (paused)" } else { "" })?;
        writeln!(f, "{}", self.slider)?;
        write!(f, "{}", self.time)?;
        if let Some(user) = &self.requested_by {
            write!(f, "\n`Requested by:` {}", user)?;
        }
        Ok(())
    }
}

/// Build the now-playing card: slider plus `pos / length`, or "Live since"
/// for streams
pub fn now_playing_card(now_playing: &NowPlaying) -> NowPlayingCard {
    let info = now_playing.track.info();
    let (slider, time) = if info.is_stream {
        (
            progress_slider(now_playing.position, now_playing.position, SLIDER_WIDTH),
            format!("Live since: `{}`", format_track_time(now_playing.position)),
        )
    } else {
        (
            progress_slider(now_playing.position, info.length, SLIDER_WIDTH),
            format!("`{}`", format_position(now_playing.position, info.length)),
        )
    };

    NowPlayingCard {
        author: info.author.clone(),
        title: info.title.clone(),
        uri: info.uri.clone(),
        slider,
        time,
        requested_by: info.requested_by.clone(),
        thumbnail_url: info.thumbnail_url.clone(),
        paused: now_playing.paused,
    }
}
