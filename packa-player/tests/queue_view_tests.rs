//! Queue view and view registry integration tests

mod helpers;

use helpers::*;
use packa_common::events::SessionEvent;
use packa_common::{DestinationId, GroupId};
use packa_player::queue_view::render::{EMPTY_QUEUE_TEXT, NOT_ACTIVE_TEXT};
use packa_player::queue_view::{Controls, QueueViewSurface, RenderedPage, CONTROL_BACKWARD, CONTROL_FORWARD};
use packa_player::simulation::CatalogResolver;
use packa_player::PlaybackService;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Every frame shown: destination, page footer, controls
#[derive(Default)]
struct RecordingSurface {
    shown: Mutex<Vec<(DestinationId, Option<String>, Controls)>>,
}

impl QueueViewSurface for RecordingSurface {
    fn show(&self, destination: DestinationId, page: &RenderedPage, controls: Controls) {
        self.shown
            .lock()
            .unwrap()
            .push((destination, page.footer.clone(), controls));
    }
}

fn tracks(n: usize) -> String {
    (0..n)
        .map(|i| format!("t{}=60", i))
        .collect::<Vec<_>>()
        .join(",")
}

const BOTH_OFF: Controls = Controls {
    backward_enabled: false,
    forward_enabled: false,
};

#[tokio::test]
async fn test_twenty_three_track_queue_pages() {
    let t = start_session().await;
    t.session.load_and_enqueue("now=100").await.unwrap();
    t.wait_playing("now").await;
    t.session.load_and_enqueue(&tracks(23)).await.unwrap();

    let view = t.service.show_queue(GROUP, DESTINATION).await;
    assert!(view.active);
    assert_eq!(view.page_count, 3);
    assert_eq!(view.page_index, 0);
    assert_eq!(view.page.entries.len(), 10);
    assert!(view.page.now_playing.as_deref().unwrap().contains("[now]"));
    assert_eq!(
        view.controls,
        Controls {
            backward_enabled: false,
            forward_enabled: true
        }
    );

    let second = t.service.page_queue(DESTINATION, CONTROL_FORWARD).await.unwrap();
    assert_eq!(second.page_index, 1);
    assert_eq!(second.page.entries.len(), 10);
    assert!(second.page.now_playing.is_none());
    assert!(second.controls.backward_enabled && second.controls.forward_enabled);

    let last = t.service.page_queue(DESTINATION, CONTROL_FORWARD).await.unwrap();
    assert_eq!(last.page_index, 2);
    assert_eq!(last.page.entries.len(), 3);
    assert!(last.page.entries[2].starts_with("`23.` [t22]"));
    assert_eq!(last.page.footer.as_deref(), Some("Page 3/3"));
    assert!(!last.controls.forward_enabled);

    let still_last = t.service.page_queue(DESTINATION, CONTROL_FORWARD).await.unwrap();
    assert_eq!(still_last.page_index, 2);

    let back = t.service.page_queue(DESTINATION, CONTROL_BACKWARD).await.unwrap();
    assert_eq!(back.page_index, 1);

    assert!(t.service.page_queue(DESTINATION, "button_play").await.is_none());
}

#[tokio::test]
async fn test_view_is_a_snapshot() {
    let t = start_session().await;
    t.session.load_and_enqueue("now=100").await.unwrap();
    t.wait_playing("now").await;
    t.session.load_and_enqueue(&tracks(12)).await.unwrap();

    t.service.show_queue(GROUP, DESTINATION).await;
    t.session.skip_from_to(0, 10).await.unwrap();

    // Paging still walks the pages rendered at creation
    let page = t.service.page_queue(DESTINATION, CONTROL_FORWARD).await.unwrap();
    assert_eq!(page.page_count, 2);
    assert_eq!(page.page.entries.len(), 2);
}

#[tokio::test]
async fn test_snapshot_excludes_track_still_starting() {
    let t = start_session().await;
    t.session.load_and_enqueue("a=10,b=10").await.unwrap();

    let view = t.service.show_queue(GROUP, DESTINATION).await;
    assert_eq!(view.page.entries.len(), 1);
    assert!(view.page.entries[0].contains("[b]"));
    assert!(view.page.now_playing.as_deref().unwrap().contains("[a]"));
}

#[tokio::test]
async fn test_static_views() {
    let t = start_session().await;

    let none = t.service.show_queue(GroupId(999), DestinationId(1)).await;
    assert!(!none.active);
    assert_eq!(none.page.description.as_deref(), Some(NOT_ACTIVE_TEXT));
    assert_eq!(none.controls, BOTH_OFF);
    assert!(!t.service.has_active_queue_view(DestinationId(1)).await);
    assert!(t.service.page_queue(DestinationId(1), CONTROL_FORWARD).await.is_none());

    // Session exists but nothing plays
    let idle = t.service.show_queue(GROUP, DESTINATION).await;
    assert_eq!(idle.page.description.as_deref(), Some(NOT_ACTIVE_TEXT));

    t.session.load_and_enqueue("solo=60").await.unwrap();
    t.wait_playing("solo").await;
    let empty = t.service.show_queue(GROUP, DESTINATION).await;
    assert!(!empty.active);
    assert_eq!(empty.page.description.as_deref(), Some(EMPTY_QUEUE_TEXT));
}

#[tokio::test]
async fn test_second_view_replaces_first() {
    let surface = Arc::new(RecordingSurface::default());
    let resolver = Arc::new(CatalogResolver::new());
    let service = PlaybackService::new(
        &test_config(),
        resolver,
        Some(surface.clone() as Arc<dyn QueueViewSurface>),
    );

    let (tx, rx) = packa_player::provider::provider_channel();
    let provider = packa_player::simulation::SimulatedProvider::new(tx);
    let session = service.join(GROUP, provider, rx, DESTINATION).await.unwrap();
    session.load_and_enqueue(&tracks(15)).await.unwrap();

    let first = service.show_queue(GROUP, DESTINATION).await;
    service.page_queue(DESTINATION, CONTROL_FORWARD).await.unwrap();
    let second = service.show_queue(GROUP, DESTINATION).await;
    assert!(first.active && second.active);

    let shown = surface.shown.lock().unwrap().clone();
    let frames: Vec<(Option<&str>, Controls)> = shown
        .iter()
        .map(|(_, footer, controls)| (footer.as_deref(), *controls))
        .collect();
    // First view: page 1, page 2, disabled; then the replacement on page 1
    assert_eq!(frames.len(), 4);
    assert_eq!(frames[1].0, Some("Page 2/2"));
    assert_eq!(frames[2], (Some("Page 2/2"), BOTH_OFF));
    assert_eq!(
        frames[3],
        (
            Some("Page 1/2"),
            Controls {
                backward_enabled: false,
                forward_enabled: true
            }
        )
    );
    assert_eq!(shown.last().map(|(d, _, c)| (*d, *c)), Some((DESTINATION, second.controls)));

    assert_eq!(service.views().len().await, 1);
    assert!(service.has_active_queue_view(DESTINATION).await);
    let paged = service.page_queue(DESTINATION, CONTROL_FORWARD).await.unwrap();
    assert_eq!(paged.page_index, 1);
}

#[tokio::test(start_paused = true)]
async fn test_sweep_removes_views_after_lifetime() {
    let service = PlaybackService::new(&test_config(), Arc::new(CatalogResolver::new()), None);
    let mut events = service.subscribe();
    let first = DestinationId(1);
    let second = DestinationId(2);

    service.show_queue(GroupId(1), first).await;

    // Sweep at 300s: nothing is old enough yet
    tokio::time::sleep(Duration::from_secs(310)).await;
    assert_eq!(service.views().len().await, 1);
    service.show_queue(GroupId(1), second).await;

    // Sweep at 600s: first view reached its lifetime, second has not
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(service.views().len().await, 1);

    // Sweep at 900s: second view is 590s old
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(service.views().len().await, 1);

    // Sweep at 1200s
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert!(service.views().is_empty().await);

    let expired: Vec<DestinationId> = drain_events(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            SessionEvent::QueueViewExpired { destination_id, .. } => Some(destination_id),
            _ => None,
        })
        .collect();
    assert_eq!(expired, vec![first, second]);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_sweep_and_sessions() {
    let t = start_session().await;
    t.session.load_and_enqueue("a=60").await.unwrap();
    t.service.show_queue(GROUP, DESTINATION).await;

    assert_eq!(t.service.shutdown().await, 1);
    assert!(t.provider.is_destroyed());

    // No sweep runs after shutdown
    tokio::time::sleep(Duration::from_secs(1300)).await;
    assert_eq!(t.service.views().len().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_view_created_after_sweep_start_is_untouched() {
    let mut config = test_config();
    config.queue_view.sweep_interval_secs = 3600;
    let service = PlaybackService::new(&config, Arc::new(CatalogResolver::new()), None);

    service.show_queue(GroupId(1), DestinationId(1)).await;
    tokio::time::sleep(Duration::from_secs(600)).await;

    let sweep_start = tokio::time::Instant::now();
    tokio::time::sleep(Duration::from_millis(5)).await;
    service.show_queue(GroupId(1), DestinationId(2)).await;

    let removed = service.views().sweep_expired_at(sweep_start).await;
    assert_eq!(removed, vec![DestinationId(1)]);
    assert_eq!(service.views().len().await, 1);
}
