/**
 * Rotating Carousel
 * Shows one published item at a time, auto-advancing on a timer that is
 * restarted by every navigation, automatic or manual.
 */
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot, watch, RwLock},
    task::JoinHandle,
    time::{sleep, Instant, Sleep},
};
use uuid::Uuid;

use crate::db::models::{ContentItem, ContentKind};
use crate::error::StoreError;
use crate::store::{ContentStore, ItemOrder, ItemQuery};

#[derive(Debug, Clone)]
pub struct CarouselConfig {
    pub kind: ContentKind,
    pub interval: Duration,
    pub limit: usize,
    pub load_timeout: Option<Duration>,
}

impl Default for CarouselConfig {
    fn default() -> Self {
        Self {
            kind: ContentKind::Blog,
            interval: Duration::from_millis(5000),
            limit: 5,
            load_timeout: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CarouselError {
    #[error("slide {index} is out of range for {len} items")]
    OutOfRange { index: usize, len: usize },

    #[error("carousel is no longer mounted")]
    Unmounted,
}

/// Items plus the current position. `current` is always a valid index when
/// there are items.
#[derive(Debug, Clone, Default)]
pub struct CarouselState {
    items: Arc<[ContentItem]>,
    current: usize,
}

impl CarouselState {
    pub fn new(items: Vec<ContentItem>) -> Self {
        Self {
            items: items.into(),
            current: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[ContentItem] {
        &self.items
    }

    pub fn current_index(&self) -> Option<usize> {
        (!self.is_empty()).then_some(self.current)
    }

    pub fn current(&self) -> Option<&ContentItem> {
        self.items.get(self.current)
    }

    pub fn next(&mut self) {
        let n = self.len();
        if n > 0 {
            self.current = (self.current + 1) % n;
        }
    }

    pub fn previous(&mut self) {
        let n = self.len();
        if n > 0 {
            self.current = (self.current + n - 1) % n;
        }
    }

    pub fn go_to(&mut self, index: usize) -> Result<(), CarouselError> {
        if index >= self.len() {
            return Err(CarouselError::OutOfRange {
                index,
                len: self.len(),
            });
        }
        self.current = index;
        Ok(())
    }

    /// A single item never rotates onto itself.
    pub fn auto_advances(&self) -> bool {
        self.len() > 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadPhase {
    Loading,
    Ready,
}

#[derive(Debug, Clone)]
pub struct CarouselSnapshot {
    pub phase: LoadPhase,
    pub state: CarouselState,
    pub timer_armed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Slide {
    pub id: String,
    pub title: String,
    pub excerpt: Option<String>,
    pub image: Option<String>,
    pub category: Option<String>,
    pub href: String,
    pub date: String,
}

impl From<&ContentItem> for Slide {
    fn from(item: &ContentItem) -> Self {
        Self {
            id: item.id.to_string(),
            title: item.title.clone(),
            excerpt: item.excerpt.clone(),
            image: item.image.clone(),
            category: item.category.clone(),
            href: item.kind.public_path(&item.slug),
            date: item.display_date().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Indicator {
    pub index: usize,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CarouselView {
    pub slide: Slide,
    pub index: usize,
    pub total: usize,
    /// Previous/next arrows are shown.
    pub controls: bool,
    /// One jump target per item; empty when there is a single item.
    pub indicators: Vec<Indicator>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CarouselRender {
    Loading,
    Empty,
    Slide(CarouselView),
}

impl CarouselSnapshot {
    pub fn render(&self) -> CarouselRender {
        if self.phase == LoadPhase::Loading {
            return CarouselRender::Loading;
        }
        let Some(item) = self.state.current() else {
            return CarouselRender::Empty;
        };

        let index = self.state.current;
        let controls = self.state.auto_advances();
        let indicators = if controls {
            (0..self.state.len())
                .map(|i| Indicator {
                    index: i,
                    active: i == index,
                })
                .collect()
        } else {
            Vec::new()
        };

        CarouselRender::Slide(CarouselView {
            slide: Slide::from(item),
            index,
            total: self.state.len(),
            controls,
            indicators,
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Nav {
    Next,
    Previous,
    GoTo(usize),
}

struct NavRequest {
    nav: Nav,
    reply: oneshot::Sender<Result<Option<usize>, CarouselError>>,
}

/// The task that owns the carousel state and its single timer.
struct Driver {
    state: CarouselState,
    phase: LoadPhase,
    interval: Duration,
    timer: Option<Pin<Box<Sleep>>>,
    snapshots: watch::Sender<CarouselSnapshot>,
}

impl Driver {
    /// Restart the interval, or drop it when there is nothing to rotate.
    fn rearm(&mut self) {
        self.timer = self
            .state
            .auto_advances()
            .then(|| Box::pin(sleep(self.interval)));
    }

    fn publish(&self) {
        self.snapshots.send_replace(CarouselSnapshot {
            phase: self.phase,
            state: self.state.clone(),
            timer_armed: self.timer.is_some(),
        });
    }

    fn loaded(&mut self, result: Result<Vec<ContentItem>, StoreError>) {
        match result {
            Ok(items) => {
                tracing::debug!(count = items.len(), "carousel items loaded");
                self.state = CarouselState::new(items);
            }
            Err(e) => {
                tracing::warn!(error = %e, "carousel load failed, rendering nothing");
                self.state = CarouselState::default();
            }
        }
        self.phase = LoadPhase::Ready;
        self.rearm();
        self.publish();
    }

    fn navigate(&mut self, nav: Nav) -> Result<Option<usize>, CarouselError> {
        match nav {
            Nav::Next => self.state.next(),
            Nav::Previous => self.state.previous(),
            Nav::GoTo(index) => self.state.go_to(index)?,
        }
        self.rearm();
        self.publish();
        Ok(self.state.current_index())
    }

    async fn run(
        mut self,
        load: impl Future<Output = Result<Vec<ContentItem>, StoreError>>,
        mut requests: mpsc::Receiver<NavRequest>,
    ) {
        tokio::pin!(load);
        let mut loading = true;

        loop {
            tokio::select! {
                result = &mut load, if loading => {
                    loading = false;
                    self.loaded(result);
                }
                request = requests.recv() => match request {
                    Some(NavRequest { nav, reply }) => {
                        let _ = reply.send(self.navigate(nav));
                    }
                    None => break,
                },
                _ = tick(&mut self.timer) => {
                    let _ = self.navigate(Nav::Next);
                }
            }
        }
    }
}

async fn tick(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(timer) => timer.as_mut().await,
        None => std::future::pending().await,
    }
}

async fn load_items(
    store: Arc<dyn ContentStore>,
    config: CarouselConfig,
) -> Result<Vec<ContentItem>, StoreError> {
    let query = ItemQuery::published(config.kind)
        .order(ItemOrder::Latest)
        .limit(config.limit);
    let load = store.query_items(config.kind, &query);

    match config.load_timeout {
        Some(limit) => tokio::time::timeout(limit, load)
            .await
            .map_err(|_| StoreError::Timeout)?,
        None => load.await,
    }
}

/// Handle to a mounted carousel. Dropping it stops the timer task.
pub struct Carousel {
    requests: mpsc::Sender<NavRequest>,
    snapshots: watch::Receiver<CarouselSnapshot>,
    task: JoinHandle<()>,
}

impl Carousel {
    /// Start loading up to `config.limit` published items, newest first.
    pub fn mount(store: Arc<dyn ContentStore>, config: CarouselConfig) -> Self {
        let (snapshots_tx, snapshots) = watch::channel(CarouselSnapshot {
            phase: LoadPhase::Loading,
            state: CarouselState::default(),
            timer_armed: false,
        });
        let (requests, requests_rx) = mpsc::channel(32);

        let driver = Driver {
            state: CarouselState::default(),
            phase: LoadPhase::Loading,
            interval: config.interval,
            timer: None,
            snapshots: snapshots_tx,
        };
        let task = tokio::spawn(driver.run(load_items(store, config), requests_rx));

        Self {
            requests,
            snapshots,
            task,
        }
    }

    async fn send(&self, nav: Nav) -> Result<Option<usize>, CarouselError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(NavRequest { nav, reply })
            .await
            .map_err(|_| CarouselError::Unmounted)?;
        response.await.map_err(|_| CarouselError::Unmounted)?
    }

    /// Advance one slide, wrapping from last to first.
    pub async fn next(&self) -> Result<Option<usize>, CarouselError> {
        self.send(Nav::Next).await
    }

    /// Go back one slide, wrapping from first to last.
    pub async fn previous(&self) -> Result<Option<usize>, CarouselError> {
        self.send(Nav::Previous).await
    }

    pub async fn go_to(&self, index: usize) -> Result<Option<usize>, CarouselError> {
        self.send(Nav::GoTo(index)).await
    }

    pub fn snapshot(&self) -> CarouselSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Wait for the initial load to finish (successfully or not).
    pub async fn loaded(&self) -> CarouselSnapshot {
        let mut snapshots = self.snapshots.clone();
        if let Ok(s) = snapshots.wait_for(|s| s.phase == LoadPhase::Ready).await {
            return s.clone();
        }
        let snapshot = snapshots.borrow().clone();
        snapshot
    }

    pub fn watch(&self) -> watch::Receiver<CarouselSnapshot> {
        self.snapshots.clone()
    }

    pub fn render(&self) -> CarouselRender {
        self.snapshots.borrow().render()
    }

    pub fn unmount(self) {}
}

impl Drop for Carousel {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct MountedView {
    carousel: Arc<Carousel>,
    last_seen: Instant,
}

/// One carousel per client view. Each mount loads its own items and owns its
/// own index and timer; a view left untouched for `idle` is unmounted.
#[derive(Clone)]
pub struct CarouselViews {
    store: Arc<dyn ContentStore>,
    config: CarouselConfig,
    idle: Duration,
    views: Arc<RwLock<HashMap<Uuid, MountedView>>>,
}

impl CarouselViews {
    pub fn new(store: Arc<dyn ContentStore>, config: CarouselConfig, idle: Duration) -> Self {
        Self {
            store,
            config,
            idle,
            views: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn sweep(&self, views: &mut HashMap<Uuid, MountedView>, now: Instant) {
        let before = views.len();
        views.retain(|_, view| now.duration_since(view.last_seen) < self.idle);
        if views.len() < before {
            tracing::debug!(dropped = before - views.len(), "idle carousel views unmounted");
        }
    }

    /// Mount a fresh carousel for a new view.
    pub async fn mount(&self) -> (Uuid, Arc<Carousel>) {
        let now = Instant::now();
        let mut views = self.views.write().await;
        self.sweep(&mut views, now);

        let id = Uuid::new_v4();
        let carousel = Arc::new(Carousel::mount(self.store.clone(), self.config.clone()));
        views.insert(
            id,
            MountedView {
                carousel: carousel.clone(),
                last_seen: now,
            },
        );
        (id, carousel)
    }

    /// The carousel of a live view, refreshing its idle deadline.
    pub async fn get(&self, id: Uuid) -> Option<Arc<Carousel>> {
        let now = Instant::now();
        let mut views = self.views.write().await;
        self.sweep(&mut views, now);

        let view = views.get_mut(&id)?;
        view.last_seen = now;
        Some(view.carousel.clone())
    }

    /// `false` when the view was not mounted.
    pub async fn unmount(&self, id: Uuid) -> bool {
        self.views.write().await.remove(&id).is_some()
    }

    /// Number of views currently mounted.
    pub async fn count(&self) -> usize {
        self.views.read().await.len()
    }
}
