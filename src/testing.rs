//! In-process rendering backend for tests
//!
//! Sessions write a real PNG on capture so the resize path is exercised, and the
//! backend keeps counters for launches, closes, aborts and per-domain navigations.

use crate::session::{BackendError, RenderBackend, RenderSession};
use crate::{ScreenshotError, Viewport};
use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const CAPTURE_SIZE: (u32, u32) = (1000, 600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    Succeed,
    FailNavigation,
    /// Navigation fails this many times, then succeeds.
    FailTimes(usize),
    Hang,
    FailCapture,
    /// Navigation succeeds after the given delay.
    Slow(Duration),
}

#[derive(Default)]
struct State {
    behaviours: HashMap<String, Behaviour>,
    navigations: HashMap<String, usize>,
    viewports: Vec<Viewport>,
    failing_launches: usize,
    launches: usize,
    closes: usize,
    aborts: usize,
    live_workers: HashSet<usize>,
    max_live: usize,
    overlapping_launches: usize,
}

#[derive(Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<State>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behaviour(self, domain: &str, behaviour: Behaviour) -> Self {
        self.lock().behaviours.insert(domain.to_string(), behaviour);
        self
    }

    pub fn as_backend(&self) -> Arc<dyn RenderBackend> {
        Arc::new(self.clone())
    }

    pub fn fail_next_launches(&self, n: usize) {
        self.lock().failing_launches = n;
    }

    /// Opens a session directly, bypassing launch failures.
    pub fn open_session(&self, worker_id: usize) -> Box<dyn RenderSession> {
        self.register_launch(worker_id);
        Box::new(FakeSession {
            worker_id,
            state: self.state.clone(),
            finished: false,
        })
    }

    pub fn launches(&self) -> usize {
        self.lock().launches
    }

    pub fn closes(&self) -> usize {
        self.lock().closes
    }

    pub fn aborts(&self) -> usize {
        self.lock().aborts
    }

    pub fn live(&self) -> usize {
        self.lock().live_workers.len()
    }

    pub fn max_live(&self) -> usize {
        self.lock().max_live
    }

    /// Launches for a worker that already had a live session.
    pub fn overlapping_launches(&self) -> usize {
        self.lock().overlapping_launches
    }

    pub fn navigations(&self, domain: &str) -> usize {
        self.lock().navigations.get(domain).copied().unwrap_or_default()
    }

    pub fn total_navigations(&self) -> usize {
        self.lock().navigations.values().sum()
    }

    pub fn viewports(&self) -> Vec<Viewport> {
        self.lock().viewports.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn register_launch(&self, worker_id: usize) {
        let mut state = self.lock();
        state.launches += 1;
        if !state.live_workers.insert(worker_id) {
            state.overlapping_launches += 1;
        }
        state.max_live = state.max_live.max(state.live_workers.len());
    }
}

#[async_trait]
impl RenderBackend for FakeBackend {
    async fn launch(&self, worker_id: usize) -> Result<Box<dyn RenderSession>, ScreenshotError> {
        {
            let mut state = self.lock();
            if state.failing_launches > 0 {
                state.failing_launches -= 1;
                return Err(ScreenshotError::SessionInit(format!(
                    "worker {worker_id}: browser refused to start"
                )));
            }
        }
        Ok(self.open_session(worker_id))
    }
}

struct FakeSession {
    worker_id: usize,
    state: Arc<Mutex<State>>,
    finished: bool,
}

impl FakeSession {
    fn host(address: &str) -> &str {
        address
            .strip_prefix("https://")
            .or_else(|| address.strip_prefix("http://"))
            .unwrap_or(address)
    }

    fn finish(&mut self, aborted: bool) {
        if self.finished {
            return;
        }
        self.finished = true;
        let mut state = self.state.lock().unwrap();
        state.live_workers.remove(&self.worker_id);
        if aborted {
            state.aborts += 1;
        } else {
            state.closes += 1;
        }
    }
}

#[async_trait]
impl RenderSession for FakeSession {
    async fn navigate(&mut self, address: &str) -> Result<(), BackendError> {
        let host = Self::host(address).to_string();
        let behaviour = {
            let mut state = self.state.lock().unwrap();
            let count = state.navigations.entry(host.clone()).or_default();
            *count += 1;
            let count = *count;
            match state.behaviours.get(&host).copied() {
                Some(Behaviour::FailTimes(n)) if count > n => Behaviour::Succeed,
                Some(behaviour) => behaviour,
                None => Behaviour::Succeed,
            }
        };

        match behaviour {
            Behaviour::FailNavigation | Behaviour::FailTimes(_) => Err(BackendError::Navigation(
                format!("net::ERR_NAME_NOT_RESOLVED at {address}"),
            )),
            Behaviour::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
            Behaviour::Slow(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
            Behaviour::Succeed | Behaviour::FailCapture => Ok(()),
        }
    }

    async fn set_viewport(&mut self, viewport: &Viewport) -> Result<(), BackendError> {
        self.state.lock().unwrap().viewports.push(viewport.clone());
        Ok(())
    }

    async fn capture_to_file(&mut self, path: &Path) -> Result<(), BackendError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let fails = self
            .state
            .lock()
            .unwrap()
            .behaviours
            .iter()
            .any(|(domain, b)| {
                *b == Behaviour::FailCapture && format!("{}.png", domain.replace('.', "_")) == name
            });
        if fails {
            return Err(BackendError::Capture("blank page".to_string()));
        }

        RgbImage::from_pixel(CAPTURE_SIZE.0, CAPTURE_SIZE.1, Rgb([200, 120, 40]))
            .save_with_format(path, ImageFormat::Png)
            .map_err(|e| BackendError::Capture(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        self.finish(false);
        Ok(())
    }

    fn abort(&mut self) {
        self.finish(true);
    }
}
