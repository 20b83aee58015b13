#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use survey_flow::{
    FlowError, Node, PageContext, PageDescriptor, PageRegistry, PageUnit, PageValidation,
};

/// Shared counters and scripted verdicts for probe pages.
#[derive(Default)]
pub struct Probe {
    pub mounts: AtomicUsize,
    pub validations: AtomicUsize,
    pub entered_with: Mutex<Vec<Option<Value>>>,
    verdicts: Mutex<VecDeque<PageValidation>>,
    delay: Mutex<Option<Duration>>,
}

impl Probe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queues the verdict for the next validation; unscripted validations
    /// succeed with `{"page": key}`.
    pub fn script(&self, verdict: PageValidation) {
        self.verdicts.lock().unwrap().push_back(verdict);
    }

    pub fn slow(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn mounts(&self) -> usize {
        self.mounts.load(Ordering::SeqCst)
    }

    pub fn validations(&self) -> usize {
        self.validations.load(Ordering::SeqCst)
    }
}

pub struct ProbePage {
    probe: Arc<Probe>,
    ctx: PageContext,
}

#[async_trait]
impl PageUnit for ProbePage {
    fn on_enter(&mut self, saved: Option<&Value>) {
        self.probe.entered_with.lock().unwrap().push(saved.cloned());
    }

    fn render(&mut self) -> survey_flow::Result<()> {
        self.probe.mounts.fetch_add(1, Ordering::SeqCst);
        self.ctx.mount.push(Node::Heading(self.ctx.key.clone()));
        Ok(())
    }

    async fn validate(&mut self) -> PageValidation {
        self.probe.validations.fetch_add(1, Ordering::SeqCst);
        let delay = *self.probe.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.probe.verdicts.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| PageValidation::valid_with(json!({ "page": self.ctx.key })))
    }

    fn destroy(&mut self) {
        self.ctx.mount.clear();
    }
}

/// Registry with a `probe` page type backed by `probe` and a `broken` type
/// that always fails to render.
pub fn probe_registry(probe: Arc<Probe>) -> Arc<PageRegistry> {
    let mut registry = PageRegistry::new();
    registry.register(
        "probe",
        move |ctx: PageContext| -> survey_flow::Result<Box<dyn PageUnit>> {
            Ok(Box::new(ProbePage {
                probe: probe.clone(),
                ctx,
            }))
        },
    );
    registry.register(
        "broken",
        |ctx: PageContext| -> survey_flow::Result<Box<dyn PageUnit>> {
            Err(FlowError::InvalidProps {
                key: ctx.key,
                reason: "cannot render".into(),
            })
        },
    );
    Arc::new(registry)
}

pub fn probe_pages(ids: &[&str]) -> Vec<PageDescriptor> {
    ids.iter()
        .map(|id| PageDescriptor::new("probe").with_id(*id))
        .collect()
}
