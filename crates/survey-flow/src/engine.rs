//! The paginator: one page at a time, validation before every forward step,
//! durable progress, and a single completion payload per run.
//!
//! Engine state lives behind a short synchronous lock that is never held
//! across an `.await`. The mounted page sits behind an async mutex that is
//! only held while it validates. A flow in the `Transitioning` phase drops
//! every navigation request, so at most one transition is ever in flight.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;

use crate::answers::{CompletionPayload, FlowPhase, FlowState, Navigation, PageValidation};
use crate::clock::{Clock, SystemClock};
use crate::error::{FlowError, Result};
use crate::pages::{PageContext, PageFactory, PageRegistry, PageUnit};
use crate::persist::{Persistence, StateSlot};
use crate::shell::{Direction, HeadlessShell, NavigationState, Progress, Shell};
use crate::spec::{PageDescriptor, SurveyDocument, key_for};
use crate::sync::lock;
use crate::variants::VariantRegistry;

pub const DEFAULT_ERROR_MESSAGE: &str = "Please complete this page before continuing.";
pub const TIMEOUT_MESSAGE: &str = "Validation took too long. Please try again.";

pub type CompleteHook = Arc<dyn Fn(&CompletionPayload) + Send + Sync>;
pub type ChangeHook = Arc<dyn Fn(&FlowState) + Send + Sync>;
pub type ResetHook = Arc<dyn Fn() + Send + Sync>;
pub type ProgressFormatter = Arc<dyn Fn(&FlowState) -> String + Send + Sync>;

#[derive(Clone)]
pub struct PaginatorOptions {
    pub show_progress: bool,
    pub on_complete: Option<CompleteHook>,
    pub on_change: Option<ChangeHook>,
    pub on_reset: Option<ResetHook>,
    pub progress_formatter: Option<ProgressFormatter>,
    pub default_error_message: String,
    /// Progress is only persisted when a key and a slot are both set.
    pub storage_key: Option<String>,
    pub resume_from_storage: bool,
    pub storage_version: String,
    pub direction: Option<Direction>,
    /// A validation running longer than this counts as failed.
    pub validation_timeout: Option<Duration>,
}

impl Default for PaginatorOptions {
    fn default() -> Self {
        Self {
            show_progress: true,
            on_complete: None,
            on_change: None,
            on_reset: None,
            progress_formatter: None,
            default_error_message: DEFAULT_ERROR_MESSAGE.to_string(),
            storage_key: None,
            resume_from_storage: true,
            storage_version: "v1".to_string(),
            direction: None,
            validation_timeout: None,
        }
    }
}

impl fmt::Debug for PaginatorOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaginatorOptions")
            .field("show_progress", &self.show_progress)
            .field("default_error_message", &self.default_error_message)
            .field("storage_key", &self.storage_key)
            .field("resume_from_storage", &self.resume_from_storage)
            .field("storage_version", &self.storage_version)
            .field("direction", &self.direction)
            .field("validation_timeout", &self.validation_timeout)
            .finish_non_exhaustive()
    }
}

impl PaginatorOptions {
    /// Options taken from a survey document; hooks stay unset.
    pub fn from_document(document: &SurveyDocument) -> Self {
        let options = &document.options;
        Self {
            show_progress: options.show_progress,
            default_error_message: options
                .default_error_message
                .clone()
                .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string()),
            storage_key: Some(document.storage_key()),
            resume_from_storage: options.resume_from_storage,
            storage_version: options.storage_version.clone(),
            direction: document.direction,
            ..Self::default()
        }
    }
}

struct FlowCore {
    phase: FlowPhase,
    index: usize,
    data_by_key: BTreeMap<String, Value>,
    durations: BTreeMap<String, u64>,
    visited: BTreeSet<usize>,
    mounted_at: Option<u64>,
    next_enabled: bool,
    completed: Option<CompletionPayload>,
}

impl FlowCore {
    fn new() -> Self {
        Self {
            phase: FlowPhase::Idle,
            index: 0,
            data_by_key: BTreeMap::new(),
            durations: BTreeMap::new(),
            visited: BTreeSet::new(),
            mounted_at: None,
            next_enabled: true,
            completed: None,
        }
    }

    /// Claims the transition slot if the flow is showing a page.
    fn begin(&mut self) -> Option<usize> {
        if self.phase != FlowPhase::Showing {
            return None;
        }
        self.phase = FlowPhase::Transitioning;
        Some(self.index)
    }
}

struct Inner {
    pages: Vec<PageDescriptor>,
    keys: Vec<String>,
    factories: Vec<Arc<dyn PageFactory>>,
    shell: Arc<dyn Shell>,
    clock: Arc<dyn Clock>,
    persistence: Persistence,
    options: PaginatorOptions,
    core: Mutex<FlowCore>,
    active: AsyncMutex<Option<Box<dyn PageUnit>>>,
}

/// Builder for [`Paginator`].
pub struct PaginatorBuilder {
    pages: Vec<PageDescriptor>,
    registry: Option<Arc<PageRegistry>>,
    shell: Option<Arc<dyn Shell>>,
    slot: Option<Arc<dyn StateSlot>>,
    clock: Option<Arc<dyn Clock>>,
    options: PaginatorOptions,
}

impl PaginatorBuilder {
    /// Page registry; defaults to the built-in pages over the built-in
    /// variants.
    pub fn registry(mut self, registry: Arc<PageRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Presentation shell; defaults to a [`HeadlessShell`].
    pub fn shell(mut self, shell: Arc<dyn Shell>) -> Self {
        self.shell = Some(shell);
        self
    }

    pub fn slot(mut self, slot: Arc<dyn StateSlot>) -> Self {
        self.slot = Some(slot);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn options(mut self, options: PaginatorOptions) -> Self {
        self.options = options;
        self
    }

    /// Resolves every page type, checks its props and rejects pages that
    /// resolve to the same key.
    pub fn build(self) -> Result<Paginator> {
        if self.pages.is_empty() {
            return Err(FlowError::EmptyFlow);
        }
        let registry = self.registry.unwrap_or_else(|| {
            Arc::new(PageRegistry::with_builtins(Arc::new(
                VariantRegistry::with_builtins(),
            )))
        });

        let mut keys = Vec::with_capacity(self.pages.len());
        let mut factories = Vec::with_capacity(self.pages.len());
        for (index, descriptor) in self.pages.iter().enumerate() {
            let factory = registry
                .get(&descriptor.page_type)
                .ok_or_else(|| FlowError::UnknownPageType {
                    index,
                    page_type: descriptor.page_type.clone(),
                })?;
            let key = key_for(descriptor, index);
            if keys.contains(&key) {
                return Err(FlowError::DuplicatePageId(key));
            }
            factory.check(descriptor, &key)?;
            keys.push(key);
            factories.push(factory);
        }

        let persistence = Persistence::new(
            self.slot,
            self.options.storage_key.clone(),
            self.options.storage_version.clone(),
            self.options.resume_from_storage,
        );
        let inner = Inner {
            pages: self.pages,
            keys,
            factories,
            shell: self.shell.unwrap_or_else(|| Arc::new(HeadlessShell::new())),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            persistence,
            options: self.options,
            core: Mutex::new(FlowCore::new()),
            active: AsyncMutex::new(None),
        };
        Ok(Paginator {
            inner: Arc::new(inner),
        })
    }
}

/// Drives a sequence of pages through one shell.
pub struct Paginator {
    inner: Arc<Inner>,
}

impl Paginator {
    pub fn builder(pages: Vec<PageDescriptor>) -> PaginatorBuilder {
        PaginatorBuilder {
            pages,
            registry: None,
            shell: None,
            slot: None,
            clock: None,
            options: PaginatorOptions::default(),
        }
    }

    /// Handle that pages and callers use to drive the flow.
    pub fn controls(&self) -> FlowControls {
        FlowControls {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Mounts the first page, or the resumed one. Only the first call has an
    /// effect; it reports `Moved` with `from == to`.
    pub async fn start(&self) -> Navigation {
        self.inner.start().await
    }

    pub async fn next(&self) -> Navigation {
        self.inner.next().await
    }

    pub async fn back(&self) -> Navigation {
        self.inner.back().await
    }

    pub async fn jump_to(&self, index: usize) -> Result<Navigation> {
        self.inner.jump_to(index).await
    }

    pub async fn complete(&self) -> Navigation {
        self.inner.complete().await
    }

    pub async fn reset(&self) -> Navigation {
        self.inner.reset().await
    }

    pub fn state(&self) -> FlowState {
        self.inner.state()
    }

    pub fn set_next_enabled(&self, enabled: bool) {
        self.inner.set_next_enabled(enabled);
    }

    pub fn descriptors(&self) -> &[PageDescriptor] {
        &self.inner.pages
    }

    pub fn keys(&self) -> &[String] {
        &self.inner.keys
    }

    pub fn data_by_key(&self) -> BTreeMap<String, Value> {
        lock(&self.inner.core).data_by_key.clone()
    }

    pub fn durations(&self) -> BTreeMap<String, u64> {
        lock(&self.inner.core).durations.clone()
    }

    /// Indices rendered at least once in this run.
    pub fn visited(&self) -> BTreeSet<usize> {
        lock(&self.inner.core).visited.clone()
    }

    /// The payload, once the flow has completed.
    pub fn completion(&self) -> Option<CompletionPayload> {
        lock(&self.inner.core).completed.clone()
    }

    pub fn is_complete(&self) -> bool {
        lock(&self.inner.core).phase == FlowPhase::Complete
    }
}

/// Weak handle to a paginator. Once the paginator is dropped every call is a
/// no-op.
#[derive(Clone)]
pub struct FlowControls {
    inner: Weak<Inner>,
}

impl fmt::Debug for FlowControls {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowControls")
            .field("attached", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl FlowControls {
    /// Controls bound to nothing.
    pub fn detached() -> Self {
        Self { inner: Weak::new() }
    }

    pub async fn next(&self) -> Navigation {
        match self.inner.upgrade() {
            Some(inner) => inner.next().await,
            None => Navigation::Ignored,
        }
    }

    pub async fn back(&self) -> Navigation {
        match self.inner.upgrade() {
            Some(inner) => inner.back().await,
            None => Navigation::Ignored,
        }
    }

    pub async fn jump_to(&self, index: usize) -> Result<Navigation> {
        match self.inner.upgrade() {
            Some(inner) => inner.jump_to(index).await,
            None => Ok(Navigation::Ignored),
        }
    }

    pub async fn complete(&self) -> Navigation {
        match self.inner.upgrade() {
            Some(inner) => inner.complete().await,
            None => Navigation::Ignored,
        }
    }

    pub async fn reset(&self) -> Navigation {
        match self.inner.upgrade() {
            Some(inner) => inner.reset().await,
            None => Navigation::Ignored,
        }
    }

    pub fn state(&self) -> Option<FlowState> {
        self.inner.upgrade().map(|inner| inner.state())
    }

    pub fn set_next_enabled(&self, enabled: bool) {
        if let Some(inner) = self.inner.upgrade() {
            inner.set_next_enabled(enabled);
        }
    }

    pub fn set_error(&self, message: Option<&str>) {
        if let Some(inner) = self.inner.upgrade() {
            inner.shell.set_error(message);
        }
    }

    /// Returns whether the shell supports text direction.
    pub fn set_direction(&self, direction: Direction) -> bool {
        let Some(inner) = self.inner.upgrade() else {
            return false;
        };
        match inner.shell.directional() {
            Some(shell) => {
                shell.set_direction(direction);
                true
            }
            None => false,
        }
    }
}

impl Inner {
    fn total(&self) -> usize {
        self.pages.len()
    }

    fn state_of(&self, core: &FlowCore) -> FlowState {
        let total = self.total();
        let index = core.index.min(total.saturating_sub(1));
        FlowState {
            index,
            total,
            has_next: index + 1 < total,
            has_prev: index > 0,
            progress: (index + 1) as f64 / total as f64,
            key: self.keys[index].clone(),
            next_enabled: core.next_enabled,
            phase: core.phase,
        }
    }

    fn state(&self) -> FlowState {
        self.state_of(&lock(&self.core))
    }

    fn navigation_of(&self, state: &FlowState) -> NavigationState {
        let showing = state.phase == FlowPhase::Showing;
        NavigationState {
            can_go_back: showing && state.has_prev,
            can_go_next: showing && state.next_enabled,
            is_last: !state.has_next,
        }
    }

    fn set_next_enabled(&self, enabled: bool) {
        let state = {
            let mut core = lock(&self.core);
            core.next_enabled = enabled;
            self.state_of(&core)
        };
        self.shell.set_navigation(self.navigation_of(&state));
    }

    /// Pushes progress and navigation to the shell.
    fn publish(&self) {
        let state = self.state();
        if self.options.show_progress {
            let label = match &self.options.progress_formatter {
                Some(format) => format(&state),
                None => format!("Page {} of {}", state.index + 1, state.total),
            };
            self.shell.set_progress(Some(Progress {
                label,
                fraction: state.progress,
            }));
        } else {
            self.shell.set_progress(None);
        }
        self.shell.set_busy(state.phase == FlowPhase::Transitioning);
        self.shell.set_navigation(self.navigation_of(&state));
    }

    fn persist(&self) {
        let snapshot = {
            let core = lock(&self.core);
            self.persistence
                .snapshot(core.index, &core.data_by_key, &core.durations)
        };
        self.persistence.persist(&snapshot);
    }

    fn controls(self: &Arc<Self>) -> FlowControls {
        FlowControls {
            inner: Arc::downgrade(self),
        }
    }

    async fn start(self: &Arc<Self>) -> Navigation {
        {
            let mut core = lock(&self.core);
            if core.phase != FlowPhase::Idle {
                return Navigation::Ignored;
            }
            core.phase = FlowPhase::Transitioning;
        }
        self.shell.set_busy(true);
        if let Some(direction) = self.options.direction
            && let Some(shell) = self.shell.directional()
        {
            shell.set_direction(direction);
        }

        let target = {
            let restored = self.persistence.restore(self.total());
            let mut core = lock(&self.core);
            match restored {
                Some(restored) => {
                    tracing::debug!(index = ?restored.index, "restored saved progress");
                    core.data_by_key = restored.data_by_key;
                    core.durations = restored.durations_by_key;
                    restored.index.unwrap_or(0)
                }
                None => 0,
            }
        };
        self.mount(target, true).await;
        Navigation::Moved {
            from: target,
            to: target,
        }
    }

    async fn next(self: &Arc<Self>) -> Navigation {
        let index = {
            let mut core = lock(&self.core);
            if !core.next_enabled {
                return Navigation::Ignored;
            }
            match core.begin() {
                Some(index) => index,
                None => return Navigation::Ignored,
            }
        };
        self.shell.set_busy(true);

        let verdict = {
            let mut active = self.active.lock().await;
            match active.as_mut() {
                Some(page) => Some(self.run_validation(page.as_mut()).await),
                None => None,
            }
        };

        match verdict {
            None => {
                self.settle();
                Navigation::Ignored
            }
            Some(PageValidation::Invalid { message }) => {
                let message = message.unwrap_or_else(|| self.options.default_error_message.clone());
                tracing::debug!(page = %self.keys[index], %message, "page rejected");
                self.settle();
                self.shell.set_error(Some(&message));
                Navigation::Rejected { message }
            }
            Some(PageValidation::Valid { data }) => {
                if let Some(data) = data {
                    lock(&self.core)
                        .data_by_key
                        .insert(self.keys[index].clone(), data);
                }
                self.teardown().await;
                if index + 1 >= self.total() {
                    self.finish();
                    Navigation::Completed
                } else {
                    self.mount(index + 1, true).await;
                    Navigation::Moved {
                        from: index,
                        to: index + 1,
                    }
                }
            }
        }
    }

    async fn run_validation(&self, page: &mut dyn PageUnit) -> PageValidation {
        match self.options.validation_timeout {
            Some(limit) => match tokio::time::timeout(limit, page.validate()).await {
                Ok(verdict) => verdict,
                Err(_) => {
                    tracing::warn!(?limit, "page validation timed out");
                    PageValidation::invalid(TIMEOUT_MESSAGE)
                }
            },
            None => page.validate().await,
        }
    }

    async fn back(self: &Arc<Self>) -> Navigation {
        let index = {
            let mut core = lock(&self.core);
            if core.phase != FlowPhase::Showing || core.index == 0 {
                return Navigation::Ignored;
            }
            match core.begin() {
                Some(index) => index,
                None => return Navigation::Ignored,
            }
        };
        self.shell.set_busy(true);
        self.teardown().await;
        self.mount(index - 1, true).await;
        Navigation::Moved {
            from: index,
            to: index - 1,
        }
    }

    async fn jump_to(self: &Arc<Self>, target: usize) -> Result<Navigation> {
        let total = self.total();
        if target >= total {
            return Err(FlowError::OutOfBounds {
                index: target,
                total,
            });
        }
        let index = {
            let mut core = lock(&self.core);
            if core.phase != FlowPhase::Showing || core.index == target {
                return Ok(Navigation::Ignored);
            }
            match core.begin() {
                Some(index) => index,
                None => return Ok(Navigation::Ignored),
            }
        };
        self.shell.set_busy(true);
        self.teardown().await;
        self.mount(target, true).await;
        Ok(Navigation::Moved {
            from: index,
            to: target,
        })
    }

    async fn complete(self: &Arc<Self>) -> Navigation {
        if lock(&self.core).begin().is_none() {
            return Navigation::Ignored;
        }
        self.shell.set_busy(true);
        self.teardown().await;
        self.finish();
        Navigation::Completed
    }

    /// Clears everything and shows the first page again. A flow that never
    /// started stays idle (storage is still cleared) and reports `Ignored`.
    async fn reset(self: &Arc<Self>) -> Navigation {
        let (from, was_idle) = {
            let mut core = lock(&self.core);
            match core.phase {
                FlowPhase::Transitioning => return Navigation::Ignored,
                FlowPhase::Idle => (0, true),
                FlowPhase::Showing | FlowPhase::Complete => {
                    core.phase = FlowPhase::Transitioning;
                    (core.index, false)
                }
            }
        };
        if !was_idle {
            self.shell.set_busy(true);
            self.teardown().await;
        }
        {
            let mut core = lock(&self.core);
            core.data_by_key.clear();
            core.durations.clear();
            core.visited.clear();
            core.mounted_at = None;
            core.completed = None;
        }
        self.persistence.clear();
        tracing::debug!("flow reset");
        if let Some(on_reset) = &self.options.on_reset {
            on_reset();
        }
        if was_idle {
            return Navigation::Ignored;
        }
        self.mount(0, false).await;
        Navigation::Moved { from, to: 0 }
    }

    /// Returns to `Showing` without moving.
    fn settle(&self) {
        lock(&self.core).phase = FlowPhase::Showing;
        self.publish();
    }

    /// Unmounts the active page and books its time.
    async fn teardown(&self) {
        let page = self.active.lock().await.take();
        if let Some(mut page) = page {
            page.on_leave();
            page.destroy();
        }
        self.shell.content().clear();

        let now = self.clock.now_ms();
        let mut core = lock(&self.core);
        if let Some(mounted_at) = core.mounted_at.take() {
            let key = self.keys[core.index].clone();
            *core.durations.entry(key).or_default() += now.saturating_sub(mounted_at);
        }
    }

    /// Mounts page `target`. Failures are shown through the shell and leave
    /// the flow on `target` with no active page.
    async fn mount(self: &Arc<Self>, target: usize, persist: bool) {
        let saved = {
            let mut core = lock(&self.core);
            core.index = target;
            core.next_enabled = true;
            core.visited.insert(target);
            core.mounted_at = Some(self.clock.now_ms());
            core.data_by_key.get(&self.keys[target]).cloned()
        };
        self.shell.set_error(None);
        let mount = self.shell.content();
        mount.clear();

        let ctx = PageContext {
            mount,
            descriptor: self.pages[target].clone(),
            key: self.keys[target].clone(),
            index: target,
            controls: self.controls(),
            saved_data: saved.clone(),
        };
        let built = self.factories[target].create(ctx).and_then(|mut page| {
            page.on_enter(saved.as_ref());
            page.render()?;
            Ok(page)
        });
        let mounted = match built {
            Ok(page) => {
                *self.active.lock().await = Some(page);
                tracing::debug!(index = target, key = %self.keys[target], "page mounted");
                true
            }
            Err(err) => {
                tracing::warn!(index = target, %err, "page failed to mount");
                self.shell.set_error(Some(&err.to_string()));
                false
            }
        };

        lock(&self.core).phase = FlowPhase::Showing;
        if persist {
            self.persist();
        }
        self.publish();
        if mounted && let Some(on_change) = &self.options.on_change {
            on_change(&self.state());
        }
    }

    /// Builds the payload once and enters `Complete`.
    fn finish(&self) {
        let payload = {
            let mut core = lock(&self.core);
            if core.completed.is_some() {
                core.phase = FlowPhase::Complete;
                return;
            }
            let page_parameters = self
                .pages
                .iter()
                .zip(&self.keys)
                .filter_map(|(page, key)| page.parameter_meta().map(|meta| (key.clone(), meta)))
                .collect();
            let payload = CompletionPayload {
                descriptors: self.pages.clone(),
                data_by_id: core.data_by_key.clone(),
                page_durations_ms: core.durations.clone(),
                page_parameters,
            };
            core.completed = Some(payload.clone());
            core.phase = FlowPhase::Complete;
            payload
        };
        self.persistence.clear();
        tracing::debug!(pages = self.total(), "flow completed");
        self.shell.set_error(None);
        if let Some(on_complete) = &self.options.on_complete {
            on_complete(&payload);
        }
        self.publish();
    }
}
