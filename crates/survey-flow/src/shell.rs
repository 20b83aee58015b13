use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::spec::Choice;
use crate::sync::lock;
use crate::variants::FieldHandle;

/// Text direction for bidirectional layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Ltr,
    Rtl,
    Auto,
}

/// An input rendered by a page and bound to a live field.
#[derive(Clone)]
pub struct InputNode {
    pub id: String,
    pub label: String,
    pub hint: Option<String>,
    pub variant: String,
    pub required: bool,
    pub choices: Vec<Choice>,
    pub error: Option<String>,
    pub field: FieldHandle,
}

impl fmt::Debug for InputNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputNode")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("variant", &self.variant)
            .field("required", &self.required)
            .field("error", &self.error)
            .field("value", &self.field.value())
            .finish()
    }
}

/// Headless render node.
#[derive(Debug, Clone)]
pub enum Node {
    Heading(String),
    Paragraph(String),
    Notice(String),
    Input(InputNode),
}

/// Content slot a page renders into. Cloning shares the same slot.
#[derive(Debug, Clone, Default)]
pub struct MountPoint {
    nodes: Arc<Mutex<Vec<Node>>>,
}

impl MountPoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, node: Node) {
        lock(&self.nodes).push(node);
    }

    pub fn clear(&self) {
        lock(&self.nodes).clear();
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.nodes).is_empty()
    }

    pub fn nodes(&self) -> Vec<Node> {
        lock(&self.nodes).clone()
    }

    pub fn inputs(&self) -> Vec<InputNode> {
        lock(&self.nodes)
            .iter()
            .filter_map(|node| match node {
                Node::Input(input) => Some(input.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn input(&self, id: &str) -> Option<InputNode> {
        self.inputs().into_iter().find(|input| input.id == id)
    }

    /// Sets or clears the inline error shown next to input `id`.
    pub fn set_input_error(&self, id: &str, error: Option<String>) {
        for node in lock(&self.nodes).iter_mut() {
            if let Node::Input(input) = node
                && input.id == id
            {
                input.error = error.clone();
            }
        }
    }
}

/// Progress line shown by the shell.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub label: String,
    pub fraction: f64,
}

/// Which navigation controls the shell should offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NavigationState {
    pub can_go_back: bool,
    pub can_go_next: bool,
    pub is_last: bool,
}

/// Presentation shell driven by the paginator.
///
/// The engine only calls these narrow update methods and never inspects the
/// shell otherwise.
pub trait Shell: Send + Sync {
    fn content(&self) -> MountPoint;

    fn set_progress(&self, _progress: Option<Progress>) {}

    fn set_error(&self, message: Option<&str>);

    fn set_navigation(&self, navigation: NavigationState);

    /// Raised while a transition is in flight.
    fn set_busy(&self, _busy: bool) {}

    /// Optional capability; shells without bidi support return `None`.
    fn directional(&self) -> Option<&dyn DirectionalShell> {
        None
    }
}

pub trait DirectionalShell: Send + Sync {
    fn set_direction(&self, direction: Direction);
}

/// Shell that only records what it was told. Used as the default and by
/// tests.
#[derive(Debug, Default)]
pub struct HeadlessShell {
    mount: MountPoint,
    progress: Mutex<Option<Progress>>,
    error: Mutex<Option<String>>,
    error_log: Mutex<Vec<String>>,
    navigation: Mutex<NavigationState>,
    busy: Mutex<bool>,
    direction: Mutex<Option<Direction>>,
}

impl HeadlessShell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mount(&self) -> &MountPoint {
        &self.mount
    }

    pub fn progress(&self) -> Option<Progress> {
        lock(&self.progress).clone()
    }

    pub fn error(&self) -> Option<String> {
        lock(&self.error).clone()
    }

    /// Every non-empty error message shown so far, oldest first.
    pub fn error_log(&self) -> Vec<String> {
        lock(&self.error_log).clone()
    }

    pub fn navigation(&self) -> NavigationState {
        *lock(&self.navigation)
    }

    pub fn is_busy(&self) -> bool {
        *lock(&self.busy)
    }

    pub fn direction(&self) -> Option<Direction> {
        *lock(&self.direction)
    }
}

impl Shell for HeadlessShell {
    fn content(&self) -> MountPoint {
        self.mount.clone()
    }

    fn set_progress(&self, progress: Option<Progress>) {
        *lock(&self.progress) = progress;
    }

    fn set_error(&self, message: Option<&str>) {
        if let Some(message) = message {
            lock(&self.error_log).push(message.to_string());
        }
        *lock(&self.error) = message.map(ToOwned::to_owned);
    }

    fn set_navigation(&self, navigation: NavigationState) {
        *lock(&self.navigation) = navigation;
    }

    fn set_busy(&self, busy: bool) {
        *lock(&self.busy) = busy;
    }

    fn directional(&self) -> Option<&dyn DirectionalShell> {
        Some(self)
    }
}

impl DirectionalShell for HeadlessShell {
    fn set_direction(&self, direction: Direction) {
        *lock(&self.direction) = Some(direction);
    }
}
