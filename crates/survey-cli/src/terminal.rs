use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use survey_flow::{MountPoint, NavigationState, Node, Progress, Shell};

/// Line-oriented shell. The engine updates it; the run loop prints it.
#[derive(Debug, Default)]
pub struct TerminalShell {
    mount: MountPoint,
    progress: Mutex<Option<Progress>>,
    error: Mutex<Option<String>>,
    navigation: Mutex<NavigationState>,
}

impl TerminalShell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mount(&self) -> &MountPoint {
        &self.mount
    }

    pub fn navigation(&self) -> NavigationState {
        *self
            .navigation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Writes the current page: progress, pending error, then its nodes.
    pub fn render(&self, out: &mut impl Write) -> io::Result<()> {
        let progress = self
            .progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(progress) = progress {
            writeln!(out, "[{}]", progress.label)?;
        }
        let error = self
            .error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(error) = error {
            writeln!(out, "! {error}")?;
        }
        for node in self.mount.nodes() {
            match node {
                Node::Heading(text) => writeln!(out, "\n== {text} ==")?,
                Node::Paragraph(text) => writeln!(out, "{text}")?,
                Node::Notice(text) => writeln!(out, "(note) {text}")?,
                Node::Input(input) => {
                    let marker = if input.required { " *" } else { "" };
                    writeln!(out, "- {}{marker}", input.label)?;
                    if let Some(hint) = &input.hint {
                        writeln!(out, "    {hint}")?;
                    }
                    if !input.choices.is_empty() {
                        let labels: Vec<&str> =
                            input.choices.iter().map(|choice| choice.label()).collect();
                        writeln!(out, "    options: {}", labels.join(", "))?;
                    }
                    if let Some(error) = &input.error {
                        writeln!(out, "    ! {error}")?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl Shell for TerminalShell {
    fn content(&self) -> MountPoint {
        self.mount.clone()
    }

    fn set_progress(&self, progress: Option<Progress>) {
        *self
            .progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = progress;
    }

    fn set_error(&self, message: Option<&str>) {
        *self.error.lock().unwrap_or_else(PoisonError::into_inner) =
            message.map(ToOwned::to_owned);
    }

    fn set_navigation(&self, navigation: NavigationState) {
        *self
            .navigation
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = navigation;
    }
}
