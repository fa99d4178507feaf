//! Which mini-player presentations exist and which one is showing.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

/// Open/closed flag of the sink, shared by every manager the lifecycle builds.
pub type Visibility = Arc<watch::Sender<bool>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresentationMode {
    /// The standalone mini-player view.
    Document,
}

impl PresentationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PresentationMode::Document => "document",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "document" => Some(PresentationMode::Document),
            _ => None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModeError {
    #[error("No PiP mode available")]
    NoModeAvailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleOutcome {
    pub mode: PresentationMode,
    pub open: bool,
}

/// Tracks the active presentation. The open flag lives in a watch channel
/// owned by the sink, so it survives re-initialization; a fresh manager
/// picks up whatever is already showing.
#[derive(Debug)]
pub struct ModeManager {
    available: Vec<PresentationMode>,
    active: Option<PresentationMode>,
    visibility: Visibility,
}

impl ModeManager {
    pub fn new(document_supported: bool, visibility: Visibility) -> Self {
        let available = if document_supported { vec![PresentationMode::Document] } else { Vec::new() };
        let active = (*visibility.borrow() && document_supported).then_some(PresentationMode::Document);
        Self { available, active, visibility }
    }

    pub fn available_modes(&self) -> &[PresentationMode] {
        &self.available
    }

    pub fn active_mode(&self) -> Option<PresentationMode> {
        self.active
    }

    pub fn is_supported(&self, mode: PresentationMode) -> bool {
        self.available.contains(&mode)
    }

    /// Toggle `preferred` when available, else the first available mode.
    /// Another active mode is closed first.
    pub fn toggle(&mut self, preferred: Option<PresentationMode>) -> Result<ToggleOutcome, ModeError> {
        let mode = preferred
            .filter(|m| self.is_supported(*m))
            .or_else(|| self.available.first().copied())
            .ok_or(ModeError::NoModeAvailable)?;

        if let Some(active) = self.active
            && active != mode
        {
            self.deactivate(active);
        }
        let open = self.active != Some(mode);
        if open {
            self.active = Some(mode);
            self.visibility.send_replace(true);
        } else {
            self.deactivate(mode);
        }
        tracing::info!(mode = mode.as_str(), open, "Mini-player toggled");
        Ok(ToggleOutcome { mode, open })
    }

    /// Mirror a close initiated by the sink itself.
    pub fn closed_by_sink(&mut self) {
        if let Some(mode) = self.active {
            self.deactivate(mode);
        }
    }

    fn deactivate(&mut self, mode: PresentationMode) {
        if self.active == Some(mode) {
            self.active = None;
        }
        self.visibility.send_replace(false);
    }
}
