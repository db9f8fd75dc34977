//! Operator selection (locomotive, switch page, view) and its persistence.
//!
//! The selection survives restarts through a small JSON file next to the log.
//! A missing or unreadable file just means "nothing remembered".

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use panel_proto::protocol::{LocoCatalog, LocoId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    /// Cab controls for the selected locomotive.
    #[default]
    Control,
    /// Paged switch keyboard.
    Keyboard,
}

impl View {
    pub fn toggled(self) -> Self {
        match self {
            Self::Control => Self::Keyboard,
            Self::Keyboard => Self::Control,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Control => "control",
            Self::Keyboard => "keyboard",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "control" => Some(Self::Control),
            "keyboard" => Some(Self::Keyboard),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    pub loco: Option<LocoId>,
    pub page: usize,
    pub view: View,
}

/// On-disk form. Every field is optional so older or hand-edited files load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSelection {
    #[serde(default)]
    pub loco_uid: Option<LocoId>,
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub view: Option<String>,
}

impl PersistedSelection {
    pub fn from_selection(sel: &Selection) -> Self {
        Self {
            loco_uid: sel.loco,
            page: Some(sel.page),
            view: Some(sel.view.label().to_string()),
        }
    }

    /// Page and view to start with. Out-of-range pages and unknown views
    /// fall back to the first page and the control view.
    pub fn restore(&self, page_count: usize) -> Selection {
        let page = self.page.filter(|p| *p < page_count).unwrap_or(0);
        let view = self
            .view
            .as_deref()
            .and_then(View::parse)
            .unwrap_or_default();
        Selection {
            loco: None,
            page,
            view,
        }
    }
}

/// Locomotive to select after a catalog (re)load: the current selection if
/// it still exists, else the remembered one, else the first in catalog order.
pub fn preserve_selection(
    catalog: &LocoCatalog,
    previous: Option<LocoId>,
    persisted: Option<LocoId>,
) -> Option<LocoId> {
    previous
        .filter(|uid| catalog.contains(*uid))
        .or_else(|| persisted.filter(|uid| catalog.contains(*uid)))
        .or_else(|| catalog.first_uid())
}

pub struct SelectionStore {
    path: PathBuf,
}

impl SelectionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> PersistedSelection {
        let Ok(content) = std::fs::read_to_string(&self.path) else {
            debug!("no saved selection at {}", self.path.display());
            return PersistedSelection::default();
        };
        match serde_json::from_str(&content) {
            Ok(saved) => saved,
            Err(e) => {
                warn!("ignoring unreadable {}: {}", self.path.display(), e);
                PersistedSelection::default()
            }
        }
    }

    pub fn save(&self, selection: &Selection) -> anyhow::Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let saved = PersistedSelection::from_selection(selection);
        std::fs::write(&self.path, serde_json::to_string_pretty(&saved)?)?;
        Ok(())
    }
}
