//! Icon resolution with fallback on missing assets.
//!
//! Every icon has an ordered candidate list ending in the placeholder.  The
//! first candidate the asset server has is used.  Lookup results are cached
//! per URL, so after the first pass most requests resolve without touching
//! the network.
//!
//! A display slot (portrait, function button n) has at most one lookup task in
//! flight.  Requesting a slot again aborts the old task and bumps the slot's
//! ticket; a result carrying an old ticket is ignored.

use std::collections::HashMap;

use tokio::task::AbortHandle;
use tracing::{debug, warn};

use panel_proto::client::ControlClient;
use panel_proto::protocol::{DEFAULT_LOCO_ICON, FUNCTION_ICON_BASE};

use crate::matrix::Side;

pub const PLACEHOLDER: &str = "grafics/placeholder.png";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IconSlot {
    Portrait,
    Function(u8),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconKind {
    /// Function button: icon family id plus its position for the fallback.
    Function { id: u32, index: u8, active: bool },
    /// Locomotive portrait by icon key.
    Portrait { key: String },
}

impl IconKind {
    /// Asset paths in preference order; always ends with the placeholder.
    pub fn candidates(&self) -> Vec<String> {
        match self {
            Self::Function { id, index, active } => {
                let prefix = if *active { "ge" } else { "we" };
                let primary = function_icon(prefix, *id);
                let positional = function_icon(prefix, FUNCTION_ICON_BASE + u32::from(*index));
                let mut out = vec![primary];
                if positional != out[0] {
                    out.push(positional);
                }
                out.push(PLACEHOLDER.to_string());
                out
            }
            Self::Portrait { key } => {
                let mut out = vec![format!("icons/{key}.png")];
                if key != DEFAULT_LOCO_ICON {
                    out.push(format!("icons/{DEFAULT_LOCO_ICON}.png"));
                }
                out.push(PLACEHOLDER.to_string());
                out
            }
        }
    }
}

fn function_icon(prefix: &str, id: u32) -> String {
    format!("fcticons/FktIcon_a_{prefix}_{id:02}.png")
}

/// Switch button artwork; these ship with the server and are not checked.
pub fn switch_icon(side: Side, active: bool) -> &'static str {
    match (side, active) {
        (Side::Straight, true) => "magicons_/switch_re_active.png",
        (Side::Straight, false) => "magicons_/switch_re_inactive.png",
        (Side::Diverging, true) => "magicons_/switch_gr_active.png",
        (Side::Diverging, false) => "magicons_/switch_gr_inactive.png",
    }
}

/// Work for a background lookup task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
    pub slot: IconSlot,
    pub ticket: u64,
    /// Absolute URLs still to try, placeholder last.
    pub urls: Vec<String>,
}

/// What a lookup task reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupOutcome {
    pub slot: IconSlot,
    pub ticket: u64,
    pub url: String,
    /// Every URL actually checked and whether it existed.
    pub checked: Vec<(String, bool)>,
}

#[derive(Debug, Default)]
pub struct IconResolver {
    base: String,
    known: HashMap<String, bool>,
    tickets: HashMap<IconSlot, u64>,
    inflight: HashMap<IconSlot, AbortHandle>,
    resolved: HashMap<IconSlot, String>,
}

impl IconResolver {
    pub fn new(base_url: &str) -> Self {
        Self {
            base: base_url.trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path)
    }

    /// Ask for `slot` to show `kind`. Returns `None` when the cache already
    /// decides it; otherwise the caller spawns `lookup` and hands the task's
    /// abort handle to `track`.
    pub fn request(&mut self, slot: IconSlot, kind: &IconKind) -> Option<LookupRequest> {
        let ticket = {
            let t = self.tickets.entry(slot).or_insert(0);
            *t += 1;
            *t
        };
        if let Some(old) = self.inflight.remove(&slot) {
            old.abort();
        }

        let urls: Vec<String> = kind.candidates().iter().map(|p| self.url(p)).collect();
        let placeholder = self.url(PLACEHOLDER);
        for (i, url) in urls.iter().enumerate() {
            if *url == placeholder {
                self.resolved.insert(slot, url.clone());
                return None;
            }
            match self.known.get(url) {
                Some(true) => {
                    self.resolved.insert(slot, url.clone());
                    return None;
                }
                Some(false) => continue,
                None => {
                    return Some(LookupRequest {
                        slot,
                        ticket,
                        urls: urls[i..].to_vec(),
                    })
                }
            }
        }
        self.resolved.insert(slot, placeholder);
        None
    }

    pub fn track(&mut self, slot: IconSlot, ticket: u64, handle: AbortHandle) {
        if self.tickets.get(&slot) == Some(&ticket) {
            self.inflight.insert(slot, handle);
        } else {
            handle.abort();
        }
    }

    /// Record a finished lookup. Cache entries are always kept; the slot is
    /// only updated when the ticket is still current.
    pub fn complete(&mut self, outcome: LookupOutcome) -> bool {
        for (url, exists) in outcome.checked {
            self.known.insert(url, exists);
        }
        if self.tickets.get(&outcome.slot) != Some(&outcome.ticket) {
            debug!("icon {:?}: stale lookup result dropped", outcome.slot);
            return false;
        }
        self.inflight.remove(&outcome.slot);
        self.resolved.insert(outcome.slot, outcome.url);
        true
    }

    pub fn resolved(&self, slot: IconSlot) -> Option<&str> {
        self.resolved.get(&slot).map(String::as_str)
    }

    /// Path relative to the asset root, for compact display.
    pub fn display_path(&self, slot: IconSlot) -> Option<&str> {
        let url = self.resolved(slot)?;
        Some(
            url.strip_prefix(&self.base)
                .map(|p| p.trim_start_matches('/'))
                .unwrap_or(url),
        )
    }
}

/// Check `urls` in order; the last one (the placeholder) is taken unchecked.
/// A failed request skips the candidate for now but is not reported in
/// `checked`, so the next request for that icon asks the server again.
pub async fn lookup(client: ControlClient, request: LookupRequest) -> LookupOutcome {
    let LookupRequest { slot, ticket, urls } = request;
    let mut checked = Vec::new();
    let last = urls.len().saturating_sub(1);
    for (i, url) in urls.iter().enumerate() {
        if i == last {
            break;
        }
        let exists = match client.asset_exists(url).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!("icon lookup failed: {}", e);
                continue;
            }
        };
        checked.push((url.clone(), exists));
        if exists {
            return LookupOutcome {
                slot,
                ticket,
                url: url.clone(),
                checked,
            };
        }
    }
    LookupOutcome {
        slot,
        ticket,
        url: urls.last().cloned().unwrap_or_default(),
        checked,
    }
}
