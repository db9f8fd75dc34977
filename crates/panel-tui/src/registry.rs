//! Entity registry: the locomotive and switch catalogs currently shown.
//!
//! Catalog loads run in the background and can overlap (startup, a
//! `loco_list_reloaded` push, a reconnect).  Every load carries a generation
//! number and only the newest one is accepted.

use tracing::{info, warn};

use panel_proto::client::ControlClient;
use panel_proto::protocol::{LocoCatalog, LocoId, Locomotive, SwitchCatalog};

#[derive(Debug, Default)]
pub struct EntityRegistry {
    locos: LocoCatalog,
    switches: SwitchCatalog,
    generation: u64,
    accepted: u64,
    loaded: bool,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a load; the returned generation tags its result.
    pub fn begin_load(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }

    /// Install a finished load. Returns `false` (and keeps the old catalogs)
    /// when a newer load was started after this one.
    pub fn accept(&mut self, generation: u64, locos: LocoCatalog, switches: SwitchCatalog) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.locos = locos;
        self.switches = switches;
        self.accepted = generation;
        self.loaded = true;
        true
    }

    /// Generation of the catalogs currently installed (0 before the first).
    pub fn accepted_generation(&self) -> u64 {
        self.accepted
    }

    /// At least one load has completed.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn locos(&self) -> &LocoCatalog {
        &self.locos
    }

    pub fn loco(&self, uid: LocoId) -> Option<&Locomotive> {
        self.locos.get(uid)
    }

    pub fn switch_label(&self, address: usize) -> String {
        self.switches.label(address)
    }
}

/// Fetch the locomotive catalog. Failures yield an empty catalog.
pub async fn load_locomotives(client: &ControlClient) -> LocoCatalog {
    match client.loco_catalog().await {
        Ok(catalog) => {
            info!("loaded {} locomotives", catalog.len());
            catalog
        }
        Err(e) => {
            warn!("locomotive catalog unavailable: {}", e);
            LocoCatalog::default()
        }
    }
}

/// Fetch the switch catalog. Failures yield an empty catalog.
pub async fn load_switch_catalog(client: &ControlClient) -> SwitchCatalog {
    match client.switch_catalog().await {
        Ok(catalog) => {
            info!("loaded {} switch names", catalog.len());
            catalog
        }
        Err(e) => {
            warn!("switch catalog unavailable: {}", e);
            SwitchCatalog::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panel_proto::protocol::SwitchEntry;
    use std::time::Duration;

    fn locos(uids: &[LocoId]) -> LocoCatalog {
        uids.iter()
            .map(|&uid| Locomotive {
                uid,
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn test_latest_generation_wins() {
        let mut reg = EntityRegistry::new();
        let first = reg.begin_load();
        let second = reg.begin_load();

        assert!(reg.accept(second, locos(&[5]), SwitchCatalog::default()));
        assert!(!reg.accept(first, locos(&[1, 2]), SwitchCatalog::default()));
        assert_eq!(reg.locos().len(), 1);
        assert!(reg.loco(5).is_some());
        assert!(reg.is_loaded());
    }

    #[test]
    fn test_switch_labels_fall_back_to_address() {
        let mut reg = EntityRegistry::new();
        let g = reg.begin_load();
        let switches = SwitchCatalog {
            entries: vec![
                SwitchEntry {
                    name: Some("Einfahrt".into()),
                },
                SwitchEntry { name: None },
            ],
        };
        reg.accept(g, LocoCatalog::default(), switches);
        assert_eq!(reg.switch_label(0), "Einfahrt");
        assert_eq!(reg.switch_label(1), "2");
        assert_eq!(reg.switch_label(30), "31");
    }

    #[tokio::test]
    async fn test_unreachable_server_loads_empty() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let client =
            ControlClient::new(&format!("http://127.0.0.1:{port}"), Duration::from_millis(500))
                .unwrap();
        assert!(load_locomotives(&client).await.is_empty());
        assert!(load_switch_catalog(&client).await.is_empty());
    }
}
