//! Fire-and-forget command channel.
//!
//! Every intent becomes one spawned POST.  Nothing here waits for the answer,
//! retries, or touches application state; a failure is only logged.  What
//! the operator sees changes when the server pushes the result back.

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use panel_proto::client::ControlClient;
use panel_proto::protocol::{Command, Direction, InfoAction, LocoId, INFO_EVENT_LOCO};

#[derive(Clone)]
pub struct CommandChannel {
    client: ControlClient,
}

impl CommandChannel {
    pub fn new(client: ControlClient) -> Self {
        Self { client }
    }

    fn send(&self, cmd: Command) -> JoinHandle<()> {
        let client = self.client.clone();
        tokio::spawn(async move {
            match client.send(&cmd).await {
                Ok(()) => debug!("sent {:?}", cmd),
                Err(e) => warn!("command {:?} failed: {}", cmd, e),
            }
        })
    }

    /// `speed` is clamped to 0..=1000.
    pub fn set_speed(&self, loco: LocoId, speed: i64) -> JoinHandle<()> {
        self.send(Command::set_speed(loco, speed))
    }

    pub fn set_direction(&self, loco: LocoId, direction: Direction) -> JoinHandle<()> {
        self.send(Command::SetDirection { loco, direction })
    }

    /// Out-of-range indices are rejected before anything is sent.
    pub fn set_function(&self, loco: LocoId, index: i64, active: bool) -> Option<JoinHandle<()>> {
        match Command::set_function(loco, index, active) {
            Ok(cmd) => Some(self.send(cmd)),
            Err(e) => {
                warn!("not sending function toggle: {}", e);
                None
            }
        }
    }

    pub fn set_switch(&self, address: usize, value: i64) -> Option<JoinHandle<()>> {
        match Command::set_switch(address, value) {
            Ok(cmd) => Some(self.send(cmd)),
            Err(e) => {
                warn!("not sending switch change: {}", e);
                None
            }
        }
    }

    pub fn set_run_state(&self, running: bool) -> JoinHandle<()> {
        self.send(Command::SetRunState { running })
    }

    pub fn send_custom_event(&self, loco: LocoId, code: u8, value: u8) -> JoinHandle<()> {
        self.send(Command::CustomEvent { loco, code, value })
    }

    pub fn send_info(&self, action: InfoAction) -> JoinHandle<()> {
        self.send_custom_event(INFO_EVENT_LOCO, action.code(), 1)
    }
}
