//! Device session registry: one exclusive session per device.
//!
//! Interactions against a device must not interleave, so each serial
//! gets one session behind an async mutex. Acquiring a session yields a
//! guard; the guard is the only way to observe or act, which makes the
//! at-most-one-interaction rule structural rather than advisory.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use droidpilot_bridge::devices::Device;
use droidpilot_bridge::DeviceBridge;
use droidpilot_core::observation::Observation;
use droidpilot_core::plan::Step;
use droidpilot_core::prelude::*;

use crate::cache::HierarchyCache;
use crate::config::EngineConfig;
use crate::interaction::{InteractionLoop, RoundResult};
use crate::observe;

/// How to pick a device when acquiring a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSelector {
    /// Exact serial, or a model/product substring.
    Serial(String),
    /// Any ready device, preferring one that is not currently in use.
    Auto,
}

/// What to do when the selected device's session is already held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireMode {
    /// Wait until the holder releases it.
    Block,
    /// Fail immediately with a busy error.
    Fail,
}

/// Per-device state that survives across rounds.
pub struct DeviceSession {
    serial: String,
    cache: HierarchyCache,
    last_observation: Option<Observation>,
}

impl DeviceSession {
    fn new(serial: String, config: &EngineConfig) -> Self {
        Self {
            serial,
            cache: HierarchyCache::new(config.cache.clone()),
            last_observation: None,
        }
    }
}

/// Registry of device sessions sharing one bridge.
pub struct SessionRegistry<B: DeviceBridge> {
    bridge: Arc<B>,
    config: EngineConfig,
    sessions: Mutex<HashMap<String, Arc<Mutex<DeviceSession>>>>,
}

impl<B: DeviceBridge> SessionRegistry<B> {
    pub fn new(bridge: B, config: EngineConfig) -> Self {
        Self {
            bridge: Arc::new(bridge),
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    /// Acquire an exclusive session for a device.
    pub async fn acquire(
        &self,
        selector: DeviceSelector,
        mode: AcquireMode,
    ) -> Result<SessionGuard<B>> {
        let devices = self.bridge.devices().await?;
        let ready: Vec<&Device> = devices.iter().filter(|d| d.state.is_ready()).collect();
        if ready.is_empty() {
            return Err(Error::NoDevices);
        }

        let slot = match &selector {
            DeviceSelector::Serial(specifier) => {
                let device = devices
                    .iter()
                    .find(|d| d.matches(specifier))
                    .ok_or_else(|| Error::device_not_found(specifier.clone()))?;
                if !device.state.is_ready() {
                    return Err(Error::device_unreachable(device.serial.clone()));
                }
                self.slot(&device.serial).await
            }
            DeviceSelector::Auto => {
                // Prefer a ready device nobody is using right now.
                let mut first = None;
                let mut free = None;
                for device in &ready {
                    let slot = self.slot(&device.serial).await;
                    if first.is_none() {
                        first = Some(slot.clone());
                    }
                    if slot.try_lock().is_ok() {
                        free = Some(slot);
                        break;
                    }
                }
                match (free, first) {
                    (Some(slot), _) => slot,
                    (None, Some(slot)) => slot,
                    (None, None) => return Err(Error::NoDevices),
                }
            }
        };

        let session = match mode {
            AcquireMode::Block => slot.lock_owned().await,
            AcquireMode::Fail => slot.try_lock_owned().map_err(|_| {
                Error::session_busy(self.serial_of(&selector, &ready))
            })?,
        };
        info!(serial = session.serial, "session acquired");

        Ok(SessionGuard {
            bridge: Arc::clone(&self.bridge),
            config: self.config.clone(),
            session,
        })
    }

    /// Drop the session kept for `serial`, discarding its cache and
    /// last observation. Fails if the session is currently held.
    pub async fn remove(&self, serial: &str) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        if let Some(slot) = sessions.get(serial) {
            if slot.try_lock().is_err() {
                return Err(Error::session_busy(serial.to_string()));
            }
            sessions.remove(serial);
            info!(serial, "session removed");
        }
        Ok(())
    }

    async fn slot(&self, serial: &str) -> Arc<Mutex<DeviceSession>> {
        let mut sessions = self.sessions.lock().await;
        Arc::clone(
            sessions
                .entry(serial.to_string())
                .or_insert_with(|| {
                    Arc::new(Mutex::new(DeviceSession::new(
                        serial.to_string(),
                        &self.config,
                    )))
                }),
        )
    }

    fn serial_of(&self, selector: &DeviceSelector, ready: &[&Device]) -> String {
        match selector {
            DeviceSelector::Serial(specifier) => specifier.clone(),
            DeviceSelector::Auto => ready
                .first()
                .map(|d| d.serial.clone())
                .unwrap_or_else(|| "auto".to_string()),
        }
    }
}

/// Exclusive handle to one device session.
pub struct SessionGuard<B: DeviceBridge> {
    bridge: Arc<B>,
    config: EngineConfig,
    session: OwnedMutexGuard<DeviceSession>,
}

impl<B: DeviceBridge> std::fmt::Debug for SessionGuard<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGuard")
            .field("serial", &self.session.serial)
            .finish_non_exhaustive()
    }
}

impl<B: DeviceBridge> SessionGuard<B> {
    pub fn serial(&self) -> &str {
        &self.session.serial
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn last_observation(&self) -> Option<&Observation> {
        self.session.last_observation.as_ref()
    }

    /// Take a standalone observation, outside any interaction round.
    pub async fn observe(&mut self) -> Observation {
        let session = &mut *self.session;
        let obs = observe::observe(
            self.bridge.as_ref(),
            &session.serial,
            &mut session.cache,
            session.last_observation.as_ref(),
            observe::ObserveOptions::default(),
        )
        .await;
        session.last_observation = Some(obs.clone());
        obs
    }

    /// Run one interaction round over `steps`.
    pub async fn run_round(&mut self, steps: &[Step], base_index: usize) -> RoundResult {
        let session = &mut *self.session;
        let mut looper = InteractionLoop::new(
            self.bridge.as_ref(),
            &session.serial,
            &mut session.cache,
            &self.config,
        )
        .with_seed(session.last_observation.take());
        let round = looper.run(steps, base_index).await;
        session.last_observation = looper.last_observation().cloned();
        round
    }
}
