//! Per-device ripening velocity registry

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use shared::{DeviceId, VelocityReading, VelocityState};

use crate::error::{AppError, AppResult};

/// Devices tracked before the least recently seen one is dropped
pub const DEFAULT_MAX_TRACKED_DEVICES: usize = 10_000;

#[derive(Debug)]
struct Tracked {
    state: VelocityState,
    last_seen: u64,
}

#[derive(Debug, Default)]
struct Devices {
    states: HashMap<DeviceId, Tracked>,
    clock: u64,
}

impl Devices {
    /// Drop the least recently seen device
    fn evict_oldest(&mut self) -> Option<DeviceId> {
        let oldest = self
            .states
            .iter()
            .min_by_key(|(_, tracked)| tracked.last_seen)
            .map(|(device, _)| device.clone())?;
        self.states.remove(&oldest);
        Some(oldest)
    }
}

/// Velocity state of the devices seen since startup.
///
/// Device ids come from clients, so the map is bounded: once full, tracking a
/// new device forgets the one seen longest ago, which then restarts without a
/// baseline.
#[derive(Debug, Clone)]
pub struct VelocityRegistry {
    devices: Arc<Mutex<Devices>>,
    max_devices: usize,
}

impl Default for VelocityRegistry {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_TRACKED_DEVICES)
    }
}

impl VelocityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(max_devices: usize) -> Self {
        Self {
            devices: Arc::new(Mutex::new(Devices::default())),
            max_devices: max_devices.max(1),
        }
    }

    /// Track one batch for a device.
    ///
    /// The read-modify-write happens under one lock, so concurrent batches of
    /// the same device are applied one after another.
    pub fn track(
        &self,
        device: &DeviceId,
        current_ripeness: f64,
        stability_threshold: f64,
    ) -> AppResult<VelocityReading> {
        let mut devices = self
            .devices
            .lock()
            .map_err(|_| AppError::Internal("velocity registry lock poisoned".to_string()))?;

        if !devices.states.contains_key(device) && devices.states.len() >= self.max_devices {
            if let Some(evicted) = devices.evict_oldest() {
                tracing::debug!(device = %evicted, "velocity registry full, dropped device");
            }
        }

        devices.clock += 1;
        let now = devices.clock;
        let tracked = devices.states.entry(device.clone()).or_insert_with(|| Tracked {
            state: VelocityState::new(),
            last_seen: now,
        });
        tracked.last_seen = now;
        Ok(tracked.state.track(current_ripeness, stability_threshold))
    }

    /// Current state of a device, if it has processed any batch
    pub fn state(&self, device: &DeviceId) -> Option<VelocityState> {
        self.devices
            .lock()
            .ok()
            .and_then(|devices| devices.states.get(device).map(|tracked| tracked.state))
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.devices.lock().map(|d| d.states.len()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::DEFAULT_STABILITY_THRESHOLD;

    #[test]
    fn test_devices_are_tracked_independently() {
        let registry = VelocityRegistry::new();
        let greenhouse_a = DeviceId::new("greenhouse-a");
        let greenhouse_b = DeviceId::new("greenhouse-b");

        registry.track(&greenhouse_a, 40.0, DEFAULT_STABILITY_THRESHOLD).unwrap();
        let b = registry.track(&greenhouse_b, 90.0, DEFAULT_STABILITY_THRESHOLD).unwrap();
        assert_eq!(b.velocity, 0.0);

        let a = registry.track(&greenhouse_a, 55.0, DEFAULT_STABILITY_THRESHOLD).unwrap();
        assert_eq!(a.velocity, 15.0);
        assert!(!a.stable);
        assert_eq!(
            registry.state(&greenhouse_b).and_then(|s| s.previous_ripeness),
            Some(90.0)
        );
    }

    #[test]
    fn test_unknown_device_has_no_state() {
        let registry = VelocityRegistry::new();
        assert_eq!(registry.state(&DeviceId::default()), None);
    }

    #[test]
    fn test_concurrent_batches_are_not_lost() {
        let registry = VelocityRegistry::new();
        let device = DeviceId::default();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                let device = device.clone();
                std::thread::spawn(move || {
                    registry.track(&device, f64::from(i), DEFAULT_STABILITY_THRESHOLD)
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        let state = registry.state(&device).unwrap();
        assert!(state.previous_ripeness.is_some());
        assert!(state.last_velocity.is_some());
    }

    #[test]
    fn test_registry_is_bounded() {
        let registry = VelocityRegistry::with_capacity(2);
        let a = DeviceId::new("greenhouse-a");
        let b = DeviceId::new("greenhouse-b");
        let c = DeviceId::new("greenhouse-c");

        registry.track(&a, 40.0, DEFAULT_STABILITY_THRESHOLD).unwrap();
        registry.track(&b, 50.0, DEFAULT_STABILITY_THRESHOLD).unwrap();
        registry.track(&a, 45.0, DEFAULT_STABILITY_THRESHOLD).unwrap();
        registry.track(&c, 60.0, DEFAULT_STABILITY_THRESHOLD).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.state(&b), None);
        assert_eq!(registry.state(&a).and_then(|s| s.previous_ripeness), Some(45.0));

        // A known device never evicts anyone
        registry.track(&c, 62.0, DEFAULT_STABILITY_THRESHOLD).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_evicted_device_restarts_without_baseline() {
        let registry = VelocityRegistry::with_capacity(1);
        let a = DeviceId::new("greenhouse-a");
        let b = DeviceId::new("greenhouse-b");

        registry.track(&a, 10.0, DEFAULT_STABILITY_THRESHOLD).unwrap();
        registry.track(&b, 20.0, DEFAULT_STABILITY_THRESHOLD).unwrap();
        let reading = registry.track(&a, 80.0, DEFAULT_STABILITY_THRESHOLD).unwrap();
        assert_eq!(reading.velocity, 0.0);
        assert!(reading.stable);
    }
}
