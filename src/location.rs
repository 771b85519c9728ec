//! User location acquisition.
//!
//! Location comes from an IP-geolocation endpoint rather than GPS hardware;
//! one read per request, no caching, 15 second timeout. The blocking HTTP
//! call runs on a worker thread so the frame loop stays responsive, and the
//! service is polled for completion each frame.

use serde::Deserialize;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub const LOCATION_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationStatus {
    Requesting,
    Granted,
    Denied,
    Unavailable,
}

impl LocationStatus {
    pub fn describe(&self) -> &'static str {
        match self {
            LocationStatus::Requesting => "locating...",
            LocationStatus::Granted => "located",
            LocationStatus::Denied => "location denied",
            LocationStatus::Unavailable => "location unavailable",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UserLocation {
    pub lat: f64,
    pub lng: f64,
    /// Provider-reported accuracy in meters; 0 when the provider omits it.
    pub accuracy: f64,
}

// ============================================================================
// Providers
// ============================================================================

pub trait LocationProvider: Send + Sync {
    fn locate(&self) -> Result<UserLocation, String>;
}

#[derive(Debug, Deserialize)]
struct GeoResponse {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    accuracy: Option<f64>,
}

/// Hosted IP-geolocation endpoint (ipapi.co-style JSON body).
pub struct IpLocationProvider {
    url: String,
}

impl IpLocationProvider {
    pub fn new(url: &str) -> Self {
        Self { url: url.to_string() }
    }
}

impl LocationProvider for IpLocationProvider {
    fn locate(&self) -> Result<UserLocation, String> {
        let agent = ureq::AgentBuilder::new()
            .timeout(LOCATION_TIMEOUT)
            .build();
        let response = agent.get(&self.url).call().map_err(|e| e.to_string())?;
        let geo: GeoResponse = response.into_json().map_err(|e| e.to_string())?;
        Ok(UserLocation {
            lat: geo.latitude,
            lng: geo.longitude,
            accuracy: geo.accuracy.unwrap_or(0.0),
        })
    }
}

/// Fixed-position provider for the demo mode and tests.
pub struct StaticLocationProvider(pub UserLocation);

impl LocationProvider for StaticLocationProvider {
    fn locate(&self) -> Result<UserLocation, String> {
        Ok(self.0)
    }
}

// ============================================================================
// Service
// ============================================================================

/// One geolocation attempt at a time, with explicit status transitions.
///
/// `Unavailable` (no provider configured) is sticky for the life of the
/// service; a refresh on an unavailable service is a no-op. Denied results
/// are terminal until the user explicitly refreshes.
pub struct LocationService {
    provider: Option<Arc<dyn LocationProvider>>,
    pub status: LocationStatus,
    pub location: Option<UserLocation>,
    pub complete: bool,
    pub refreshing: bool,
    rx: Option<Receiver<Result<UserLocation, String>>>,
}

impl LocationService {
    pub fn new(provider: Option<Arc<dyn LocationProvider>>) -> Self {
        let unavailable = provider.is_none();
        Self {
            provider,
            status: if unavailable {
                LocationStatus::Unavailable
            } else {
                LocationStatus::Requesting
            },
            location: None,
            complete: unavailable,
            refreshing: false,
            rx: None,
        }
    }

    /// Start a geolocation attempt. A refresh keeps `complete` set so the
    /// map does not fall back into its initial loading state.
    pub fn request(&mut self, is_refresh: bool) {
        if self.status == LocationStatus::Unavailable {
            self.complete = true;
            return;
        }
        let Some(provider) = self.provider.clone() else {
            return;
        };

        if is_refresh {
            self.refreshing = true;
        } else {
            self.status = LocationStatus::Requesting;
            self.complete = false;
        }

        let (tx, rx) = mpsc::channel();
        self.rx = Some(rx);
        thread::spawn(move || {
            let _ = tx.send(provider.locate());
        });
    }

    /// Drain a finished attempt, if any. Returns the final status exactly
    /// once per completed attempt.
    pub fn poll(&mut self) -> Option<LocationStatus> {
        let outcome = match &self.rx {
            Some(rx) => match rx.try_recv() {
                Ok(result) => result,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => Err("location worker died".to_string()),
            },
            None => return None,
        };
        self.rx = None;

        match outcome {
            Ok(location) => {
                self.location = Some(location);
                self.status = LocationStatus::Granted;
            }
            Err(_) => {
                self.status = LocationStatus::Denied;
            }
        }
        self.complete = true;
        self.refreshing = false;
        Some(self.status)
    }

    pub fn pending(&self) -> bool {
        self.rx.is_some()
    }
}
