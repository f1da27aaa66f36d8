//! Viewer presentation
//!
//! A viewer gets a dedicated display surface (a browser window in practice)
//! that follows the host's URL. The surface is opened lazily, navigated in
//! place while it lives, and reopened when the user has closed it.

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Opaque reference to a display surface
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SurfaceHandle(String);

impl SurfaceHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SurfaceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("Display surface '{0}' no longer exists")]
    Gone(SurfaceHandle),

    #[error("No page agent attached")]
    NoAgent,

    #[error("Timed out waiting for the display surface")]
    Timeout,
}

/// Host environment capable of opening display surfaces
pub trait DisplaySurfaces {
    fn exists(&self, handle: &SurfaceHandle) -> impl Future<Output = bool> + Send;

    /// Open a new surface showing `url`; resolves once it exists
    fn open(&self, url: &str) -> impl Future<Output = Result<SurfaceHandle, SurfaceError>> + Send;

    /// Point the surface's active view at `url`
    fn navigate(
        &self,
        handle: &SurfaceHandle,
        url: &str,
    ) -> impl Future<Output = Result<(), SurfaceError>> + Send;

    fn mute(&self, handle: &SurfaceHandle) -> impl Future<Output = Result<(), SurfaceError>> + Send;
}

/// Keeps the viewer's surface on the host's URL
pub struct ViewerPresentation<D> {
    surfaces: D,
}

impl<D: DisplaySurfaces> ViewerPresentation<D> {
    pub fn new(surfaces: D) -> Self {
        Self { surfaces }
    }

    pub fn surfaces(&self) -> &D {
        &self.surfaces
    }

    /// Show `url`, returning the handle to track afterwards
    ///
    /// A tracked surface that no longer exists, or cannot be navigated, is
    /// replaced by a new one. `None` means no surface could be opened.
    pub async fn show(&self, tracked: Option<SurfaceHandle>, url: &str) -> Option<SurfaceHandle> {
        if let Some(handle) = tracked {
            if self.surfaces.exists(&handle).await {
                match self.surfaces.navigate(&handle, url).await {
                    Ok(()) => {
                        debug!(surface = %handle, url, "Viewer surface navigated");
                        return Some(handle);
                    }
                    Err(e) => {
                        warn!(surface = %handle, error = %e, "Viewer surface navigation failed, reopening");
                    }
                }
            } else {
                debug!(surface = %handle, "Viewer surface is gone, reopening");
            }
        }

        self.open(url).await
    }

    async fn open(&self, url: &str) -> Option<SurfaceHandle> {
        let handle = match self.surfaces.open(url).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(url, error = %e, "Failed to open viewer surface");
                return None;
            }
        };

        // Viewer surfaces start muted
        if let Err(e) = self.surfaces.mute(&handle).await {
            warn!(surface = %handle, error = %e, "Failed to mute viewer surface");
        }

        info!(surface = %handle, url, "Opened viewer surface");
        Some(handle)
    }

    /// Tracked handle after the user closed `closed`
    pub fn surface_closed(
        tracked: Option<SurfaceHandle>,
        closed: &SurfaceHandle,
    ) -> Option<SurfaceHandle> {
        match tracked {
            Some(handle) if handle == *closed => {
                info!(surface = %handle, "Viewer surface closed, staying in room");
                None
            }
            other => other,
        }
    }
}
