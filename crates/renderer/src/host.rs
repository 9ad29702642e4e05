//! The environment a session runs inside.
//!
//! A host is single threaded and cooperative: it hands out tokens for frames,
//! timers, listeners and drawable nodes, and later calls back into the
//! session with those tokens. The session never blocks and never keeps a
//! callback registered with the host beyond its own teardown.

use scheduler::{FrameRequester, TimerHost};

use crate::surface::SurfaceSize;
use crate::types::ContainerRect;

/// Identifies a container element supplied by the embedder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(pub u64);

/// Identifies a drawable node appended to a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerTarget {
    Window,
    Container(ContainerId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    Resize,
    PointerMove,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HostError {
    #[error("container {0:?} is not known to the host")]
    UnknownContainer(ContainerId),
    #[error("container {0:?} already holds a drawable node")]
    DrawableExists(ContainerId),
}

pub trait Host: FrameRequester + TimerHost {
    /// Monotonic time in milliseconds, the same clock frame timestamps use.
    fn now_ms(&self) -> f64;

    fn device_pixel_ratio(&self) -> f32;

    fn container_rect(&self, container: ContainerId) -> ContainerRect;

    fn add_listener(&mut self, target: ListenerTarget, kind: ListenerKind) -> ListenerId;

    fn remove_listener(&mut self, listener: ListenerId);

    /// Appends a drawable node sized to `size` and presented at 100% of the
    /// container box.
    fn append_drawable(
        &mut self,
        container: ContainerId,
        size: &SurfaceSize,
    ) -> Result<NodeId, HostError>;

    fn remove_drawable(&mut self, node: NodeId);

    fn set_container_attribute(&mut self, container: ContainerId, name: &str, value: &str) {
        tracing::trace!(?container, name, value, "host ignores container attribute");
    }
}
