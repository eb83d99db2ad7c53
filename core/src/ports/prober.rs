//! Port prober port (interface).

use crate::error::Result;

/// Port for asking the operating system which TCP ports are bindable.
pub trait PortProber: Send + Sync {
    /// Return `port` if it can be bound right now, otherwise the nearest
    /// bindable port the system suggests.
    fn nearest_free(&self, port: u16) -> Result<u16>;
}

impl<T: PortProber + ?Sized> PortProber for &T {
    fn nearest_free(&self, port: u16) -> Result<u16> {
        (**self).nearest_free(port)
    }
}
