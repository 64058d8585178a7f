use std::io::{Read, Write};

/// A byte-oriented serial link to the unit.
///
/// Besides plain `Read + Write`, the exchange discipline needs to know how
/// many received bytes are buffered so it can drain without blocking.
pub trait SerialLink: Read + Write + Send {
    /// Number of received bytes waiting to be read.
    fn bytes_available(&mut self) -> std::io::Result<usize>;

    /// Short description for diagnostics (device path or "simulated").
    fn describe(&self) -> String;

    /// Release the link. Called exactly once by the owning transport.
    fn close(&mut self) -> std::io::Result<()> {
        self.flush()
    }
}

impl<T: SerialLink + ?Sized> SerialLink for Box<T> {
    fn bytes_available(&mut self) -> std::io::Result<usize> {
        (**self).bytes_available()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }

    fn close(&mut self) -> std::io::Result<()> {
        (**self).close()
    }
}
