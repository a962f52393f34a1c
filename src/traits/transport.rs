//! Outbound side of the serial transport.
//!
//! Line reception is the other half: the transport hands every received
//! frame to `CommandSender::deliver_line` (runtime feature).

/// Sends status and diagnostic lines to the host.
///
/// Implementations queue and flush asynchronously; `send` must not block
/// on the wire.
///
/// # Example
///
/// ```rust
/// use stepper_servo_ctl::traits::Transport;
///
/// struct Stdout;
///
/// impl Transport for Stdout {
///     fn send(&self, line: &str) {
///         println!("{line}");
///     }
/// }
///
/// Stdout.send("SCT:BGN");
/// ```
pub trait Transport: Send + Sync {
    /// Queues one line (without terminator) for transmission.
    fn send(&self, line: &str);
}

#[cfg(feature = "std")]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn send(&self, line: &str) {
        (**self).send(line)
    }
}
