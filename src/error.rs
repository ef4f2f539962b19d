use crate::bridge::DetailedStatus;

/// Failure of a single call into the bridge adapter. Each variant carries the USB error that
/// caused it.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeError {
    #[error("adapter enumeration failed")]
    EnumerationFailed(#[source] rusb::Error),

    #[error("failed to open the adapter")]
    OpenFailed(#[source] rusb::Error),

    #[error("failed to configure the adapter")]
    ConfigFailed(#[source] rusb::Error),

    #[error("write request failed")]
    WriteFailed(#[source] rusb::Error),

    #[error("read request failed")]
    ReadFailed(#[source] rusb::Error),

    #[error("read response failed")]
    ResponseFailed(#[source] rusb::Error),

    #[error("transfer status exchange failed")]
    StatusFailed(#[source] rusb::Error),
}

impl BridgeError {
    /// The USB error underneath.
    pub fn usb_error(&self) -> rusb::Error {
        match *self {
            BridgeError::EnumerationFailed(e)
            | BridgeError::OpenFailed(e)
            | BridgeError::ConfigFailed(e)
            | BridgeError::WriteFailed(e)
            | BridgeError::ReadFailed(e)
            | BridgeError::ResponseFailed(e)
            | BridgeError::StatusFailed(e) => e,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("failed to enumerate adapters")]
    EnumerationFailed(#[source] BridgeError),

    #[error("no adapter found")]
    NoAdapterFound,

    #[error("{0} matching adapters found, refusing to pick one")]
    AmbiguousAdapter(u32),

    #[error("failed to connect to the adapter")]
    AdapterOpenFailed(#[source] BridgeError),

    #[error("failed to configure the adapter")]
    AdapterConfigFailed(#[source] BridgeError),

    #[error("failed to detect/configure the target device")]
    ProbeFailed(#[source] Box<Error>),

    #[error("failed to start the write transfer")]
    WriteRequestFailed(#[source] BridgeError),

    #[error("failed to request the transfer status")]
    StatusRequestFailed(#[source] BridgeError),

    #[error("failed to poll the transfer status")]
    StatusPollFailed(#[source] BridgeError),

    #[error("transfer did not complete in time")]
    Timeout,

    #[error("communication with the target device has failed (code {0})")]
    DeviceCommunicationFailed(DetailedStatus),

    #[error("failed to start the read transfer")]
    ReadRequestFailed(#[source] BridgeError),

    #[error("failed to force the read response")]
    ReadForceFailed(#[source] BridgeError),

    #[error("failed to read data")]
    ReadResponseFailed(#[source] BridgeError),

    #[error("sample has an unexpected measurement type")]
    UnexpectedMeasurementType,

    #[error("not connected")]
    NotConnected,

    #[error("ten-bit addressing is not supported")]
    AddressNotSupported,

    #[error("I/O error: {0}")]
    Io(std::io::ErrorKind),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns whether the error only affects the current reading. The caller may retry on the
    /// next cycle without reconnecting.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::WriteRequestFailed(..)
                | Error::StatusRequestFailed(..)
                | Error::StatusPollFailed(..)
                | Error::Timeout
                | Error::DeviceCommunicationFailed(..)
                | Error::ReadRequestFailed(..)
                | Error::ReadForceFailed(..)
                | Error::ReadResponseFailed(..)
                | Error::UnexpectedMeasurementType
        )
    }

    /// Returns the USB error behind this error, if there is one.
    pub fn usb_error(&self) -> Option<rusb::Error> {
        match self {
            Error::EnumerationFailed(e)
            | Error::AdapterOpenFailed(e)
            | Error::AdapterConfigFailed(e)
            | Error::WriteRequestFailed(e)
            | Error::StatusRequestFailed(e)
            | Error::StatusPollFailed(e)
            | Error::ReadRequestFailed(e)
            | Error::ReadForceFailed(e)
            | Error::ReadResponseFailed(e) => Some(e.usb_error()),
            Error::ProbeFailed(inner) => inner.usb_error(),
            _ => None,
        }
    }
}

impl From<Error> for std::io::Error {
    fn from(value: Error) -> Self {
        use std::io::ErrorKind;
        let kind = match value.usb_error() {
            Some(rusb::Error::InvalidParam) => ErrorKind::InvalidInput,
            Some(rusb::Error::Access) => ErrorKind::PermissionDenied,
            Some(rusb::Error::NoDevice) => ErrorKind::ConnectionRefused,
            Some(rusb::Error::NotFound) => ErrorKind::Unsupported,
            Some(rusb::Error::Busy) => ErrorKind::ResourceBusy,
            Some(rusb::Error::Timeout) => ErrorKind::TimedOut,
            Some(rusb::Error::Pipe) => ErrorKind::BrokenPipe,
            Some(rusb::Error::Interrupted) => ErrorKind::Interrupted,
            Some(rusb::Error::NoMem) => ErrorKind::OutOfMemory,
            Some(rusb::Error::NotSupported) => ErrorKind::InvalidInput,
            Some(_) => ErrorKind::Other,
            None => match &value {
                Error::Io(kind) => *kind,
                Error::Timeout => ErrorKind::TimedOut,
                Error::NotConnected | Error::NoAdapterFound => ErrorKind::NotConnected,
                Error::DeviceCommunicationFailed(_) => ErrorKind::NotConnected,
                Error::AddressNotSupported => ErrorKind::Unsupported,
                Error::UnexpectedMeasurementType => ErrorKind::InvalidData,
                _ => ErrorKind::Other,
            },
        };
        std::io::Error::new(kind, value)
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        // errors that went through the `From` impl above come back unchanged
        if value.get_ref().is_some_and(|inner| inner.is::<Error>()) {
            if let Some(inner) = value.into_inner() {
                if let Ok(error) = inner.downcast::<Error>() {
                    return *error;
                }
            }
            return Error::Io(std::io::ErrorKind::Other);
        }
        match value.kind() {
            std::io::ErrorKind::TimedOut => Error::Timeout,
            std::io::ErrorKind::NotConnected => Error::NotConnected,
            kind => Error::Io(kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_round_trip() {
        let error = Error::ReadResponseFailed(BridgeError::ResponseFailed(rusb::Error::Timeout));
        let io_error: std::io::Error = error.clone().into();
        assert_eq!(io_error.kind(), std::io::ErrorKind::TimedOut);
        assert_eq!(Error::from(io_error), error);
    }

    #[test]
    fn test_plain_io_error() {
        let io_error = std::io::Error::from(std::io::ErrorKind::BrokenPipe);
        assert_eq!(
            Error::from(io_error),
            Error::Io(std::io::ErrorKind::BrokenPipe)
        );
    }

    #[test]
    fn test_probe_failure_exposes_usb_error() {
        let error = Error::ProbeFailed(Box::new(Error::WriteRequestFailed(
            BridgeError::WriteFailed(rusb::Error::Pipe),
        )));
        assert_eq!(error.usb_error(), Some(rusb::Error::Pipe));
        assert!(!error.is_transient());
    }

    #[test]
    fn test_transient_errors() {
        assert!(Error::UnexpectedMeasurementType.is_transient());
        assert!(Error::Timeout.is_transient());
        assert!(!Error::NotConnected.is_transient());
        assert!(!Error::NoAdapterFound.is_transient());
    }
}
