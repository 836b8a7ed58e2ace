// Error handling for the discovery engine.
// Mirrors the teacher crate's rich, contextual error variants; extended
// with the failure taxonomy from the Error Handling Design (fatal vs.
// locally-recovered classes).

use std::net::Ipv4Addr;
use thiserror::Error;

/// Comprehensive error types for network operations.
/// Most variants are recovered locally by the component that raised them —
/// only `NoInterfaces` is fatal to the scan.
#[derive(Error, Debug)]
pub enum NetweaverError {
    #[error("Failed to connect to {host}:{port} - {reason}")]
    ConnectionFailed {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("Host {ip} is unreachable after {attempts} attempts")]
    HostUnreachable { ip: Ipv4Addr, attempts: u32 },

    #[error("Port scan failed for {ip} - {details}")]
    PortScanFailed { ip: Ipv4Addr, details: String },

    #[error("Failed to resolve hostname '{hostname}' - {reason}")]
    DnsResolutionFailed { hostname: String, reason: String },

    #[error("Socket operation failed: {operation} - {reason}")]
    SocketError { operation: String, reason: String },

    #[error("Insufficient privileges for {operation}")]
    PermissionDenied { operation: String },

    #[error("Invalid configuration: {field} - {reason}")]
    ConfigError { field: String, reason: String },

    #[error("Operation timed out after {duration_ms}ms: {operation}")]
    Timeout { operation: String, duration_ms: u64 },

    #[error("Invalid parameter: {param} - {reason}")]
    InvalidParameter { param: String, reason: String },

    #[error("File operation failed: {path} - {reason}")]
    FileError { path: String, reason: String },

    #[error("Failed to {operation} {format} data - {details}")]
    SerializationError {
        operation: String,
        format: String,
        details: String,
    },

    /// No usable network interfaces were found at startup. The only fatal
    /// variant — every other error class is recovered locally.
    #[error("No usable network interfaces found")]
    NoInterfaces,

    /// The device-rules YAML failed to parse or failed structural
    /// validation (e.g. a rule with neither `all_of` nor `any_of`).
    #[error("Device rules configuration invalid: {reason}")]
    RuleConfigError { reason: String },
}

pub type Result<T> = std::result::Result<T, NetweaverError>;

/// Error context extension trait for enriching errors with additional info.
pub trait ErrorContext<T> {
    fn with_host_context(self, host: &str, port: u16) -> Result<T>;
    fn with_ip_context(self, ip: Ipv4Addr) -> Result<T>;
    fn with_operation_context(self, operation: &str) -> Result<T>;
}

impl<T, E: std::fmt::Display> ErrorContext<T> for std::result::Result<T, E> {
    fn with_host_context(self, host: &str, port: u16) -> Result<T> {
        self.map_err(|e| NetweaverError::ConnectionFailed {
            host: host.to_string(),
            port,
            reason: e.to_string(),
        })
    }

    fn with_ip_context(self, ip: Ipv4Addr) -> Result<T> {
        self.map_err(|e| NetweaverError::PortScanFailed {
            ip,
            details: e.to_string(),
        })
    }

    fn with_operation_context(self, operation: &str) -> Result<T> {
        self.map_err(|e| NetweaverError::SocketError {
            operation: operation.to_string(),
            reason: e.to_string(),
        })
    }
}
