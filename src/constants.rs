// Constants module - centralized default values for configuration
//
// This module defines all default values used throughout the codebase.
// Using constants instead of magic numbers improves maintainability
// and makes it easier to understand and modify defaults.

// =============================================================================
// Server defaults
// =============================================================================

/// Default listen address
pub const DEFAULT_ADDRESS: &str = "0.0.0.0";

/// Default listen port
pub const DEFAULT_PORT: u16 = 8080;

/// Default number of worker threads
pub const DEFAULT_THREADS: usize = 4;

/// Default request timeout in seconds (exceeding it cancels the request)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default time to wait for in-flight work on shutdown, in seconds
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// Image defaults
// =============================================================================

/// Default maximum output width (used when no width is requested)
pub const DEFAULT_MAX_WIDTH: u32 = 3840;

/// Default maximum output height (used when no height is requested)
pub const DEFAULT_MAX_HEIGHT: u32 = 2160;

/// Default quality for lossy formats (JPEG, WebP)
pub const DEFAULT_QUALITY: u8 = 80;

/// Default number of transform engine worker threads
pub const DEFAULT_ENGINE_THREADS: usize = 4;

/// Default maximum source image width
pub const DEFAULT_MAX_SOURCE_WIDTH: u32 = 10000;

/// Default maximum source image height
pub const DEFAULT_MAX_SOURCE_HEIGHT: u32 = 10000;

/// Default maximum source pixel count (100 megapixels)
pub const DEFAULT_MAX_SOURCE_PIXELS: u64 = 100_000_000;

// =============================================================================
// Fetch defaults
// =============================================================================

/// Default number of fetch slots (concurrent fetch + transform operations)
pub const DEFAULT_FETCH_SLOTS: usize = 8;

/// Default source fetch timeout in seconds
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 20;

/// Default maximum source image size (50 MB)
pub const DEFAULT_MAX_SOURCE_BYTES: u64 = 50 * 1024 * 1024;

/// Default request correlation header
pub const DEFAULT_CORRELATION_HEADER: &str = "X-Request-ID";

// =============================================================================
// Response defaults
// =============================================================================

/// Size of each body chunk written to the client
pub const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Non-standard status used when the client goes away or the request times out
pub const STATUS_CLIENT_CLOSED_REQUEST: u16 = 499;
