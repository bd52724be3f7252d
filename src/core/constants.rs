//! Dispatcher constants.
//!
//! Names recognized in JSON options, wire framing sizes and runtime defaults.

use std::time::Duration;

// =============================================================================
// TRANSPORT NAMES
// =============================================================================

/// obfs2: no options.
pub const TRANSPORT_OBFS2: &str = "obfs2";

/// obfs4: `cert` and `iatMode`.
pub const TRANSPORT_OBFS4: &str = "obfs4";

/// Shadow: `password` and `cipherName`.
pub const TRANSPORT_SHADOW: &str = "shadow";

/// meek (lite): `url` and `front`.
pub const TRANSPORT_MEEKLITE: &str = "meeklite";

/// Dust: `serverPublic` and `chunkSize`.
pub const TRANSPORT_DUST: &str = "Dust";

/// Replicant: separate `client` and `server` records.
pub const TRANSPORT_REPLICANT: &str = "Replicant";

/// Optimizer: `transports` and `strategy`.
pub const TRANSPORT_OPTIMIZER: &str = "Optimizer";

// =============================================================================
// OPTIMIZER STRATEGY NAMES
// =============================================================================

/// Try candidates in declaration order.
pub const STRATEGY_FIRST: &str = "first";

/// One uniformly random candidate per dial.
pub const STRATEGY_RANDOM: &str = "random";

/// Round-robin across dial calls.
pub const STRATEGY_ROTATE: &str = "rotate";

/// Prefer candidates with the best success history.
pub const STRATEGY_TRACK: &str = "track";

/// Prefer candidates with the lowest observed dial latency.
pub const STRATEGY_MINIMIZE_DIAL_DURATION: &str = "minimizeDialDuration";

// =============================================================================
// CONFIGURATION LIMITS
// =============================================================================

/// Maximum optimizer nesting accepted by the decoder.
pub const MAX_NESTING_DEPTH: usize = 8;

/// Size of X25519-style public/private keys carried as hex.
pub const KEY_SIZE: usize = 32;

// =============================================================================
// UDP FRAMING
// =============================================================================

/// Length prefix size (little-endian u16).
pub const FRAME_HEADER_SIZE: usize = 2;

/// Largest payload a single frame can carry.
pub const MAX_FRAME_PAYLOAD: usize = u16::MAX as usize;

/// Default receive buffer for UDP sockets.
pub const DEFAULT_UDP_BUFFER_SIZE: usize = 65535;

/// Per-session queue depth between the UDP reader and the session writer.
pub const SESSION_QUEUE_DEPTH: usize = 64;

// =============================================================================
// TIMING AND BUFFERS
// =============================================================================

/// Upper bound on one optimizer dial, all attempts included.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(60);

/// Copy buffer used by each relay direction.
pub const RELAY_BUFFER_SIZE: usize = 16 * 1024;

/// Smoothing factor for dial latency estimates.
pub const LATENCY_EWMA_ALPHA: f64 = 0.5;
