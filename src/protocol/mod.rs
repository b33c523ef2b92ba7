//! Frame model: the vocabulary of message kinds and close-code semantics.
//!
//! Everything above the transport boundary speaks these types.
//!
//! | Message Kind | Payload | Delivered to listener |
//! |--------------|---------|-----------------------|
//! | `Text` | UTF-8 bytes (validated before delivery) | yes |
//! | `Binary` | arbitrary bytes | yes |
//! | `Ping` | — | no (answered or discarded) |
//! | `Pong` | — | as `on_pong` |
//! | `Close` | optional code + reason | as `on_disconnected` |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `close_code` | Close status codes and their range classification |
//! | `frame` | Typed frames and close frame contents |

// ============================================================================
// Submodules
// ============================================================================

/// Close status codes per RFC 6455.
pub mod close_code;

/// Typed message frames.
pub mod frame;

// ============================================================================
// Re-exports
// ============================================================================

pub use close_code::CloseCode;
pub use frame::{CloseFrame, Frame};
