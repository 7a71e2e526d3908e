//! Pipeline stages for screenshot verification.
//!
//! Each submodule implements one step. Stages run strictly in order; only
//! the navigator's searches run concurrently.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ preprocess ──▶ extract ──▶ navigate ──▶ audit
//! (path/URL) (image ops)   (vision)    (queries →   (live page
//!                                       search →     → score)
//!                                       resolve)
//! ```
//!
//! 1. [`input`]      — read a local path or download a URL into memory
//! 2. [`preprocess`] — contrast, brightness, sharpening; runs in
//!    `spawn_blocking` because image ops are CPU-bound
//! 3. [`extract`]    — one vision call → transcript + postmark; helpers in
//!    [`encode`] (base64 wrap), [`structured`] (JSON isolation) and
//!    [`postprocess`] (transcript cleanup)
//! 4. [`navigate`]   — query generation, concurrent search via [`fanout`],
//!    URL resolution
//! 5. [`audit`]      — load the candidate page and score it

pub mod audit;
pub mod encode;
pub mod extract;
pub mod fanout;
pub mod input;
pub mod navigate;
pub mod postprocess;
pub mod preprocess;
pub mod structured;
