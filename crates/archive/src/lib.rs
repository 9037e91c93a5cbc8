//! Streaming archive assembly.
//!
//! Bundles one or more resolved entries under a user's root into a zip or
//! tar.gz, written chunk-wise as it is produced. Assembly shells out to
//! the system `zip` / `tar` tools with the user's root as the working
//! directory and forwards their stdout; the archive is never materialized
//! in memory or on disk.
//!
//! Zip compression adapts to size: a byte-sum probe walks the requested
//! trees first, and once the total reaches the configured threshold the
//! archive is written in store mode (no deflate), since compressing very
//! large bundles costs far more CPU than the transfer saves.

pub mod error;
mod naming;
mod streamer;

pub use crate::naming::{content_disposition, download_name};
pub use crate::streamer::{Archive, ArchiveFormat, ArchiveStreamer};
