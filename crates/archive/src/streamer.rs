//! Archive assembly by piping system tools.

use crate::error::{ErrorKind, Result};
use bytes::Bytes;
use exn::ResultExt;
use futures::Stream;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll};
use stash_storage::backend::LocalAdapter;
use tokio::process::{ChildStdout, Command};
use tokio_util::io::ReaderStream;

/// Supported archive container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
}

impl ArchiveFormat {
    /// Parse the wire form (`zip` / `targz`).
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "zip" => Some(Self::Zip),
            "targz" => Some(Self::TarGz),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::TarGz => "tar.gz",
        }
    }

    fn tool(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::TarGz => "tar",
        }
    }
}

/// Builds streaming archives of already-authorized paths under one root.
pub struct ArchiveStreamer {
    adapter: LocalAdapter,
    /// Byte threshold at which zips stop deflating.
    large_bytes: u64,
}

impl ArchiveStreamer {
    pub fn new(adapter: LocalAdapter, large_bytes: u64) -> Self {
        Self {
            adapter,
            large_bytes,
        }
    }

    /// Assemble an archive of the given virtual paths.
    ///
    /// Every path is resolved against the adapter's root first; the tool
    /// then runs with that root as its working directory and only ever
    /// sees relative paths. Bytes stream straight from the tool's stdout.
    pub async fn stream(&self, paths: &[String], format: ArchiveFormat) -> Result<Archive> {
        if paths.is_empty() {
            exn::bail!(ErrorKind::Source);
        }
        let mut relative = Vec::with_capacity(paths.len());
        for path in paths {
            let resolved = self
                .adapter
                .resolve_existing(path)
                .await
                .or_raise(|| ErrorKind::Source)?;
            let rel = resolved
                .host_path
                .strip_prefix(self.adapter.root_real())
                .map(PathBuf::from)
                .unwrap_or_default();
            relative.push(if rel.as_os_str().is_empty() {
                PathBuf::from(".")
            } else {
                rel
            });
        }

        // Only zip adapts; tar.gz always gzips.
        let stored = match format {
            ArchiveFormat::Zip => {
                self.adapter
                    .probe_size(paths, self.large_bytes)
                    .await
                    .or_raise(|| ErrorKind::Source)?
                    >= self.large_bytes
            }
            ArchiveFormat::TarGz => false,
        };

        let tool = which::which(format.tool())
            .map_err(|_| ErrorKind::ToolNotFound(format.tool().to_string()))?;
        let mut command = Command::new(tool);
        match format {
            ArchiveFormat::Zip => {
                command.arg("-r").arg("-q");
                if stored {
                    // Store mode: the probe says deflate isn't worth it.
                    command.arg("-0");
                }
                command.arg("-");
            }
            ArchiveFormat::TarGz => {
                command.arg("-czf").arg("-");
            }
        }
        command
            .args(&relative)
            .current_dir(self.adapter.root_real())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(ErrorKind::Io)?;
        // unwrap is safe: stdout was configured as piped just above
        let stdout = child.stdout.take().unwrap();

        // Reap the child off to the side; stream consumers only see EOF.
        // A dropped stream closes the pipe and the tool dies on EPIPE, so
        // client disconnects stop production promptly. Failures are logged
        // with the tool's stderr and never retried.
        tokio::spawn(async move {
            match child.wait_with_output().await {
                Ok(output) if !output.status.success() => tracing::warn!(
                    status = output.status.code(),
                    stderr = %String::from_utf8_lossy(&output.stderr),
                    "archive tool exited with failure",
                ),
                Err(e) => tracing::warn!(error = %e, "failed to reap archive tool"),
                _ => {}
            }
        });

        Ok(Archive {
            stored,
            inner: ReaderStream::new(stdout),
        })
    }
}

/// A producing archive: a byte stream plus the compression decision.
pub struct Archive {
    /// True when the probe tipped a zip into store mode.
    pub stored: bool,
    inner: ReaderStream<ChildStdout>,
}

impl Stream for Archive {
    type Item = std::io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
