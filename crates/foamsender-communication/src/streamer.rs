//! File streaming
//!
//! Sends a G-code file line by line through the transport, one
//! acknowledged line at a time. The first failure aborts the transfer.

use crate::transport::TransportController;
use foamsender_core::{
    CancellationToken, ConnectionError, EventDispatcher, Result, SenderEvent, ShellError,
    TransmissionError,
};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// How file lines are turned into transmitted lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOptions {
    /// Skip lines that are empty once their terminator is removed
    pub skip_blank_lines: bool,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            skip_blank_lines: true,
        }
    }
}

/// Totals for a finished transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamSummary {
    /// Lines transmitted and acknowledged
    pub lines_sent: usize,
    /// Lines skipped as blank
    pub lines_skipped: usize,
    /// Acknowledgment bytes discarded
    pub bytes_discarded: usize,
}

/// Stream `path` through `transport`
///
/// The file is opened before anything is written, so an unreadable file
/// leaves the device untouched. The transport lock is taken per line, which
/// lets other holders interleave between lines but never inside one.
pub fn stream_file(
    transport: &Mutex<TransportController>,
    path: &Path,
    options: &StreamOptions,
    cancel: &CancellationToken,
    events: &EventDispatcher,
) -> Result<StreamSummary> {
    let file = File::open(path).map_err(|e| ShellError::FileOpen {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let total_bytes = file.metadata().map(|m| m.len()).unwrap_or(0);

    if !transport.lock().is_open() {
        return Err(ConnectionError::NotConnected.into());
    }

    tracing::info!("Streaming {}", path.display());
    events.publish(SenderEvent::TransferStarted(path.to_path_buf()));

    let mut summary = StreamSummary::default();
    match stream_lines(
        transport,
        BufReader::new(file),
        total_bytes,
        options,
        cancel,
        events,
        &mut summary,
    ) {
        Ok(()) => {
            tracing::info!("Sent {} lines from {}", summary.lines_sent, path.display());
            events.publish(SenderEvent::TransferFinished {
                lines_sent: summary.lines_sent,
            });
            Ok(summary)
        }
        Err(e) => {
            tracing::error!(
                "Transfer of {} stopped after {} lines: {}",
                path.display(),
                summary.lines_sent,
                e
            );
            events.publish(SenderEvent::TransferFailed {
                lines_sent: summary.lines_sent,
                reason: e.to_string(),
            });
            Err(e)
        }
    }
}

fn stream_lines<R: BufRead>(
    transport: &Mutex<TransportController>,
    mut reader: R,
    total_bytes: u64,
    options: &StreamOptions,
    cancel: &CancellationToken,
    events: &EventDispatcher,
    summary: &mut StreamSummary,
) -> Result<()> {
    let mut raw = String::new();
    let mut bytes_read = 0u64;
    let mut line_number = 0usize;

    loop {
        if cancel.is_cancelled() {
            return Err(TransmissionError::Cancelled.into());
        }

        raw.clear();
        let n = reader.read_line(&mut raw)?;
        if n == 0 {
            return Ok(());
        }
        bytes_read += n as u64;
        line_number += 1;

        let line = raw.trim_end_matches(['\r', '\n']);
        if options.skip_blank_lines && line.trim().is_empty() {
            summary.lines_skipped += 1;
            continue;
        }

        let outcome = transport.lock().send_line_and_drain(line, cancel)?;
        summary.lines_sent += 1;
        summary.bytes_discarded += outcome.discarded;

        events.publish(SenderEvent::LineSent {
            line_number,
            line: line.to_string(),
        });
        events.publish(SenderEvent::Progress {
            bytes_read,
            total_bytes,
        });
    }
}
