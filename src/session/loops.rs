//! The raw-bytes and decoded-text read loops.
//!
//! Each loop owns its renderer outright. The write path never touches a
//! renderer; it sends an [`LoopCommand::Outgoing`] mirror over the loop's
//! command queue instead.

use super::events::{SessionEvent, View};
use super::tee::{Branch, Chunk};
use crate::decode::TextEncoding;
use crate::render::{BinaryRenderer, TextRenderer};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone)]
pub(crate) enum LoopCommand {
    /// Bytes that were just written to the device.
    Outgoing(Chunk),
    /// Forget everything rendered so far.
    Clear,
}

pub(crate) type EventSender = mpsc::UnboundedSender<SessionEvent>;

fn emit(events: &EventSender, event: SessionEvent) {
    // The shell may have gone away; the session keeps running regardless.
    let _ = events.send(event);
}

pub(crate) async fn run_text_loop(
    session_id: u64,
    mut branch: Branch,
    mut commands: mpsc::UnboundedReceiver<LoopCommand>,
    mut renderer: TextRenderer,
    encoding: TextEncoding,
    events: EventSender,
    token: CancellationToken,
) {
    let mut decoder = encoding.decoder();

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(session_id, "text loop cancelled");
                return;
            }
            Some(command) = commands.recv() => match command {
                LoopCommand::Outgoing(bytes) => {
                    let mut mirror = encoding.decoder();
                    let mut text = mirror.decode(&bytes);
                    text.push_str(&mirror.finish());
                    renderer.push_outgoing(&text);
                }
                LoopCommand::Clear => {
                    renderer.clear();
                    emit(&events, SessionEvent::Cleared(View::Text));
                }
            },
            chunk = branch.next() => match chunk {
                Some(chunk) => renderer.push_str(&decoder.decode(&chunk)),
                None => {
                    renderer.push_str(&decoder.finish());
                    renderer.finish();
                    flush_text(&mut renderer, &events);
                    debug!(session_id, "text loop reached end of stream");
                    return;
                }
            },
        }
        flush_text(&mut renderer, &events);
    }
}

fn flush_text(renderer: &mut TextRenderer, events: &EventSender) {
    for line in renderer.take_updates() {
        emit(events, SessionEvent::Text(line));
    }
}

pub(crate) async fn run_binary_loop(
    session_id: u64,
    mut branch: Branch,
    mut commands: mpsc::UnboundedReceiver<LoopCommand>,
    mut renderer: BinaryRenderer,
    events: EventSender,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(session_id, "binary loop cancelled");
                return;
            }
            Some(command) = commands.recv() => match command {
                LoopCommand::Outgoing(bytes) => renderer.push_outgoing(&bytes),
                LoopCommand::Clear => {
                    renderer.clear();
                    emit(&events, SessionEvent::Cleared(View::Binary));
                }
            },
            chunk = branch.next() => match chunk {
                Some(chunk) => renderer.push_bytes(&chunk),
                None => {
                    renderer.finish();
                    flush_binary(&mut renderer, &events);
                    debug!(session_id, "binary loop reached end of stream");
                    return;
                }
            },
        }
        flush_binary(&mut renderer, &events);
    }
}

fn flush_binary(renderer: &mut BinaryRenderer, events: &EventSender) {
    for row in renderer.take_updates() {
        emit(events, SessionEvent::Binary(row));
    }
}
