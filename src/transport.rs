//! MIDI port plumbing
//!
//! Hardware input arrives through a midir callback and is forwarded into a
//! tokio channel. Outgoing messages go through [`MidiSink`] so the relay loop
//! can be driven without real ports.

use anyhow::{Context, Result};
use midir::{MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::midi::format_hex;

/// Destination for raw MIDI bytes
pub trait MidiSink: Send + Sync {
    fn send(&self, bytes: &[u8]) -> Result<()>;
}

/// Find a port whose name contains `pattern`, ignoring case
fn find_port<'a, P: Clone>(
    ports: &'a [(P, String)],
    pattern: &str,
) -> Option<&'a (P, String)> {
    let pattern = pattern.to_lowercase();
    ports
        .iter()
        .find(|(_, name)| name.to_lowercase().contains(&pattern))
}

/// Names of the available (input, output) ports
pub fn list_ports() -> Result<(Vec<String>, Vec<String>)> {
    let midi_in = MidiInput::new("MIDI-Relay-Scanner").context("Failed to create MIDI input")?;
    let midi_out = MidiOutput::new("MIDI-Relay-Scanner").context("Failed to create MIDI output")?;

    let inputs = midi_in
        .ports()
        .iter()
        .filter_map(|port| midi_in.port_name(port).ok())
        .collect();
    let outputs = midi_out
        .ports()
        .iter()
        .filter_map(|port| midi_out.port_name(port).ok())
        .collect();

    Ok((inputs, outputs))
}

/// Open the hardware input; every message is forwarded to `tx`
///
/// The connection closes when the returned value is dropped.
pub fn open_input(pattern: &str, tx: mpsc::UnboundedSender<Vec<u8>>) -> Result<MidiInputConnection<()>> {
    let mut midi_in = MidiInput::new("MIDI-Relay-Input").context("Failed to create MIDI input")?;
    midi_in.ignore(midir::Ignore::None);

    let ports: Vec<_> = midi_in
        .ports()
        .into_iter()
        .filter_map(|port| midi_in.port_name(&port).ok().map(|name| (port, name)))
        .collect();
    debug!("Found {} MIDI input ports", ports.len());

    let (port, name) = find_port(&ports, pattern)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("Input port '{}' not found", pattern))?;

    info!("Connecting to input port: {}", name);

    midi_in
        .connect(
            &port,
            "MIDI-Relay",
            move |_timestamp, data, _| {
                trace!("RX {}", format_hex(data));
                if tx.send(data.to_vec()).is_err() {
                    debug!("Relay loop gone, input message dropped");
                }
            },
            (),
        )
        .map_err(|e| anyhow::anyhow!("Failed to connect to input port '{}': {}", name, e))
}

/// Output port opened through midir
pub struct PortSink {
    name: String,
    conn: Mutex<MidiOutputConnection>,
}

impl PortSink {
    pub fn open(pattern: &str) -> Result<Self> {
        let midi_out = MidiOutput::new("MIDI-Relay-Output").context("Failed to create MIDI output")?;

        let ports: Vec<_> = midi_out
            .ports()
            .into_iter()
            .filter_map(|port| midi_out.port_name(&port).ok().map(|name| (port, name)))
            .collect();
        debug!("Found {} MIDI output ports", ports.len());

        let (port, name) = find_port(&ports, pattern)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Output port '{}' not found", pattern))?;

        info!("Connecting to output port: {}", name);

        let conn = midi_out
            .connect(&port, "MIDI-Relay")
            .map_err(|e| anyhow::anyhow!("Failed to connect to output port '{}': {}", name, e))?;

        Ok(Self {
            name,
            conn: Mutex::new(conn),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl MidiSink for PortSink {
    fn send(&self, bytes: &[u8]) -> Result<()> {
        self.conn
            .lock()
            .send(bytes)
            .with_context(|| format!("Failed to send {} to '{}'", format_hex(bytes), self.name))?;
        trace!("TX {} -> {}", format_hex(bytes), self.name);
        Ok(())
    }
}

/// Spaces messages to a slow device by at least `interval`
///
/// Messages are queued, never dropped; a background task drains the queue.
pub struct ThrottledSink {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl ThrottledSink {
    /// Must be called inside a tokio runtime
    pub fn spawn(inner: Arc<dyn MidiSink>, interval: Duration) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();

        tokio::spawn(async move {
            let mut last_sent: Option<Instant> = None;
            while let Some(bytes) = rx.recv().await {
                if let Some(last) = last_sent {
                    tokio::time::sleep_until(last + interval).await;
                }
                if let Err(e) = inner.send(&bytes) {
                    warn!("Throttled send failed: {:#}", e);
                }
                last_sent = Some(Instant::now());
            }
            debug!("Throttled sink closed");
        });

        Self { tx }
    }
}

impl MidiSink for ThrottledSink {
    fn send(&self, bytes: &[u8]) -> Result<()> {
        self.tx
            .send(bytes.to_vec())
            .map_err(|_| anyhow::anyhow!("Throttled sink worker stopped"))
    }
}

/// Sink that keeps everything it is given, for tests and dry runs
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<(Instant, Vec<u8>)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<Vec<u8>> {
        self.sent.lock().iter().map(|(_, bytes)| bytes.clone()).collect()
    }

    pub fn timestamps(&self) -> Vec<Instant> {
        self.sent.lock().iter().map(|(at, _)| *at).collect()
    }
}

impl MidiSink for RecordingSink {
    fn send(&self, bytes: &[u8]) -> Result<()> {
        self.sent.lock().push((Instant::now(), bytes.to_vec()));
        Ok(())
    }
}
