//! Demultiplexing of raw hardware messages to per-input translators
//!
//! Each message is keyed by status class, channel and number. Note-on and
//! note-off share one class; pitchbend, program change and channel pressure
//! carry no controller number and are keyed by channel only.

use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, trace, warn};

use crate::driver::{DeviceDriver, InputDriver};
use crate::midi::{format_hex, MidiEvent, StatusKind, SYSTEM};
use crate::translator::{InputTranslator, InputTranslatorSnapshot, TranslationResult};

/// Routing identity of an input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputKey {
    class: StatusKind,
    channel: u8,
    number: u8,
}

impl InputKey {
    fn new(class: StatusKind, channel: u8, number: u8) -> Self {
        let class = match class {
            StatusKind::NoteOn | StatusKind::NoteOff => StatusKind::NoteOnOff,
            other => other,
        };
        let number = match class {
            StatusKind::PitchBend | StatusKind::ProgramChange | StatusKind::ChannelPressure => 0,
            _ => number,
        };
        Self {
            class,
            channel,
            number,
        }
    }

    pub fn for_driver(driver: &InputDriver) -> Self {
        Self::new(driver.status, driver.channel, driver.number)
    }

    pub fn for_event(event: &MidiEvent) -> Self {
        Self::new(event.kind(), event.channel(), event.data1())
    }
}

/// Outcome of routing one raw message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    /// Messages for the device and/or the clients
    Translated(TranslationResult),
    /// System message forwarded to clients as is
    Raw(Vec<u8>),
    /// Malformed message, dropped
    Dropped,
}

/// All translators of one device
#[derive(Debug, Clone)]
pub struct Router {
    device: String,
    translators: Vec<InputTranslator>,
    index: HashMap<InputKey, usize>,
}

impl Router {
    /// One translator per input, using each input's native response
    pub fn new(device: &DeviceDriver) -> Result<Self> {
        let translators = device
            .inputs
            .iter()
            .map(|input| {
                InputTranslator::from_driver(input)
                    .with_context(|| format!("Failed to build translator for input '{}'", input.id))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::from_translators(&device.name, translators))
    }

    /// Rebuild translators from snapshots; inputs without a snapshot start from defaults
    pub fn restore(
        device: &DeviceDriver,
        snapshots: &BTreeMap<String, InputTranslatorSnapshot>,
    ) -> Result<Self> {
        for id in snapshots.keys() {
            if device.input(id).is_none() {
                warn!("Snapshot input '{}' is not part of device '{}', ignored", id, device.name);
            }
        }

        let translators = device
            .inputs
            .iter()
            .map(|input| {
                let translator = match snapshots.get(&input.id) {
                    Some(snapshot) => InputTranslator::restore(input, snapshot.clone()),
                    None => InputTranslator::from_driver(input),
                };
                translator.with_context(|| format!("Failed to restore input '{}'", input.id))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::from_translators(&device.name, translators))
    }

    fn from_translators(device: &str, translators: Vec<InputTranslator>) -> Self {
        let mut index = HashMap::new();
        for (position, translator) in translators.iter().enumerate() {
            let key = InputKey::for_driver(translator.driver());
            if index.insert(key, position).is_some() {
                warn!(
                    "Inputs of device '{}' share the address of '{}'; the later one wins",
                    device,
                    translator.id()
                );
            }
        }

        debug!("Router for '{}' with {} inputs", device, translators.len());

        Self {
            device: device.to_string(),
            translators,
            index,
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    /// Route raw bytes from the hardware
    pub fn route(&mut self, bytes: &[u8]) -> Routed {
        if bytes.first().is_some_and(|status| *status >= SYSTEM) {
            trace!("System message passed through: {}", format_hex(bytes));
            return Routed::Raw(bytes.to_vec());
        }

        match MidiEvent::from_bytes(bytes) {
            Ok(event) => Routed::Translated(self.route_event(&event)),
            Err(e) => {
                warn!("Dropping malformed message [{}]: {}", format_hex(bytes), e);
                Routed::Dropped
            }
        }
    }

    /// Route a parsed event; events of unknown inputs pass through to clients
    pub fn route_event(&mut self, event: &MidiEvent) -> TranslationResult {
        match self.index.get(&InputKey::for_event(event)) {
            Some(position) => self.translators[*position].handle(event),
            None => {
                trace!("No input for {}, passing through", event);
                TranslationResult::passthrough(*event)
            }
        }
    }

    pub fn translator(&self, id: &str) -> Option<&InputTranslator> {
        self.translators.iter().find(|t| t.id() == id)
    }

    pub fn translator_mut(&mut self, id: &str) -> Option<&mut InputTranslator> {
        self.translators.iter_mut().find(|t| t.id() == id)
    }

    pub fn translators(&self) -> impl Iterator<Item = &InputTranslator> {
        self.translators.iter()
    }

    /// Current light message of every input with a backlight
    pub fn sync_device(&self) -> Vec<MidiEvent> {
        self.translators
            .iter()
            .filter_map(InputTranslator::sync_device)
            .collect()
    }

    pub fn snapshot(&self) -> BTreeMap<String, InputTranslatorSnapshot> {
        self.translators
            .iter()
            .map(|t| (t.id().to_string(), t.snapshot()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::DriverCatalog;
    use crate::response::OutputStrategy;

    fn ev(bytes: &[u8]) -> MidiEvent {
        MidiEvent::from_bytes(bytes).unwrap()
    }

    fn apc() -> Router {
        let catalog = DriverCatalog::embedded().unwrap();
        Router::new(catalog.device("APC Key 25").unwrap()).unwrap()
    }

    #[test]
    fn test_note_on_and_off_share_an_input() {
        let mut router = apc();
        router
            .translator_mut("pad-1")
            .unwrap()
            .set_output_strategy(OutputStrategy::Toggle)
            .unwrap();

        assert!(matches!(router.route(&[0x90, 32, 127]), Routed::Translated(r) if r.to_client.is_some()));
        assert_eq!(router.route(&[0x80, 32, 0]), Routed::Translated(TranslationResult::default()));
        assert_eq!(router.translator("pad-1").unwrap().state().current_state, 1);
    }

    #[test]
    fn test_unknown_inputs_pass_through() {
        let mut router = apc();
        let event = ev(&[0x95, 1, 2]);
        assert_eq!(router.route_event(&event), TranslationResult::passthrough(event));
    }

    #[test]
    fn test_malformed_and_system_messages() {
        let mut router = apc();
        assert_eq!(router.route(&[0x90, 32]), Routed::Dropped);
        assert_eq!(router.route(&[]), Routed::Dropped);
        assert_eq!(router.route(&[0xF8]), Routed::Raw(vec![0xF8]));
        assert_eq!(router.translator("pad-1").unwrap().state().current_state, 0);
    }

    #[test]
    fn test_pitchbend_keyed_by_channel() {
        let catalog = DriverCatalog::embedded().unwrap();
        let mut router = Router::new(catalog.device("Desk Mixer").unwrap()).unwrap();
        router
            .translator_mut("fader-1")
            .unwrap()
            .set_override_channel(4)
            .unwrap();

        let out = router.route_event(&ev(&[0xE0, 0x11, 0x40]));
        assert_eq!(out.to_client, Some(ev(&[0xE4, 0x11, 0x40])));
    }

    #[test]
    fn test_sync_device_collects_lights() {
        let router = apc();
        let lights = router.sync_device();
        assert_eq!(lights, vec![ev(&[144, 32, 0]), ev(&[144, 33, 0])]);
    }

    #[test]
    fn test_restore_from_snapshots() {
        let catalog = DriverCatalog::embedded().unwrap();
        let device = catalog.device("APC Key 25").unwrap();
        let mut router = Router::new(device).unwrap();
        {
            let pad = router.translator_mut("pad-2").unwrap();
            pad.set_output_strategy(OutputStrategy::Toggle).unwrap();
            pad.set_color(1, "Green").unwrap();
        }
        router.route(&[0x90, 33, 127]);

        let mut snapshots = router.snapshot();
        snapshots.remove("pad-1");
        let restored = Router::restore(device, &snapshots).unwrap();

        let pad = restored.translator("pad-2").unwrap();
        assert_eq!(pad.output_strategy(), OutputStrategy::Toggle);
        assert_eq!(pad.state().current_state, 1);
        assert_eq!(pad.sync_device(), Some(ev(&[150, 33, 21])));
        assert_eq!(
            restored.translator("pad-1").unwrap().output_strategy(),
            OutputStrategy::Gate
        );
    }
}
