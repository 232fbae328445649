use color_eyre::eyre::{eyre, Report, Result};
use midir::{os::unix::VirtualOutput, MidiOutput, MidiOutputConnection};
use midly::{
    live::LiveEvent,
    num::{u4, u7},
    MidiMessage,
};
use stepseq_core::{MidiOut, NoteOn};

const CLIENT_NAME: &str = "stepseq";

pub struct MidiPort {
    connection: MidiOutputConnection,
    name: String,
    buf: Vec<u8>,
}

impl MidiPort {
    /// connect to output port `index`, or open a virtual port when none is given
    pub fn connect(index: Option<usize>) -> Result<Self> {
        let output = MidiOutput::new(CLIENT_NAME)?;
        let (connection, name) = match index {
            Some(index) => {
                let ports = output.ports();
                let port = ports
                    .get(index)
                    .ok_or_else(|| eyre!("no midi output port {}", index))?;
                let name = output.port_name(port)?;
                let connection = output
                    .connect(port, CLIENT_NAME)
                    .map_err(|e| eyre!("connect to {}: {}", name, e))?;
                (connection, name)
            }
            None => {
                let connection = output
                    .create_virtual(CLIENT_NAME)
                    .map_err(|e| eyre!("create virtual port: {}", e))?;
                (connection, format!("{} (virtual)", CLIENT_NAME))
            }
        };
        Ok(Self {
            connection,
            name,
            buf: Vec::with_capacity(3),
        })
    }

    pub fn ports() -> Result<Vec<String>> {
        let output = MidiOutput::new(CLIENT_NAME)?;
        Ok(output
            .ports()
            .iter()
            .filter_map(|p| output.port_name(p).ok())
            .collect())
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

fn live_event(event: NoteOn) -> LiveEvent<'static> {
    // take the saturated data bytes; u7::from alone would wrap 128 to 0
    let [_, key, vel] = event.to_bytes();
    LiveEvent::Midi {
        channel: u4::from(event.channel.saturating_sub(1)),
        message: MidiMessage::NoteOn {
            key: u7::from(key),
            vel: u7::from(vel),
        },
    }
}

impl MidiOut for MidiPort {
    type Error = Report;

    fn note_on(&mut self, event: NoteOn) -> Result<(), Self::Error> {
        self.buf.clear();
        live_event(event).write_std(&mut self.buf)?;
        self.connection.send(&self.buf)?;
        Ok(())
    }
}
