//! Raw detector readout for a single trigger.
//!
//! Records are a flat sequence of little-endian `f32` words, written in the order the fields
//! appear in [`RawEvent`]. Multi-dimensional fields are stored row-major
//! (`[side][plane][wire]` for cathodes).
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};

use super::constants::*;
use super::error::RawEventError;

/// Number of `f32` words in one record
pub const RAW_EVENT_WORDS: usize = 3
    + 4
    + 2
    + N_SIDES * (N_BETA_TUBES + 1)
    + N_SIDES * N_BETA_TUBES
    + N_SIDES
    + N_SIDES * 2 * N_MWPC_WIRES
    + 2 * N_DAQ_MODULES
    + 5 * N_SIDES
    + N_UCN_MONITORS;
/// Size of one record in bytes
pub const RAW_EVENT_SIZE: usize = RAW_EVENT_WORDS * 4;

/// Sis00 trigger flag word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TriggerFlags(pub u32);

impl TriggerFlags {
    pub fn from_raw(word: f32) -> Self {
        Self(word as u32)
    }

    pub fn is_led(&self) -> bool {
        self.0 & SIS_LED_BIT != 0
    }

    pub fn is_pulser(&self) -> bool {
        self.0 & SIS_PULSER_BIT != 0
    }

    pub fn is_scint_trigger(&self) -> bool {
        self.0 & SIS_SCINT_TRIGGER_MASK != 0
    }

    /// Any UCN monitor fired
    pub fn is_ucn_mon(&self) -> bool {
        self.0 & SIS_UCN_MON_MASK != 0
    }

    /// A specific UCN monitor fired
    pub fn is_ucn_mon_channel(&self, monitor: UcnMonitor) -> bool {
        self.0 & SIS_UCN_MON_BIT != 0
            && self.0 & (1 << (SIS_UCN_MON_FIRST_CHANNEL_BIT + monitor as u32)) != 0
    }
}

/// The UCN monitors read out with every run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UcnMonitor {
    GateValve = 0,
    Switcher = 1,
    Foil = 2,
    SourceCryostat = 3,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEvent {
    pub trigger_number: f32,
    pub sis00: f32,
    /// Absolute (unix) time of the event
    pub abs_time: f32,
    /// Time scaler in microseconds for the [East, West, Both, None] clocks
    pub time_scaler: [f32; 4],
    /// Time since last beam pulse, microseconds
    pub beam_clock: f32,
    /// Time since the previous event, microseconds
    pub delt0: f32,
    /// PMT TDCs with the 2-of-4 self trigger TDC in the last slot
    pub scint_tdc: [[f32; N_BETA_TUBES + 1]; N_SIDES],
    pub pmt_adc: [[f32; N_BETA_TUBES]; N_SIDES],
    pub anode: [f32; N_SIDES],
    pub cathodes: [[[f32; N_MWPC_WIRES]; 2]; N_SIDES],
    pub evnb: [f32; N_DAQ_MODULES],
    pub bkhf: [f32; N_DAQ_MODULES],
    pub backing_tdc: [f32; N_SIDES],
    pub backing_adc: [f32; N_SIDES],
    pub drift_tac: [f32; N_SIDES],
    pub top_tdc: [f32; N_SIDES],
    pub top_adc: [f32; N_SIDES],
    pub mon_adc: [f32; N_UCN_MONITORS],
}

fn read_into<R: Read>(reader: &mut R, dest: &mut [f32]) -> Result<(), std::io::Error> {
    reader.read_f32_into::<LittleEndian>(dest)
}

fn write_from<W: Write>(writer: &mut W, src: &[f32]) -> Result<(), std::io::Error> {
    for word in src {
        writer.write_f32::<LittleEndian>(*word)?;
    }
    Ok(())
}

impl RawEvent {
    pub fn trigger_flags(&self) -> TriggerFlags {
        TriggerFlags::from_raw(self.sis00)
    }

    /// Read the next record.
    ///
    /// Returns `Ok(None)` if the reader is exhausted exactly at a record boundary.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Option<Self>, RawEventError> {
        let mut buffer = vec![0u8; RAW_EVENT_SIZE];
        let mut filled = 0;
        while filled < RAW_EVENT_SIZE {
            match reader.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(RawEventError::IOError(e)),
            }
        }
        if filled == 0 {
            return Ok(None);
        } else if filled < RAW_EVENT_SIZE {
            return Err(RawEventError::Truncated(filled));
        }

        let mut cursor = Cursor::new(buffer);
        let mut event = RawEvent {
            trigger_number: cursor.read_f32::<LittleEndian>()?,
            sis00: cursor.read_f32::<LittleEndian>()?,
            abs_time: cursor.read_f32::<LittleEndian>()?,
            ..Default::default()
        };
        read_into(&mut cursor, &mut event.time_scaler)?;
        event.beam_clock = cursor.read_f32::<LittleEndian>()?;
        event.delt0 = cursor.read_f32::<LittleEndian>()?;
        for side in event.scint_tdc.iter_mut() {
            read_into(&mut cursor, side)?;
        }
        for side in event.pmt_adc.iter_mut() {
            read_into(&mut cursor, side)?;
        }
        read_into(&mut cursor, &mut event.anode)?;
        for side in event.cathodes.iter_mut() {
            for plane in side.iter_mut() {
                read_into(&mut cursor, plane)?;
            }
        }
        read_into(&mut cursor, &mut event.evnb)?;
        read_into(&mut cursor, &mut event.bkhf)?;
        read_into(&mut cursor, &mut event.backing_tdc)?;
        read_into(&mut cursor, &mut event.backing_adc)?;
        read_into(&mut cursor, &mut event.drift_tac)?;
        read_into(&mut cursor, &mut event.top_tdc)?;
        read_into(&mut cursor, &mut event.top_adc)?;
        read_into(&mut cursor, &mut event.mon_adc)?;

        Ok(Some(event))
    }

    /// Write this event as one record
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), RawEventError> {
        write_from(
            writer,
            &[self.trigger_number, self.sis00, self.abs_time],
        )?;
        write_from(writer, &self.time_scaler)?;
        write_from(writer, &[self.beam_clock, self.delt0])?;
        for side in self.scint_tdc.iter() {
            write_from(writer, side)?;
        }
        for side in self.pmt_adc.iter() {
            write_from(writer, side)?;
        }
        write_from(writer, &self.anode)?;
        for side in self.cathodes.iter() {
            for plane in side.iter() {
                write_from(writer, plane)?;
            }
        }
        write_from(writer, &self.evnb)?;
        write_from(writer, &self.bkhf)?;
        write_from(writer, &self.backing_tdc)?;
        write_from(writer, &self.backing_adc)?;
        write_from(writer, &self.drift_tac)?;
        write_from(writer, &self.top_tdc)?;
        write_from(writer, &self.top_adc)?;
        write_from(writer, &self.mon_adc)?;
        Ok(())
    }
}
