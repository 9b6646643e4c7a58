//! Offline WAV rendering
//!
//! Writes RIFF/WAVE with an extended format chunk (WAVE_FORMAT_EXTENSIBLE),
//! IEEE float 32-bit, two channels: the one container layout every DAW and
//! `aplay`-style tool agrees on for float audio.
//!
//! Sinks that support random writes get their `riffSize`/`dataSize` fields
//! rewritten as data grows, so an interrupted render is still a valid file.
//! Pipe sinks keep the initial maximum-size sentinel header, which players
//! treat as "read until EOF".

use std::io::{Seek, SeekFrom, Write};

use crate::error::Result;
use crate::session::{Session, NUM_CHANNELS};
use crate::source::Source;
use crate::time::Tz;

const BITS_PER_SAMPLE: u16 = 32;
/// 3 = IEEE float; 1 would be integer PCM.
const SAMPLE_FORMAT: u16 = 3;
const BLOCK_ALIGN: u16 = (NUM_CHANNELS as u16) * BITS_PER_SAMPLE / 8;

/// validBits + channelMask + subFormat GUID.
const EXT_SIZE: u16 = 2 + 4 + 16;
const FMT_SIZE: u32 = 2 + 2 + 4 + 4 + 2 + 2 + 2 + EXT_SIZE as u32;

/// KSDATAFORMAT_SUBTYPE_IEEE_FLOAT.
const SUB_FORMAT: [u8; 16] = [
    0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0xAA, 0x00, 0x38, 0x9B,
    0x71,
];

const RIFF_SIZE_OFF: u64 = 4;
/// Bytes counted by `riffSize`, excluding the audio data.
pub const RIFF_HEADER_SIZE: u32 = 4 + 4 + 4 + FMT_SIZE + 4 + 4;
const DATA_SIZE_OFF: u64 = RIFF_HEADER_SIZE as u64 + 4;
/// Total header bytes before the first audio frame.
pub const HEADER_SIZE: usize = DATA_SIZE_OFF as usize + 4;

/// `(riffSize, dataSize)` for a known frame count, or the streaming
/// sentinel when the count is unknown (`None`).
fn wav_sizes(num_frames: Option<Tz>) -> (u32, u32) {
    match num_frames {
        None => (u32::MAX, u32::MAX - RIFF_HEADER_SIZE),
        Some(n) => {
            let data = n as u32 * BLOCK_ALIGN as u32;
            (data + RIFF_HEADER_SIZE, data)
        }
    }
}

fn wav_header(sample_rate: Tz, num_frames: Option<Tz>) -> [u8; HEADER_SIZE] {
    let (riff_size, data_size) = wav_sizes(num_frames);
    let byte_rate = sample_rate as u32 * BLOCK_ALIGN as u32;

    let mut buf = Vec::with_capacity(HEADER_SIZE);
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&riff_size.to_le_bytes());
    buf.extend_from_slice(b"WAVE");
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&FMT_SIZE.to_le_bytes());
    buf.extend_from_slice(&SAMPLE_FORMAT.to_le_bytes());
    buf.extend_from_slice(&(NUM_CHANNELS as u16).to_le_bytes());
    buf.extend_from_slice(&(sample_rate as u32).to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&BLOCK_ALIGN.to_le_bytes());
    buf.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    buf.extend_from_slice(&EXT_SIZE.to_le_bytes());
    buf.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes()); // validBits
    buf.extend_from_slice(&0u32.to_le_bytes()); // channelMask
    buf.extend_from_slice(&SUB_FORMAT);
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());

    buf.try_into().expect("header layout is fixed")
}

/// Incremental stereo float WAV writer.
///
/// The header goes out immediately with sentinel sizes; call
/// [`update_sizes`](WavWriter::update_sizes) (or [`finalize`]
/// (WavWriter::finalize)) on seekable sinks to keep the size fields honest.
pub struct WavWriter<W: Write> {
    out: W,
    sample_rate: Tz,
    frames_written: Tz,
    /// Cleared after the first failed seek so pipe sinks are probed once.
    seekable: bool,
}

impl<W: Write> WavWriter<W> {
    /// Write the sentinel header and return the writer.
    pub fn new(mut out: W, sample_rate: Tz) -> Result<Self> {
        out.write_all(&wav_header(sample_rate, None))?;
        Ok(WavWriter {
            out,
            sample_rate,
            frames_written: 0,
            seekable: true,
        })
    }

    /// Append one window of per-channel samples, interleaved L/R.
    ///
    /// # Panics
    /// The channel slices must have equal length.
    pub fn write_window(&mut self, left: &[f32], right: &[f32]) -> Result<()> {
        assert_eq!(left.len(), right.len(), "channel windows must match");

        let mut bytes = Vec::with_capacity(left.len() * BLOCK_ALIGN as usize);
        for (l, r) in left.iter().zip(right) {
            bytes.extend_from_slice(&l.to_le_bytes());
            bytes.extend_from_slice(&r.to_le_bytes());
        }
        self.out.write_all(&bytes)?;
        self.frames_written += left.len() as Tz;
        Ok(())
    }

    /// Frames appended so far.
    pub fn frames_written(&self) -> Tz {
        self.frames_written
    }

    /// Sample rate stamped into the header.
    pub fn sample_rate(&self) -> Tz {
        self.sample_rate
    }
}

impl<W: Write + Seek> WavWriter<W> {
    /// Rewrite the size fields to cover the data written so far.
    ///
    /// A sink that cannot seek (a pipe) keeps the sentinel header; the
    /// first failed seek disables further attempts.
    pub fn update_sizes(&mut self) -> Result<()> {
        if !self.seekable {
            return Ok(());
        }
        let (riff_size, data_size) = wav_sizes(Some(self.frames_written));

        if self.out.seek(SeekFrom::Start(RIFF_SIZE_OFF)).is_err() {
            self.seekable = false;
            return Ok(());
        }
        self.out.write_all(&riff_size.to_le_bytes())?;
        self.out.seek(SeekFrom::Start(DATA_SIZE_OFF))?;
        self.out.write_all(&data_size.to_le_bytes())?;
        self.out.seek(SeekFrom::End(0))?;
        Ok(())
    }

    /// Update the header one last time and hand the sink back.
    pub fn finalize(mut self) -> Result<W> {
        self.update_sizes()?;
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Mix `session` from its current position to its end in `chunk` windows,
/// appending everything to `writer` and keeping the header current.
pub fn render<W: Write + Seek>(
    session: &Session,
    writer: &mut WavWriter<W>,
    chunk: Tz,
) -> Result<()> {
    assert!(chunk > 0, "chunk must be positive");
    let mut left = Vec::new();
    let mut right = Vec::new();

    loop {
        let pos = session.position();
        let remaining = session.length() - pos;
        if remaining <= 0 {
            break;
        }
        let window = chunk.min(remaining);

        left.clear();
        session.samples(0, pos, window, &mut |buf| left.extend_from_slice(buf));
        right.clear();
        session.samples(1, pos, window, &mut |buf| right.extend_from_slice(buf));

        writer.write_window(&left, &right)?;
        writer.update_sizes()?;
    }
    Ok(())
}
