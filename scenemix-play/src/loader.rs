//! Audio file loading using symphonia
//!
//! Decodes a whole file into an in-memory [`MemSource`] at its native
//! sample rate: deinterleaved f32 channel buffers, mono and stereo kept
//! as-is, wider layouts downmixed to stereo. Streaming decode is out of
//! scope: scene sources are loaded once at startup and shared from then
//! on.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{info, warn};

use scenemix_engine::{MemSource, Tz};

use crate::error::{Error, Result};

fn decode_error(path: &Path, message: impl std::fmt::Display) -> Error {
    Error::Decode {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

/// Decode `path` into memory.
pub fn load_source<P: AsRef<Path>>(path: P) -> Result<MemSource> {
    let path = path.as_ref();

    let file = File::open(path).map_err(|source| Error::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| decode_error(path, format!("unsupported format: {}", e)))?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| decode_error(path, "no audio track"))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let sample_rate = codec_params.sample_rate.unwrap_or(44100) as Tz;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| decode_error(path, format!("unsupported codec: {}", e)))?;

    let mut channels: Vec<Vec<f32>> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut native_channels = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(decode_error(path, e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                // A corrupt packet loses a few milliseconds, not the file.
                warn!(path = %path.display(), error = e, "skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(decode_error(path, e)),
        };

        let spec = *decoded.spec();
        if sample_buf.is_none() {
            native_channels = spec.channels.count();
            let out_channels = native_channels.min(2);
            channels = vec![Vec::new(); out_channels];
            sample_buf = Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
        }
        let sample_buf = sample_buf.as_mut().unwrap();
        sample_buf.copy_interleaved_ref(decoded);

        deinterleave(&mut channels, sample_buf.samples(), native_channels);
    }

    if channels.is_empty() {
        return Err(decode_error(path, "no audio data"));
    }

    info!(
        path = %path.display(),
        rate = sample_rate,
        channels = channels.len(),
        frames = channels[0].len(),
        "source loaded"
    );
    Ok(MemSource::new(channels, sample_rate))
}

/// Split interleaved samples into the channel buffers, downmixing wider
/// layouts to stereo (even source channels left, odd right, averaged).
fn deinterleave(channels: &mut [Vec<f32>], interleaved: &[f32], native_channels: usize) {
    match native_channels {
        0 => {}
        1 => channels[0].extend_from_slice(interleaved),
        2 => {
            for frame in interleaved.chunks_exact(2) {
                channels[0].push(frame[0]);
                channels[1].push(frame[1]);
            }
        }
        n => {
            let halves = (n as f32) / 2.0;
            for frame in interleaved.chunks_exact(n) {
                let (mut left, mut right) = (0.0f32, 0.0f32);
                for (i, &v) in frame.iter().enumerate() {
                    if i % 2 == 0 {
                        left += v;
                    } else {
                        right += v;
                    }
                }
                channels[0].push(left / halves);
                channels[1].push(right / halves);
            }
        }
    }
}
