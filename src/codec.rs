use anyhow::{Result, anyhow};
use log::warn;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{
    CODEC_TYPE_MP1, CODEC_TYPE_MP2, CODEC_TYPE_MP3, CodecParameters, CodecType, DecoderOptions,
};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::Packet;

use mpa::process::decode::Decoder;
use mpa::structs::header::{FrameHeader, Layer};

fn codec_type(layer: Layer) -> CodecType {
    match layer {
        Layer::Layer1 => CODEC_TYPE_MP1,
        Layer::Layer2 => CODEC_TYPE_MP2,
        Layer::Layer3 => CODEC_TYPE_MP3,
    }
}

/// Frame decoder backed by symphonia, producing 16-bit little-endian
/// interleaved PCM.
///
/// The codec is created from the first frame it sees, so one instance serves
/// any layer.
#[derive(Default)]
pub struct SymphoniaDecoder {
    inner: Option<Box<dyn symphonia::core::codecs::Decoder>>,
    layer: Option<Layer>,
    packets: u64,
    concealed: u64,
}

impl SymphoniaDecoder {
    /// Frames replaced with silence after a decode error.
    pub fn concealed(&self) -> u64 {
        self.concealed
    }

    /// Creates the codec on first use, or again when the layer changes.
    fn prepare(&mut self, header: &FrameHeader) -> Result<()> {
        if self.inner.is_some() && self.layer == Some(header.layer) {
            return Ok(());
        }

        let mut params = CodecParameters::new();
        params
            .for_codec(codec_type(header.layer))
            .with_sample_rate(header.sample_rate);

        let codec = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| anyhow!("Failed to create {} decoder: {e}", header.layer))?;

        self.inner = Some(codec);
        self.layer = Some(header.layer);
        Ok(())
    }
}

impl Decoder for SymphoniaDecoder {
    fn convert(&mut self, frame: &[u8], out: &mut [u8]) -> Result<usize> {
        let header_bytes: [u8; 4] = frame
            .get(..4)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| anyhow!("Frame shorter than its header"))?;
        let header = FrameHeader::parse(header_bytes)?;

        // Output size symphonia would produce for this frame. Used as
        // silence when the frame cannot be decoded so positions stay aligned
        // with the index.
        let frame_bytes = header.samples_per_frame as usize * header.channels() * 2;

        let ts = self.packets;
        self.packets += header.samples_per_frame as u64;
        let packet = Packet::new_from_slice(0, ts, header.samples_per_frame as u64, frame);

        self.prepare(&header)?;
        let Some(codec) = self.inner.as_mut() else {
            anyhow::bail!("No decoder for {}", header.layer);
        };
        let decoded = match codec.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("Frame at sample {ts} could not be decoded: {e}");
                self.concealed += 1;
                let n = frame_bytes.min(out.len());
                out[..n].fill(0);
                return Ok(n);
            }
            Err(e) => return Err(anyhow!("Decoder failure: {e}")),
        };

        let mut samples = SampleBuffer::<i16>::new(decoded.capacity() as u64, *decoded.spec());
        samples.copy_interleaved_ref(decoded);

        let pcm = samples.samples();
        if pcm.len() * 2 > out.len() {
            anyhow::bail!(
                "Decoded {} samples do not fit a {} byte buffer",
                pcm.len(),
                out.len()
            );
        }

        for (dst, sample) in out.chunks_exact_mut(2).zip(pcm) {
            dst.copy_from_slice(&sample.to_le_bytes());
        }

        Ok(pcm.len() * 2)
    }

    fn reset(&mut self) {
        if let Some(codec) = self.inner.as_mut() {
            codec.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_selects_codec() {
        assert_eq!(codec_type(Layer::Layer1), CODEC_TYPE_MP1);
        assert_eq!(codec_type(Layer::Layer2), CODEC_TYPE_MP2);
        assert_eq!(codec_type(Layer::Layer3), CODEC_TYPE_MP3);
    }

    #[test]
    fn rejects_truncated_frame() {
        let mut decoder = SymphoniaDecoder::default();
        let mut out = vec![0u8; 8192];
        assert!(decoder.convert(&[0xFF, 0xFB], &mut out).is_err());
        assert!(decoder.convert(&[0x00, 0x00, 0x00, 0x00], &mut out).is_err());
    }
}
