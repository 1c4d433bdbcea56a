// WAV export of captured utterances, for offline inspection of what the
// STT backends actually received.

use std::path::{Path, PathBuf};

use chrono::Local;

/// Write one utterance as 16-bit mono WAV into `dir`, named with the
/// local capture time. Returns the path written.
pub fn write_utterance(
    dir: &Path,
    samples: &[i16],
    sample_rate: u32,
) -> Result<PathBuf, hound::Error> {
    std::fs::create_dir_all(dir)?;
    let name = format!("utterance-{}.wav", Local::now().format("%Y%m%d-%H%M%S%.3f"));
    let path = dir.join(name);

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(path)
}
