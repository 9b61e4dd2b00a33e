//! ALSA PCM device wrappers shared by the capture and playback threads.

use alsa::pcm::{Access, Format, HwParams, PCM};
use alsa::{Direction, ValueOr};

use crate::error::CallError;

/// Parameters negotiated with the hardware. The call pipeline is mono
/// S16LE throughout; only rate and period can differ from the request.
#[derive(Debug, Clone)]
pub struct AlsaParams {
    pub sample_rate: u32,
    pub period_size: usize,
}

pub fn open_capture(device: &str, sample_rate: u32) -> Result<(PCM, AlsaParams), CallError> {
    open_pcm(device, Direction::Capture, sample_rate, "capture")
}

pub fn open_playback(device: &str, sample_rate: u32) -> Result<(PCM, AlsaParams), CallError> {
    open_pcm(device, Direction::Playback, sample_rate, "playback")
}

fn open_pcm(
    device: &str,
    direction: Direction,
    sample_rate: u32,
    dir_name: &str,
) -> Result<(PCM, AlsaParams), CallError> {
    let pcm = PCM::new(device, direction, false).map_err(|e| {
        CallError::DeviceUnavailable(format!("cannot open {dir_name} device '{device}': {e}"))
    })?;

    let configure = |pcm: &PCM| -> alsa::Result<AlsaParams> {
        {
            let hwp = HwParams::any(pcm)?;
            hwp.set_access(Access::RWInterleaved)?;
            hwp.set_format(Format::S16LE)?;
            hwp.set_channels(1)?;
            hwp.set_rate_near(sample_rate, ValueOr::Nearest)?;
            pcm.hw_params(&hwp)?;
        }
        let hwp = pcm.hw_params_current()?;
        Ok(AlsaParams {
            sample_rate: hwp.get_rate()?,
            period_size: hwp.get_period_size()? as usize,
        })
    };

    let params = configure(&pcm).map_err(|e| {
        CallError::DeviceUnavailable(format!(
            "cannot configure {dir_name} device '{device}': {e}"
        ))
    })?;
    ensure_exact_rate(device, dir_name, sample_rate, &params)?;

    log::info!(
        "ALSA {}: device={}, rate={}, period_size={}",
        dir_name,
        device,
        params.sample_rate,
        params.period_size,
    );

    Ok((pcm, params))
}

/// The pipeline is fixed-rate end to end with no resampler: capture blocks
/// are tagged with the requested rate and playback frames are written raw.
/// `set_rate_near` may settle on a neighboring hardware rate (typical for
/// direct `hw:` devices), and such a device must be rejected, not mislabeled
/// or pitch-shifted.
fn ensure_exact_rate(
    device: &str,
    dir_name: &str,
    requested: u32,
    params: &AlsaParams,
) -> Result<(), CallError> {
    if params.sample_rate != requested {
        return Err(CallError::DeviceUnavailable(format!(
            "{dir_name} device '{device}' negotiated {} Hz instead of {requested} Hz; \
             use a plug device (e.g. 'default' or 'plughw:...')",
            params.sample_rate
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deviating_hardware_rate_is_rejected() {
        let negotiated = AlsaParams {
            sample_rate: 22_050,
            period_size: 256,
        };
        assert!(matches!(
            ensure_exact_rate("hw:0,0", "capture", 16_000, &negotiated),
            Err(CallError::DeviceUnavailable(_))
        ));

        let exact = AlsaParams {
            sample_rate: 16_000,
            period_size: 256,
        };
        assert!(ensure_exact_rate("hw:0,0", "capture", 16_000, &exact).is_ok());
    }
}
