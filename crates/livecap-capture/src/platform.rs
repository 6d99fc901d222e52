//! Platform capability detection for the `init()` boundary call.

use crate::{devices, permissions, source};
use cpal::traits::HostTrait;
use livecap_types::{
    AudioCapabilities, AudioFormat, Platform, PlatformCapabilities, ScreenCapabilities,
};

/// Snapshot of what this machine can capture. Side-effect free.
pub fn get_platform_capabilities() -> PlatformCapabilities {
    let host = cpal::default_host();

    let input_devices = host.input_devices().map(|d| d.count()).unwrap_or(0);
    let output_devices = host.output_devices().map(|d| d.count()).unwrap_or(0);

    let audio = AudioCapabilities {
        system_audio: source::system_audio_available(),
        microphone: input_devices > 0,
        sample_rates: vec![16000, 24000, 44100, 48000, 96000],
        formats: vec![
            AudioFormat::Aac,
            AudioFormat::Mp3,
            AudioFormat::Wav,
            AudioFormat::Raw,
        ],
        input_devices,
        output_devices,
    };

    let displays = devices::list_displays();
    let screen = ScreenCapabilities {
        supported: !displays.is_empty(),
        display_count: displays.len(),
        window_capture: !displays.is_empty(),
        frame_rates: vec![15, 30, 60],
    };

    PlatformCapabilities {
        platform: detect_platform(),
        audio,
        screen,
        system_version: system_version(),
        permissions: permissions::probe_status(),
    }
}

fn detect_platform() -> Platform {
    #[cfg(target_os = "macos")]
    return Platform::MacOs;

    #[cfg(target_os = "windows")]
    return Platform::Windows;

    #[cfg(target_os = "linux")]
    return Platform::Linux;

    #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
    return Platform::Unknown;
}

fn system_version() -> String {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("sw_vers")
            .arg("-productVersion")
            .output()
            .ok()
            .and_then(|output| String::from_utf8(output.stdout).ok())
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    #[cfg(target_os = "windows")]
    {
        "Windows".to_string()
    }

    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/etc/os-release")
            .ok()
            .and_then(|content| {
                content
                    .lines()
                    .find(|line| line.starts_with("PRETTY_NAME="))
                    .map(|line| {
                        line.split('=')
                            .nth(1)
                            .unwrap_or("Unknown")
                            .trim_matches('"')
                            .to_string()
                    })
            })
            .unwrap_or_else(|| "Linux".to_string())
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
    {
        "Unknown".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capabilities_report_current_platform() {
        let caps = get_platform_capabilities();
        #[cfg(target_os = "linux")]
        assert_eq!(caps.platform, Platform::Linux);
        assert!(!caps.system_version.is_empty());
        assert!(caps.audio.formats.contains(&AudioFormat::Wav));
    }
}
