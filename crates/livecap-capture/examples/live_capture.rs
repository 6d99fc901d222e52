//! Run a short live capture session against the platform devices and print
//! what comes out.
//!
//! ```sh
//! cargo run --example live_capture
//! ```

use livecap_capture::{
    check_permissions, create_capture_session, get_audio_devices, init, request_permissions,
    AudioFormat, CaptureConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let capabilities = init();
    println!(
        "platform: {} ({}), system audio: {}",
        capabilities.platform, capabilities.system_version, capabilities.audio.system_audio
    );

    println!("\naudio devices:");
    for device in get_audio_devices() {
        println!(
            "  [{:?}] {} {}",
            device.device_type,
            device.name,
            if device.is_default { "(default)" } else { "" }
        );
    }

    println!("\npermissions before request: {:?}", check_permissions().await);
    let permissions = request_permissions().await;
    println!("permissions after request:  {permissions:?}");

    let mut config = CaptureConfig::default();
    config.audio.system_audio = false;
    config.audio.sample_rate = 48000;
    config.audio.segment_duration_ms = 1000;
    config.audio.format = AudioFormat::Wav;

    let session = create_capture_session(config)?;
    println!("\nsession {} created, capturing 5 seconds...", session.id());

    let mut stream = session.start().await?;

    let capture = async {
        let mut received = 0;
        while let Some(item) = stream.next_segment().await {
            match item {
                Ok(segment) => {
                    received += 1;
                    println!(
                        "  segment {}: {} ms @ {} ms, {} bytes ({:?})",
                        segment.sequence,
                        segment.duration_ms,
                        segment.start_ms,
                        segment.data.len(),
                        segment.source,
                    );
                }
                Err(err) => eprintln!("  stream error: {err}"),
            }
            if received >= 5 {
                break;
            }
        }
    };

    tokio::select! {
        _ = capture => {}
        _ = tokio::time::sleep(std::time::Duration::from_secs(8)) => {
            eprintln!("timed out waiting for segments");
        }
    }

    session.stop().await?;
    println!("session stopped ({})", session.status());

    Ok(())
}
