use mmwave_frame::{DecoderConfig, FrameReader};
use mmwave_transport::MemorySource;
use tracing::info;

use crate::cmd::DecodeArgs;
use crate::exit::{decode_error, io_error, CliResult, SUCCESS};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let context = format!("failed to read {}", args.capture.display());
    let data = std::fs::read(&args.capture).map_err(|err| io_error(&context, err))?;

    let mut config = DecoderConfig {
        mount: args.mount.to_mount(),
        ..DecoderConfig::default()
    };
    if let Some(max) = args.max_packet_len {
        config.max_packet_len = max;
    }

    let name = args.capture.display().to_string();
    let mut reader = FrameReader::with_config(MemorySource::from_bytes(name, data), config);
    let mut printed = 0usize;

    while let Some(frame) = reader
        .next_frame()
        .map_err(|err| decode_error("decode failed", err))?
    {
        print_frame(&frame, None, format);
        printed = printed.saturating_add(1);
        if args.count.is_some_and(|count| printed >= count) {
            break;
        }
    }

    info!(frames = printed, dropped = reader.dropped(), "capture decoded");
    Ok(SUCCESS)
}
