use std::sync::Arc;

use mmwave_frame::DecoderConfig;
use mmwave_session::{ConfigLines, SensorSession, SessionConfig};
use tracing::info;

use crate::cmd::{parse_duration, StreamArgs};
use crate::exit::{io_error, session_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: StreamArgs, format: OutputFormat) -> CliResult<i32> {
    let lines =
        ConfigLines::load(&args.cfg).map_err(|err| session_error("invalid config", err))?;

    let config = SessionConfig {
        config_baud: args.config_baud,
        data_baud: args.data_baud,
        timeout: parse_duration(&args.timeout)?,
        max_retries: args.max_retries,
        autoretry_swap: !args.no_swap,
        decoder: DecoderConfig {
            mount: args.mount.to_mount(),
            ..DecoderConfig::default()
        },
        ..SessionConfig::new(args.config_port, args.data_port)
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("runtime setup failed", err))?;

    runtime.block_on(stream(config, lines, args.count, format))
}

async fn stream(
    config: SessionConfig,
    lines: ConfigLines,
    count: Option<usize>,
    format: OutputFormat,
) -> CliResult<i32> {
    let (session, report) = SensorSession::open(&config, &lines)
        .map_err(|err| session_error("sensor setup failed", err))?;
    info!(
        attempts = report.attempts,
        swapped = report.swapped,
        "sensor ready"
    );

    let session = Arc::new(session);
    let mut acquisition = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.start_sensor().await }
    });

    let mut printed = 0usize;
    let result = loop {
        tokio::select! {
            frame = session.get_data() => {
                print_frame(&frame, Some(session.update_freq()), format);
                printed = printed.saturating_add(1);
                if count.is_some_and(|count| printed >= count) {
                    break Ok(SUCCESS);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break Ok(SUCCESS);
            }
            joined = &mut acquisition => {
                break match joined {
                    Ok(Ok(())) => Ok(SUCCESS),
                    Ok(Err(err)) => Err(session_error("acquisition failed", err)),
                    Err(err) => Err(CliError::new(
                        INTERNAL,
                        format!("acquisition task failed: {err}"),
                    )),
                };
            }
        }
    };

    session.stop_sensor(true);
    info!(frames = printed, "{session}");
    result
}
