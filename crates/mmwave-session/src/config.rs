use std::path::Path;
use std::time::Duration;

use mmwave_frame::DecoderConfig;

use crate::error::{Result, SessionError};

/// Default baud rate of the command (CLI) port.
pub const DEFAULT_CONFIG_BAUD: u32 = 115_200;

/// Default baud rate of the data port.
pub const DEFAULT_DATA_BAUD: u32 = 921_600;

/// Default serial read timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Default pause between acquisition iterations.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Extension a sensor configuration file must carry.
pub const CONFIG_EXTENSION: &str = "cfg";

/// The command script sent to the sensor, one command per line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigLines {
    lines: Vec<String>,
}

impl ConfigLines {
    /// Split a configuration script into lines.
    pub fn from_text(text: &str) -> Self {
        Self::from_lines(text.lines())
    }

    pub fn from_lines<I>(lines: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    /// Load a `.cfg` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let is_cfg = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(CONFIG_EXTENSION));
        if !is_cfg {
            return Err(SessionError::Config(format!(
                "{} is not a .{CONFIG_EXTENSION} file",
                path.display()
            )));
        }

        let text = std::fs::read_to_string(path).map_err(|source| SessionError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_text(&text))
    }

    /// Raw lines as loaded.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Commands to send: comments and blank lines dropped, carriage returns
    /// removed, each terminated by a single newline.
    pub fn commands(&self) -> impl Iterator<Item = String> + '_ {
        self.lines.iter().filter_map(|line| {
            let command = line.replace('\r', "");
            let command = command.trim_end_matches('\n');
            if command.trim().is_empty() || command.starts_with('%') {
                None
            } else {
                Some(format!("{command}\n"))
            }
        })
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Everything needed to bring a sensor up in one call.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub config_port: String,
    pub data_port: String,
    pub config_baud: u32,
    pub data_baud: u32,
    /// Read/write timeout of both ports.
    pub timeout: Duration,
    /// Handshake attempts before giving up (at least one is always made).
    pub max_retries: u32,
    /// Retry once with the ports exchanged when every attempt fails.
    pub autoretry_swap: bool,
    pub poll_interval: Duration,
    pub decoder: DecoderConfig,
}

impl SessionConfig {
    pub fn new(config_port: impl Into<String>, data_port: impl Into<String>) -> Self {
        Self {
            config_port: config_port.into(),
            data_port: data_port.into(),
            ..Self::default()
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            config_port: String::new(),
            data_port: String::new(),
            config_baud: DEFAULT_CONFIG_BAUD,
            data_baud: DEFAULT_DATA_BAUD,
            timeout: DEFAULT_TIMEOUT,
            max_retries: 1,
            autoretry_swap: true,
            poll_interval: DEFAULT_POLL_INTERVAL,
            decoder: DecoderConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = "% profile for people counting\r\n\
                          sensorStop\r\n\
                          \r\n\
                          flushCfg\r\n\
                          %\n\
                          channelCfg 15 7 0\n\
                          sensorStart";

    #[test]
    fn commands_skip_comments_and_blanks() {
        let cfg = ConfigLines::from_text(SCRIPT);
        let commands: Vec<String> = cfg.commands().collect();

        assert_eq!(cfg.len(), 7);
        assert_eq!(
            commands,
            vec![
                "sensorStop\n",
                "flushCfg\n",
                "channelCfg 15 7 0\n",
                "sensorStart\n"
            ]
        );
    }

    #[test]
    fn embedded_carriage_returns_removed() {
        let cfg = ConfigLines::from_lines(["frameCfg 0 1\r16 0\r\n"]);
        assert_eq!(cfg.commands().next().unwrap(), "frameCfg 0 116 0\n");
    }

    #[test]
    fn load_rejects_wrong_extension() {
        let err = ConfigLines::load("profile.txt").unwrap_err();
        assert!(matches!(err, SessionError::Config(_)));
    }

    #[test]
    fn load_reads_cfg_file() {
        let path = std::env::temp_dir().join(format!("mmwave-load-{}.cfg", std::process::id()));
        std::fs::write(&path, "sensorStop\n% comment\nsensorStart\n").unwrap();

        let cfg = ConfigLines::load(&path).unwrap();
        assert_eq!(cfg.commands().count(), 2);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn load_missing_file_reports_path() {
        let err = ConfigLines::load("/nonexistent/mmwave/profile.CFG").unwrap_err();
        assert!(matches!(err, SessionError::ConfigRead { .. }));
        assert!(err.to_string().contains("profile.CFG"));
    }

    #[test]
    fn default_session_config() {
        let cfg = SessionConfig::new("/dev/ttyUSB0", "/dev/ttyUSB1");
        assert_eq!(cfg.config_baud, 115_200);
        assert_eq!(cfg.data_baud, 921_600);
        assert_eq!(cfg.max_retries, 1);
        assert!(cfg.autoretry_swap);
        assert_eq!(cfg.poll_interval, Duration::from_millis(1));
    }
}
