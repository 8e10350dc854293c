use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use crate::types::*;

// Seconds are written with at most this many significant digits
const SIGNIFICANT_DIGITS: i32 = 12;

/// Output target of a set of onset rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// `Emo<run>_GameStim.txt`, one row per run
    GameStim(Run),
    /// `Emo<run>_<code>.txt`, where code is the condition's first letter
    Condition(Run, Condition),
}

impl Channel {
    /// File name of the channel, without the output prefix
    pub fn file_name(&self) -> String {
        match self {
            Channel::GameStim(run) => format!("Emo{}_GameStim.txt", run.number()),
            Channel::Condition(run, condition) => {
                format!("Emo{}_{}.txt", run.number(), condition.code())
            }
        }
    }
}

/// Writes onset rows to files named from an output prefix.
///
/// Each call to [`OnsetEmitter::emit`] opens, writes and closes its file.
/// Whether the file is truncated first depends on the channel: game stimulus
/// channels always overwrite, condition channels follow the configured
/// [`ChannelPolicies`].
#[derive(Debug, Clone)]
pub struct OnsetEmitter {
    output_prefix: String,
    policies: ChannelPolicies,
}

impl OnsetEmitter {
    /// # Arguments
    ///
    /// * `output_prefix` - Prepended verbatim to every file name, so it may
    ///   end in a directory separator or in a file name stem
    /// * `policies` - Overwrite or append policy per condition
    pub fn new<S: Into<String>>(output_prefix: S, policies: ChannelPolicies) -> Self {
        OnsetEmitter {
            output_prefix: output_prefix.into(),
            policies,
        }
    }

    pub fn channel_path(&self, channel: Channel) -> PathBuf {
        PathBuf::from(format!("{}{}", self.output_prefix, channel.file_name()))
    }

    pub fn policy(&self, channel: Channel) -> ChannelPolicy {
        match channel {
            Channel::GameStim(_) => ChannelPolicy::Overwrite,
            Channel::Condition(_, condition) => self.policies.policy_for(condition),
        }
    }

    /// Writes `rows` to the channel's file and returns its path
    pub fn emit(&self, channel: Channel, rows: &[OnsetRow]) -> Result<PathBuf, EmoError> {
        let path = self.channel_path(channel);
        let policy = self.policy(channel);

        let write = || -> io::Result<()> {
            let file = match policy {
                ChannelPolicy::Overwrite => OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(&path)?,
                ChannelPolicy::Append => OpenOptions::new().create(true).append(true).open(&path)?,
            };
            let mut writer = BufWriter::new(file);
            write_rows(&mut writer, rows)?;
            writer.flush()
        };

        write().map_err(|source| EmoError::ChannelWrite {
            channel: path.display().to_string(),
            source,
        })?;

        tracing::debug!(
            path = %path.display(),
            rows = rows.len(),
            policy = ?policy,
            "Wrote onset channel"
        );

        Ok(path)
    }
}

/// Writes rows as space-delimited `onset duration weight` lines
pub fn write_rows<W: Write>(writer: &mut W, rows: &[OnsetRow]) -> io::Result<()> {
    for row in rows {
        writeln!(
            writer,
            "{} {} {}",
            format_seconds(row.onset),
            format_seconds(row.duration),
            row.weight
        )?;
    }
    Ok(())
}

/// Formats seconds with up to 12 significant digits.
///
/// Trailing zeros are dropped but integral values keep one decimal, so
/// `10.0` prints as `10.0` and `4.778000000000001` as `4.778`. Very small
/// or very large values use a signed two-digit exponent (`1.23e-05`).
pub fn format_seconds(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        let text = if value > 0.0 { "inf" } else { "-inf" };
        return text.to_string();
    }
    if value == 0.0 {
        return "0.0".to_string();
    }

    // Exponent after rounding to the significant digits
    let scientific = format!("{:.*e}", (SIGNIFICANT_DIGITS - 1) as usize, value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };

    if !(-4..SIGNIFICANT_DIGITS).contains(&exponent) {
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!(
            "{}e{}{:02}",
            trim_fraction(mantissa),
            sign,
            exponent.abs()
        );
    }

    let decimals = (SIGNIFICANT_DIGITS - 1 - exponent).max(0) as usize;
    let mut text = trim_fraction(&format!("{:.*}", decimals, value)).to_string();
    if !text.contains('.') {
        text.push_str(".0");
    }
    text
}

/// Drops trailing fractional zeros and a dangling decimal point
fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}
