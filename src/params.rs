//! Export configuration and command-line parsing.

use crate::error::{ExportError, Result};
use crate::quantity::NumberLocale;
use crate::token_writer::separator_byte;
use chrono::{FixedOffset, Offset, Utc};
use std::path::PathBuf;

/// Parameters of one CSV transactions export.
#[derive(Debug, Clone)]
pub struct ExportParams {
    /// File the export is written to.
    pub output_path: PathBuf,

    /// Field separator.
    pub separator: char,

    /// Conventions for the locale-formatted amount and rate columns.
    pub locale: NumberLocale,

    /// Offset used to turn timestamps into calendar dates.
    pub utc_offset: FixedOffset,

    /// Export every transaction regardless of the checkpoint.
    pub export_all: bool,
}

impl ExportParams {
    pub const DEFAULT_SEPARATOR: char = ',';

    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        ExportParams {
            output_path: output_path.into(),
            separator: Self::DEFAULT_SEPARATOR,
            locale: NumberLocale::default(),
            utc_offset: Utc.fix(),
            export_all: false,
        }
    }

    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    pub fn with_locale(mut self, locale: NumberLocale) -> Self {
        self.locale = locale;
        self
    }

    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = offset;
        self
    }

    pub fn with_export_all(mut self, export_all: bool) -> Self {
        self.export_all = export_all;
        self
    }
}

/// Everything the binary needs for one invocation.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub accounts_path: PathBuf,
    pub splits_path: PathBuf,
    pub checkpoint_path: PathBuf,
    pub params: ExportParams,
}

impl CliConfig {
    /// Parses arguments, excluding the program name.
    ///
    /// ```text
    /// <accounts.csv> <splits.csv> <output.csv> [--separator C] [--checkpoint FILE]
    ///     [--all] [--decimal-comma] [--utc-offset +HH:MM]
    /// ```
    pub fn from_args<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut positional = Vec::new();
        let mut separator = ExportParams::DEFAULT_SEPARATOR;
        let mut checkpoint_path = None;
        let mut export_all = false;
        let mut locale = NumberLocale::default();
        let mut utc_offset = None;

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--separator" => {
                    let value = args.next().ok_or(ExportError::MissingArgument)?;
                    separator = parse_separator(&value)?;
                }
                "--checkpoint" => {
                    let value = args.next().ok_or(ExportError::MissingArgument)?;
                    checkpoint_path = Some(PathBuf::from(value));
                }
                "--all" => export_all = true,
                "--decimal-comma" => locale = NumberLocale::DECIMAL_COMMA,
                "--utc-offset" => {
                    let value = args.next().ok_or(ExportError::MissingArgument)?;
                    utc_offset = Some(parse_offset(&value)?);
                }
                flag if flag.starts_with("--") => {
                    return Err(ExportError::UnknownOption(flag.to_string()))
                }
                _ => positional.push(PathBuf::from(&arg)),
            }
        }

        let mut positional = positional.into_iter();
        let (accounts_path, splits_path, output_path) =
            match (positional.next(), positional.next(), positional.next()) {
                (Some(a), Some(s), Some(o)) => (a, s, o),
                _ => return Err(ExportError::MissingArgument),
            };
        if let Some(extra) = positional.next() {
            return Err(ExportError::UnknownOption(extra.display().to_string()));
        }

        let checkpoint_path = checkpoint_path.unwrap_or_else(|| {
            let mut name = output_path.clone().into_os_string();
            name.push(".checkpoint");
            PathBuf::from(name)
        });

        let mut params = ExportParams::new(output_path)
            .with_separator(separator)
            .with_locale(locale)
            .with_export_all(export_all);
        if let Some(offset) = utc_offset {
            params = params.with_utc_offset(offset);
        }

        Ok(CliConfig {
            accounts_path,
            splits_path,
            checkpoint_path,
            params,
        })
    }
}

/// Accepts a single character or the names `tab`, `comma`, `semicolon`.
fn parse_separator(value: &str) -> Result<char> {
    let separator = match value {
        "tab" | "\\t" => '\t',
        "comma" => ',',
        "semicolon" => ';',
        other => {
            let mut chars = other.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => c,
                _ => return Err(ExportError::UnknownOption(format!("--separator {}", value))),
            }
        }
    };
    separator_byte(separator)?;
    Ok(separator)
}

/// Parses `+HH:MM`, `-HH:MM` or `Z`.
fn parse_offset(value: &str) -> Result<FixedOffset> {
    let bad = || ExportError::UnknownOption(format!("--utc-offset {}", value));
    if value == "Z" {
        return Ok(Utc.fix());
    }

    let (sign, rest) = if let Some(rest) = value.strip_prefix('+') {
        (1, rest)
    } else if let Some(rest) = value.strip_prefix('-') {
        (-1, rest)
    } else {
        return Err(bad());
    };
    let (hours, minutes) = rest.split_once(':').ok_or_else(bad)?;
    let hours: i32 = hours.parse().map_err(|_| bad())?;
    let minutes: i32 = minutes.parse().map_err(|_| bad())?;
    if minutes >= 60 {
        return Err(bad());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(bad)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_defaults() {
        let config = CliConfig::from_args(args(&["a.csv", "s.csv", "out.csv"])).unwrap();
        assert_eq!(config.accounts_path, PathBuf::from("a.csv"));
        assert_eq!(config.splits_path, PathBuf::from("s.csv"));
        assert_eq!(config.params.output_path, PathBuf::from("out.csv"));
        assert_eq!(config.checkpoint_path, PathBuf::from("out.csv.checkpoint"));
        assert_eq!(config.params.separator, ',');
        assert_eq!(config.params.locale, NumberLocale::POSIX);
        assert_eq!(config.params.utc_offset.local_minus_utc(), 0);
        assert!(!config.params.export_all);
    }

    #[test]
    fn test_all_options() {
        let config = CliConfig::from_args(args(&[
            "--separator",
            "semicolon",
            "a.csv",
            "--all",
            "s.csv",
            "--decimal-comma",
            "out.csv",
            "--checkpoint",
            "state/last",
            "--utc-offset",
            "-03:30",
        ]))
        .unwrap();
        assert_eq!(config.params.separator, ';');
        assert!(config.params.export_all);
        assert_eq!(config.params.locale, NumberLocale::DECIMAL_COMMA);
        assert_eq!(config.checkpoint_path, PathBuf::from("state/last"));
        assert_eq!(config.params.utc_offset.local_minus_utc(), -(3 * 3600 + 30 * 60));
    }

    #[test]
    fn test_missing_positional() {
        assert!(matches!(
            CliConfig::from_args(args(&["a.csv", "s.csv"])),
            Err(ExportError::MissingArgument)
        ));
        assert!(matches!(
            CliConfig::from_args(args(&["a.csv", "s.csv", "o.csv", "--separator"])),
            Err(ExportError::MissingArgument)
        ));
    }

    #[test]
    fn test_rejects_unknown_flag_and_extra_argument() {
        assert!(matches!(
            CliConfig::from_args(args(&["a", "s", "o", "--zip"])),
            Err(ExportError::UnknownOption(flag)) if flag == "--zip"
        ));
        assert!(CliConfig::from_args(args(&["a", "s", "o", "extra"])).is_err());
    }

    #[test]
    fn test_separator_forms() {
        assert_eq!(parse_separator("tab").unwrap(), '\t');
        assert_eq!(parse_separator("|").unwrap(), '|');
        assert!(parse_separator("\"").is_err());
        assert!(parse_separator(";;").is_err());
    }

    #[test]
    fn test_offsets() {
        assert_eq!(parse_offset("Z").unwrap().local_minus_utc(), 0);
        assert_eq!(parse_offset("+05:45").unwrap().local_minus_utc(), 5 * 3600 + 45 * 60);
        assert!(parse_offset("05:00").is_err());
        assert!(parse_offset("+5").is_err());
        assert!(parse_offset("+01:75").is_err());
    }
}
