//! File appender with size and date based rotation
//!
//! A size threshold rolls `app.log` to `app.log.1`, shifting older backups
//! up and dropping the ones beyond the configured count. A date pattern
//! renames the finished file to `app.log<formatted date>` when the
//! formatted value changes, keeping the newest dated files.

use crate::core::appender::Appender;
use crate::core::destination::{Destination, RotationThreshold, WriterSpec};
use crate::core::error::{ConfigError, Result};
use crate::core::log_record::LogRecord;
use chrono::{DateTime, Local};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Convert a `SimpleDateFormat`-style pattern (`'.'yyyy-MM-dd`) into a
/// chrono format string
///
/// # Example
///
/// ```
/// use log_config_manager::appenders::file::date_pattern_to_chrono;
///
/// assert_eq!(date_pattern_to_chrono("'.'yyyy-MM-dd"), ".%Y-%m-%d");
/// assert_eq!(date_pattern_to_chrono("'.'yyyy-MM-dd-HH"), ".%Y-%m-%d-%H");
/// ```
pub fn date_pattern_to_chrono(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '\'' {
            // quoted literal, '' is an escaped quote
            if chars.get(i + 1) == Some(&'\'') {
                out.push('\'');
                i += 2;
                continue;
            }
            i += 1;
            while i < chars.len() {
                if chars[i] == '\'' {
                    if chars.get(i + 1) == Some(&'\'') {
                        out.push('\'');
                        i += 2;
                        continue;
                    }
                    break;
                }
                push_literal(&mut out, chars[i]);
                i += 1;
            }
            i += 1;
            continue;
        }

        if c.is_ascii_alphabetic() {
            let run = chars[i..].iter().take_while(|&&x| x == c).count();
            out.push_str(match (c, run) {
                ('y', 2) => "%y",
                ('y', _) => "%Y",
                ('M', 1) | ('M', 2) => "%m",
                ('M', 3) => "%b",
                ('M', _) => "%B",
                ('d', _) => "%d",
                ('H', _) => "%H",
                ('h', _) => "%I",
                ('m', _) => "%M",
                ('s', _) => "%S",
                ('S', _) => "%3f",
                ('a', _) => "%p",
                ('E', 1..=3) => "%a",
                ('E', _) => "%A",
                ('D', _) => "%j",
                ('w', _) => "%V",
                _ => "",
            });
            i += run;
            continue;
        }

        push_literal(&mut out, c);
        i += 1;
    }
    out
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}

enum Rotation {
    Size { max_bytes: u64 },
    Date { format: String, period: String },
}

pub struct FileAppender {
    path: PathBuf,
    max_files: usize,
    rotation: Rotation,
    writer: Option<BufWriter<File>>,
    current_size: u64,
    name: String,
}

impl FileAppender {
    /// Open (or create) `path` for appending, creating parent directories
    ///
    /// # Errors
    ///
    /// Returns an IO error when the directory or the file cannot be created
    pub fn new(path: impl Into<PathBuf>, max_files: usize, threshold: &RotationThreshold) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ConfigError::io(format!("creating log directory '{}'", parent.display()), e)
            })?;
        }

        let file = Self::open(&path)?;
        let metadata = file
            .metadata()
            .map_err(|e| ConfigError::io(format!("reading metadata of '{}'", path.display()), e))?;

        let rotation = match threshold {
            RotationThreshold::Size { max_bytes } => Rotation::Size {
                max_bytes: *max_bytes,
            },
            RotationThreshold::DatePattern(pattern) => {
                let format = date_pattern_to_chrono(pattern);
                // a file left over from an earlier period rolls on first write
                let modified: DateTime<Local> = metadata
                    .modified()
                    .map(DateTime::from)
                    .unwrap_or_else(|_| Local::now());
                let period = modified.format(&format).to_string();
                Rotation::Date { format, period }
            }
        };

        Ok(Self {
            name: format!("file:{}", path.display()),
            path,
            max_files,
            rotation,
            writer: Some(BufWriter::new(file)),
            current_size: metadata.len(),
        })
    }

    pub fn from_spec(spec: &WriterSpec) -> Result<Self> {
        match &spec.destination {
            Destination::File(path) => Self::new(path, spec.max_files, &spec.rotation),
            Destination::Console => Err(ConfigError::appender(
                spec.destination.to_string(),
                "file appender needs a file destination",
            )),
        }
    }

    fn open(path: &Path) -> Result<File> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| ConfigError::io(format!("opening '{}'", path.display()), e))
    }

    /// Suffix of the dated file to roll into, if the period has changed
    fn pending_period(&self) -> Option<(String, String)> {
        match &self.rotation {
            Rotation::Size { max_bytes } => {
                if self.current_size >= *max_bytes {
                    Some((String::new(), String::new()))
                } else {
                    None
                }
            }
            Rotation::Date { format, period } => {
                let now = Local::now().format(format).to_string();
                if &now != period {
                    Some((period.clone(), now))
                } else {
                    None
                }
            }
        }
    }

    fn close_writer(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .flush()
                .map_err(|e| ConfigError::io(format!("flushing '{}'", self.path.display()), e))?;
        }
        Ok(())
    }

    fn reopen(&mut self) -> Result<()> {
        self.writer = Some(BufWriter::new(Self::open(&self.path)?));
        self.current_size = 0;
        Ok(())
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        self.suffixed_path(&format!(".{}", index))
    }

    fn suffixed_path(&self, suffix: &str) -> PathBuf {
        let mut path = self.path.clone();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("app.log")
            .to_string();
        path.set_file_name(format!("{}{}", file_name, suffix));
        path
    }

    fn rotate_by_size(&mut self) -> Result<()> {
        self.close_writer()?;

        if self.max_files == 0 {
            if self.path.exists() {
                fs::remove_file(&self.path)
                    .map_err(|e| ConfigError::io(format!("truncating '{}'", self.path.display()), e))?;
            }
            return self.reopen();
        }

        let oldest = self.backup_path(self.max_files);
        if oldest.exists() {
            if let Err(e) = fs::remove_file(&oldest) {
                tracing::warn!(path = %oldest.display(), error = %e, "cannot remove oldest backup");
            }
        }
        for index in (1..self.max_files).rev() {
            let from = self.backup_path(index);
            if from.exists() {
                let to = self.backup_path(index + 1);
                fs::rename(&from, &to)
                    .map_err(|e| ConfigError::io(format!("shifting backup '{}'", from.display()), e))?;
            }
        }
        if self.path.exists() {
            let first = self.backup_path(1);
            fs::rename(&self.path, &first)
                .map_err(|e| ConfigError::io(format!("rolling '{}'", self.path.display()), e))?;
        }
        self.reopen()
    }

    fn rotate_by_date(&mut self, finished: &str, next: String) -> Result<()> {
        self.close_writer()?;

        let target = self.suffixed_path(finished);
        if self.path.exists() && !target.exists() {
            fs::rename(&self.path, &target)
                .map_err(|e| ConfigError::io(format!("rolling '{}'", self.path.display()), e))?;
        }
        if let Rotation::Date { period, .. } = &mut self.rotation {
            *period = next;
        }
        self.prune_dated();
        self.reopen()
    }

    /// Keep only the newest `max_files` dated files
    fn prune_dated(&self) {
        let (Some(dir), Some(base)) = (
            self.path.parent(),
            self.path.file_name().and_then(|n| n.to_str()),
        ) else {
            return;
        };
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };

        let mut dated: Vec<(std::time::SystemTime, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.len() > base.len() && name.starts_with(base))
            })
            .filter_map(|entry| {
                let modified = entry.metadata().and_then(|m| m.modified()).ok()?;
                Some((modified, entry.path()))
            })
            .collect();

        if dated.len() <= self.max_files {
            return;
        }
        dated.sort();
        let excess = dated.len() - self.max_files;
        for (_, path) in dated.into_iter().take(excess) {
            if let Err(e) = fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %e, "cannot remove dated log file");
            }
        }
    }
}

impl Appender for FileAppender {
    fn append(&mut self, record: &LogRecord) -> Result<()> {
        if let Some((finished, next)) = self.pending_period() {
            match self.rotation {
                Rotation::Size { .. } => self.rotate_by_size()?,
                Rotation::Date { .. } => self.rotate_by_date(&finished, next)?,
            }
        }

        let line = record.to_line();
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| ConfigError::appender(self.path.display().to_string(), "file closed"))?;
        writer
            .write_all(line.as_bytes())
            .map_err(|e| ConfigError::io(format!("writing '{}'", self.path.display()), e))?;
        self.current_size += line.len() as u64;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer
                .flush()
                .map_err(|e| ConfigError::io(format!("flushing '{}'", self.path.display()), e))?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn close(&mut self) -> Result<()> {
        self.close_writer()
    }
}

impl Drop for FileAppender {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
