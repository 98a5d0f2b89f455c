// src/internal/logger/format.rs

//! `%(field)s`-style message templates, as used by the `file_format` and
//! `stream_format` options.

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

use super::record::Record;

fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| {
        Regex::new(r"%(?:(%)|\((\w+)\)([-#0 +]*)(\d+)?(?:\.(\d+))?([sdfr]))")
            .expect("static template regex")
    })
}

/// How `%(asctime)s` renders milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeStyle {
    /// `2024-01-31 12:00:00,123`
    #[default]
    Standard,
    /// `2024-01-31 12:00:00.123`
    Syslog,
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Field {
        name: String,
        left: bool,
        zero: bool,
        width: Option<usize>,
        precision: Option<usize>,
        conv: char,
        raw: String,
    },
}

enum FieldValue {
    Str(String),
    Int(i64),
    Float(f64),
}

/// A parsed template. Parsing never fails: anything that is not a
/// recognised token is kept as literal text.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(template: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut last = 0;

        for caps in token_regex().captures_iter(template) {
            let whole = caps.get(0).map(|m| (m.start(), m.end(), m.as_str()));
            let Some((start, end, raw)) = whole else {
                continue;
            };
            literal.push_str(&template[last..start]);
            last = end;

            if caps.get(1).is_some() {
                literal.push('%');
                continue;
            }

            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            let flags = caps.get(3).map(|m| m.as_str()).unwrap_or("");
            segments.push(Segment::Field {
                name: caps[2].to_string(),
                left: flags.contains('-'),
                zero: flags.contains('0'),
                width: caps.get(4).and_then(|m| m.as_str().parse().ok()),
                precision: caps.get(5).and_then(|m| m.as_str().parse().ok()),
                conv: caps[6].chars().next().unwrap_or('s'),
                raw: raw.to_string(),
            });
        }
        literal.push_str(&template[last..]);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self { segments }
    }

    pub fn render(&self, record: &Record, style: TimeStyle) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field {
                    name,
                    left,
                    zero,
                    width,
                    precision,
                    conv,
                    raw,
                } => match field_value(record, name, style) {
                    Some(value) => {
                        let text = convert(value, *conv, *precision);
                        pad_into(&mut out, &text, *width, *left, *zero && *conv != 's');
                    }
                    None => out.push_str(raw),
                },
            }
        }
        out
    }
}

fn field_value(record: &Record, name: &str, style: TimeStyle) -> Option<FieldValue> {
    let value = match name {
        "name" => FieldValue::Str(record.logger.clone()),
        "levelname" => FieldValue::Str(record.level.as_str().to_string()),
        "levelno" => FieldValue::Int(i64::from(record.level.number())),
        "message" => FieldValue::Str(record.message.clone()),
        "asctime" => FieldValue::Str(asctime(record, style)),
        "created" => FieldValue::Float(record.created.timestamp_millis() as f64 / 1000.0),
        "msecs" => FieldValue::Int(i64::from(record.created.timestamp_subsec_millis())),
        "source" => FieldValue::Str(record.source()),
        "pathname" => FieldValue::Str(record.call_site.file.clone()),
        "filename" => FieldValue::Str(
            Path::new(&record.call_site.file)
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_default(),
        ),
        "lineno" => FieldValue::Int(i64::from(record.call_site.line)),
        "process" => FieldValue::Int(i64::from(std::process::id())),
        "threadName" => FieldValue::Str(record.thread.clone().unwrap_or_default()),
        _ => return None,
    };
    Some(value)
}

fn asctime(record: &Record, style: TimeStyle) -> String {
    let sep = match style {
        TimeStyle::Standard => ',',
        TimeStyle::Syslog => '.',
    };
    format!(
        "{}{}{:03}",
        record.created.format("%Y-%m-%d %H:%M:%S"),
        sep,
        record.created.timestamp_subsec_millis()
    )
}

fn convert(value: FieldValue, conv: char, precision: Option<usize>) -> String {
    match conv {
        'd' => match value {
            FieldValue::Int(n) => n.to_string(),
            FieldValue::Float(f) => (f.trunc() as i64).to_string(),
            FieldValue::Str(s) => s,
        },
        'f' => {
            let p = precision.unwrap_or(6);
            match value {
                FieldValue::Int(n) => format!("{:.*}", p, n as f64),
                FieldValue::Float(f) => format!("{:.*}", p, f),
                FieldValue::Str(s) => s,
            }
        }
        'r' => {
            let text = match value {
                FieldValue::Str(s) => format!("{:?}", s),
                FieldValue::Int(n) => n.to_string(),
                FieldValue::Float(f) => f.to_string(),
            };
            truncate(text, precision)
        }
        _ => {
            let text = match value {
                FieldValue::Str(s) => s,
                FieldValue::Int(n) => n.to_string(),
                FieldValue::Float(f) => f.to_string(),
            };
            truncate(text, precision)
        }
    }
}

fn truncate(text: String, precision: Option<usize>) -> String {
    match precision {
        Some(p) if text.chars().count() > p => text.chars().take(p).collect(),
        _ => text,
    }
}

fn pad_into(out: &mut String, text: &str, width: Option<usize>, left: bool, zero: bool) {
    let len = text.chars().count();
    let fill = width.map(|w| w.saturating_sub(len)).unwrap_or(0);
    let pad = if zero && !left { '0' } else { ' ' };
    if left {
        out.push_str(text);
        out.extend(std::iter::repeat(' ').take(fill));
    } else {
        out.extend(std::iter::repeat(pad).take(fill));
        out.push_str(text);
    }
}

/// A template bound to a timestamp style.
#[derive(Debug, Clone)]
pub struct Formatter {
    template: Template,
    time_style: TimeStyle,
}

impl Formatter {
    pub fn new(template: &str) -> Self {
        Self {
            template: Template::parse(template),
            time_style: TimeStyle::Standard,
        }
    }

    pub fn with_time_style(mut self, style: TimeStyle) -> Self {
        self.time_style = style;
        self
    }

    /// Renders one record; a traceback, if any, follows on its own lines.
    pub fn format(&self, record: &Record) -> String {
        let mut line = self.template.render(record, self.time_style);
        if let Some(traceback) = &record.traceback {
            let traceback = traceback.trim_end();
            if !traceback.is_empty() {
                line.push('\n');
                line.push_str(traceback);
            }
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::internal::logger::level::Level;
    use crate::internal::logger::record::CallSite;
    use chrono::{Local, TimeZone};

    fn record(level: Level, message: &str) -> Record {
        let mut record = Record::new(level, "cfme", message, CallSite::new("cfme/tests/test_cli.rs", 42));
        record.created = Local.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap()
            + chrono::Duration::milliseconds(45);
        record
    }

    #[test]
    fn test_default_file_format() {
        let formatter = Formatter::new("%(asctime)-15s [%(levelname).1s] %(message)s (%(source)s)");
        assert_eq!(
            formatter.format(&record(Level::Warning, "disk low")),
            "2024-03-05 07:08:09,045 [W] disk low (cfme/tests/test_cli.rs:42)"
        );
    }

    #[test]
    fn test_syslog_time_style_uses_dot() {
        let formatter = Formatter::new("%(asctime)s [abcd1234] %(message)s")
            .with_time_style(TimeStyle::Syslog);
        assert_eq!(
            formatter.format(&record(Level::Info, "hello")),
            "2024-03-05 07:08:09.045 [abcd1234] hello"
        );
    }

    #[test]
    fn test_width_precision_and_escapes() {
        let t = Template::parse("%(levelname)-8s|%(levelno)5d|%(msecs)03d|100%%");
        assert_eq!(
            t.render(&record(Level::Info, "x"), TimeStyle::Standard),
            "INFO    |   20|045|100%"
        );
    }

    #[test]
    fn test_unknown_fields_stay_literal() {
        let t = Template::parse("%(bogus)s %(message)s %z");
        assert_eq!(
            t.render(&record(Level::Info, "m"), TimeStyle::Standard),
            "%(bogus)s m %z"
        );
    }

    #[test]
    fn test_traceback_follows_message() {
        let formatter = Formatter::new("[%(levelname)s] %(message)s");
        let rec = record(Level::Error, "boom").with_traceback("caused by: io\n");
        assert_eq!(formatter.format(&rec), "[ERROR] boom\ncaused by: io");
    }
}
