//! Template parsing and rendering.
//!
//! Templates use brace placeholders:
//!
//! - `{name}` or `{name:spec}` substitutes the resolved value of field `name`;
//!   `spec` is `[[fill]align][0][width]` with `<`, `>` or `^` alignment
//! - `{0}` or `{}` substitutes the render-time local timestamp; `{0:%H:%M}`
//!   formats it with a strftime string
//! - `{{` and `}}` are literal braces
//!
//! Templates are compiled against the pattern's [`FieldSet`] so a placeholder
//! naming a missing field is rejected at validation time.

use chrono::{DateTime, Local};
use rand::Rng;

use crate::error::GeneratorError;
use crate::field::FieldSet;
use crate::producers::{validate_strftime, Value};

/// Rendering of `{0}` when no format spec is given.
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
    Center,
}

/// Parsed `[[fill]align][0][width]` format spec.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FormatSpec {
    fill: char,
    align: Option<Align>,
    width: usize,
}

impl FormatSpec {
    fn parse(spec: &str) -> Option<Self> {
        let chars: Vec<char> = spec.chars().collect();
        let align_of = |c: char| match c {
            '<' => Some(Align::Left),
            '>' => Some(Align::Right),
            '^' => Some(Align::Center),
            _ => None,
        };

        let mut fill = None;
        let mut align = None;
        let mut rest = 0;
        if chars.len() >= 2 && align_of(chars[1]).is_some() {
            fill = Some(chars[0]);
            align = align_of(chars[1]);
            rest = 2;
        } else if let Some(a) = chars.first().and_then(|c| align_of(*c)) {
            align = Some(a);
            rest = 1;
        }

        // A leading 0 pads with zeros unless a fill is given; alignment
        // still follows the value type
        let mut digits: String = chars[rest..].iter().collect();
        if digits.starts_with('0') {
            fill = fill.or(Some('0'));
            digits.remove(0);
        }
        let fill = fill.unwrap_or(' ');

        let width = if digits.is_empty() {
            0
        } else if digits.chars().all(|c| c.is_ascii_digit()) {
            digits.parse().ok()?
        } else {
            return None;
        };

        Some(Self { fill, align, width })
    }

    fn apply(&self, value: &Value, out: &mut String) {
        let text = value.to_string();
        let len = text.chars().count();
        if len >= self.width {
            out.push_str(&text);
            return;
        }

        // Numbers align right by default, text left
        let align = self.align.unwrap_or(match value {
            Value::Int(_) => Align::Right,
            Value::Text(_) => Align::Left,
        });
        let pad = self.width - len;
        let (before, after) = match align {
            Align::Left => (0, pad),
            Align::Right => (pad, 0),
            Align::Center => (pad / 2, pad - pad / 2),
        };
        out.extend(std::iter::repeat(self.fill).take(before));
        out.push_str(&text);
        out.extend(std::iter::repeat(self.fill).take(after));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Timestamp(Option<String>),
    Field { index: usize, spec: Option<FormatSpec> },
}

/// A compiled template string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse `source` and bind its named placeholders to `fields`.
    ///
    /// # Errors
    ///
    /// - `InvalidTemplate` for unbalanced braces, unsupported format specs,
    ///   positional indices other than 0, or invalid strftime strings
    /// - `UnknownPlaceholder` when a name is not a field of the pattern
    pub fn compile(source: &str, fields: &FieldSet) -> Result<Self, GeneratorError> {
        let invalid = |reason: &str| GeneratorError::InvalidTemplate {
            template: source.to_string(),
            reason: reason.to_string(),
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut auto_index = 0usize;
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(invalid("single '}' encountered")),
                '{' => {
                    let mut body = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some('{') => return Err(invalid("nested '{' is not supported")),
                            Some(ch) => body.push(ch),
                            None => return Err(invalid("unterminated '{'")),
                        }
                    }

                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }

                    let (name, spec) = match body.split_once(':') {
                        Some((name, spec)) => (name, Some(spec)),
                        None => (body.as_str(), None),
                    };

                    if name.contains('!') || name.contains('.') || name.contains('[') {
                        return Err(invalid("conversions and attribute access are not supported"));
                    }

                    let position = if name.is_empty() {
                        auto_index += 1;
                        Some(auto_index - 1)
                    } else if name.chars().all(|ch| ch.is_ascii_digit()) {
                        Some(name.parse::<usize>().map_err(|_| invalid("bad index"))?)
                    } else {
                        None
                    };

                    match position {
                        Some(0) => {
                            let format = match spec {
                                Some(fmt) if !fmt.is_empty() => {
                                    validate_strftime(fmt).map_err(|reason| invalid(&reason))?;
                                    Some(fmt.to_string())
                                }
                                _ => None,
                            };
                            segments.push(Segment::Timestamp(format));
                        }
                        Some(i) => {
                            return Err(invalid(&format!(
                                "positional index {} out of range (only {{0}} is bound)",
                                i
                            )))
                        }
                        None => {
                            let index = fields.index_of(name).ok_or_else(|| {
                                GeneratorError::UnknownPlaceholder {
                                    template: source.to_string(),
                                    name: name.to_string(),
                                }
                            })?;
                            let spec = match spec {
                                Some(raw) if !raw.is_empty() => Some(
                                    FormatSpec::parse(raw)
                                        .ok_or_else(|| invalid("unsupported format spec"))?,
                                ),
                                _ => None,
                            };
                            segments.push(Segment::Field { index, spec });
                        }
                    }
                }
                other => literal.push(other),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// Format with already resolved field values and a fixed timestamp.
    ///
    /// `values` is indexed like the [`FieldSet`] the template was compiled
    /// against.
    pub fn format(&self, values: &[Value], now: &DateTime<Local>) -> String {
        let mut out = String::with_capacity(self.source.len() + 32);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Timestamp(format) => {
                    let fmt = format.as_deref().unwrap_or(DEFAULT_TIMESTAMP_FORMAT);
                    out.push_str(&now.format(fmt).to_string());
                }
                Segment::Field { index, spec } => {
                    let Some(value) = values.get(*index) else {
                        continue;
                    };
                    match spec {
                        Some(spec) => spec.apply(value, &mut out),
                        None => out.push_str(&value.to_string()),
                    }
                }
            }
        }
        out
    }
}

/// Resolve every field and render `template` with the current local time.
///
/// Apart from the clock read and the producers' random draws this has no
/// side effects.
pub fn render_template<R: Rng + ?Sized>(
    template: &Template,
    fields: &FieldSet,
    rng: &mut R,
) -> String {
    let values = fields.resolve_all(rng);
    template.format(&values, &Local::now())
}
