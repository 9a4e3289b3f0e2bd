//! Name template compilation.
//!
//! A template like `logstash-%{YYYY.MM.dd}` is compiled into two jointly
//! derived artifacts: a timestamp format for the placeholder segment and an
//! anchored name pattern whose single capture group isolates that segment.
//! Both come out of one compilation step so they cannot drift apart.

use chrono::format::{Parsed, StrftimeItems};
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use thiserror::Error;

/// Timestamp parser/renderer derived from a placeholder token.
#[derive(Debug, Clone)]
pub struct DateFormat {
    /// The token as written in the template, e.g. "YYYY.MM.dd".
    token: String,
    /// Equivalent strftime format, e.g. "%Y.%m.%d".
    strftime: String,
}

impl DateFormat {
    /// Translates a date-format token into a strftime format.
    ///
    /// Tokens use the pattern-letter convention of the original
    /// configurations: runs of `y`/`Y`, `M`, `d`, `H`, `m`, `s` select the
    /// field, punctuation passes through as literal text. Anything else is
    /// rejected rather than silently mismatched.
    fn from_token(token: &str) -> Result<Self, TemplateError> {
        let mut strftime = String::with_capacity(token.len());
        let mut has_year = false;
        let mut chars = token.chars().peekable();

        while let Some(c) = chars.next() {
            if !c.is_ascii_alphabetic() {
                if c == '%' {
                    return Err(TemplateError::UnsupportedDateToken {
                        token: token.to_string(),
                        field: "%".to_string(),
                    });
                }
                strftime.push(c);
                continue;
            }

            let mut run = 1;
            while chars.peek() == Some(&c) {
                chars.next();
                run += 1;
            }

            let spec = match (c, run) {
                ('y' | 'Y', 4) => {
                    has_year = true;
                    "%Y"
                }
                ('y' | 'Y', 2) => {
                    has_year = true;
                    "%y"
                }
                ('M', 2) => "%m",
                ('d', 2) => "%d",
                ('H', 2) => "%H",
                ('m', 2) => "%M",
                ('s', 2) => "%S",
                _ => {
                    return Err(TemplateError::UnsupportedDateToken {
                        token: token.to_string(),
                        field: c.to_string().repeat(run),
                    });
                }
            };
            strftime.push_str(spec);
        }

        // Every other calendar field defaults relative to the year; without
        // one the format could never parse any timestamp the pattern matches.
        if !has_year {
            return Err(TemplateError::MissingYearField {
                token: token.to_string(),
            });
        }

        Ok(Self {
            token: token.to_string(),
            strftime,
        })
    }

    /// The token as written in the template.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Parses a timestamp segment into a UTC instant.
    ///
    /// Calendar fields absent from the token default to the start of the
    /// period (January, the 1st, midnight), so monthly or yearly index names
    /// resolve to the instant their partition began. Returns `None` when the
    /// text does not parse; a malformed timestamp is not an error condition.
    pub fn parse(&self, text: &str) -> Option<DateTime<Utc>> {
        let mut parsed = Parsed::new();
        chrono::format::parse(&mut parsed, text, StrftimeItems::new(&self.strftime)).ok()?;

        // %y fills year_mod_100 rather than year; resolve it with the usual
        // two-digit pivot (00-68 -> 20xx, 69-99 -> 19xx).
        let year = match (parsed.year(), parsed.year_mod_100()) {
            (Some(year), _) => year,
            (None, Some(rem)) if rem < 69 => 2000 + rem,
            (None, Some(rem)) => 1900 + rem,
            (None, None) => return None,
        };
        let month = parsed.month().unwrap_or(1);
        let day = parsed.day().unwrap_or(1);
        let hour = match (parsed.hour_div_12(), parsed.hour_mod_12()) {
            (Some(div), Some(rem)) => div * 12 + rem,
            _ => 0,
        };
        let minute = parsed.minute().unwrap_or(0);
        let second = parsed.second().unwrap_or(0);

        Some(
            NaiveDate::from_ymd_opt(year, month, day)?
                .and_hms_opt(hour, minute, second)?
                .and_utc(),
        )
    }

    /// Renders a timestamp in this format.
    pub fn format(&self, timestamp: &DateTime<Utc>) -> String {
        timestamp.format(&self.strftime).to_string()
    }
}

/// The jointly compiled form of a name template.
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    /// Parser/renderer for the placeholder segment.
    pub date_format: DateFormat,
    /// Anchored pattern; capture group 1 is exactly the placeholder segment.
    pub name_pattern: Regex,
}

/// Compiles a name template containing one `%{...}` placeholder.
///
/// The template must have the shape `<prefix>%{<inner>}<suffix>` with exactly
/// one placeholder. Literal `+` characters in the inner token are stripped (a
/// historical affordance with no matching semantic). The name pattern is the
/// escaped prefix and suffix around a `(.+)` capture, anchored at both ends.
pub fn compile(template: &str) -> Result<CompiledTemplate, TemplateError> {
    let start = template
        .find("%{")
        .ok_or_else(|| TemplateError::MissingPlaceholder {
            template: template.to_string(),
        })?;
    let inner_start = start + 2;
    let inner_len =
        template[inner_start..]
            .find('}')
            .ok_or_else(|| TemplateError::MissingPlaceholder {
                template: template.to_string(),
            })?;

    let prefix = &template[..start];
    let inner = &template[inner_start..inner_start + inner_len];
    let suffix = &template[inner_start + inner_len + 1..];

    if suffix.contains("%{") {
        return Err(TemplateError::MultiplePlaceholders {
            template: template.to_string(),
        });
    }

    // Leading + markers carried over from old configurations are dropped
    let token: String = inner.chars().filter(|c| *c != '+').collect();
    if token.is_empty() {
        return Err(TemplateError::EmptyPlaceholder {
            template: template.to_string(),
        });
    }

    let date_format = DateFormat::from_token(&token)?;
    let name_pattern = Regex::new(&format!(
        "^{}(.+){}$",
        regex::escape(prefix),
        regex::escape(suffix)
    ))?;

    Ok(CompiledTemplate {
        date_format,
        name_pattern,
    })
}

/// Errors from compiling a name template.
#[derive(Error, Debug)]
pub enum TemplateError {
    /// No well-formed `%{...}` placeholder in the template.
    #[error(
        "the pattern '{template}' does not have a timestamp placeholder; \
         add one with %{{date-format}}"
    )]
    MissingPlaceholder { template: String },

    /// More than one placeholder; the timestamp segment would be ambiguous.
    #[error("the pattern '{template}' has more than one timestamp placeholder")]
    MultiplePlaceholders { template: String },

    /// A placeholder whose token is empty (or all `+`).
    #[error("the pattern '{template}' has an empty timestamp placeholder")]
    EmptyPlaceholder { template: String },

    /// A pattern letter with no strftime equivalent.
    #[error("unsupported field '{field}' in date format '{token}'")]
    UnsupportedDateToken { token: String, field: String },

    /// A date format with no year field; it could never parse a timestamp.
    #[error("date format '{token}' has no year field")]
    MissingYearField { token: String },

    /// The derived name pattern failed to compile.
    #[error("invalid name pattern: {0}")]
    Pattern(#[from] regex::Error),
}
