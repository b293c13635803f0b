//! Rendering of device commands from fixed templates.
//!
//! Templates use a small printf subset: `%d` with an optional `0` flag and width
//! (`%03d`), `%s` and `%%`.

use crate::error::ScanlinkError;
use std::borrow::Cow;
use std::fmt::{self, Display};

/// A typed argument substituted into a command template.
#[derive(Clone, Debug, PartialEq)]
pub enum CommandArg {
    Int(i64),
    Str(String),
}

macro_rules! impl_int_arg {
    ($($t:ty),*) => {
        $(impl From<$t> for CommandArg {
            fn from(value: $t) -> Self {
                CommandArg::Int(value as i64)
            }
        })*
    };
}

impl_int_arg!(i8, i16, i32, i64, u8, u16, u32, usize);

impl From<&str> for CommandArg {
    fn from(value: &str) -> Self {
        CommandArg::Str(value.to_string())
    }
}

impl From<String> for CommandArg {
    fn from(value: String) -> Self {
        CommandArg::Str(value)
    }
}

impl Display for CommandArg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CommandArg::Int(v) => write!(f, "{}", v),
            CommandArg::Str(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, PartialEq)]
enum Piece<'a> {
    Literal(&'a str),
    Int { width: usize, zero_pad: bool },
    Str { width: usize },
}

fn template_error(template: &str, reason: String) -> ScanlinkError {
    ScanlinkError::InvalidTemplate {
        template: template.to_string(),
        reason,
    }
}

fn parse_template(template: &str) -> Result<Vec<Piece<'_>>, ScanlinkError> {
    let mut pieces = Vec::new();
    let bytes = template.as_bytes();
    let mut literal_start = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            i += 1;
            continue;
        }
        if literal_start < i {
            pieces.push(Piece::Literal(&template[literal_start..i]));
        }
        let percent_at = i;
        i += 1;
        if bytes.get(i) == Some(&b'%') {
            pieces.push(Piece::Literal("%"));
            i += 1;
            literal_start = i;
            continue;
        }

        let zero_pad = bytes.get(i) == Some(&b'0');
        if zero_pad {
            i += 1;
        }
        let width_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        let width = template[width_start..i].parse::<usize>().unwrap_or(0);

        match bytes.get(i) {
            Some(b'd') => pieces.push(Piece::Int { width, zero_pad }),
            Some(b's') if !zero_pad => pieces.push(Piece::Str { width }),
            _ => {
                return Err(template_error(
                    template,
                    format!("unsupported placeholder at byte {}", percent_at),
                ))
            }
        }
        i += 1;
        literal_start = i;
    }
    if literal_start < bytes.len() {
        pieces.push(Piece::Literal(&template[literal_start..]));
    }
    Ok(pieces)
}

/// Substitutes `args` into `template`.
///
/// The number and the types of the arguments must match the placeholders.
pub fn create_formatted_command(
    template: &str,
    args: &[CommandArg],
) -> Result<String, ScanlinkError> {
    let pieces = parse_template(template)?;
    let n_placeholders = pieces
        .iter()
        .filter(|p| !matches!(p, Piece::Literal(_)))
        .count();
    if n_placeholders != args.len() {
        return Err(template_error(
            template,
            format!(
                "{} placeholders but {} arguments",
                n_placeholders,
                args.len()
            ),
        ));
    }

    let mut args = args.iter();
    let mut rendered: Vec<Cow<'_, str>> = Vec::with_capacity(pieces.len());
    for piece in &pieces {
        if let Piece::Literal(text) = piece {
            rendered.push(Cow::Borrowed(*text));
            continue;
        }
        let text = match (piece, args.next()) {
            (Piece::Int { width, zero_pad }, Some(CommandArg::Int(v))) => match zero_pad {
                true => format!("{:0width$}", v, width = *width),
                false => format!("{:width$}", v, width = *width),
            },
            (Piece::Str { width }, Some(CommandArg::Str(s))) => {
                format!("{:>width$}", s, width = *width)
            }
            (_, arg) => {
                return Err(template_error(
                    template,
                    format!("argument {:?} does not fit placeholder {:?}", arg, piece),
                ))
            }
        };
        rendered.push(Cow::Owned(text));
    }

    let size: usize = rendered.iter().map(|t| t.len()).sum();
    let mut command = String::with_capacity(size);
    for text in &rendered {
        command.push_str(text);
    }
    Ok(command)
}

/// Appends `params` to `command`, separated by spaces.
pub fn join_command(command: &str, params: &[&dyn Display]) -> String {
    let mut result = command.to_string();
    for param in params {
        result.push(' ');
        result.push_str(&param.to_string());
    }
    result
}
