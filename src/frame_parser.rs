//! Turns raw notification payloads into [`SensorFrame`]s.
//!
//! The firmware sends every report as ASCII text: comma-separated decimal
//! numbers, often with a trailing comma. A payload is only accepted when every
//! token is a number and there are exactly [`FRAME_LEN`] of them; anything
//! else is rejected as a whole.

use nom::{
    character::complete::multispace0, combinator::all_consuming, number::complete::double,
    sequence::delimited, Finish, IResult,
};

use crate::sensor_frame::{SensorFrame, FRAME_LEN};

use std::{fmt, str, str::FromStr};

/// Why a payload did not become a [`SensorFrame`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A token could not be read as a floating-point number.
    NotNumeric {
        /// The offending token, as received.
        token: String,
    },

    /// Every token was numeric, but there was the wrong number of them.
    WrongSize {
        /// How many values a frame holds.
        expected: usize,
        /// How many values the payload held.
        actual: usize,
    },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseError::NotNumeric { token } => {
                write!(f, "could not convert {:?} to a float", token)
            }
            ParseError::WrongSize { expected, actual } => {
                write!(f, "expected {} values, received {}", expected, actual)
            }
        }
    }
}

impl std::error::Error for ParseError {}

// A single float literal, optionally padded with whitespace, and nothing else.
fn parse_value(s: &str) -> IResult<&str, f64> {
    all_consuming(delimited(multispace0, double, multispace0))(s)
}

fn parse_token(token: &str) -> Result<f64, ParseError> {
    match parse_value(token).finish() {
        Ok((_remaining, value)) => Ok(value),
        Err(_) => Err(ParseError::NotNumeric {
            token: token.to_owned(),
        }),
    }
}

/// Validate and reshape one notification payload.
pub fn parse(payload: &[u8]) -> Result<SensorFrame, ParseError> {
    let text = str::from_utf8(payload).map_err(|_| ParseError::NotNumeric {
        token: String::from_utf8_lossy(payload).into_owned(),
    })?;
    text.parse()
}

impl FromStr for SensorFrame {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split(',')
            .filter(|token| !token.is_empty())
            .map(parse_token)
            .collect::<Result<Vec<f64>, ParseError>>()?;

        SensorFrame::from_row_major(&values).ok_or(ParseError::WrongSize {
            expected: FRAME_LEN,
            actual: values.len(),
        })
    }
}
