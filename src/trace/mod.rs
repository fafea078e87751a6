// src/trace/mod.rs
//! Hardware trace decoding
//!
//! Recovers per-time signed integer vectors from a VCD dump of a packed
//! output bus. The bus is `dimension` fields of `data_width` bits each; field
//! 0 occupies the least significant bits, and every field is read as
//! two's-complement signed. This module knows nothing about the golden model.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("signal '{0}' not declared in trace")]
    MissingSignal(String),

    #[error("malformed trace: {0}")]
    Malformed(String),

    #[error("field width must be in 1..=64 and dimension at least 1 (got width {width}, dimension {dimension})")]
    FieldWidth { width: u32, dimension: usize },

    #[error("signal '{signal}' is {actual} bits wide, expected {expected} ({dimension} x {width})")]
    BusWidth {
        signal: String,
        expected: usize,
        actual: usize,
        dimension: usize,
        width: u32,
    },
}

/// Reinterpret the low `width` bits of `raw` as two's-complement.
pub fn sign_extend(raw: u64, width: u32) -> i64 {
    if width >= 64 {
        return raw as i64;
    }
    let shift = 64 - width;
    ((raw << shift) as i64) >> shift
}

/// Decoded bus values keyed by simulation time.
///
/// Holds only the times at which the bus changed; between changes the
/// previous value is held, as in the dump itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedTrace {
    samples: BTreeMap<u64, Vec<i64>>,
}

impl DecodedTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, time: u64, values: Vec<i64>) {
        self.samples.insert(time, values);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<u64, Vec<i64>> {
        &self.samples
    }

    /// Value held on the bus at `time`.
    pub fn value_at(&self, time: u64) -> Option<&[i64]> {
        self.samples
            .range(..=time)
            .next_back()
            .map(|(_, values)| values.as_slice())
    }

    /// One field across all recorded changes, in time order.
    pub fn field_changes(&self, field: usize) -> Vec<i64> {
        self.samples
            .values()
            .filter_map(|values| values.get(field).copied())
            .collect()
    }

    /// One field sampled at `start + n * period` for `n` in `0..count`.
    pub fn field_sampled(&self, field: usize, start: u64, period: u64, count: usize) -> Vec<i64> {
        (0..count as u64)
            .map_while(|n| {
                self.value_at(start + n * period)
                    .and_then(|values| values.get(field).copied())
            })
            .collect()
    }
}

impl From<BTreeMap<u64, Vec<i64>>> for DecodedTrace {
    fn from(samples: BTreeMap<u64, Vec<i64>>) -> Self {
        Self { samples }
    }
}

/// Output bus name in the accelerator testbench.
pub const DEFAULT_SIGNAL: &str = "output_result";

/// Lanes on the accelerator's output bus, independent of how many filters a
/// run uses. Lanes past the last filter are decoded and ignored.
pub const DEFAULT_DIMENSION: usize = 16;

/// Decoder for one packed bus signal in a VCD dump.
#[derive(Debug, Clone)]
pub struct TraceDecoder {
    signal_name: String,
    dimension: usize,
    data_width: u32,
}

impl TraceDecoder {
    pub fn new(signal_name: &str, dimension: usize, data_width: u32) -> Result<Self, TraceError> {
        if dimension == 0 || !(1..=64).contains(&data_width) {
            return Err(TraceError::FieldWidth {
                width: data_width,
                dimension,
            });
        }
        Ok(Self {
            signal_name: signal_name.to_string(),
            dimension,
            data_width,
        })
    }

    fn bus_width(&self) -> usize {
        self.dimension * self.data_width as usize
    }

    /// Slice a binary word (MSB first) into signed fields.
    ///
    /// Returns `Ok(None)` when any bit is `x` or `z`. Short words are extended
    /// the way VCD defines: with the leading bit if it is `x`/`z`, else with 0.
    pub fn decode_word(&self, bits: &str) -> Result<Option<Vec<i64>>, TraceError> {
        let total = self.bus_width();
        if bits.len() > total {
            return Err(TraceError::Malformed(format!(
                "value has {} bits, bus is {} bits",
                bits.len(),
                total
            )));
        }

        let fill = match bits.chars().next() {
            Some(c @ ('x' | 'X' | 'z' | 'Z')) => c,
            _ => '0',
        };
        let mut word: Vec<char> = std::iter::repeat(fill).take(total - bits.len()).collect();
        word.extend(bits.chars());

        if word.iter().any(|c| matches!(c, 'x' | 'X' | 'z' | 'Z')) {
            return Ok(None);
        }

        let width = self.data_width as usize;
        let mut fields = Vec::with_capacity(self.dimension);
        for i in 0..self.dimension {
            let end = total - i * width;
            let slice = &word[end - width..end];
            let mut raw: u64 = 0;
            for &c in slice {
                let bit = match c {
                    '0' => 0,
                    '1' => 1,
                    other => {
                        return Err(TraceError::Malformed(format!("invalid bit '{}'", other)));
                    }
                };
                raw = (raw << 1) | bit;
            }
            fields.push(sign_extend(raw, self.data_width));
        }
        Ok(Some(fields))
    }

    pub fn parse_file<P: AsRef<Path>>(&self, path: P) -> Result<DecodedTrace, TraceError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        self.parse_str(&content)
    }

    /// Parse a VCD document and collect every change of the bus signal.
    pub fn parse_str(&self, vcd: &str) -> Result<DecodedTrace, TraceError> {
        let mut tokens = vcd.split_whitespace();
        let mut id_code: Option<String> = None;

        // Header: find the identifier code of our signal.
        loop {
            let token = tokens
                .next()
                .ok_or_else(|| TraceError::Malformed("missing $enddefinitions".to_string()))?;
            match token {
                "$var" => {
                    let fields: Vec<&str> = tokens.by_ref().take_while(|t| *t != "$end").collect();
                    if fields.len() < 4 {
                        return Err(TraceError::Malformed(format!("short $var declaration: {:?}", fields)));
                    }
                    let width: usize = fields[1]
                        .parse()
                        .map_err(|_| TraceError::Malformed(format!("bad $var width '{}'", fields[1])))?;
                    let reference = fields[3];
                    if id_code.is_none() && self.matches_signal(reference) {
                        if width != self.bus_width() {
                            return Err(TraceError::BusWidth {
                                signal: self.signal_name.clone(),
                                expected: self.bus_width(),
                                actual: width,
                                dimension: self.dimension,
                                width: self.data_width,
                            });
                        }
                        id_code = Some(fields[2].to_string());
                    }
                }
                "$enddefinitions" => {
                    skip_to_end(&mut tokens);
                    break;
                }
                t if t.starts_with('$') && t != "$end" => skip_to_end(&mut tokens),
                _ => {}
            }
        }

        let id_code = id_code.ok_or_else(|| TraceError::MissingSignal(self.signal_name.clone()))?;

        // Body: timestamps and value changes.
        let mut trace = DecodedTrace::new();
        let mut time: u64 = 0;
        while let Some(token) = tokens.next() {
            match token.as_bytes()[0] {
                b'#' => {
                    time = token[1..]
                        .parse()
                        .map_err(|_| TraceError::Malformed(format!("bad timestamp '{}'", token)))?;
                }
                b'b' | b'B' => {
                    let id = tokens
                        .next()
                        .ok_or_else(|| TraceError::Malformed(format!("vector change '{}' without identifier", token)))?;
                    if id == id_code {
                        match self.decode_word(&token[1..])? {
                            Some(values) => trace.insert(time, values),
                            None => log::debug!("skipping unknown bus value at time {}", time),
                        }
                    }
                }
                b'r' | b'R' => {
                    // Real-valued change; never our bus.
                    tokens.next();
                }
                b'$' => match token {
                    "$comment" => skip_to_end(&mut tokens),
                    // $dumpvars / $dumpall / $dumpon / $dumpoff / $end only bracket changes.
                    _ => {}
                },
                b'0' | b'1' | b'x' | b'X' | b'z' | b'Z' => {
                    // Scalar change: value char then identifier, no space.
                    if self.bus_width() == 1 && &token[1..] == id_code {
                        match self.decode_word(&token[..1])? {
                            Some(values) => trace.insert(time, values),
                            None => log::debug!("skipping unknown bus value at time {}", time),
                        }
                    }
                }
                _ => {
                    return Err(TraceError::Malformed(format!("unexpected token '{}'", token)));
                }
            }
        }

        log::debug!(
            "decoded {} changes of '{}' ({} x {} bits)",
            trace.len(),
            self.signal_name,
            self.dimension,
            self.data_width
        );
        Ok(trace)
    }

    /// Exact name, or the last component of a hierarchical name.
    fn matches_signal(&self, reference: &str) -> bool {
        reference == self.signal_name || reference.rsplit('.').next() == Some(self.signal_name.as_str())
    }
}

fn skip_to_end<'a>(tokens: &mut impl Iterator<Item = &'a str>) {
    for token in tokens.by_ref() {
        if token == "$end" {
            break;
        }
    }
}
