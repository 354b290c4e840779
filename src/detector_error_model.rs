//! Detector error models restricted to graph-like mechanisms, and their
//! text encoding.
//!
//! ```text
//! error(<p>) D<i> [D<j>] [L<k> ...]
//! ```

use std::collections::BTreeSet;

use crate::error::{CrosscheckError, Result};

/// Log-likelihood ratio weight `ln((1-p)/p)` of a mechanism firing.
/// Probabilities on or outside the boundary of (0,1) are degenerate and get weight 0.
pub fn mechanism_weight(probability : f64) -> f64 {
    if probability > 0.0 && probability < 1.0 {
        ((1.0 - probability) / probability).ln()
    } else {
        0.0
    }
}

/// One independent error mechanism.
///
/// Two detectors make a graph edge, a single detector makes a boundary edge.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorMechanism {
    pub probability : f64,
    pub detectors : Vec<usize>,
    pub observables : Vec<usize>,
}

impl ErrorMechanism {
    pub fn new(probability : f64, detectors : Vec<usize>, observables : Vec<usize>) -> Result<Self> {
        check_detectors(&detectors).map_err(CrosscheckError::InvalidParameter)?;
        Ok(ErrorMechanism { probability, detectors, observables })
    }

    pub fn weight(self : &Self) -> f64 {
        mechanism_weight(self.probability)
    }

    pub fn is_boundary(self : &Self) -> bool {
        self.detectors.len() == 1
    }

    pub fn is_edge(self : &Self) -> bool {
        self.detectors.len() == 2
    }

    fn encode(self : &Self, out : &mut String) {
        out.push_str(&format!("error({})", self.probability));
        for d in self.detectors.iter() {
            out.push_str(&format!(" D{}", d));
        }
        for l in self.observables.iter() {
            out.push_str(&format!(" L{}", l));
        }
        out.push('\n');
    }
}

fn check_detectors(detectors : &[usize]) -> std::result::Result<(), String> {
    match detectors {
        [] => Err("mechanism flips no detector".to_string()),
        [_] => Ok(()),
        [a, b] if a == b => Err(format!("detector D{} repeated in one mechanism", a)),
        [_, _] => Ok(()),
        _ => Err(format!("mechanism flips {} detectors, at most 2 are matchable", detectors.len())),
    }
}

/// An ordered list of graph-like error mechanisms.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetectorErrorModel {
    mechanisms : Vec<ErrorMechanism>,
    num_detectors : usize,
    num_observables : usize,
}

impl DetectorErrorModel {
    pub fn from_mechanisms(mechanisms : Vec<ErrorMechanism>) -> Self {
        let mut dem = DetectorErrorModel::default();
        for mechanism in mechanisms {
            dem.push(mechanism);
        }
        dem
    }

    /// Syndrome graph of a distance `d` repetition code with uniform error probability `p`.
    ///
    /// `d-1` edges `D<i> D<i+1>` each flipping `L0`, then boundary edges on `D0` and `D<d-2>`.
    pub fn repetition_code(d : usize, p : f64) -> Result<Self> {
        if d < 2 {
            return Err(CrosscheckError::InvalidParameter(format!("chain length must be at least 2, got {}", d)));
        }
        if !(p > 0.0 && p < 1.0) {
            return Err(CrosscheckError::InvalidParameter(format!("error probability must lie in (0,1), got {}", p)));
        }

        let mut mechanisms = (0..d - 1)
            .map(|i| ErrorMechanism::new(p, vec![i, i + 1], vec![0]))
            .collect::<Result<Vec<_>>>()?;
        mechanisms.push(ErrorMechanism::new(p, vec![0], vec![])?);
        mechanisms.push(ErrorMechanism::new(p, vec![d - 2], vec![])?);

        Ok(DetectorErrorModel::from_mechanisms(mechanisms))
    }

    /// Parse DEM text.
    ///
    /// Reads `error` and `detector` lines, applies `shift_detectors` offsets
    /// and unrolls `repeat N { ... }` blocks. A block without its own
    /// `shift_detectors` is shifted past its largest detector on every pass.
    /// Comments, blank lines and other instructions are skipped. Only the
    /// part of an `error` line before the first `^` is read.
    pub fn parse(text : &str) -> Result<Self> {
        let lines = text.lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
            .collect::<Vec<_>>();
        let mut dem = DetectorErrorModel::default();
        let mut offset = 0usize;
        parse_block(&lines, &mut dem, &mut offset)?;
        Ok(dem)
    }

    /// Canonical text encoding, one newline-terminated line per mechanism.
    pub fn to_text(self : &Self) -> String {
        let mut out = String::new();
        for mechanism in self.mechanisms.iter() {
            mechanism.encode(&mut out);
        }
        out
    }

    pub fn mechanisms(self : &Self) -> &[ErrorMechanism] {
        &self.mechanisms
    }

    /// One past the largest detector index mentioned.
    pub fn num_detectors(self : &Self) -> usize {
        self.num_detectors
    }

    /// One past the largest logical observable index mentioned.
    pub fn num_observables(self : &Self) -> usize {
        self.num_observables
    }

    fn push(self : &mut Self, mechanism : ErrorMechanism) {
        if let Some(max_det) = mechanism.detectors.iter().max() {
            self.num_detectors = self.num_detectors.max(max_det + 1);
        }
        if let Some(max_obs) = mechanism.observables.iter().max() {
            self.num_observables = self.num_observables.max(max_obs + 1);
        }
        self.mechanisms.push(mechanism);
    }
}

/// Encode the repetition code DEM for chain length `d` and probability `p`.
pub fn build_repetition_dem(d : usize, p : f64) -> Result<String> {
    Ok(DetectorErrorModel::repetition_code(d, p)?.to_text())
}

/// Lines are `(line number, trimmed text)`. `offset` is the running detector shift.
fn parse_block(lines : &[(usize, &str)], dem : &mut DetectorErrorModel, offset : &mut usize) -> Result<()> {
    let mut i = 0;
    while i < lines.len() {
        let (line_no, line) = lines[i];
        if line.starts_with("error") {
            let mechanism = parse_error_line(line, line_no, *offset)?;
            dem.push(mechanism);
        } else if line.starts_with("detector") {
            for token in line.split_whitespace().skip(1) {
                if let Some(rest) = token.strip_prefix('D') {
                    let idx = parse_index(rest, line_no, "detector")? + *offset;
                    dem.num_detectors = dem.num_detectors.max(idx + 1);
                }
            }
        } else if line.starts_with("shift_detectors") {
            *offset += parse_shift(line, line_no)?;
        } else if line.starts_with("repeat") {
            let close = matching_brace(lines, i)?;
            parse_repeat(line, line_no, &lines[i + 1..close], dem, offset)?;
            i = close;
        } else if line.starts_with('}') {
            return Err(CrosscheckError::dem(line_no, "'}' without an open repeat block"));
        }
        i += 1;
    }
    Ok(())
}

fn parse_repeat(
    header : &str,
    line_no : usize,
    body : &[(usize, &str)],
    dem : &mut DetectorErrorModel,
    offset : &mut usize,
) -> Result<()> {
    let count : usize = header.split_whitespace()
        .nth(1)
        .map(|t| t.trim_end_matches('{'))
        .ok_or_else(|| CrosscheckError::dem(line_no, "repeat missing count"))?
        .parse()
        .map_err(|e| CrosscheckError::dem(line_no, format!("bad repeat count: {}", e)))?;

    // Without an explicit shift each pass moves past the body's largest detector
    let implicit_shift = if body.iter().any(|(_, l)| l.starts_with("shift_detectors")) {
        0
    } else {
        let mut scratch = DetectorErrorModel::default();
        parse_block(body, &mut scratch, &mut 0)?;
        scratch.num_detectors
    };

    for _ in 0..count {
        parse_block(body, dem, offset)?;
        *offset += implicit_shift;
    }
    Ok(())
}

/// Index of the `}` closing the `repeat` block opened at `lines[open]`.
fn matching_brace(lines : &[(usize, &str)], open : usize) -> Result<usize> {
    let (line_no, header) = lines[open];
    if !header.ends_with('{') {
        return Err(CrosscheckError::dem(line_no, "repeat block must open with '{' on the same line"));
    }
    let mut depth = 0usize;
    for (j, (_, line)) in lines.iter().enumerate().skip(open) {
        if line.ends_with('{') {
            depth += 1;
        } else if line.starts_with('}') {
            depth -= 1;
            if depth == 0 {
                return Ok(j);
            }
        }
    }
    Err(CrosscheckError::dem(line_no, "repeat block is never closed"))
}

/// `shift_detectors [(coords)] N`
fn parse_shift(line : &str, line_no : usize) -> Result<usize> {
    let rest = match line.find(')') {
        Some(close) => &line[close + 1..],
        None => &line["shift_detectors".len()..],
    };
    match rest.split_whitespace().next() {
        Some(token) => parse_index(token, line_no, "shift"),
        None => Ok(0),
    }
}

fn parse_error_line(line : &str, line_no : usize, offset : usize) -> Result<ErrorMechanism> {
    // Correlated halves after `^` are not matchable here
    let line = line.split('^').next().unwrap_or(line);

    let open = line.find('(').ok_or_else(|| CrosscheckError::dem(line_no, "error line missing '('"))?;
    let close = line.find(')').ok_or_else(|| CrosscheckError::dem(line_no, "error line missing ')'"))?;
    if close < open {
        return Err(CrosscheckError::dem(line_no, "mismatched parentheses"));
    }
    let probability : f64 = line[open + 1..close]
        .trim()
        .parse()
        .map_err(|e| CrosscheckError::dem(line_no, format!("bad probability: {}", e)))?;

    let mut detectors = Vec::new();
    let mut observables = BTreeSet::new();
    for token in line[close + 1..].split_whitespace() {
        if let Some(rest) = token.strip_prefix('D') {
            detectors.push(parse_index(rest, line_no, "detector")? + offset);
        } else if let Some(rest) = token.strip_prefix('L') {
            // An observable listed twice flips back
            let idx = parse_index(rest, line_no, "observable")?;
            if !observables.remove(&idx) {
                observables.insert(idx);
            }
        }
    }

    check_detectors(&detectors).map_err(|reason| CrosscheckError::dem(line_no, reason))?;
    Ok(ErrorMechanism { probability, detectors, observables: observables.into_iter().collect() })
}

fn parse_index(text : &str, line_no : usize, what : &str) -> Result<usize> {
    text.parse()
        .map_err(|e| CrosscheckError::dem(line_no, format!("bad {} index '{}': {}", what, text, e)))
}
