//! Allocation traces.
//!
//! A trace is a plain text file: four header numbers followed by one
//! operation per line.
//!
//! ```text
//!   20000        suggested heap size
//!   2            number of ids
//!   4            number of operations
//!   1            weight
//!   a 0 512      allocate 512 bytes as id 0
//!   r 0 640      reallocate id 0 to 640 bytes
//!   a 1 128
//!   f 0          free id 0
//! ```

use std::{fs, path::Path, str::FromStr};

use crate::error::TraceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceOp {
  Alloc { id: usize, size: usize },
  Realloc { id: usize, size: usize },
  Free { id: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
  pub suggested_heap_size: usize,
  pub num_ids: usize,
  pub weight: usize,
  pub ops: Vec<TraceOp>,
}

impl Trace {
  pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TraceError> {
    fs::read_to_string(path)?.parse()
  }
}

fn number(
  line: usize,
  text: &str,
  field: Option<&str>,
) -> Result<usize, TraceError> {
  field
    .and_then(|field| field.parse().ok())
    .ok_or_else(|| TraceError::Parse {
      line,
      text: text.to_string(),
    })
}

impl FromStr for Trace {
  type Err = TraceError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let mut lines = s
      .lines()
      .enumerate()
      .map(|(index, text)| (index + 1, text.trim()))
      .filter(|(_, text)| !text.is_empty());

    let mut header = |name: &'static str| -> Result<usize, TraceError> {
      let (line, text) = lines.next().ok_or(TraceError::MissingHeader(name))?;
      number(line, text, Some(text))
    };

    let suggested_heap_size = header("heap size")?;
    let num_ids = header("id count")?;
    let num_ops = header("operation count")?;
    let weight = header("weight")?;

    let mut ops = Vec::new();
    for (line, text) in lines {
      let mut fields = text.split_whitespace();
      let kind = fields.next().unwrap_or_default();
      let id = number(line, text, fields.next())?;

      let op = match kind {
        "a" => TraceOp::Alloc {
          id,
          size: number(line, text, fields.next())?,
        },
        "r" => TraceOp::Realloc {
          id,
          size: number(line, text, fields.next())?,
        },
        "f" => TraceOp::Free { id },
        other => {
          return Err(TraceError::UnknownOp {
            line,
            op: other.to_string(),
          });
        }
      };

      if id >= num_ids {
        return Err(TraceError::IdOutOfRange { line, id, num_ids });
      }

      ops.push(op);
    }

    if ops.len() != num_ops {
      return Err(TraceError::OpCountMismatch {
        declared: num_ops,
        found: ops.len(),
      });
    }

    Ok(Trace {
      suggested_heap_size,
      num_ids,
      weight,
      ops,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const SHORT: &str = "20000\n2\n5\n1\na 0 512\na 1 128\nr 0 640\nf 1\nf 0\n";

  #[test]
  fn test_parse_short_trace() {
    let trace: Trace = SHORT.parse().unwrap();

    assert_eq!(trace.suggested_heap_size, 20000);
    assert_eq!(trace.num_ids, 2);
    assert_eq!(trace.weight, 1);
    assert_eq!(
      trace.ops,
      vec![
        TraceOp::Alloc { id: 0, size: 512 },
        TraceOp::Alloc { id: 1, size: 128 },
        TraceOp::Realloc { id: 0, size: 640 },
        TraceOp::Free { id: 1 },
        TraceOp::Free { id: 0 },
      ]
    );
  }

  #[test]
  fn test_blank_lines_and_padding_are_skipped() {
    let trace: Trace = "  100\n\n1\n1\n0\n\n  a 0 8  \n".parse().unwrap();

    assert_eq!(trace.ops, vec![TraceOp::Alloc { id: 0, size: 8 }]);
  }

  #[test]
  fn test_missing_header() {
    assert!(matches!(
      "100\n2\n".parse::<Trace>(),
      Err(TraceError::MissingHeader("operation count"))
    ));
  }

  #[test]
  fn test_bad_lines_are_reported() {
    assert!(matches!(
      "100\n1\n1\n1\na 0\n".parse::<Trace>(),
      Err(TraceError::Parse { line: 5, .. })
    ));
    assert!(matches!(
      "100\n1\n1\n1\nx 0 4\n".parse::<Trace>(),
      Err(TraceError::UnknownOp { line: 5, .. })
    ));
    assert!(matches!(
      "100\n1\n1\n1\na 3 4\n".parse::<Trace>(),
      Err(TraceError::IdOutOfRange { line: 5, id: 3, num_ids: 1 })
    ));
    assert!(matches!(
      "100\n1\n2\n1\na 0 4\n".parse::<Trace>(),
      Err(TraceError::OpCountMismatch { declared: 2, found: 1 })
    ));
  }

  #[test]
  fn test_huge_declared_counts_are_not_trusted() {
    assert!(matches!(
      "0\n1\n18446744073709551615\n1\na 0 8\n".parse::<Trace>(),
      Err(TraceError::OpCountMismatch {
        declared: usize::MAX,
        found: 1
      })
    ));

    let trace: Trace = "0\n18446744073709551615\n1\n1\na 7 8\n".parse().unwrap();
    assert_eq!(trace.num_ids, usize::MAX);
  }
}
