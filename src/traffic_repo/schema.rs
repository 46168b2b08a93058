// netstat connection table: header resolution and row parsing.

use super::TrafficError;
use crate::models::ProcessBytes;
use std::collections::HashMap;

/// Where the counters live in a connection row, resolved from the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnIndices {
    pub rx: usize,
    pub tx: usize,
    /// The `(state)` column. UDP rows leave it out, shifting later columns left.
    pub state: Option<usize>,
    pub pid: Option<usize>,
}

impl ColumnIndices {
    pub fn resolve(header: &str) -> Result<Self, TrafficError> {
        let columns = header_columns(header);
        let find = |name: &str| columns.iter().position(|c| c.eq_ignore_ascii_case(name));
        let rx = find("rxbytes").ok_or(TrafficError::MissingColumn("rxbytes"))?;
        let tx = find("txbytes").ok_or(TrafficError::MissingColumn("txbytes"))?;
        Ok(Self {
            rx,
            tx,
            state: find("(state)"),
            pid: find("pid"),
        })
    }

    /// Column index for a row; stateless (UDP) rows lose one column after `(state)`.
    fn index(&self, column: usize, has_state: bool) -> usize {
        match self.state {
            Some(state) if !has_state && column > state => column - 1,
            _ => column,
        }
    }
}

/// Header tokens with two-word names ("Local Address") merged into one column.
pub(crate) fn header_columns(header: &str) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for token in header.split_whitespace() {
        if token == "Address"
            && let Some(last) = columns.last_mut()
            && (last == "Local" || last == "Foreign")
        {
            last.push(' ');
            last.push_str(token);
            continue;
        }
        columns.push(token.to_string());
    }
    columns
}

/// PID from a `name:pid` token (newer netstat builds append one per row).
/// IPv6 endpoints also contain colons but end in `.port`, so they never parse.
fn pid_from_token(tokens: &[&str]) -> Option<u32> {
    tokens.iter().find_map(|token| {
        let (_, suffix) = token.rsplit_once(':')?;
        suffix.parse::<u32>().ok()
    })
}

/// Cumulative bytes per PID from `netstat -n -b -v` output.
pub(crate) fn parse_netstat(output: &str) -> Result<HashMap<u32, ProcessBytes>, TrafficError> {
    let header = output
        .lines()
        .find(|l| l.trim_start().starts_with("Proto"))
        .ok_or(TrafficError::HeaderNotFound)?;
    let columns = ColumnIndices::resolve(header)?;

    let mut per_pid: HashMap<u32, ProcessBytes> = HashMap::new();
    let mut parsed_rows = 0usize;
    for line in output.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(proto) = tokens.first() else {
            continue;
        };
        let has_state = proto.starts_with("tcp");
        if !has_state && !proto.starts_with("udp") {
            continue;
        }
        let rx_idx = columns.index(columns.rx, has_state);
        let tx_idx = columns.index(columns.tx, has_state);
        let (Some(rx), Some(tx)) = (
            tokens.get(rx_idx).and_then(|t| t.parse::<u64>().ok()),
            tokens.get(tx_idx).and_then(|t| t.parse::<u64>().ok()),
        ) else {
            continue;
        };
        let pid = pid_from_token(&tokens).or_else(|| {
            let idx = columns.index(columns.pid?, has_state);
            tokens.get(idx)?.parse::<u32>().ok()
        });
        let Some(pid) = pid.filter(|p| *p > 0) else {
            continue;
        };
        parsed_rows += 1;
        if rx == 0 && tx == 0 {
            continue;
        }
        let entry = per_pid.entry(pid).or_default();
        entry.rx = entry.rx.saturating_add(rx);
        entry.tx = entry.tx.saturating_add(tx);
    }

    if parsed_rows == 0 {
        return Err(TrafficError::NoRows);
    }
    Ok(per_pid)
}
