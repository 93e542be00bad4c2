//! Text loaders feeding IPv4 address and prefix lists into a TCAM.
//!
//! Malformed lines are logged and skipped; a loader never aborts on bad
//! input. Blank lines and `#` comments are ignored.

use crate::constants::ACL_PRIORITY_START;
use crate::errors::Error;
use crate::helpers::KeyBits;
use crate::types::SoftTcam;
use ipnet::Ipv4Net;
use log::{info, warn};
use std::io::BufRead;
use std::net::Ipv4Addr;

/// Outcome of one load pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped: usize,
}

/// Parse a dotted-quad address into a host-order key.
pub fn parse_v4_addr(s: &str) -> Result<u32, Error> {
    s.trim()
        .parse::<Ipv4Addr>()
        .map(u32::from)
        .map_err(|_| Error::InvalidPrefix)
}

/// Parse `a.b.c.d/len` into `(data, mask)`. Host bits beyond the prefix
/// must be clear, which also rules out a non-zero address with `/0`.
pub fn parse_v4_prefix(s: &str) -> Result<(u32, u32), Error> {
    let net: Ipv4Net = s.trim().parse().map_err(|_| Error::InvalidPrefix)?;
    let data = u32::from(net.addr());
    let mask = u32::prefix_mask(u32::from(net.prefix_len()));
    if data & !mask != 0 {
        return Err(Error::InvalidPrefix);
    }
    Ok((data, mask))
}

fn meaningful_lines<R: BufRead>(reader: R) -> impl Iterator<Item = String> {
    reader
        .lines()
        .map_while(|line| match line {
            Ok(l) => Some(l),
            Err(e) => {
                warn!("[LOAD] read error, stopping: {}", e);
                None
            }
        })
        .filter(|l| {
            let t = l.trim();
            !t.is_empty() && !t.starts_with('#')
        })
}

/// Full-route table: one CIDR per line, priority = prefix length (longest
/// prefix wins), value = network address.
pub fn load_routes<R: BufRead>(tcam: &mut SoftTcam<u32, u32>, reader: R) -> LoadReport {
    let mut report = LoadReport::default();
    for line in meaningful_lines(reader) {
        let inserted = parse_v4_prefix(&line).and_then(|(data, mask)| {
            tcam.insert(data, mask, mask.count_ones(), data)
        });
        match inserted {
            Ok(()) => report.loaded += 1,
            Err(e) => {
                warn!("skip: {} ({})", line, e);
                report.skipped += 1;
            }
        }
    }
    info!("[LOAD] routes: {} loaded, {} skipped", report.loaded, report.skipped);
    report
}

/// ACL: one address per line, exact match, earlier lines outrank later
/// ones. At most `limit` lines are accepted.
pub fn load_acl<R: BufRead>(tcam: &mut SoftTcam<u32, u32>, reader: R, limit: usize) -> LoadReport {
    let mut report = LoadReport::default();
    let mut priority = ACL_PRIORITY_START;
    for line in meaningful_lines(reader) {
        if report.loaded >= limit {
            break;
        }
        let inserted =
            parse_v4_addr(&line).and_then(|addr| tcam.insert(addr, u32::MAX, priority, addr));
        match inserted {
            Ok(()) => {
                report.loaded += 1;
                priority = priority.saturating_sub(1);
            }
            Err(e) => {
                warn!("skip: {} ({})", line, e);
                report.skipped += 1;
            }
        }
    }
    info!("[LOAD] acl: {} loaded, {} skipped", report.loaded, report.skipped);
    report
}

/// Lookup keys (flows), one address per line.
pub fn load_keys<R: BufRead>(reader: R) -> Vec<u32> {
    meaningful_lines(reader)
        .filter_map(|line| match parse_v4_addr(&line) {
            Ok(k) => Some(k),
            Err(_) => {
                warn!("skip: {}", line);
                None
            }
        })
        .collect()
}
