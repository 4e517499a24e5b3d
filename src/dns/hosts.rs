//! Hosts-file style override table.
//!
//! Parses text of the form `<ip> <host> [ignored...]`, one record per line.
//! Blank lines and `#` comments are skipped, as are lines with fewer than two
//! fields or an unparsable IP literal. Repeated hosts accumulate addresses in
//! file order.

use std::collections::HashMap;
use std::net::IpAddr;

/// Built-in override table used when no hosts text has been configured.
pub const DEFAULT_HOSTS_TEXT: &str = "\
104.18.3.173 www.dlsite.com
104.18.2.173 www.dlsite.com
104.18.3.173 ssl.dlsite.com
104.18.2.173 ssl.dlsite.com
18.178.19.156 play.dlsite.com
52.196.205.186 play.dlsite.com
35.72.203.42 login.dlsite.com
3.112.120.146 login.dlsite.com
3.169.55.3 download.dlsite.com
3.169.55.49 download.dlsite.com
3.169.55.112 download.dlsite.com
54.178.187.141 webup.dlsite.com
57.181.47.167 webup.dlsite.com
";

/// One host with every address configured for it, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostOverrideEntry {
    pub host: String,
    pub addresses: Vec<IpAddr>,
}

/// Ordered host → addresses mapping.
///
/// Iteration order is first-appearance order in the source text, which is
/// also the order suffix matching walks the table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostOverrideTable {
    entries: Vec<HostOverrideEntry>,
    index: HashMap<String, usize>,
}

impl HostOverrideTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses hosts text. Malformed lines are skipped, never fatal.
    pub fn parse(text: &str) -> Self {
        let mut table = Self::new();

        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut fields = line.split_whitespace();
            let (Some(ip), Some(host)) = (fields.next(), fields.next()) else {
                continue;
            };

            let Ok(addr) = ip.parse::<IpAddr>() else {
                tracing::trace!(line = %line, "skipping hosts line with invalid address");
                continue;
            };

            let host = host.trim_end_matches('.').to_lowercase();
            if host.is_empty() {
                continue;
            }
            table.insert(host, addr);
        }

        table
    }

    /// Parses `text`, or the built-in table when `text` is blank.
    pub fn parse_or_default(text: &str) -> Self {
        if text.trim().is_empty() {
            Self::parse(DEFAULT_HOSTS_TEXT)
        } else {
            Self::parse(text)
        }
    }

    fn insert(&mut self, host: String, addr: IpAddr) {
        match self.index.get(&host) {
            Some(&i) => self.entries[i].addresses.push(addr),
            None => {
                self.index.insert(host.clone(), self.entries.len());
                self.entries.push(HostOverrideEntry {
                    host,
                    addresses: vec![addr],
                });
            }
        }
    }

    /// Exact lookup. `host` must already be lowercased.
    pub fn get(&self, host: &str) -> Option<&[IpAddr]> {
        self.index
            .get(host)
            .map(|&i| self.entries[i].addresses.as_slice())
    }

    /// First entry whose key equals `host` or is a dot-boundary suffix of it.
    pub fn suffix_match(&self, host: &str) -> Option<&[IpAddr]> {
        self.entries
            .iter()
            .find(|entry| is_dot_suffix(host, &entry.host))
            .map(|entry| entry.addresses.as_slice())
    }

    /// Entries in first-appearance order.
    pub fn iter(&self) -> impl Iterator<Item = &HostOverrideEntry> {
        self.entries.iter()
    }

    /// Number of distinct hosts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table has no hosts.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `host == suffix || host.ends_with("." + suffix)`, without allocating.
pub(crate) fn is_dot_suffix(host: &str, suffix: &str) -> bool {
    if suffix.is_empty() {
        return false;
    }
    if host == suffix {
        return true;
    }
    host.len() > suffix.len()
        && host.ends_with(suffix)
        && host.as_bytes()[host.len() - suffix.len() - 1] == b'.'
}
