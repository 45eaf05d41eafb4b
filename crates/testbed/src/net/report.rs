use std::fmt;
use std::net::Ipv4Addr;

/// One host/address pair whose observed result differs from the expectation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub host: String,
    pub addr: String,
    pub ip: Ipv4Addr,
    pub want: String,
    pub got: String,
}

/// Outcome of one network check over many host/address pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    check: &'static str,
    checked: usize,
    mismatches: Vec<Mismatch>,
}

impl CheckReport {
    pub(crate) fn new(check: &'static str, checked: usize, mismatches: Vec<Mismatch>) -> Self {
        Self {
            check,
            checked,
            mismatches,
        }
    }

    /// Name of the probe, e.g. `reachable` or `traceroute`.
    pub fn check(&self) -> &'static str {
        self.check
    }

    /// Number of pairs that were probed.
    pub fn checked(&self) -> usize {
        self.checked
    }

    pub fn mismatches(&self) -> &[Mismatch] {
        &self.mismatches
    }

    pub fn is_ok(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// Fails the calling test with the full diff if anything mismatched.
    #[track_caller]
    pub fn assert_ok(&self) {
        if !self.is_ok() {
            panic!("{self}");
        }
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            return write!(
                f,
                "{} gave the expected result for all {} host/addr combinations",
                self.check, self.checked
            );
        }
        write!(
            f,
            "{} gave the wrong result for the following host/addr combinations:",
            self.check
        )?;
        for m in &self.mismatches {
            write!(
                f,
                "\n  {} -> {} ({}): want {}, got {}",
                m.host, m.addr, m.ip, m.want, m.got
            )?;
        }
        Ok(())
    }
}
