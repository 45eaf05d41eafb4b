//! Scope timing for slow fleet operations.
//!
//! A [`Timer`] logs its name, arguments, any extra detail and the result at
//! `debug` level when it goes out of scope:
//!
//! ```text
//! Net::traceroute(pi1, external): elapsed time: 1.2345 seconds
//!     traceroute to 1.1.1.1 (1.1.1.1), 30 hops max, 60 byte packets
//!     Result: [192.168.0.1, 10.0.0.1, 1.1.1.1]
//! ```

use std::fmt::{Debug, Display};
use std::time::{Duration, Instant};

pub struct Timer {
    name: &'static str,
    args: Vec<String>,
    extras: Vec<String>,
    result: Option<String>,
    started: Instant,
}

impl Timer {
    pub fn start(name: &'static str) -> Self {
        Self {
            name,
            args: Vec::new(),
            extras: Vec::new(),
            result: None,
            started: Instant::now(),
        }
    }

    pub fn arg(mut self, arg: impl Display) -> Self {
        self.args.push(arg.to_string());
        self
    }

    pub fn add_extra(&mut self, extra: impl Display) {
        self.extras.push(extra.to_string());
    }

    pub fn set_result(&mut self, result: impl Debug) {
        self.result = Some(format!("{result:?}"));
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn render(&self, elapsed: Duration) -> String {
        let mut out = self.name.to_string();
        if !self.args.is_empty() {
            out.push('(');
            out.push_str(&self.args.join(", "));
            out.push(')');
        }
        out.push_str(&format!(
            ": elapsed time: {:.4} seconds",
            elapsed.as_secs_f64()
        ));

        let mut details: Vec<String> = self
            .extras
            .iter()
            .flat_map(|extra| extra.lines())
            .map(str::to_string)
            .collect();
        if let Some(result) = &self.result {
            details.push(format!("Result: {result}"));
        }
        for line in details.iter().filter(|line| !line.is_empty()) {
            out.push_str("\n    ");
            out.push_str(line);
        }
        out
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        tracing::debug!("{}", self.render(self.elapsed()));
    }
}
