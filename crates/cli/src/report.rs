//! Round-trip report rendering.

use crate::abi::ObjectSummary;
use serde::Serialize;
use std::fmt::Write;
use std::time::Duration;

#[derive(Debug, Serialize)]
pub struct Report {
    pub satellite: String,
    pub bucket: String,
    pub key: String,
    pub bytes: usize,
    pub write_calls: usize,
    pub verified: bool,
    pub upload_ms: u128,
    pub download_ms: u128,
    pub object: ObjectSummary,
    pub listing: Vec<ObjectSummary>,
}

impl Report {
    pub fn throughput(bytes: usize, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        bytes as f64 / secs / (1024.0 * 1024.0)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "satellite   {}", self.satellite);
        let _ = writeln!(out, "object      {}/{}", self.bucket, self.key);
        let _ = writeln!(
            out,
            "uploaded    {} bytes in {} writes ({} ms)",
            self.bytes, self.write_calls, self.upload_ms
        );
        let _ = writeln!(
            out,
            "downloaded  {} ms, {}",
            self.download_ms,
            if self.verified { "verified" } else { "MISMATCH" }
        );
        if self.object.expires > 0 {
            let _ = writeln!(out, "expires     {}", self.object.expires);
        }
        let _ = writeln!(out, "listing     {} entries", self.listing.len());
        for item in &self.listing {
            let marker = if item.is_prefix { "PRE" } else { "OBJ" };
            let _ = writeln!(out, "  {marker} {:>10}  {}", item.content_length, item.key);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(key: &str, is_prefix: bool) -> ObjectSummary {
        ObjectSummary {
            key: key.into(),
            is_prefix,
            content_length: 4,
            created: 1,
            expires: 0,
            custom: Vec::new(),
        }
    }

    #[test]
    fn render_marks_prefixes() {
        let report = Report {
            satellite: "memory://local".into(),
            bucket: "demo".into(),
            key: "a".into(),
            bytes: 4,
            write_calls: 1,
            verified: true,
            upload_ms: 0,
            download_ms: 0,
            object: summary("a", false),
            listing: vec![summary("a", false), summary("dir/", true)],
        };
        let text = report.render();
        assert!(text.contains("verified"));
        assert!(text.contains("PRE"));
        assert!(text.contains("listing     2 entries"));
    }

    #[test]
    fn throughput_handles_zero_elapsed() {
        assert_eq!(Report::throughput(10, Duration::ZERO), 0.0);
    }
}
