//! Append-only NDJSON event stream on stderr.
//!
//! Format:
//!   {"src":"vicad","event":"<event>","run_id":<run_id>}
//!   {"src":"vicad","event":"<event>","run_id":<run_id>,"details":"<escaped>"}
//!
//! `serde_json` does the escaping, so multi-line diagnostics and control
//! characters stay inside one valid JSON line. Consumers grep it:
//!   vicad run model.vicad.ts 2>build/vicad.log
//!   grep '"event":"RUN_DONE"' build/vicad.log | jq .

use std::io::Write;

/// Emit one event record.
pub fn log_event(event: &str, run_id: u64) {
    write_record(event, run_id, None);
}

/// Emit one event record with a details string.
pub fn log_event_with(event: &str, run_id: u64, details: &str) {
    if details.is_empty() {
        write_record(event, run_id, None);
    } else {
        write_record(event, run_id, Some(details));
    }
}

fn write_record(event: &str, run_id: u64, details: Option<&str>) {
    let record = match details {
        Some(d) => serde_json::json!({
            "src": "vicad",
            "event": event,
            "run_id": run_id,
            "details": d,
        }),
        None => serde_json::json!({
            "src": "vicad",
            "event": event,
            "run_id": run_id,
        }),
    };
    let mut err = std::io::stderr().lock();
    // Best effort: a full stderr pipe must not take the transport down.
    let _ = writeln!(err, "{record}");
}

#[cfg(test)]
mod tests {
    #[test]
    fn details_with_newlines_stay_one_json_line() {
        let record = serde_json::json!({
            "src": "vicad",
            "event": "SCRIPT_ERROR",
            "run_id": 3,
            "details": "line one\nline \"two\"\t",
        });
        let line = record.to_string();
        assert!(!line.contains('\n'));
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["details"], "line one\nline \"two\"\t");
    }
}
