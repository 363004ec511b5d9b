use chrono::{Datelike, Local};
use regex::Regex;

pub const DEFAULT_INVOICE_FORMAT: &str = "INV-YYYY-XXX";

/// Derive the next sequential invoice number from the previous one.
///
/// With no previous number the format hint picks the starting value. With a
/// previous number the rightmost contiguous digit run is incremented in
/// place, left-padded with zeros to the run's original width (a minimum, not
/// a cap, so `099` rolls over to `100`), and everything around the run is
/// preserved verbatim. A number with no digits at all gets `-001` appended.
pub fn generate_next_invoice_number(last_number: Option<&str>, format: &str) -> String {
    let last = match last_number {
        Some(s) if !s.is_empty() => s,
        _ => {
            let year = Local::now().year();
            return match format {
                "INV-YYYY-XXX" => format!("INV-{}-001", year),
                "INV-XXX" => "INV-001".to_string(),
                _ => "001".to_string(),
            };
        }
    };

    let digit_run = Regex::new(r"\d+").unwrap();
    let run = match digit_run.find_iter(last).last() {
        Some(m) => m,
        None => return format!("{}-001", last),
    };

    let next = match run.as_str().parse::<u128>() {
        Ok(n) => n + 1,
        // Digit run too long to be a counter; start a fresh one instead.
        Err(_) => return format!("{}-001", last),
    };
    let padded = format!("{:0width$}", next, width = run.len());

    format!("{}{}{}", &last[..run.start()], padded, &last[run.end()..])
}
