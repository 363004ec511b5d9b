use crate::model::{FIELD_BUSINESS_NAME, FIELD_CLIENT_NAME, FormData, LineItem};

/// Required fields gating preview and download.
pub const DOWNLOAD_REQUIRED_FIELDS: [&str; 2] = [FIELD_BUSINESS_NAME, FIELD_CLIENT_NAME];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    fn from_errors(errors: Vec<String>) -> Self {
        Self { valid: errors.is_empty(), errors }
    }
}

/// Return the required field names that are absent or whitespace-only,
/// in the order they were asked for.
pub fn validate_required_fields(form: &FormData, required: &[&str]) -> Vec<String> {
    required
        .iter()
        .filter(|field| {
            form.get(**field)
                .map(|value| value.trim().is_empty())
                .unwrap_or(true)
        })
        .map(|field| field.to_string())
        .collect()
}

/// Check line-item completeness. A row can emit both a description error and
/// a rate error; the list keeps row order.
pub fn validate_line_items(rows: &[LineItem]) -> ValidationResult {
    if rows.is_empty() {
        return ValidationResult::from_errors(vec![
            "At least one line item is required".to_string(),
        ]);
    }

    let mut errors = Vec::new();
    for (index, row) in rows.iter().enumerate() {
        if row.description.trim().is_empty() {
            errors.push(format!("Line item {}: Description is required", index + 1));
        }
        // Written so a NaN rate fails too.
        if !(row.rate > 0.0) {
            errors.push(format!("Line item {}: Rate must be greater than 0", index + 1));
        }
    }

    ValidationResult::from_errors(errors)
}

/// The authoritative pre-download gate: required fields first, then line
/// items. Callers must surface every error, not just the first.
pub fn validate_before_download(form: &FormData, rows: &[LineItem]) -> ValidationResult {
    let mut errors: Vec<String> = validate_required_fields(form, &DOWNLOAD_REQUIRED_FIELDS)
        .into_iter()
        .map(|field| format!("{} is required", field))
        .collect();

    errors.extend(validate_line_items(rows).errors);

    ValidationResult::from_errors(errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> FormData {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn row(id: u32, description: &str, rate: f64) -> LineItem {
        LineItem {
            description: description.to_string(),
            rate,
            ..LineItem::new(id)
        }
    }

    #[test]
    fn whitespace_only_fields_are_missing() {
        let data = form(&[("businessName", "  ")]);
        assert_eq!(
            validate_required_fields(&data, &["businessName"]),
            vec!["businessName"]
        );
    }

    #[test]
    fn missing_fields_follow_requested_order() {
        let data = form(&[("clientName", "Client Inc.")]);
        let missing = validate_required_fields(&data, &["owner", "businessName", "clientName"]);
        assert_eq!(missing, vec!["owner", "businessName"]);
    }

    #[test]
    fn present_fields_pass() {
        let data = form(&[("businessName", "Dragon Corp")]);
        assert!(validate_required_fields(&data, &["businessName"]).is_empty());
    }

    #[test]
    fn empty_rows_is_a_single_error() {
        let result = validate_line_items(&[]);
        assert!(!result.valid);
        assert_eq!(result.errors, vec!["At least one line item is required"]);
    }

    #[test]
    fn one_row_can_emit_both_errors() {
        let result = validate_line_items(&[row(0, "", 0.0)]);
        assert!(!result.valid);
        assert_eq!(
            result.errors,
            vec![
                "Line item 1: Description is required",
                "Line item 1: Rate must be greater than 0",
            ]
        );
    }

    #[test]
    fn indices_are_one_based_and_ordered() {
        let rows = [row(0, "Design", 100.0), row(1, "", 50.0), row(2, "Hosting", 0.0)];
        let result = validate_line_items(&rows);
        assert_eq!(
            result.errors,
            vec![
                "Line item 2: Description is required",
                "Line item 3: Rate must be greater than 0",
            ]
        );
    }

    #[test]
    fn negative_rate_is_rejected() {
        let result = validate_line_items(&[row(0, "Refund", -5.0)]);
        assert_eq!(result.errors, vec!["Line item 1: Rate must be greater than 0"]);
    }

    #[test]
    fn valid_rows_pass() {
        let result = validate_line_items(&[row(0, "Service", 100.0)]);
        assert!(result.valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn download_gate_passes_complete_form() {
        let data = form(&[("businessName", "Dragon Corp"), ("clientName", "Client Inc.")]);
        let rows = [row(0, "Service", 100.0)];
        assert!(validate_before_download(&data, &rows).valid);
    }

    #[test]
    fn download_gate_reports_missing_business_name() {
        let data = form(&[("businessName", ""), ("clientName", "Client Inc.")]);
        let rows = [row(0, "Service", 100.0)];
        let result = validate_before_download(&data, &rows);
        assert!(!result.valid);
        assert!(result.errors.contains(&"businessName is required".to_string()));
    }

    #[test]
    fn download_gate_collects_every_error() {
        let result = validate_before_download(&FormData::new(), &[]);
        assert_eq!(
            result.errors,
            vec![
                "businessName is required",
                "clientName is required",
                "At least one line item is required",
            ]
        );
    }
}
