use std::time::{Duration, Instant};

use crate::formatting::number_with_commas;
use crate::model::{
    COMPANY_FIELDS, CompanyInfo, FIELD_BUSINESS_NAME, FIELD_CLIENT_NAME, FIELD_DATE,
    FIELD_INVOICE_NO, FIELD_NOTES, FormData, Invoice, InvoiceStatus, LineItem, RenderContext,
    Settings,
};
use crate::numbering::generate_next_invoice_number;
use crate::storage::{self, KeyValueStore};
use crate::validation::{ValidationResult, validate_before_download};

/// Quiet period before a company-info edit is persisted.
pub const AUTOSAVE_DELAY: Duration = Duration::from_millis(500);

/// Cancellable-delay primitive for debounced writes. Each `schedule`
/// supersedes whatever was pending and restarts the window, so only the last
/// edit within a window fires. Single-threaded: the owner drives `poll`.
#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<T>,
    deadline: Option<Instant>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self { delay, pending: None, deadline: None }
    }

    pub fn schedule(&mut self, value: T, now: Instant) {
        self.pending = Some(value);
        self.deadline = Some(now + self.delay);
    }

    /// Hand out the pending value once the quiet period has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match self.deadline {
            Some(deadline) if now >= deadline => self.take(),
            _ => None,
        }
    }

    /// Fire immediately, ignoring the remaining delay.
    pub fn flush(&mut self) -> Option<T> {
        self.take()
    }

    pub fn cancel(&mut self) {
        self.take();
    }

    fn take(&mut self) -> Option<T> {
        self.deadline = None;
        self.pending.take()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Editing,
    Previewing,
}

/// Editable line-item fields. Rate and quantity go through numeric coercion
/// on every direct edit; description is taken verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowField {
    Description,
    Rate,
    Quantity,
}

/// Live state for one invoice editing session: the form field map, the
/// ordered line items, and the editing/previewing state machine that gates
/// preview on validation.
pub struct Session {
    pub form: FormData,
    pub rows: Vec<LineItem>,
    pub currency_code: String,
    pub currency_symbol: String,
    pub template: Option<String>,
    pub logo: Option<String>,
    mode: Mode,
    total: String,
    next_row_id: u32,
    logo_token: u64,
    autosave: Debouncer<CompanyInfo>,
}

impl Session {
    pub fn new() -> Self {
        let mut session = Self {
            form: FormData::new(),
            rows: vec![LineItem::new(0)],
            currency_code: "USD".to_string(),
            currency_symbol: "$".to_string(),
            template: None,
            logo: None,
            mode: Mode::Editing,
            total: String::new(),
            next_row_id: 1,
            logo_token: 0,
            autosave: Debouncer::new(AUTOSAVE_DELAY),
        };
        session.recalculate_total();
        session
    }

    /// Prefill saved company fields and logo, and assign the next invoice
    /// number when auto-increment is on.
    pub fn start(&mut self, store: &dyn KeyValueStore, settings: &Settings) {
        if let Some(info) = storage::load_company_info(store) {
            self.apply_company_info(&info);
        }
        if let Some(logo) = storage::load_logo(store) {
            self.logo = Some(logo);
        }
        if !settings.default_notes.is_empty() {
            self.form
                .insert(FIELD_NOTES.to_string(), settings.default_notes.clone());
        }
        if settings.auto_increment {
            let invoices = storage::load_invoices(store);
            let number = next_invoice_number(settings, &invoices);
            self.form.insert(FIELD_INVOICE_NO.to_string(), number);
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn total(&self) -> &str {
        &self.total
    }

    // ------------------------------------------
    // Form fields
    // ------------------------------------------

    /// Set a form field. Edits to company fields schedule the debounced
    /// profile autosave; each edit restarts the window (last write wins).
    pub fn set_field(&mut self, name: &str, value: &str, now: Instant) {
        self.form.insert(name.to_string(), value.to_string());

        if COMPANY_FIELDS.contains(&name) {
            let snapshot = self.company_snapshot();
            if snapshot.is_empty() {
                // An edit that erases the last profile field supersedes any
                // pending autosave; letting it fire would persist stale data.
                self.autosave.cancel();
            } else {
                self.autosave.schedule(snapshot, now);
            }
        }
    }

    pub fn field(&self, name: &str) -> &str {
        self.form.get(name).map(String::as_str).unwrap_or("")
    }

    /// Pending autosave ready to persist, if its quiet period has elapsed.
    pub fn poll_autosave(&mut self, now: Instant) -> Option<CompanyInfo> {
        self.autosave.poll(now)
    }

    /// Force out any pending autosave, e.g. when the session ends.
    pub fn flush_autosave(&mut self) -> Option<CompanyInfo> {
        self.autosave.flush()
    }

    /// Extract the company profile from the current form fields.
    pub fn company_snapshot(&self) -> CompanyInfo {
        let get = |name: &str| {
            self.form
                .get(name)
                .filter(|value| !value.is_empty())
                .cloned()
        };
        CompanyInfo {
            business_name: get("businessName"),
            email: get("email"),
            address: get("address"),
            city: get("city"),
            zipcode: get("zipcode"),
            phone: get("phone"),
            website: get("website"),
        }
    }

    pub fn apply_company_info(&mut self, info: &CompanyInfo) {
        let mut put = |name: &str, value: &Option<String>| {
            if let Some(value) = value {
                self.form.insert(name.to_string(), value.clone());
            }
        };
        put("businessName", &info.business_name);
        put("email", &info.email);
        put("address", &info.address);
        put("city", &info.city);
        put("zipcode", &info.zipcode);
        put("phone", &info.phone);
        put("website", &info.website);
    }

    /// Reset the company fields and logo after a "clear saved data".
    pub fn clear_company_fields(&mut self) {
        for field in COMPANY_FIELDS {
            self.form.insert(field.to_string(), String::new());
        }
        self.logo = None;
        self.autosave.cancel();
    }

    // ------------------------------------------
    // Line items
    // ------------------------------------------

    pub fn add_row(&mut self) -> u32 {
        let id = self.next_row_id;
        self.next_row_id += 1;
        self.rows.push(LineItem::new(id));
        self.recalculate_total();
        id
    }

    pub fn remove_row(&mut self, id: u32) {
        self.rows.retain(|row| row.id != id);
        self.recalculate_total();
    }

    /// Edit one field of a row. Rate and quantity are coerced to numbers
    /// (unparsable input becomes 0) and the cached amount is recomputed.
    pub fn update_row(&mut self, id: u32, field: RowField, value: &str) {
        let Some(row) = self.rows.iter_mut().find(|row| row.id == id) else {
            return;
        };
        match field {
            RowField::Description => row.description = value.to_string(),
            RowField::Rate => {
                row.rate = value.trim().parse().unwrap_or(0.0);
                row.amount = row.computed_amount();
            }
            RowField::Quantity => {
                row.quantity = value.trim().parse().unwrap_or(0);
                row.amount = row.computed_amount();
            }
        }
        self.recalculate_total();
    }

    /// Explicit override of a row's cached amount, bypassing the
    /// rate x quantity derivation.
    pub fn set_row_amount(&mut self, id: u32, amount: &str) {
        if let Some(row) = self.rows.iter_mut().find(|row| row.id == id) {
            row.amount = amount.to_string();
        }
        self.recalculate_total();
    }

    fn recalculate_total(&mut self) {
        let sum: f64 = self.rows.iter().map(|row| parse_amount(&row.amount)).sum();
        self.total = number_with_commas(format!("{:.2}", sum));
    }

    // ------------------------------------------
    // Logo upload
    // ------------------------------------------

    /// Start a logo upload. Uploads complete asynchronously and out of order,
    /// so each gets a monotonic token and only the latest one may land.
    pub fn begin_logo_upload(&mut self) -> u64 {
        self.logo_token += 1;
        self.logo_token
    }

    /// Apply a finished upload. Stale completions (superseded by a newer
    /// `begin_logo_upload`) are discarded.
    pub fn complete_logo_upload(&mut self, token: u64, data: String) -> bool {
        if token != self.logo_token {
            log::warn!("Discarding stale logo upload (token {})", token);
            return false;
        }
        self.logo = Some(data);
        true
    }

    // ------------------------------------------
    // Preview state machine
    // ------------------------------------------

    /// `editing -> previewing`, gated by the required-field and line-item
    /// checks. On failure the session stays in editing and every error is
    /// returned; on success the mode flips.
    pub fn try_preview(&mut self) -> ValidationResult {
        let result = validate_before_download(&self.form, &self.rows);
        if result.valid {
            self.mode = Mode::Previewing;
        }
        result
    }

    /// `previewing -> editing`, unconditional.
    pub fn back_to_edit(&mut self) {
        self.mode = Mode::Editing;
    }

    // ------------------------------------------
    // Outputs
    // ------------------------------------------

    /// Snapshot the session as an invoice history record. A blank id lets the
    /// store generate one on first save.
    pub fn snapshot(&self, id: &str) -> Invoice {
        Invoice {
            id: id.to_string(),
            form_data: self.form.clone(),
            rows: self.rows.clone(),
            status: InvoiceStatus::Draft,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    /// The fully-computed prop bag a PDF renderer consumes. Only meaningful
    /// after `try_preview` has passed.
    pub fn render_context(&self, settings: &Settings) -> RenderContext {
        let get = |name: &str| self.field(name).to_string();
        RenderContext {
            template: self.template.clone().unwrap_or_else(|| "classic".to_string()),
            business_name: get(FIELD_BUSINESS_NAME),
            email: get("email"),
            address: get("address"),
            city: get("city"),
            zipcode: get("zipcode"),
            phone: get("phone"),
            website: get("website"),
            client_name: get(FIELD_CLIENT_NAME),
            client_email: get("clientEmail"),
            client_address: get("clientAddress"),
            client_city: get("clientCity"),
            client_zipcode: get("clientZipcode"),
            client_phone: get("clientPhone"),
            invoice_no: get(FIELD_INVOICE_NO),
            date: get(FIELD_DATE),
            notes: get(FIELD_NOTES),
            rows: self.rows.clone(),
            logo: self.logo.clone(),
            currency_symbol: self.currency_symbol.clone(),
            total_amount: self.total.clone(),
            branding: settings.branding.clone(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a cached amount string the way the editor sums it: the leading
/// numeric prefix counts ("12abc" is 12), anything without one counts as 0.
pub fn parse_amount(value: &str) -> f64 {
    let trimmed = value.trim_start();
    let bytes = trimmed.as_bytes();

    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    let mut seen_dot = false;
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => end += 1,
            b'.' if !seen_dot => {
                seen_dot = true;
                end += 1;
            }
            _ => break,
        }
    }

    trimmed[..end].parse().unwrap_or(0.0)
}

/// Next invoice number for a new session: increments the most recently
/// updated invoice's number, or starts the sequence from the format.
pub fn next_invoice_number(settings: &Settings, invoices: &[Invoice]) -> String {
    let last = invoices
        .iter()
        .max_by(|a, b| a.updated_at.cmp(&b.updated_at))
        .and_then(|invoice| invoice.form_data.get(FIELD_INVOICE_NO))
        .map(String::as_str)
        .filter(|number| !number.is_empty());
    generate_next_invoice_number(last, &settings.auto_increment_format)
}
