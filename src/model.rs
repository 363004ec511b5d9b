use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// Form field names shared between the editing session and validation.
pub const FIELD_BUSINESS_NAME: &str = "businessName";
pub const FIELD_CLIENT_NAME: &str = "clientName";
pub const FIELD_INVOICE_NO: &str = "invoiceNo";
pub const FIELD_NOTES: &str = "notes";
pub const FIELD_DATE: &str = "date";

// Company profile fields mirrored from the form into the saved CompanyInfo.
pub const COMPANY_FIELDS: [&str; 7] = [
    "businessName",
    "email",
    "address",
    "city",
    "zipcode",
    "phone",
    "website",
];

/// Live form state: field name -> raw input value.
pub type FormData = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FontFamily {
    #[default]
    Helvetica,
    Times,
    Courier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Branding {
    pub primary_color: String,
    pub secondary_color: String,
    pub font_family: FontFamily,
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            primary_color: "#1a73e8".to_string(),
            secondary_color: "#f1f3f4".to_string(),
            font_family: FontFamily::Helvetica,
        }
    }
}

/// Application settings. Every field has a default so an older or partial
/// document merges over the defaults at load time; keys this version does not
/// know about are kept in `extra` and survive a save/load round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub currency: String,
    pub language: String,
    pub auto_increment: bool,
    pub auto_increment_format: String,
    pub default_notes: String,
    pub theme: Theme,
    pub branding: Branding,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            currency: "USD".to_string(),
            language: "en".to_string(),
            auto_increment: true,
            auto_increment_format: crate::numbering::DEFAULT_INVOICE_FORMAT.to_string(),
            default_notes: String::new(),
            theme: Theme::Light,
            branding: Branding::default(),
            extra: BTreeMap::new(),
        }
    }
}

/// The invoicing business's own saved profile, distinct from any invoice's
/// client fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CompanyInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zipcode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

impl CompanyInfo {
    pub fn is_empty(&self) -> bool {
        self.business_name.is_none()
            && self.email.is_none()
            && self.address.is_none()
            && self.city.is_none()
            && self.zipcode.is_none()
            && self.phone.is_none()
            && self.website.is_none()
    }
}

fn default_quantity() -> u32 {
    1
}

fn default_amount() -> String {
    "0.00".to_string()
}

/// One billable row of an invoice. `amount` caches the formatted
/// rate x quantity string so editing does not re-derive it and accumulate
/// floating point drift; the table update path may also set it directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub id: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rate: f64,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default = "default_amount")]
    pub amount: String,
}

impl LineItem {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            description: String::new(),
            rate: 0.0,
            quantity: 1,
            amount: default_amount(),
        }
    }

    pub fn computed_amount(&self) -> String {
        format!("{:.2}", self.rate * self.quantity as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    #[default]
    Draft,
    Paid,
    Void,
}

/// One saved invoice in history: a snapshot of the form plus its rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub form_data: FormData,
    #[serde(default)]
    pub rows: Vec<LineItem>,
    #[serde(default)]
    pub status: InvoiceStatus,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Client {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zipcode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Flat prop bag for a PDF renderer. The session only builds it from
/// validated, fully-computed state; the renderer consumes it opaquely.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderContext {
    pub template: String,
    pub business_name: String,
    pub email: String,
    pub address: String,
    pub city: String,
    pub zipcode: String,
    pub phone: String,
    pub website: String,
    pub client_name: String,
    pub client_email: String,
    pub client_address: String,
    pub client_city: String,
    pub client_zipcode: String,
    pub client_phone: String,
    pub invoice_no: String,
    pub date: String,
    pub notes: String,
    pub rows: Vec<LineItem>,
    pub logo: Option<String>,
    pub currency_symbol: String,
    pub total_amount: String,
    pub branding: Branding,
}
