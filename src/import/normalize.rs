//! Turns one raw spreadsheet/CSV row (string-keyed, lower-cased headers,
//! inconsistent naming and value encodings) into a canonical donor record.

use chrono::{DateTime, NaiveDate};
use std::collections::HashMap;
use unicode_normalization::UnicodeNormalization;

/// Ordered header aliases per canonical field; the first non-empty match wins.
struct AliasSpec {
    field: &'static str,
    aliases: &'static [&'static str],
}

const FIELD_ALIASES: &[AliasSpec] = &[
    AliasSpec { field: "first_name", aliases: &["first_name", "firstname", "first"] },
    AliasSpec { field: "last_name", aliases: &["last_name", "lastname", "last", "surname"] },
    AliasSpec {
        field: "organization_name",
        aliases: &["organization_name", "organizationname", "organization", "org_name", "org"],
    },
    AliasSpec { field: "pmm", aliases: &["pmm", "primary_manager"] },
    AliasSpec { field: "smm", aliases: &["smm", "secondary_manager"] },
    AliasSpec { field: "vmm", aliases: &["vmm", "volunteer_manager"] },
    AliasSpec { field: "total_donations", aliases: &["total_donations", "totaldonations", "total_donation_amount"] },
    AliasSpec { field: "total_pledges", aliases: &["total_pledges", "totalpledges", "total_pledge"] },
    AliasSpec { field: "largest_gift", aliases: &["largest_gift", "largestgift"] },
    AliasSpec { field: "last_gift_amount", aliases: &["last_gift_amount", "lastgiftamount", "last_gift"] },
    AliasSpec { field: "first_gift_date", aliases: &["first_gift_date", "firstgiftdate"] },
    AliasSpec { field: "last_gift_date", aliases: &["last_gift_date", "lastgiftdate"] },
    AliasSpec { field: "excluded", aliases: &["excluded", "exclude"] },
    AliasSpec { field: "deceased", aliases: &["deceased"] },
    AliasSpec { field: "email", aliases: &["email", "email_address", "emailaddress"] },
    AliasSpec { field: "phone", aliases: &["phone", "phone_number", "phonenumber", "telephone"] },
    AliasSpec { field: "address", aliases: &["address", "address_line1", "street_address"] },
    AliasSpec { field: "city", aliases: &["city", "town"] },
    AliasSpec {
        field: "contact_preference",
        aliases: &["contact_preference", "contactpreference", "communication_preference", "contact_phone_type"],
    },
    AliasSpec { field: "tags", aliases: &["tags", "tag"] },
    AliasSpec { field: "notes", aliases: &["notes", "note", "comments"] },
];

#[derive(Debug, Clone, Default)]
pub struct NormalizedDonor {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub organization_name: Option<String>,
    pub pmm: Option<String>,
    pub smm: Option<String>,
    pub vmm: Option<String>,
    pub total_donations: f64,
    pub total_pledges: f64,
    pub largest_gift: f64,
    pub last_gift_amount: f64,
    pub first_gift_date: Option<NaiveDate>,
    pub last_gift_date: Option<NaiveDate>,
    pub excluded: bool,
    pub deceased: bool,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub contact_preference: Option<String>,
    pub tags: Vec<String>,
    pub notes: Option<String>,
}

impl NormalizedDonor {
    /// At least one identity field must survive normalization for the row to
    /// be importable.
    pub fn has_identity(&self) -> bool {
        self.first_name.is_some() || self.last_name.is_some() || self.organization_name.is_some()
    }
}

/// First non-empty value among the canonical field's header aliases.
fn field<'a>(row: &'a HashMap<String, String>, canonical: &str) -> Option<&'a str> {
    let spec = FIELD_ALIASES.iter().find(|s| s.field == canonical)?;
    spec.aliases
        .iter()
        .filter_map(|alias| row.get(*alias))
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
}

/// NFC-normalize so visually identical names with different combining-character
/// encodings do not produce duplicate donors.
pub fn normalize_text(value: &str) -> String {
    value.trim().nfc().collect()
}

fn text_field(row: &HashMap<String, String>, canonical: &str) -> Option<String> {
    field(row, canonical).map(normalize_text)
}

/// Inherited heuristic: integers above 1e9 are Unix epoch seconds, anything
/// else gets a pass through the known date formats, and failures become None.
/// Small epoch values and unrecognized strings are silently dropped.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(n) = raw.parse::<i64>() {
        if n > 1_000_000_000 {
            return DateTime::from_timestamp(n, 0).map(|dt| dt.date_naive());
        }
        return None;
    }
    const FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y", "%Y/%m/%d", "%b %d, %Y"];
    for fmt in FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(d);
        }
    }
    DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive())
}

/// Monetary fields are non-negative everywhere a donor is written, so a
/// negative value counts as unparseable and takes the fallback.
pub fn parse_amount(raw: &str, default: f64) -> f64 {
    let cleaned = raw.trim().trim_start_matches('$').replace(',', "");
    if cleaned.is_empty() {
        return default;
    }
    match cleaned.parse::<f64>() {
        Ok(v) if v >= 0.0 => v,
        _ => default,
    }
}

pub fn parse_boolean(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "yes" | "true" | "1" | "y")
}

/// Normalize one raw row. Malformed individual fields fall back to defaults;
/// the row itself is only unusable when every identity field is empty, which
/// the caller checks via `has_identity`.
pub fn normalize_row(row: &HashMap<String, String>) -> NormalizedDonor {
    let tags = field(row, "tags")
        .map(|raw| {
            raw.split(',')
                .map(normalize_text)
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default();

    NormalizedDonor {
        first_name: text_field(row, "first_name"),
        last_name: text_field(row, "last_name"),
        organization_name: text_field(row, "organization_name"),
        pmm: text_field(row, "pmm"),
        smm: text_field(row, "smm"),
        vmm: text_field(row, "vmm"),
        total_donations: field(row, "total_donations").map_or(0.0, |v| parse_amount(v, 0.0)),
        total_pledges: field(row, "total_pledges").map_or(0.0, |v| parse_amount(v, 0.0)),
        largest_gift: field(row, "largest_gift").map_or(0.0, |v| parse_amount(v, 0.0)),
        last_gift_amount: field(row, "last_gift_amount").map_or(0.0, |v| parse_amount(v, 0.0)),
        first_gift_date: field(row, "first_gift_date").and_then(parse_date),
        last_gift_date: field(row, "last_gift_date").and_then(parse_date),
        excluded: field(row, "excluded").map_or(false, parse_boolean),
        deceased: field(row, "deceased").map_or(false, parse_boolean),
        email: text_field(row, "email"),
        phone: text_field(row, "phone"),
        address: text_field(row, "address"),
        city: text_field(row, "city"),
        contact_preference: text_field(row, "contact_preference"),
        tags,
        notes: text_field(row, "notes"),
    }
}
