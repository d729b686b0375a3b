//! Pipeline KPI rollup over fetched site records.
//!
//! Single pass over the records. Fields are read leniently: upstream mixes
//! `"ACTIVE"`/`"active"` and `"YES"`/`true`, and detail-less queries omit
//! some fields entirely. A missing field counts as "no".

use serde::Serialize;

use crate::site_activity::Record;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteKpis {
    pub total_sites: u64,
    pub active_sites: u64,
    pub inactive_sites: u64,
    pub consent_granted: u64,
    pub consent_pending: u64,
    pub consent_rate: f64,
    pub shared_sites: u64,
    pub share_rate: f64,
    pub sites_with_appointments: u64,
    pub appointment_rate: f64,
    pub appointments_with_consent: u64,
    pub appointments_without_consent: u64,
    pub appointment_rate_with_consent: f64,
    pub appointment_rate_without_consent: f64,
    pub sites_with_consent_count: u64,
    pub sites_without_consent_count: u64,
    pub shared_sites_with_consent: u64,
    pub shared_sites_without_consent: u64,
}

fn text_field<'a>(record: &'a Record, key: &str) -> Option<&'a str> {
    record.get(key).and_then(|v| v.as_str())
}

/// `true`, `"true"`, `"YES"` (any case) count as yes.
fn flag_field(record: &Record, key: &str) -> bool {
    match record.get(key) {
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::String(s)) => {
            s.eq_ignore_ascii_case("yes") || s.eq_ignore_ascii_case("true")
        }
        _ => false,
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

pub fn calculate_kpis(records: &[Record]) -> SiteKpis {
    let mut k = SiteKpis {
        total_sites: records.len() as u64,
        ..SiteKpis::default()
    };

    for record in records {
        if text_field(record, "site_status").is_some_and(|s| s.eq_ignore_ascii_case("active")) {
            k.active_sites += 1;
        }

        let consent = text_field(record, "consent").unwrap_or_default();
        let has_consent = consent.eq_ignore_ascii_case("yes");
        if has_consent {
            k.consent_granted += 1;
        } else if consent.eq_ignore_ascii_case("no") || consent.eq_ignore_ascii_case("pending") {
            k.consent_pending += 1;
        }

        let shared = flag_field(record, "is_shared");
        let appointment = flag_field(record, "has_appointment");
        if shared {
            k.shared_sites += 1;
        }
        if appointment {
            k.sites_with_appointments += 1;
        }

        if has_consent {
            k.sites_with_consent_count += 1;
            k.appointments_with_consent += appointment as u64;
            k.shared_sites_with_consent += shared as u64;
        } else {
            k.sites_without_consent_count += 1;
            k.appointments_without_consent += appointment as u64;
            k.shared_sites_without_consent += shared as u64;
        }
    }

    k.inactive_sites = k.total_sites - k.active_sites;
    k.consent_rate = percent(k.consent_granted, k.total_sites);
    k.share_rate = percent(k.shared_sites, k.total_sites);
    k.appointment_rate = percent(k.sites_with_appointments, k.total_sites);
    k.appointment_rate_with_consent =
        percent(k.appointments_with_consent, k.sites_with_consent_count);
    k.appointment_rate_without_consent =
        percent(k.appointments_without_consent, k.sites_without_consent_count);
    k
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_empty_input_has_zero_rates() {
        let k = calculate_kpis(&[]);
        assert_eq!(k, SiteKpis::default());
        assert_eq!(k.consent_rate, 0.0);
    }

    #[test]
    fn test_pipeline_counts_and_rates() {
        let records = vec![
            record(json!({ "site_status": "ACTIVE", "consent": "YES", "is_shared": true, "has_appointment": true })),
            record(json!({ "site_status": "active", "consent": "YES", "is_shared": true, "has_appointment": false })),
            record(json!({ "site_status": "inactive", "consent": "NO", "is_shared": false, "has_appointment": true })),
            record(json!({ "site_status": "ACTIVE", "consent": "PENDING", "is_shared": "true", "has_appointment": false })),
        ];

        let k = calculate_kpis(&records);
        assert_eq!(k.total_sites, 4);
        assert_eq!(k.active_sites, 3);
        assert_eq!(k.inactive_sites, 1);
        assert_eq!(k.consent_granted, 2);
        assert_eq!(k.consent_pending, 2);
        assert_eq!(k.consent_rate, 50.0);
        assert_eq!(k.shared_sites, 3);
        assert_eq!(k.share_rate, 75.0);
        assert_eq!(k.sites_with_appointments, 2);
        assert_eq!(k.appointment_rate, 50.0);
        assert_eq!(k.appointments_with_consent, 1);
        assert_eq!(k.appointments_without_consent, 1);
        assert_eq!(k.appointment_rate_with_consent, 50.0);
        assert_eq!(k.appointment_rate_without_consent, 50.0);
        assert_eq!(k.shared_sites_with_consent, 2);
        assert_eq!(k.shared_sites_without_consent, 1);
    }

    #[test]
    fn test_missing_fields_count_as_no() {
        let k = calculate_kpis(&[record(json!({ "siteId": "S-1" }))]);
        assert_eq!(k.total_sites, 1);
        assert_eq!(k.active_sites, 0);
        assert_eq!(k.inactive_sites, 1);
        assert_eq!(k.consent_granted, 0);
        assert_eq!(k.consent_pending, 0);
        assert_eq!(k.sites_without_consent_count, 1);
        assert_eq!(k.appointment_rate_with_consent, 0.0);
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(calculate_kpis(&[])).unwrap();
        assert!(json.get("sitesWithAppointments").is_some());
        assert!(json.get("appointmentRateWithConsent").is_some());
    }
}
