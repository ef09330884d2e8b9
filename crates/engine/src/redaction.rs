//! PII redaction — the two-phase redact/rehydrate boundary.
//!
//! Nothing crosses from clinical context to the model without passing
//! through [`redact`]. Identifying fields become stable placeholders
//! (`PATIENT_NAME`, `CONTACT_1`, ...) with a reversible mapping that lives
//! only in request-local memory. Free-text fields are additionally scanned
//! for phone numbers, email addresses, SSNs, and street addresses.
//!
//! Rehydration is the inverse: placeholders in generated output are
//! replaced from the mapping, so rehydration can never introduce a value
//! that was absent from the original context.

use std::sync::LazyLock;

use aftercare_core::patient::{AgeBand, Allergy, Gender, Medication};
use aftercare_core::record::{DischargeNote, MedicalRecord};
use regex::Regex;

use crate::context::ClinicalContext;

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{3}[-.]?\d{3}[-.]?\d{4}\b").expect("valid phone regex"));
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("valid email regex")
});
static SSN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{3}-?\d{2}-?\d{4}\b").expect("valid ssn regex"));
static ADDRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b\d{1,5}\s+[A-Za-z0-9\s]+(?:Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd|Lane|Ln|Drive|Dr|Court|Ct|Place|Pl|Way)\b",
    )
    .expect("valid address regex")
});

/// The reversible placeholder → original mapping for one request.
#[derive(Debug, Clone, Default)]
pub struct RedactionMap {
    entries: Vec<(String, String)>,
    next_contact: usize,
}

impl RedactionMap {
    fn insert(&mut self, placeholder: impl Into<String>, original: impl Into<String>) {
        self.entries.push((placeholder.into(), original.into()));
    }

    /// Register a contact value (phone/email) under the next stable
    /// `CONTACT_n` placeholder, reusing an existing one for repeat values.
    fn contact_placeholder(&mut self, original: &str) -> String {
        if let Some((p, _)) = self.entries.iter().find(|(_, o)| o == original) {
            return p.clone();
        }
        self.next_contact += 1;
        let placeholder = format!("CONTACT_{}", self.next_contact);
        self.insert(placeholder.clone(), original);
        placeholder
    }

    /// The original value behind a placeholder, if any.
    pub fn original_for(&self, placeholder: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(p, _)| p == placeholder)
            .map(|(_, o)| o.as_str())
    }

    /// Replace every known placeholder in `text` with its original value.
    /// Values never present in the mapping cannot appear in the output.
    pub fn rehydrate(&self, text: &str) -> String {
        let mut out = text.to_string();
        // Longest placeholders first: CONTACT_12 must not be clobbered by
        // a CONTACT_1 replacement.
        let mut entries: Vec<&(String, String)> = self.entries.iter().collect();
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        for (placeholder, original) in entries {
            out = out.replace(placeholder.as_str(), original);
        }
        out
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The model-facing projection of a [`ClinicalContext`]: clinically relevant
/// attributes only, all identifying data replaced by placeholders.
#[derive(Debug, Clone)]
pub struct RedactedContext {
    pub age_band: AgeBand,
    pub gender: Gender,
    pub medical_history: Vec<String>,
    pub allergies: Vec<Allergy>,
    pub current_medications: Vec<Medication>,
    /// Record with free-text fields scrubbed.
    pub record: Option<MedicalRecord>,
    /// Discharge note with free-text fields scrubbed.
    pub discharge_note: Option<DischargeNote>,
    /// Pre-rendered, scrubbed summary of the comprehensive history
    /// (clinical activities + visit counts), when in comprehensive mode.
    pub history_summary: Option<String>,
}

/// Redact a clinical context into its model-facing projection plus the
/// request-local mapping needed to reverse it.
pub fn redact(context: &ClinicalContext) -> (RedactedContext, RedactionMap) {
    let mut map = RedactionMap::default();
    let patient = &context.patient;

    map.insert("PATIENT_NAME", patient.full_name());
    if let Some(phone) = &patient.phone {
        map.contact_placeholder(phone);
    }
    if let Some(email) = &patient.email {
        map.contact_placeholder(email);
    }
    if let Some(contact) = &patient.emergency_contact {
        map.insert("EMERGENCY_CONTACT_NAME", contact.name.clone());
        map.contact_placeholder(&contact.phone);
        if let Some(email) = &contact.email {
            map.contact_placeholder(email);
        }
    }

    let scrub = |text: &str, map: &mut RedactionMap| scrub_free_text(text, patient, map);

    let record = context.record.as_ref().map(|r| {
        let mut r = r.clone();
        r.treatment_summary = scrub(&r.treatment_summary, &mut map);
        r.physician_notes = r.physician_notes.as_deref().map(|t| scrub(t, &mut map));
        r.nursing_notes = r.nursing_notes.as_deref().map(|t| scrub(t, &mut map));
        r
    });

    let discharge_note = context.discharge_note.as_ref().map(|n| {
        let mut n = n.clone();
        n.discharge_summary = scrub(&n.discharge_summary, &mut map);
        n.follow_up_instructions = n.follow_up_instructions.as_deref().map(|t| scrub(t, &mut map));
        n.activity_restrictions = n.activity_restrictions.as_deref().map(|t| scrub(t, &mut map));
        n.diet_instructions = n.diet_instructions.as_deref().map(|t| scrub(t, &mut map));
        n.warning_signs = n.warning_signs.as_deref().map(|t| scrub(t, &mut map));
        n
    });

    let history_summary = context.history.as_ref().map(|h| {
        let mut lines = Vec::new();
        lines.push(format!(
            "Total visits: {}, records on file: {}",
            h.visits.len(),
            h.medical_records.len()
        ));
        if let Some(last) = h.visits.first() {
            lines.push(format!("Last visit type: {} ({})", last.visit_type, last.status));
        }
        for activity in h.activities.iter().filter(|a| a.is_clinical()).take(10) {
            lines.push(format!("- [{}] {}", activity.activity_type, activity.description));
        }
        scrub_free_text(&lines.join("\n"), patient, &mut map)
    });

    let redacted = RedactedContext {
        age_band: context.age_band,
        gender: patient.gender,
        medical_history: patient.medical_history.clone(),
        allergies: patient.allergies.clone(),
        current_medications: patient.current_medications.clone(),
        record,
        discharge_note,
        history_summary,
    };

    (redacted, map)
}

/// Scrub one free-text field: patient name occurrences become
/// `PATIENT_NAME`, detected contact values become `CONTACT_n`, SSNs and
/// street addresses are masked outright (they are never rehydrated).
/// Also applied to inbound question text, which is patient-authored and
/// just as likely to carry identifiers.
pub(crate) fn scrub_free_text(
    text: &str,
    patient: &aftercare_core::Patient,
    map: &mut RedactionMap,
) -> String {
    let mut out = text.to_string();

    // Name occurrences, longest form first so "Ada Lovelace" wins over
    // "Ada". Emergency contact names cross the boundary too; tokens the
    // contact shares with the patient (a family surname) resolve to the
    // patient's placeholder.
    let patient_tokens = [
        patient.full_name(),
        patient.last_name.clone(),
        patient.first_name.clone(),
    ];
    let mut names: Vec<(String, &str)> = Vec::new();
    if let Some(contact) = &patient.emergency_contact {
        names.push((contact.name.clone(), "EMERGENCY_CONTACT_NAME"));
        for part in contact.name.split_whitespace() {
            if !patient_tokens.iter().any(|t| t.eq_ignore_ascii_case(part)) {
                names.push((part.to_string(), "EMERGENCY_CONTACT_NAME"));
            }
        }
    }
    for token in patient_tokens {
        names.push((token, "PATIENT_NAME"));
    }
    names.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    for (needle, placeholder) in &names {
        if needle.len() >= 2 {
            out = replace_word_case_insensitive(&out, needle, placeholder);
        }
    }

    // Emails before phones: an email can embed digit runs.
    out = replace_all_mapped(&EMAIL_RE, &out, map);
    // SSN before phone; both are digit patterns and SSN is the stricter mask.
    out = SSN_RE.replace_all(&out, "XXX-XX-XXXX").into_owned();
    out = replace_all_mapped(&PHONE_RE, &out, map);
    out = ADDRESS_RE.replace_all(&out, "ADDRESS_REDACTED").into_owned();

    out
}

fn replace_all_mapped(re: &Regex, text: &str, map: &mut RedactionMap) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for m in re.find_iter(text) {
        out.push_str(&text[last..m.start()]);
        out.push_str(&map.contact_placeholder(m.as_str()));
        last = m.end();
    }
    out.push_str(&text[last..]);
    out
}

/// Case-insensitive whole-word replacement. Matching on word boundaries
/// keeps a short surname ("Li", "Ng") from mangling clinical terms that
/// merely contain it ("Lisinopril").
fn replace_word_case_insensitive(text: &str, needle: &str, replacement: &str) -> String {
    let lower_text = text.to_lowercase();
    let lower_needle = needle.to_lowercase();
    if lower_needle.is_empty() {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut search = 0;
    while let Some(pos) = lower_text[search..].find(&lower_needle) {
        let start = search + pos;
        let end = start + lower_needle.len();
        let bounded = lower_text[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric())
            && lower_text[end..]
                .chars()
                .next()
                .is_none_or(|c| !c.is_alphanumeric());
        if bounded {
            out.push_str(&text[last..start]);
            out.push_str(replacement);
            last = end;
            search = end;
        } else {
            let step = lower_text[start..].chars().next().map_or(1, char::len_utf8);
            search = start + step;
        }
    }
    out.push_str(&text[last..]);
    out
}
