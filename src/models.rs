use std::borrow::Cow;
use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::{Map, Value};

/// Display value for an absent `utmSource`.
pub const DIRECT_SOURCE: &str = "direct";
/// Display value for any other absent categorical field.
pub const UNSPECIFIED: &str = "(unspecified)";

/// One lead submission, normalized at ingestion.
///
/// Free-text and categorical fields keep the value the sheet sent (trimmed);
/// sentinels are applied on read through [`LeadRecord::category`], so the
/// serialized form round-trips through the normalizer unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeadRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub position: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_content: Option<String>,
    pub utm_term: Option<String>,
    pub page_variant: Option<String>,
    pub course_name: Option<String>,
    pub submit_at: Option<String>,
    /// Parsed `submit_at`; `None` when absent or unparseable.
    pub submitted_at: Option<NaiveDateTime>,
    /// Keys the schema does not know about, in arrival order.
    pub extra: Map<String, Value>,
    /// Known columns the source row carried, blank ones included.
    pub(crate) sent: BTreeSet<Field>,
}

/// Writes every column the record carries; blank known columns come out as
/// empty strings so the key set survives a round trip.
impl Serialize for LeadRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let known: Vec<Field> = self.known_columns().collect();
        let mut map = serializer.serialize_map(Some(known.len() + self.extra.len()))?;
        for field in known {
            map.serialize_entry(field.key(), self.field(field).unwrap_or(""))?;
        }
        for (key, value) in &self.extra {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// A known column of the lead sheet, in schema order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Id,
    Name,
    Email,
    Phone,
    Company,
    Position,
    UtmSource,
    UtmMedium,
    UtmCampaign,
    UtmContent,
    UtmTerm,
    PageVariant,
    CourseName,
    SubmitAt,
}

impl Field {
    pub const ALL: [Field; 14] = [
        Field::Id,
        Field::Name,
        Field::Email,
        Field::Phone,
        Field::Company,
        Field::Position,
        Field::UtmSource,
        Field::UtmMedium,
        Field::UtmCampaign,
        Field::UtmContent,
        Field::UtmTerm,
        Field::PageVariant,
        Field::CourseName,
        Field::SubmitAt,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::Name => "name",
            Field::Email => "email",
            Field::Phone => "phone",
            Field::Company => "company",
            Field::Position => "position",
            Field::UtmSource => "utmSource",
            Field::UtmMedium => "utmMedium",
            Field::UtmCampaign => "utmCampaign",
            Field::UtmContent => "utmContent",
            Field::UtmTerm => "utmTerm",
            Field::PageVariant => "pageVariant",
            Field::CourseName => "courseName",
            Field::SubmitAt => "submitAt",
        }
    }

    /// Other spellings the sheet has used for the same column.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Field::Phone => &["phoneNo"],
            _ => &[],
        }
    }

    pub fn from_key(key: &str) -> Option<Field> {
        Field::ALL
            .into_iter()
            .find(|field| field.key() == key || field.aliases().contains(&key))
    }
}

/// A categorical column that can be grouped on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Source,
    Medium,
    Campaign,
    Content,
    Term,
    Variant,
    Course,
}

impl Dimension {
    pub fn field(self) -> Field {
        match self {
            Dimension::Source => Field::UtmSource,
            Dimension::Medium => Field::UtmMedium,
            Dimension::Campaign => Field::UtmCampaign,
            Dimension::Content => Field::UtmContent,
            Dimension::Term => Field::UtmTerm,
            Dimension::Variant => Field::PageVariant,
            Dimension::Course => Field::CourseName,
        }
    }

    pub fn sentinel(self) -> &'static str {
        match self {
            Dimension::Source => DIRECT_SOURCE,
            Dimension::Variant => PageVariant::Default.key(),
            _ => UNSPECIFIED,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Dimension::Source => "Source",
            Dimension::Medium => "Medium",
            Dimension::Campaign => "Campaign",
            Dimension::Content => "Content",
            Dimension::Term => "Term",
            Dimension::Variant => "Page variant",
            Dimension::Course => "Course",
        }
    }
}

/// Landing-page version of an A/B test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PageVariant {
    A,
    B,
    Default,
}

impl PageVariant {
    pub const ALL: [PageVariant; 3] = [PageVariant::A, PageVariant::B, PageVariant::Default];

    pub fn parse(raw: Option<&str>) -> PageVariant {
        match raw.map(str::trim) {
            Some(value) if value.eq_ignore_ascii_case("a") => PageVariant::A,
            Some(value) if value.eq_ignore_ascii_case("b") => PageVariant::B,
            _ => PageVariant::Default,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            PageVariant::A => "a",
            PageVariant::B => "b",
            PageVariant::Default => "default",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PageVariant::A => "Variant A",
            PageVariant::B => "Variant B",
            PageVariant::Default => "Default page",
        }
    }
}

impl LeadRecord {
    pub fn field(&self, field: Field) -> Option<&str> {
        let value = match field {
            Field::Id => &self.id,
            Field::Name => &self.name,
            Field::Email => &self.email,
            Field::Phone => &self.phone,
            Field::Company => &self.company,
            Field::Position => &self.position,
            Field::UtmSource => &self.utm_source,
            Field::UtmMedium => &self.utm_medium,
            Field::UtmCampaign => &self.utm_campaign,
            Field::UtmContent => &self.utm_content,
            Field::UtmTerm => &self.utm_term,
            Field::PageVariant => &self.page_variant,
            Field::CourseName => &self.course_name,
            Field::SubmitAt => &self.submit_at,
        };
        value.as_deref()
    }

    pub(crate) fn field_mut(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::Id => &mut self.id,
            Field::Name => &mut self.name,
            Field::Email => &mut self.email,
            Field::Phone => &mut self.phone,
            Field::Company => &mut self.company,
            Field::Position => &mut self.position,
            Field::UtmSource => &mut self.utm_source,
            Field::UtmMedium => &mut self.utm_medium,
            Field::UtmCampaign => &mut self.utm_campaign,
            Field::UtmContent => &mut self.utm_content,
            Field::UtmTerm => &mut self.utm_term,
            Field::PageVariant => &mut self.page_variant,
            Field::CourseName => &mut self.course_name,
            Field::SubmitAt => &mut self.submit_at,
        }
    }

    /// Grouping key for `dimension`, with the dimension's sentinel for
    /// absent values. Page variants collapse to `a`, `b` or `default`.
    pub fn category(&self, dimension: Dimension) -> &str {
        if dimension == Dimension::Variant {
            return self.variant().key();
        }
        self.field(dimension.field())
            .unwrap_or_else(|| dimension.sentinel())
    }

    pub fn variant(&self) -> PageVariant {
        PageVariant::parse(self.page_variant.as_deref())
    }

    /// Identity inside a loaded set: the `id` when present, otherwise the
    /// record's position.
    pub fn identity(&self, index: usize) -> Cow<'_, str> {
        match &self.id {
            Some(id) => Cow::Borrowed(id),
            None => Cow::Owned(format!("#{index}")),
        }
    }

    /// Value of a column by its sheet key, known or extra.
    pub fn get(&self, key: &str) -> Option<Cow<'_, str>> {
        match Field::from_key(key) {
            Some(field) => self.field(field).map(Cow::Borrowed),
            None => self.extra.get(key).and_then(value_text),
        }
    }

    fn known_columns(&self) -> impl Iterator<Item = Field> + '_ {
        Field::ALL
            .into_iter()
            .filter(|field| self.sent.contains(field) || self.field(*field).is_some())
    }

    /// Every column key the record carries, blank ones included: known
    /// columns in schema order, then extras in arrival order.
    pub fn columns(&self) -> Vec<&str> {
        self.known_columns()
            .map(|field| -> &str { field.key() })
            .chain(self.extra.keys().map(String::as_str))
            .collect()
    }

    /// Every present column as `(key, text)`, known fields first in schema
    /// order, then extras in arrival order.
    pub fn entries(&self) -> Vec<(&str, Cow<'_, str>)> {
        let known = Field::ALL
            .into_iter()
            .filter_map(|field| self.field(field).map(|v| (field.key(), Cow::Borrowed(v))));
        let extra = self
            .extra
            .iter()
            .filter_map(|(key, value)| value_text(value).map(|v| (key.as_str(), v)));
        known.chain(extra).collect()
    }
}

/// Text form of a JSON value; `None` for null and blank strings.
pub fn value_text(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::Null => None,
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(Cow::Borrowed(trimmed))
            }
        }
        Value::Bool(flag) => Some(Cow::Owned(flag.to_string())),
        Value::Number(number) => Some(Cow::Owned(number.to_string())),
        other => Some(Cow::Owned(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn categories_fall_back_to_sentinels() {
        let record = LeadRecord::default();
        assert_eq!(record.category(Dimension::Source), "direct");
        assert_eq!(record.category(Dimension::Campaign), "(unspecified)");
        assert_eq!(record.category(Dimension::Variant), "default");
    }

    #[test]
    fn variant_parsing_is_case_insensitive() {
        assert_eq!(PageVariant::parse(Some("A")), PageVariant::A);
        assert_eq!(PageVariant::parse(Some(" b ")), PageVariant::B);
        assert_eq!(PageVariant::parse(Some("c")), PageVariant::Default);
        assert_eq!(PageVariant::parse(None), PageVariant::Default);
    }

    #[test]
    fn phone_alias_resolves_to_phone_field() {
        assert_eq!(Field::from_key("phoneNo"), Some(Field::Phone));
        assert_eq!(Field::from_key("utmSource"), Some(Field::UtmSource));
        assert_eq!(Field::from_key("v"), None);
    }

    #[test]
    fn entries_list_known_fields_then_extras() {
        let mut record = LeadRecord {
            name: Some("Avery".to_string()),
            utm_source: Some("google".to_string()),
            ..LeadRecord::default()
        };
        record.extra.insert("score".to_string(), json!(7));
        record.extra.insert("note".to_string(), Value::Null);

        let keys: Vec<&str> = record.entries().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["name", "utmSource", "score"]);
        assert_eq!(record.get("score").as_deref(), Some("7"));
    }

    #[test]
    fn blank_columns_are_kept_through_serialization() {
        let record = crate::normalize::normalize(json!({
            "utmTerm": "",
            "name": "Avery",
            "phoneNo": null,
            "memo": "  ",
        }));
        assert!(record.utm_term.is_none());
        assert_eq!(record.columns(), vec!["name", "phone", "utmTerm", "memo"]);

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({ "name": "Avery", "phone": "", "utmTerm": "", "memo": "  " })
        );
    }

    #[test]
    fn identity_uses_position_without_id() {
        let record = LeadRecord::default();
        assert_eq!(record.identity(4), "#4");
    }
}
