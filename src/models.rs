use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identity of a record within its collection.
pub trait RecordKey: PartialEq + Clone + fmt::Display + fmt::Debug + Send + Sync + 'static {
    /// Parse a key from its display form (CLI arguments, URL segments).
    fn parse_key(raw: &str) -> Result<Self, String>;
}

impl<T> RecordKey for T
where
    T: PartialEq + Clone + fmt::Display + fmt::Debug + FromStr + Send + Sync + 'static,
    T::Err: fmt::Display,
{
    fn parse_key(raw: &str) -> Result<Self, String> {
        raw.trim().parse().map_err(|e: T::Err| e.to_string())
    }
}

/// One entity instance held by a paginated collection.
///
/// Collections only ever read the key; everything else is reached through the
/// record's JSON projection so list and form views stay generic.
pub trait Record: Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static {
    type Key: RecordKey;

    /// Resource segment used by data sources (`/units`, `records.resource`)
    const RESOURCE: &'static str;

    fn key(&self) -> Self::Key;

    /// Read one field through the JSON projection, `Null` when absent.
    fn field_value(&self, name: &str) -> Value {
        match serde_json::to_value(self) {
            Ok(Value::Object(mut map)) => map.remove(name).unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }
}

/// Administrative unit (office, community centre) staff are assigned to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub active: bool,
}

impl Record for Unit {
    type Key = i64;
    const RESOURCE: &'static str = "units";

    fn key(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: i64,
    pub unit_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub position: String,
    pub hired_on: Option<NaiveDate>,
}

impl Record for Employee {
    type Key = i64;
    const RESOURCE: &'static str = "employees";

    fn key(&self) -> i64 {
        self.id
    }
}

/// Registered beneficiary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: i64,
    pub document_type: String,
    pub document_number: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<NaiveDate>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub monthly_income: Option<f64>,
    pub notes: Option<String>,
}

impl Record for Person {
    type Key = i64;
    const RESOURCE: &'static str = "persons";

    fn key(&self) -> i64 {
        self.id
    }
}

/// Household composition entry: `person_id` lives in the household headed by `household_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyMember {
    pub household_id: i64,
    pub person_id: i64,
    pub full_name: String,
    pub relationship: String,
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub dependent: bool,
}

impl Record for FamilyMember {
    type Key = MemberKey;
    const RESOURCE: &'static str = "family-members";

    fn key(&self) -> MemberKey {
        MemberKey {
            household_id: self.household_id,
            person_id: self.person_id,
        }
    }
}

/// Composite key of a household membership, displayed as `<household>-<person>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberKey {
    pub household_id: i64,
    pub person_id: i64,
}

#[derive(Error, Debug)]
#[error("invalid household member key '{0}', expected <household>-<person>")]
pub struct MemberKeyError(String);

impl fmt::Display for MemberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.household_id, self.person_id)
    }
}

impl FromStr for MemberKey {
    type Err = MemberKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (household, person) = s
            .split_once('-')
            .ok_or_else(|| MemberKeyError(s.to_string()))?;
        let household_id = household.parse().map_err(|_| MemberKeyError(s.to_string()))?;
        let person_id = person.parse().map_err(|_| MemberKeyError(s.to_string()))?;
        Ok(MemberKey {
            household_id,
            person_id,
        })
    }
}

/// Lookup value (document types, relationships, positions) grouped by category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub id: i64,
    pub category: String,
    pub code: String,
    pub label: String,
    #[serde(default)]
    pub active: bool,
}

impl Record for Classification {
    type Key = i64;
    const RESOURCE: &'static str = "classifications";

    fn key(&self) -> i64 {
        self.id
    }
}

/// Classification categories referenced by entity forms
pub mod categories {
    pub const DOCUMENT_TYPE: &str = "document_type";
    pub const RELATIONSHIP: &str = "relationship";
    pub const POSITION: &str = "position";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_key_round_trips_through_display() {
        let key = MemberKey { household_id: 3, person_id: 17 };
        assert_eq!(key.to_string(), "3-17");
        assert_eq!(MemberKey::parse_key("3-17").unwrap(), key);
        assert!(MemberKey::parse_key("3").is_err());
        assert!(MemberKey::parse_key("a-b").is_err());
    }

    #[test]
    fn test_field_value_reads_json_projection() {
        let unit = Unit {
            id: 4,
            code: "N-01".to_string(),
            name: "North Office".to_string(),
            address: None,
            phone: Some("555-0101".to_string()),
            active: true,
        };
        assert_eq!(unit.field_value("name"), Value::from("North Office"));
        assert_eq!(unit.field_value("address"), Value::Null);
        assert_eq!(unit.field_value("missing"), Value::Null);
        assert_eq!(unit.key(), 4);
    }

    #[test]
    fn test_optional_fields_default_when_absent() {
        let member: FamilyMember = serde_json::from_str(
            r#"{"household_id": 1, "person_id": 2, "full_name": "Ana Ruiz", "relationship": "daughter"}"#,
        )
        .unwrap();
        assert!(!member.dependent);
        assert!(member.birth_date.is_none());
        assert_eq!(member.key(), MemberKey { household_id: 1, person_id: 2 });
    }
}
