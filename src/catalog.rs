//! Per-entity configuration
//!
//! Everything the generic list, form and data sources need to know about a
//! registry entity: its screen, columns, form fields, searchable fields and
//! the lookups its select fields draw from. Also picks the backend (local
//! SQLite or remote REST API) collections are built over.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::info;

use crate::config::Config;
use crate::crud::{Collection, DataSource, LoadParams};
use crate::lookup::LookupFeed;
use crate::models::{categories, Classification, Employee, FamilyMember, Person, Record, Unit};
use crate::remote::RestClient;
use crate::storage::Storage;
use crate::tui::components::column::{formatters, ColumnDescriptor};
use crate::tui::components::form_field::{
    options_channel, FieldDescriptor, FieldKind, OptionsHandle, SelectOption, Violation,
};
use crate::tui::traits::ScreenId;

/// A record type the registry manages through a list and a form
pub trait Entity: Record {
    /// Plural heading, "Units"
    const TITLE: &'static str;
    /// Singular noun, "Unit"
    const SINGULAR: &'static str;
    const SCREEN: ScreenId;
    /// Fields a search term is matched against
    const SEARCHABLE: &'static [&'static str];

    fn columns(lookups: &Lookups) -> Vec<ColumnDescriptor>;

    fn fields(lookups: &Lookups) -> Vec<FieldDescriptor>;
}

/// Option lists shared by select fields and lookup columns
#[derive(Debug, Clone)]
pub struct Lookups {
    pub units: OptionsHandle,
    pub persons: OptionsHandle,
    pub document_types: OptionsHandle,
    pub relationships: OptionsHandle,
    pub positions: OptionsHandle,
    pub categories: OptionsHandle,
}

impl Lookups {
    /// Lookups with no options yet; selects accept any value until options arrive
    pub fn empty() -> Self {
        Self {
            units: OptionsHandle::fixed(Vec::new()),
            persons: OptionsHandle::fixed(Vec::new()),
            document_types: OptionsHandle::fixed(Vec::new()),
            relationships: OptionsHandle::fixed(Vec::new()),
            positions: OptionsHandle::fixed(Vec::new()),
            categories: category_options(),
        }
    }
}

fn category_options() -> OptionsHandle {
    OptionsHandle::fixed(vec![
        SelectOption::new("Document type", categories::DOCUMENT_TYPE),
        SelectOption::new("Relationship", categories::RELATIONSHIP),
        SelectOption::new("Position", categories::POSITION),
    ])
}

/// Background loaders behind [`Lookups`]
#[derive(Clone)]
pub struct LookupFeeds {
    units: LookupFeed<Unit>,
    persons: LookupFeed<Person>,
    classifications: LookupFeed<Classification>,
}

impl LookupFeeds {
    pub fn new(backend: &Backend) -> (Self, Lookups) {
        let (units_tx, units) = options_channel(Vec::new());
        let (persons_tx, persons) = options_channel(Vec::new());
        let (document_types_tx, document_types) = options_channel(Vec::new());
        let (relationships_tx, relationships) = options_channel(Vec::new());
        let (positions_tx, positions) = options_channel(Vec::new());

        let feeds = Self {
            units: LookupFeed::new(backend.source::<Unit>())
                .sorted_by("name")
                .publish_filtered(units_tx, |u: &Unit| u.active, |u: &Unit| {
                    SelectOption::new(&u.name, u.id)
                }),
            persons: LookupFeed::new(backend.source::<Person>())
                .sorted_by("last_name")
                .publish_to(persons_tx, |p: &Person| {
                    SelectOption::new(&format!("{}, {}", p.last_name, p.first_name), p.id)
                }),
            classifications: LookupFeed::new(backend.source::<Classification>())
                .sorted_by("label")
                .publish_filtered(document_types_tx, in_category(categories::DOCUMENT_TYPE), classification_option)
                .publish_filtered(relationships_tx, in_category(categories::RELATIONSHIP), classification_option)
                .publish_filtered(positions_tx, in_category(categories::POSITION), classification_option),
        };

        let lookups = Lookups {
            units,
            persons,
            document_types,
            relationships,
            positions,
            categories: category_options(),
        };
        (feeds, lookups)
    }

    /// Start every lookup load without waiting for it
    pub fn spawn_all(&self) {
        self.units.spawn();
        self.persons.spawn();
        self.classifications.spawn();
    }

    pub async fn refresh_all(&self) {
        futures::join!(
            self.units.refresh(),
            self.persons.refresh(),
            self.classifications.refresh()
        );
    }
}

fn in_category(category: &'static str) -> impl Fn(&Classification) -> bool + Send + Sync + 'static {
    move |c: &Classification| c.active && c.category == category
}

fn classification_option(c: &Classification) -> SelectOption {
    SelectOption::new(&c.label, c.code.clone())
}

impl Entity for Unit {
    const TITLE: &'static str = "Units";
    const SINGULAR: &'static str = "Unit";
    const SCREEN: ScreenId = ScreenId::Units;
    const SEARCHABLE: &'static [&'static str] = &["code", "name"];

    fn columns(_lookups: &Lookups) -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::new("code", "Code").sortable().with_width(8),
            ColumnDescriptor::new("name", "Name").sortable().with_width(28),
            ColumnDescriptor::new("phone", "Phone").with_width(16),
            ColumnDescriptor::new("active", "Active")
                .with_width(8)
                .with_formatter(formatters::yes_no),
        ]
    }

    fn fields(_lookups: &Lookups) -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::text("code", "Code")
                .required()
                .with_length(Some(2), Some(10))
                .with_placeholder("N01"),
            FieldDescriptor::text("name", "Name").required().with_length(None, Some(80)),
            FieldDescriptor::text("address", "Address"),
            FieldDescriptor::new("phone", "Phone", FieldKind::Tel),
            FieldDescriptor::new("active", "Active", FieldKind::Checkbox),
        ]
    }
}

impl Entity for Employee {
    const TITLE: &'static str = "Employees";
    const SINGULAR: &'static str = "Employee";
    const SCREEN: ScreenId = ScreenId::Employees;
    const SEARCHABLE: &'static [&'static str] = &["first_name", "last_name", "email"];

    fn columns(lookups: &Lookups) -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::new("last_name", "Last name").sortable().with_width(18),
            ColumnDescriptor::new("first_name", "First name").sortable().with_width(18),
            ColumnDescriptor::new("unit_id", "Unit")
                .with_width(22)
                .with_formatter(formatters::lookup(lookups.units.clone())),
            ColumnDescriptor::new("position", "Position")
                .with_width(18)
                .with_formatter(formatters::lookup(lookups.positions.clone())),
            ColumnDescriptor::new("email", "Email").with_width(28),
        ]
    }

    fn fields(lookups: &Lookups) -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::select("unit_id", "Unit", lookups.units.clone()).required(),
            FieldDescriptor::text("first_name", "First name").required(),
            FieldDescriptor::text("last_name", "Last name").required(),
            FieldDescriptor::new("email", "Email", FieldKind::Email).required(),
            FieldDescriptor::new("phone", "Phone", FieldKind::Tel),
            FieldDescriptor::select("position", "Position", lookups.positions.clone()).required(),
            FieldDescriptor::new("hired_on", "Hired on", FieldKind::Date).with_placeholder("YYYY-MM-DD"),
        ]
    }
}

impl Entity for Person {
    const TITLE: &'static str = "Persons";
    const SINGULAR: &'static str = "Person";
    const SCREEN: ScreenId = ScreenId::Persons;
    const SEARCHABLE: &'static [&'static str] = &["document_number", "first_name", "last_name"];

    fn columns(lookups: &Lookups) -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::new("document_type", "Doc")
                .with_width(10)
                .with_formatter(formatters::lookup(lookups.document_types.clone())),
            ColumnDescriptor::new("document_number", "Number").sortable().with_width(14),
            ColumnDescriptor::new("last_name", "Last name").sortable().with_width(18),
            ColumnDescriptor::new("first_name", "First name").sortable().with_width(18),
            ColumnDescriptor::new("birth_date", "Born")
                .sortable()
                .with_width(12)
                .with_formatter(formatters::date),
            ColumnDescriptor::new("monthly_income", "Income")
                .with_width(14)
                .with_formatter(formatters::currency),
        ]
    }

    fn fields(lookups: &Lookups) -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::select("document_type", "Document type", lookups.document_types.clone())
                .required()
                .in_tab("Identity"),
            FieldDescriptor::text("document_number", "Document number")
                .required()
                .with_length(Some(6), Some(12))
                .with_message(Violation::Required, "Document number is mandatory")
                .with_message(Violation::MinLength, "Document numbers have 6 to 12 characters")
                .with_message(Violation::MaxLength, "Document numbers have 6 to 12 characters")
                .in_tab("Identity"),
            FieldDescriptor::text("first_name", "First name").required().in_tab("Identity"),
            FieldDescriptor::text("last_name", "Last name").required().in_tab("Identity"),
            FieldDescriptor::new("birth_date", "Birth date", FieldKind::Date)
                .with_placeholder("YYYY-MM-DD")
                .in_tab("Identity"),
            FieldDescriptor::new("email", "Email", FieldKind::Email).in_tab("Contact"),
            FieldDescriptor::new("phone", "Phone", FieldKind::Tel).in_tab("Contact"),
            FieldDescriptor::text("address", "Address").in_tab("Contact"),
            FieldDescriptor::new("monthly_income", "Monthly income", FieldKind::Number)
                .with_range(Some(0.0), None)
                .with_message(Violation::Min, "Income cannot be negative")
                .in_tab("Socioeconomic"),
            FieldDescriptor::new("notes", "Notes", FieldKind::TextArea)
                .with_length(None, Some(500))
                .in_tab("Socioeconomic"),
        ]
    }
}

impl Entity for FamilyMember {
    const TITLE: &'static str = "Family Members";
    const SINGULAR: &'static str = "Family Member";
    const SCREEN: ScreenId = ScreenId::FamilyMembers;
    const SEARCHABLE: &'static [&'static str] = &["full_name", "relationship"];

    fn columns(lookups: &Lookups) -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::new("household_id", "Household")
                .with_width(24)
                .with_formatter(formatters::lookup(lookups.persons.clone())),
            ColumnDescriptor::new("full_name", "Member").sortable().with_width(24),
            ColumnDescriptor::new("relationship", "Relationship")
                .sortable()
                .with_width(16)
                .with_formatter(formatters::lookup(lookups.relationships.clone())),
            ColumnDescriptor::new("birth_date", "Born")
                .with_width(12)
                .with_formatter(formatters::date),
            ColumnDescriptor::new("dependent", "Dependent")
                .with_width(10)
                .with_formatter(formatters::yes_no),
        ]
    }

    fn fields(lookups: &Lookups) -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::select("household_id", "Head of household", lookups.persons.clone())
                .required(),
            FieldDescriptor::select("person_id", "Member", lookups.persons.clone()).required(),
            FieldDescriptor::text("full_name", "Full name").required(),
            FieldDescriptor::select("relationship", "Relationship", lookups.relationships.clone())
                .required(),
            FieldDescriptor::new("birth_date", "Birth date", FieldKind::Date)
                .with_placeholder("YYYY-MM-DD"),
            FieldDescriptor::new("dependent", "Dependent", FieldKind::Checkbox),
        ]
    }
}

impl Entity for Classification {
    const TITLE: &'static str = "Classifications";
    const SINGULAR: &'static str = "Classification";
    const SCREEN: ScreenId = ScreenId::Classifications;
    const SEARCHABLE: &'static [&'static str] = &["category", "code", "label"];

    fn columns(lookups: &Lookups) -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::new("category", "Category")
                .sortable()
                .with_width(16)
                .with_formatter(formatters::lookup(lookups.categories.clone())),
            ColumnDescriptor::new("code", "Code").sortable().with_width(10),
            ColumnDescriptor::new("label", "Label").sortable().with_width(28),
            ColumnDescriptor::new("active", "Active")
                .with_width(8)
                .with_formatter(formatters::yes_no),
        ]
    }

    fn fields(lookups: &Lookups) -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::select("category", "Category", lookups.categories.clone()).required(),
            FieldDescriptor::text("code", "Code").required().with_length(None, Some(12)),
            FieldDescriptor::text("label", "Label").required(),
            FieldDescriptor::new("active", "Active", FieldKind::Checkbox),
        ]
    }
}

/// Where records live
pub enum Backend {
    Local(Storage),
    Remote(RestClient),
}

impl Backend {
    /// Remote API when `REGISTRY_API_URL` is set, the local database otherwise
    pub async fn open(config: &Config) -> Result<Self> {
        match config.api_url {
            Some(ref url) => {
                let client = RestClient::new(url, config)
                    .with_context(|| format!("Failed to create HTTP client for {}", url))?;
                info!("Using remote registry at {}", url);
                Ok(Backend::Remote(client))
            }
            None => {
                let storage = Storage::new(config.database_path_str())
                    .await
                    .with_context(|| {
                        format!("Failed to open database at {}", config.database_path_str())
                    })?;
                Ok(Backend::Local(storage))
            }
        }
    }

    pub fn source<R: Entity>(&self) -> Arc<dyn DataSource<R>> {
        match self {
            Backend::Local(storage) => Arc::new(storage.source::<R>(R::SEARCHABLE)),
            Backend::Remote(client) => Arc::new(client.source::<R>()),
        }
    }

    pub fn collection<R: Entity>(&self, page_size: u32) -> Arc<Collection<R>> {
        Arc::new(Collection::new(self.source::<R>(), page_size))
    }

    pub fn describe(&self) -> String {
        match self {
            Backend::Local(_) => "local database".to_string(),
            Backend::Remote(_) => "remote registry".to_string(),
        }
    }
}

/// Records written by [`seed`]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub classifications: usize,
    pub units: usize,
    pub persons: usize,
    pub employees: usize,
    pub family_members: usize,
}

impl SeedReport {
    pub fn total(&self) -> usize {
        self.classifications + self.units + self.persons + self.employees + self.family_members
    }
}

/// Fill an empty registry with a small demonstration data set
pub async fn seed(backend: &Backend) -> Result<SeedReport> {
    let units = backend.source::<Unit>();
    let existing = units
        .load(&LoadParams::new(1, 1))
        .await
        .context("Failed to check for existing units")?;
    if existing.total > 0 {
        anyhow::bail!("Registry already has {} units; refusing to seed", existing.total);
    }

    let mut report = SeedReport::default();

    let classifications = backend.source::<Classification>();
    let lookup_rows = [
        (categories::DOCUMENT_TYPE, "DNI", "National ID"),
        (categories::DOCUMENT_TYPE, "PAS", "Passport"),
        (categories::RELATIONSHIP, "SPOUSE", "Spouse"),
        (categories::RELATIONSHIP, "CHILD", "Child"),
        (categories::RELATIONSHIP, "PARENT", "Parent"),
        (categories::POSITION, "SW", "Social worker"),
        (categories::POSITION, "ADM", "Administrative"),
        (categories::POSITION, "COORD", "Coordinator"),
    ];
    for (category, code, label) in lookup_rows {
        classifications
            .create(json!({"category": category, "code": code, "label": label, "active": true}))
            .await
            .with_context(|| format!("Failed to create classification {}", code))?;
        report.classifications += 1;
    }

    let mut unit_ids = Vec::new();
    for (code, name, phone) in [
        ("N01", "North Community Centre", "+54 11 5555-0101"),
        ("S01", "South Social Office", "+54 11 5555-0202"),
        ("C01", "Central Registry Desk", "+54 11 5555-0303"),
    ] {
        let unit = units
            .create(json!({"code": code, "name": name, "phone": phone, "active": true}))
            .await
            .with_context(|| format!("Failed to create unit {}", code))?;
        unit_ids.push(unit.id);
        report.units += 1;
    }

    let persons = backend.source::<Person>();
    let mut person_ids = Vec::new();
    for (number, first, last, born, income) in [
        ("30111222", "Ana", "Gómez", "1984-05-12", 185000.0),
        ("28999111", "Luis", "Gómez", "1981-11-02", 210000.0),
        ("45123456", "Sofía", "Gómez", "2010-03-30", 0.0),
        ("33222444", "Marta", "Pereyra", "1990-07-21", 98000.0),
    ] {
        let person = persons
            .create(json!({
                "document_type": "DNI",
                "document_number": number,
                "first_name": first,
                "last_name": last,
                "birth_date": born,
                "monthly_income": income,
            }))
            .await
            .with_context(|| format!("Failed to create person {}", number))?;
        person_ids.push(person.id);
        report.persons += 1;
    }

    let employees = backend.source::<Employee>();
    for (unit, first, last, email, position) in [
        (0, "Carla", "Ruiz", "cruiz@registry.example.org", "SW"),
        (1, "Diego", "Ferrari", "dferrari@registry.example.org", "ADM"),
        (2, "Elena", "Sosa", "esosa@registry.example.org", "COORD"),
    ] {
        employees
            .create(json!({
                "unit_id": unit_ids[unit],
                "first_name": first,
                "last_name": last,
                "email": email,
                "position": position,
                "hired_on": "2022-03-01",
            }))
            .await
            .with_context(|| format!("Failed to create employee {}", email))?;
        report.employees += 1;
    }

    let members = backend.source::<FamilyMember>();
    let head = person_ids[0];
    for (member, name, relationship, dependent) in [
        (person_ids[1], "Luis Gómez", "SPOUSE", false),
        (person_ids[2], "Sofía Gómez", "CHILD", true),
    ] {
        members
            .create(json!({
                "household_id": head,
                "person_id": member,
                "full_name": name,
                "relationship": relationship,
                "dependent": dependent,
            }))
            .await
            .with_context(|| format!("Failed to add {} to household {}", name, head))?;
        report.family_members += 1;
    }

    info!("Seeded {} records", report.total());
    Ok(report)
}
