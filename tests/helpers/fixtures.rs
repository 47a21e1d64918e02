//! Common test fixtures
//!
//! Entity and embeddable declarations shared by the integration tests.
#![allow(dead_code)]

use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, Utc};
use dynamo_entity::Error;
use dynamo_entity::entity::{
    DeclaredType, Entity, FieldDescriptor, Record, RecordKind, Scalar, UuidGenerator,
};
use dynamo_entity::schema::AttributeType;

/// Merchant with a generated UUID id and an index on its name
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Merchant {
    pub id: Option<String>,
    pub name: String,
}

impl Record for Merchant {
    const KIND: RecordKind = RecordKind::Entity;

    fn fields() -> Vec<FieldDescriptor<Self>> {
        vec![
            FieldDescriptor::generated_id(
                "id",
                |m: &Merchant| m.id.as_deref(),
                |m: &mut Merchant, id| m.id = Some(id),
                UuidGenerator,
            ),
            FieldDescriptor::plain("name", |m: &Merchant| &m.name, |m: &mut Merchant, v| {
                m.name = v
            }),
        ]
    }
}

impl Entity for Merchant {
    const TABLE: &'static str = "merchant";
    const INDEXES: &'static [&'static str] = &["name"];
}

impl Merchant {
    pub fn named(name: &str) -> Self {
        Self {
            id: None,
            name: name.to_string(),
        }
    }

    pub fn with_id(id: &str, name: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            name: name.to_string(),
        }
    }
}

/// Category whose id must be supplied by the caller
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Category {
    pub code: Option<String>,
    pub label: String,
    pub budget: Option<i64>,
}

impl Record for Category {
    const KIND: RecordKind = RecordKind::Entity;

    fn fields() -> Vec<FieldDescriptor<Self>> {
        vec![
            FieldDescriptor::id(
                "code",
                |c: &Category| c.code.as_deref(),
                |c: &mut Category, code| c.code = Some(code),
            ),
            FieldDescriptor::plain("label", |c: &Category| &c.label, |c: &mut Category, v| {
                c.label = v
            }),
            FieldDescriptor::plain("budget", |c: &Category| &c.budget, |c: &mut Category, v| {
                c.budget = v
            }),
        ]
    }
}

impl Entity for Category {
    const TABLE: &'static str = "category";
}

/// Receipt scan attached to an expense
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Attachment {
    pub location: String,
    pub content_type: String,
    pub size: i64,
}

impl Record for Attachment {
    const KIND: RecordKind = RecordKind::Embeddable;

    fn fields() -> Vec<FieldDescriptor<Self>> {
        vec![
            FieldDescriptor::plain(
                "location",
                |a: &Attachment| &a.location,
                |a: &mut Attachment, v| a.location = v,
            ),
            FieldDescriptor::plain(
                "content_type",
                |a: &Attachment| &a.content_type,
                |a: &mut Attachment, v| a.content_type = v,
            ),
            FieldDescriptor::plain("size", |a: &Attachment| &a.size, |a: &mut Attachment, v| {
                a.size = v
            }),
        ]
    }
}

/// Expense referencing a merchant, with an embedded attachment
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Expense {
    pub id: Option<String>,
    pub merchant: Option<Merchant>,
    pub amount: f64,
    pub date: Option<DateTime<Utc>>,
    pub description: String,
    pub approved: bool,
    pub attachment: Option<Attachment>,
    pub cache: Vec<String>,
}

impl Record for Expense {
    const KIND: RecordKind = RecordKind::Entity;

    fn fields() -> Vec<FieldDescriptor<Self>> {
        vec![
            FieldDescriptor::generated_id(
                "id",
                |e: &Expense| e.id.as_deref(),
                |e: &mut Expense, id| e.id = Some(id),
                UuidGenerator,
            ),
            FieldDescriptor::many_to_one(
                "merchant",
                |e: &Expense| e.merchant.as_ref(),
                |e: &mut Expense, m| e.merchant = Some(m),
            ),
            FieldDescriptor::plain("amount", |e: &Expense| &e.amount, |e: &mut Expense, v| {
                e.amount = v
            }),
            FieldDescriptor::temporal(
                "date",
                |e: &Expense| e.date,
                |e: &mut Expense, d| e.date = Some(d),
            ),
            FieldDescriptor::plain(
                "description",
                |e: &Expense| &e.description,
                |e: &mut Expense, v| e.description = v,
            ),
            FieldDescriptor::plain(
                "approved",
                |e: &Expense| &e.approved,
                |e: &mut Expense, v| e.approved = v,
            ),
            FieldDescriptor::embedded(
                "attachment",
                |e: &Expense| e.attachment.as_ref(),
                |e: &mut Expense, a| e.attachment = Some(a),
            ),
            FieldDescriptor::transient("cache"),
        ]
    }
}

impl Entity for Expense {
    const TABLE: &'static str = "expense";
    const INDEXES: &'static [&'static str] = &["merchant.id"];
}

impl Expense {
    pub fn new(merchant: &Merchant, amount: f64, description: &str) -> Self {
        Self {
            id: None,
            merchant: Some(merchant.clone()),
            amount,
            date: DateTime::from_timestamp_millis(1_700_000_000_123),
            description: description.to_string(),
            approved: false,
            attachment: None,
            cache: Vec::new(),
        }
    }
}

/// Entity embedding a value object that embeds itself
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SampleEntity {
    pub id: Option<String>,
    pub name: String,
    pub embedded: Option<SampleEmbeddable>,
}

impl Record for SampleEntity {
    const KIND: RecordKind = RecordKind::Entity;

    fn fields() -> Vec<FieldDescriptor<Self>> {
        vec![
            FieldDescriptor::generated_id(
                "id",
                |s: &SampleEntity| s.id.as_deref(),
                |s: &mut SampleEntity, id| s.id = Some(id),
                UuidGenerator,
            ),
            FieldDescriptor::plain(
                "name",
                |s: &SampleEntity| &s.name,
                |s: &mut SampleEntity, v| s.name = v,
            ),
            FieldDescriptor::embedded(
                "embedded",
                |s: &SampleEntity| s.embedded.as_ref(),
                |s: &mut SampleEntity, e| s.embedded = Some(e),
            ),
        ]
    }
}

impl Entity for SampleEntity {
    const TABLE: &'static str = "sample_entity";
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SampleEmbeddable {
    pub some_field: String,
    pub deep_embedded: Option<Box<SampleEmbeddable>>,
}

impl Record for SampleEmbeddable {
    const KIND: RecordKind = RecordKind::Embeddable;

    fn fields() -> Vec<FieldDescriptor<Self>> {
        vec![
            FieldDescriptor::plain(
                "some_field",
                |s: &SampleEmbeddable| &s.some_field,
                |s: &mut SampleEmbeddable, v| s.some_field = v,
            ),
            FieldDescriptor::embedded(
                "deep_embedded",
                |s: &SampleEmbeddable| s.deep_embedded.as_deref(),
                |s: &mut SampleEmbeddable, e| s.deep_embedded = Some(Box::new(e)),
            ),
        ]
    }
}

impl SampleEmbeddable {
    /// Chain of `depth` nested values, the outermost named `level-1`
    pub fn chain(depth: usize) -> Option<Self> {
        (1..=depth).rev().fold(None, |inner, level| {
            Some(SampleEmbeddable {
                some_field: format!("level-{}", level),
                deep_embedded: inner.map(Box::new),
            })
        })
    }
}

/// Entity declaring a one-to-many collection
#[derive(Debug, Default)]
pub struct ExpenseReport {
    pub id: Option<String>,
    pub expenses: Vec<Expense>,
}

impl Record for ExpenseReport {
    const KIND: RecordKind = RecordKind::Entity;

    fn fields() -> Vec<FieldDescriptor<Self>> {
        vec![
            FieldDescriptor::id(
                "id",
                |r: &ExpenseReport| r.id.as_deref(),
                |r: &mut ExpenseReport, id| r.id = Some(id),
            ),
            FieldDescriptor::one_to_many::<Expense>("expenses"),
        ]
    }
}

impl Entity for ExpenseReport {
    const TABLE: &'static str = "expense_report";
}

/// Entity embedding another entity
#[derive(Debug, Default)]
pub struct Invoice {
    pub id: Option<String>,
    pub merchant: Option<Merchant>,
}

impl Record for Invoice {
    const KIND: RecordKind = RecordKind::Entity;

    fn fields() -> Vec<FieldDescriptor<Self>> {
        vec![
            FieldDescriptor::id(
                "id",
                |i: &Invoice| i.id.as_deref(),
                |i: &mut Invoice, id| i.id = Some(id),
            ),
            FieldDescriptor::embedded(
                "merchant",
                |i: &Invoice| i.merchant.as_ref(),
                |i: &mut Invoice, m| i.merchant = Some(m),
            ),
        ]
    }
}

impl Entity for Invoice {
    const TABLE: &'static str = "invoice";
}

/// Entity without an id field
#[derive(Debug, Default)]
pub struct Note {
    pub text: String,
}

impl Record for Note {
    const KIND: RecordKind = RecordKind::Entity;

    fn fields() -> Vec<FieldDescriptor<Self>> {
        vec![FieldDescriptor::plain(
            "text",
            |n: &Note| &n.text,
            |n: &mut Note, v| n.text = v,
        )]
    }
}

impl Entity for Note {
    const TABLE: &'static str = "note";
}

/// Entity with an index over two columns
#[derive(Debug, Default)]
pub struct Trip {
    pub id: Option<String>,
    pub origin: String,
    pub destination: String,
}

impl Record for Trip {
    const KIND: RecordKind = RecordKind::Entity;

    fn fields() -> Vec<FieldDescriptor<Self>> {
        vec![
            FieldDescriptor::id(
                "id",
                |t: &Trip| t.id.as_deref(),
                |t: &mut Trip, id| t.id = Some(id),
            ),
            FieldDescriptor::plain("origin", |t: &Trip| &t.origin, |t: &mut Trip, v| {
                t.origin = v
            }),
            FieldDescriptor::plain(
                "destination",
                |t: &Trip| &t.destination,
                |t: &mut Trip, v| t.destination = v,
            ),
        ]
    }
}

impl Entity for Trip {
    const TABLE: &'static str = "trip";
    const INDEXES: &'static [&'static str] = &["origin,destination"];
}

/// Entity indexed on a boolean column
#[derive(Debug, Default)]
pub struct Reminder {
    pub id: Option<String>,
    pub done: bool,
}

impl Record for Reminder {
    const KIND: RecordKind = RecordKind::Entity;

    fn fields() -> Vec<FieldDescriptor<Self>> {
        vec![
            FieldDescriptor::id(
                "id",
                |r: &Reminder| r.id.as_deref(),
                |r: &mut Reminder, id| r.id = Some(id),
            ),
            FieldDescriptor::plain("done", |r: &Reminder| &r.done, |r: &mut Reminder, v| {
                r.done = v
            }),
        ]
    }
}

impl Entity for Reminder {
    const TABLE: &'static str = "reminder";
    const INDEXES: &'static [&'static str] = &["done"];
}

/// Price that refuses to be stored unless finite
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Price(pub f64);

impl Scalar for Price {
    fn declared_type() -> DeclaredType {
        DeclaredType::Number
    }

    fn to_attribute(&self) -> Result<AttributeValue, Error> {
        if !self.0.is_finite() {
            return Err(Error::IncompatibleAttributeType {
                attribute: "price".to_string(),
                expected: AttributeType::Number,
                found: self.0.to_string(),
            });
        }
        self.0.to_attribute()
    }

    fn from_attribute(value: AttributeValue) -> Result<Self, Error> {
        f64::from_attribute(value).map(Price)
    }
}

/// Product with a generated id and a validated price
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Product {
    pub id: Option<String>,
    pub price: Price,
}

impl Record for Product {
    const KIND: RecordKind = RecordKind::Entity;

    fn fields() -> Vec<FieldDescriptor<Self>> {
        vec![
            FieldDescriptor::generated_id(
                "id",
                |p: &Product| p.id.as_deref(),
                |p: &mut Product, id| p.id = Some(id),
                UuidGenerator,
            ),
            FieldDescriptor::plain("price", |p: &Product| &p.price, |p: &mut Product, v| {
                p.price = v
            }),
        ]
    }
}

impl Entity for Product {
    const TABLE: &'static str = "product";
}

impl Product {
    pub fn priced(price: f64) -> Self {
        Self {
            id: None,
            price: Price(price),
        }
    }
}
