//! Synthetic customer profiles for registration runs
//!
//! Values come from small fixed pools; realism is not a goal, uniqueness of
//! the external id and email is.

use chrono::{Datelike, Duration, NaiveDate};
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Value};
use shared::{Context, EntityId};
use uuid::Uuid;

const FIRST_NAMES: &[&str] = &[
    "Ava", "Liam", "Maya", "Noah", "Zoe", "Ethan", "Iris", "Lucas", "Nora", "Owen", "Ruby", "Theo",
];
const LAST_NAMES: &[&str] = &[
    "Garcia", "Nguyen", "Patel", "Smith", "Kowalski", "Okafor", "Larsen", "Moreau", "Tanaka", "Reyes",
];
const STREETS: &[&str] = &["Maple Ave", "Oak St", "Cedar Ln", "Pine Rd", "Elm Dr", "Birch Way", "Lakeview Blvd"];
const CITIES: &[(&str, &str, &str)] = &[
    ("Austin", "TX", "78701"),
    ("Columbus", "OH", "43004"),
    ("Denver", "CO", "80202"),
    ("Portland", "OR", "97201"),
    ("Raleigh", "NC", "27601"),
    ("Tampa", "FL", "33602"),
];
const EMAIL_DOMAINS: &[&str] = &["example.com", "example.net", "example.org"];

/// One customer to be registered through the core API
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticCustomer {
    pub external_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

impl SyntheticCustomer {
    /// Draw a customer aged between 18 and 80 on `today`
    pub fn generate<R: Rng + ?Sized>(rng: &mut R, today: NaiveDate) -> Self {
        let first_name = pick(rng, FIRST_NAMES);
        let last_name = pick(rng, LAST_NAMES);
        let external_id = Uuid::new_v4().to_string();
        let (city, state, zip) = *CITIES.choose(rng).unwrap_or(&CITIES[0]);

        // Short external id suffix keeps emails unique across a batch
        let email = format!(
            "{}.{}.{}@{}",
            first_name.to_lowercase(),
            last_name.to_lowercase(),
            &external_id[..8],
            pick(rng, EMAIL_DOMAINS)
        );

        let age_days = rng.gen_range(18 * 365..=80 * 365);
        let date_of_birth = today - Duration::days(age_days);

        Self {
            external_id,
            email,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            date_of_birth,
            address: format!("{} {}", rng.gen_range(1..=9999), pick(rng, STREETS)),
            city: city.to_string(),
            state: state.to_string(),
            zip: zip.to_string(),
        }
    }

    /// `{"user": {...}}` body for the core users endpoint
    pub fn to_payload(&self, context: Context) -> Value {
        json!({
            "user": {
                "external_id": self.external_id,
                "email": self.email,
                "first_name": self.first_name,
                "last_name": self.last_name,
                "opted_in": true,
                "dob": format!(
                    "{:04}-{:02}-{:02}",
                    self.date_of_birth.year(),
                    self.date_of_birth.month(),
                    self.date_of_birth.day()
                ),
                "address": self.address,
                "city": self.city,
                "zip": self.zip,
                "state": self.state,
                "country": "USA",
                "user_profile": profile_defaults(context),
            }
        })
    }
}

/// Id and email of the customer the core API created, if the body carries one
pub fn parse_registration(body: &Value) -> Option<(EntityId, Option<String>)> {
    let user = body.get("user")?;
    let id = match user.get("id")? {
        Value::String(id) => id.clone(),
        Value::Number(id) => id.to_string(),
        _ => return None,
    };
    let email = user.get("email").and_then(Value::as_str).map(str::to_string);
    Some((EntityId::new(id), email))
}

fn profile_defaults(context: Context) -> Value {
    match context {
        Context::Retail => json!({ "brand": ["vrg", "kr", "ta", "psg", "gho", "me"] }),
        Context::Fuel => json!({ "brand": ["kr"] }),
        Context::Qsr => json!({
            "Allergies": [],
            "Dietary_Restrictions": [],
            "Favorite_Team": [],
            "Most_Frequent_Store": [],
            "Occasions": []
        }),
    }
}

fn pick<'a, R: Rng + ?Sized>(rng: &mut R, pool: &[&'a str]) -> &'a str {
    pool.choose(rng).copied().unwrap_or_default()
}
